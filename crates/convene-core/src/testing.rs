//! Recording transport used by the unit tests.

use async_trait::async_trait;
use convene_models::Snowflake;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::RemoteError;
use crate::resolver::MemoryResolver;
use crate::transport::Transport;
use crate::ClientState;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch(Snowflake, Snowflake),
    List(Snowflake),
    Edit {
        guild_id: Snowflake,
        event_id: Snowflake,
        body: Map<String, Value>,
        reason: Option<String>,
    },
    Delete {
        guild_id: Snowflake,
        event_id: Snowflake,
        reason: Option<String>,
    },
}

#[derive(Default)]
pub struct MockTransport {
    calls: Mutex<Vec<Call>>,
    responses: Mutex<VecDeque<Result<Value, RemoteError>>>,
}

impl MockTransport {
    pub fn push_response(&self, response: Result<Value, RemoteError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, call: Call) -> Result<Value, RemoteError> {
        self.calls.lock().unwrap().push(call);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Value::Null))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_scheduled_event(
        &self,
        guild_id: Snowflake,
        event_id: Snowflake,
    ) -> Result<Value, RemoteError> {
        self.next(Call::Fetch(guild_id, event_id))
    }

    async fn list_scheduled_events(&self, guild_id: Snowflake) -> Result<Vec<Value>, RemoteError> {
        match self.next(Call::List(guild_id))? {
            Value::Array(items) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    async fn edit_scheduled_event(
        &self,
        guild_id: Snowflake,
        event_id: Snowflake,
        body: &Map<String, Value>,
        reason: Option<&str>,
    ) -> Result<Value, RemoteError> {
        self.next(Call::Edit {
            guild_id,
            event_id,
            body: body.clone(),
            reason: reason.map(str::to_string),
        })
    }

    async fn delete_scheduled_event(
        &self,
        guild_id: Snowflake,
        event_id: Snowflake,
        reason: Option<&str>,
    ) -> Result<(), RemoteError> {
        self.next(Call::Delete {
            guild_id,
            event_id,
            reason: reason.map(str::to_string),
        })
        .map(|_| ())
    }
}

pub fn state_with(transport: Arc<MockTransport>) -> (ClientState, Arc<MemoryResolver>) {
    let resolver = Arc::new(MemoryResolver::new());
    let state = ClientState::new(transport, resolver.clone());
    (state, resolver)
}

pub const EVENT_ID: u64 = 912_345_678_901_234_567;
pub const GUILD_ID: u64 = 80_351_110_224_678_912;
pub const CHANNEL_ID: u64 = 41_771_983_423_143_937;

/// A full voice-channel event payload.
pub fn full_payload() -> Value {
    json!({
        "id": EVENT_ID.to_string(),
        "guild_id": GUILD_ID.to_string(),
        "channel_id": CHANNEL_ID.to_string(),
        "creator_id": "53908232506183680",
        "name": "Movie night",
        "description": "Bring snacks",
        "scheduled_start_time": "2024-06-01T19:00:00+00:00",
        "scheduled_end_time": null,
        "privacy_level": 2,
        "status": 1,
        "entity_type": 2,
        "entity_id": null,
        "entity_metadata": null,
        "user_count": 12,
        "image": "a_1b2c3d",
        "creator": {
            "id": "53908232506183680",
            "username": "mason",
            "global_name": "Mason",
            "avatar": null
        }
    })
}

/// The listing form of [`full_payload`].
pub fn partial_payload() -> Value {
    json!({
        "id": EVENT_ID.to_string(),
        "guild_id": GUILD_ID.to_string(),
        "name": "Movie night",
        "scheduled_start_time": "2024-06-01T19:00:00+00:00",
        "privacy_level": 2,
        "status": 1,
        "entity_type": 2
    })
}
