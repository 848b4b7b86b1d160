use async_trait::async_trait;
use convene_models::Snowflake;
use serde_json::{Map, Value};

use crate::error::RemoteError;

/// Request/response access to the remote scheduled-event routes.
///
/// Implementations own retry and rate-limit policy. Payloads are returned raw;
/// validation happens in the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_scheduled_event(
        &self,
        guild_id: Snowflake,
        event_id: Snowflake,
    ) -> Result<Value, RemoteError>;

    async fn list_scheduled_events(&self, guild_id: Snowflake) -> Result<Vec<Value>, RemoteError>;

    async fn edit_scheduled_event(
        &self,
        guild_id: Snowflake,
        event_id: Snowflake,
        body: &Map<String, Value>,
        reason: Option<&str>,
    ) -> Result<Value, RemoteError>;

    async fn delete_scheduled_event(
        &self,
        guild_id: Snowflake,
        event_id: Snowflake,
        reason: Option<&str>,
    ) -> Result<(), RemoteError>;
}
