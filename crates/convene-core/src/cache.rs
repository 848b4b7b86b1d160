use convene_models::{SchemaError, Snowflake};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{EventError, RemoteError};
use crate::scheduled_event::{EventPayload, ScheduledEvent};
use crate::ClientState;

pub const GUILD_SCHEDULED_EVENT_CREATE: &str = "GUILD_SCHEDULED_EVENT_CREATE";
pub const GUILD_SCHEDULED_EVENT_UPDATE: &str = "GUILD_SCHEDULED_EVENT_UPDATE";
pub const GUILD_SCHEDULED_EVENT_DELETE: &str = "GUILD_SCHEDULED_EVENT_DELETE";
pub const GUILD_SCHEDULED_EVENT_USER_ADD: &str = "GUILD_SCHEDULED_EVENT_USER_ADD";
pub const GUILD_SCHEDULED_EVENT_USER_REMOVE: &str = "GUILD_SCHEDULED_EVENT_USER_REMOVE";

/// What a gateway dispatch did to the cache.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Upserted(Arc<ScheduledEvent>),
    Removed(Arc<ScheduledEvent>),
    Subscribed {
        event: Option<Arc<ScheduledEvent>>,
        user_id: Snowflake,
    },
    Unsubscribed {
        event: Option<Arc<ScheduledEvent>>,
        user_id: Snowflake,
    },
    Ignored,
}

#[derive(Deserialize)]
struct SubscriptionPayload {
    guild_scheduled_event_id: Snowflake,
    user_id: Snowflake,
}

/// Shared handles for every event seen through one client.
///
/// A second payload for a cached id updates the existing handle, so every
/// holder of the `Arc` observes it.
#[derive(Debug)]
pub struct EventCache {
    state: ClientState,
    events: DashMap<Snowflake, Arc<ScheduledEvent>>,
}

impl EventCache {
    pub fn new(state: ClientState) -> Self {
        Self {
            state,
            events: DashMap::new(),
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn upsert(&self, payload: EventPayload) -> Arc<ScheduledEvent> {
        match self.events.entry(payload.id()) {
            Entry::Occupied(entry) => {
                let event = entry.get().clone();
                drop(entry);
                event.reparse(payload);
                event
            }
            Entry::Vacant(entry) => entry
                .insert(Arc::new(ScheduledEvent::new(self.state.clone(), payload)))
                .value()
                .clone(),
        }
    }

    pub fn upsert_partial(&self, raw: &Value) -> Result<Arc<ScheduledEvent>, SchemaError> {
        Ok(self.upsert(EventPayload::partial(raw)?))
    }

    pub fn upsert_full(&self, raw: &Value) -> Result<Arc<ScheduledEvent>, SchemaError> {
        Ok(self.upsert(EventPayload::full(raw)?))
    }

    pub fn get(&self, event_id: Snowflake) -> Option<Arc<ScheduledEvent>> {
        self.events.get(&event_id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, event_id: Snowflake) -> Option<Arc<ScheduledEvent>> {
        self.events.remove(&event_id).map(|(_, event)| event)
    }

    /// Cached events of one guild, ordered by start time.
    pub fn for_guild(&self, guild_id: Snowflake) -> Vec<Arc<ScheduledEvent>> {
        let mut events: Vec<_> = self
            .events
            .iter()
            .filter(|entry| entry.value().guild_id() == guild_id)
            .map(|entry| entry.value().clone())
            .collect();
        events.sort_by_key(|event| (event.scheduled_start_time(), event.id()));
        events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Apply one gateway dispatch.
    pub fn handle_dispatch(
        &self,
        event_type: &str,
        payload: &Value,
    ) -> Result<DispatchOutcome, SchemaError> {
        match event_type {
            GUILD_SCHEDULED_EVENT_CREATE | GUILD_SCHEDULED_EVENT_UPDATE => {
                let event = self.upsert_full(payload)?;
                tracing::debug!(
                    event_id = %event.id(),
                    event_type,
                    "applied scheduled event dispatch"
                );
                Ok(DispatchOutcome::Upserted(event))
            }
            GUILD_SCHEDULED_EVENT_DELETE => {
                let payload = EventPayload::full(payload)?;
                let event = match self.remove(payload.id()) {
                    Some(event) => {
                        event.reparse(payload);
                        event
                    }
                    None => Arc::new(ScheduledEvent::new(self.state.clone(), payload)),
                };
                Ok(DispatchOutcome::Removed(event))
            }
            GUILD_SCHEDULED_EVENT_USER_ADD | GUILD_SCHEDULED_EVENT_USER_REMOVE => {
                let subscription = SubscriptionPayload::deserialize(payload)?;
                let added = event_type == GUILD_SCHEDULED_EVENT_USER_ADD;
                let event = self.get(subscription.guild_scheduled_event_id);
                if let Some(event) = &event {
                    event.adjust_user_count(if added { 1 } else { -1 });
                }
                let user_id = subscription.user_id;
                Ok(if added {
                    DispatchOutcome::Subscribed { event, user_id }
                } else {
                    DispatchOutcome::Unsubscribed { event, user_id }
                })
            }
            _ => Ok(DispatchOutcome::Ignored),
        }
    }

    /// List a guild's events through the transport and cache them.
    pub async fn fetch_guild_events(
        &self,
        guild_id: Snowflake,
    ) -> Result<Vec<Arc<ScheduledEvent>>, EventError> {
        let entries = self.state.transport.list_scheduled_events(guild_id).await?;
        let mut events = Vec::with_capacity(entries.len());
        for raw in &entries {
            let payload = EventPayload::full(raw).or_else(|_| EventPayload::partial(raw))?;
            events.push(self.upsert(payload));
        }
        tracing::debug!(%guild_id, count = events.len(), "listed scheduled events");
        Ok(events)
    }

    /// Delete remotely, then evict.
    pub async fn delete(
        &self,
        event: &ScheduledEvent,
        reason: Option<&str>,
    ) -> Result<(), RemoteError> {
        event.delete(reason).await?;
        self.remove(event.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        full_payload, partial_payload, state_with, Call, MockTransport, EVENT_ID, GUILD_ID,
    };
    use serde_json::json;

    fn cache() -> (EventCache, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::default());
        let (state, _) = state_with(transport.clone());
        (EventCache::new(state), transport)
    }

    #[test]
    fn upsert_reuses_the_existing_handle() {
        let (cache, _) = cache();
        let first = cache.upsert_full(&full_payload()).unwrap();
        let mut renamed = partial_payload();
        renamed["name"] = json!("Renamed");
        let second = cache.upsert_partial(&renamed).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "Renamed");
        assert_eq!(first.description().as_deref(), Some("Bring snacks"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn create_update_and_delete_dispatches() {
        let (cache, _) = cache();
        let outcome = cache
            .handle_dispatch(GUILD_SCHEDULED_EVENT_CREATE, &full_payload())
            .unwrap();
        let held = match outcome {
            DispatchOutcome::Upserted(event) => event,
            other => panic!("unexpected outcome {other:?}"),
        };

        let mut update = full_payload();
        update["status"] = json!(2);
        cache
            .handle_dispatch(GUILD_SCHEDULED_EVENT_UPDATE, &update)
            .unwrap();
        assert_eq!(held.status(), convene_models::EventStatus::Active);

        let outcome = cache
            .handle_dispatch(GUILD_SCHEDULED_EVENT_DELETE, &update)
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Removed(event) if event.id() == held.id()));
        assert!(cache.is_empty());
    }

    #[test]
    fn subscription_dispatches_adjust_user_count() {
        let (cache, _) = cache();
        let event = cache.upsert_full(&full_payload()).unwrap();
        let subscription = json!({
            "guild_scheduled_event_id": EVENT_ID.to_string(),
            "user_id": "53908232506183680",
            "guild_id": GUILD_ID.to_string(),
        });

        cache
            .handle_dispatch(GUILD_SCHEDULED_EVENT_USER_ADD, &subscription)
            .unwrap();
        assert_eq!(event.user_count(), 13);
        for _ in 0..20 {
            cache
                .handle_dispatch(GUILD_SCHEDULED_EVENT_USER_REMOVE, &subscription)
                .unwrap();
        }
        assert_eq!(event.user_count(), 0);
    }

    #[test]
    fn unrelated_and_malformed_dispatches() {
        let (cache, _) = cache();
        assert!(matches!(
            cache.handle_dispatch("MESSAGE_CREATE", &json!({})).unwrap(),
            DispatchOutcome::Ignored
        ));
        assert!(cache
            .handle_dispatch(GUILD_SCHEDULED_EVENT_CREATE, &json!({"id": "1"}))
            .is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn fetch_guild_events_caches_each_entry() {
        let (cache, transport) = cache();
        let mut second = full_payload();
        second["id"] = json!((EVENT_ID + 1).to_string());
        second["scheduled_start_time"] = json!("2024-05-01T19:00:00Z");
        transport.push_response(Ok(json!([full_payload(), second, partial_payload()])));

        let events = cache.fetch_guild_events(Snowflake::new(GUILD_ID)).await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(cache.len(), 2);
        assert!(Arc::ptr_eq(&events[0], &events[2]));

        let ordered = cache.for_guild(Snowflake::new(GUILD_ID));
        assert_eq!(ordered[0].id(), Snowflake::new(EVENT_ID + 1));
        assert!(cache.for_guild(Snowflake::new(1)).is_empty());
        assert_eq!(transport.calls(), vec![Call::List(Snowflake::new(GUILD_ID))]);
    }

    #[tokio::test]
    async fn delete_evicts_only_on_success() {
        let (cache, transport) = cache();
        let event = cache.upsert_full(&full_payload()).unwrap();

        transport.push_response(Err(RemoteError::Forbidden));
        assert_eq!(cache.delete(&event, None).await, Err(RemoteError::Forbidden));
        assert_eq!(cache.len(), 1);

        cache.delete(&event, Some("done")).await.unwrap();
        assert!(cache.get(event.id()).is_none());
    }
}
