use chrono::{DateTime, Utc};
use convene_models::{
    build_edit_request, validate_full, validate_partial, Channel, EditScheduledEvent, EntityType,
    EventStatus, FieldUpdate, Guild, PartialScheduledEvent, PrivacyLevel, ScheduledEventPayload,
    SchemaError, Snowflake, User,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{EventError, RemoteError};
use crate::ClientState;

pub const MAX_EVENT_NAME_LEN: usize = 100;
pub const MAX_EVENT_DESCRIPTION_LEN: usize = 1000;
pub const MAX_EVENT_LOCATION_LEN: usize = 100;

/// A validated payload in one of the two shapes the remote service sends.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Partial(PartialScheduledEvent),
    Full(Box<ScheduledEventPayload>),
}

impl EventPayload {
    pub fn partial(raw: &Value) -> Result<Self, SchemaError> {
        validate_partial(raw).map(EventPayload::Partial)
    }

    pub fn full(raw: &Value) -> Result<Self, SchemaError> {
        validate_full(raw).map(|full| EventPayload::Full(Box::new(full)))
    }

    fn common(&self) -> &PartialScheduledEvent {
        match self {
            EventPayload::Partial(partial) => partial,
            EventPayload::Full(full) => &full.partial,
        }
    }

    pub fn id(&self) -> Snowflake {
        self.common().id
    }

    pub fn guild_id(&self) -> Snowflake {
        self.common().guild_id
    }

    pub fn is_full(&self) -> bool {
        matches!(self, EventPayload::Full(_))
    }
}

/// Pick the stored value for a nullable key.
///
/// A key the payload carries always wins, `null` included. A missing key keeps
/// the prior value on partial payloads and clears it on full ones.
fn merge_nullable<T: Clone>(incoming: Option<Option<T>>, prior: Option<&T>, full: bool) -> Option<T> {
    match incoming {
        Some(value) => value,
        None if full => None,
        None => prior.cloned(),
    }
}

/// Every mutable attribute of an event at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSnapshot {
    pub name: String,
    pub description: Option<String>,
    pub channel_id: Option<Snowflake>,
    pub creator_id: Option<Snowflake>,
    pub entity_id: Option<Snowflake>,
    pub scheduled_start_time: DateTime<Utc>,
    pub scheduled_end_time: Option<DateTime<Utc>>,
    pub privacy_level: PrivacyLevel,
    pub status: EventStatus,
    pub entity_type: EntityType,
    pub user_count: u64,
    pub image: Option<String>,
    pub creator: Option<User>,
    /// Whether a full payload has been applied at least once.
    pub hydrated: bool,
    raw_location: Option<String>,
}

impl EventSnapshot {
    fn from_payload(payload: &EventPayload, prior: Option<&EventSnapshot>) -> Self {
        let full = payload.is_full();
        let common = payload.common();
        let prior_location = prior.and_then(|p| p.raw_location.as_ref());
        let location = match common.entity_metadata.clone() {
            Some(metadata) => metadata.and_then(|m| m.location),
            None if full => None,
            None => prior_location.cloned(),
        };

        let mut snapshot = EventSnapshot {
            name: common.name.clone(),
            description: prior.and_then(|p| p.description.clone()),
            channel_id: merge_nullable(common.channel_id, prior.and_then(|p| p.channel_id.as_ref()), full),
            creator_id: prior.and_then(|p| p.creator_id),
            entity_id: merge_nullable(common.entity_id, prior.and_then(|p| p.entity_id.as_ref()), full),
            scheduled_start_time: common.scheduled_start_time,
            scheduled_end_time: merge_nullable(
                common.scheduled_end_time,
                prior.and_then(|p| p.scheduled_end_time.as_ref()),
                full,
            ),
            privacy_level: common.privacy_level,
            status: common.status,
            entity_type: common.entity_type,
            user_count: prior.map_or(0, |p| p.user_count),
            image: merge_nullable(common.image.clone(), prior.and_then(|p| p.image.as_ref()), full),
            creator: prior.and_then(|p| p.creator.clone()),
            hydrated: full || prior.is_some_and(|p| p.hydrated),
            raw_location: location,
        };

        if let EventPayload::Full(payload) = payload {
            snapshot.description = payload.description.clone().flatten();
            snapshot.creator_id = payload.creator_id.flatten();
            if let Some(creator) = payload.creator.clone() {
                snapshot.creator = creator;
            }
            if let Some(count) = payload.user_count {
                snapshot.user_count = count;
            }
        }
        // A channel kept from before a move to an external location is stale.
        if snapshot.entity_type == EntityType::External {
            snapshot.channel_id = None;
        }
        // A retained creator that no longer matches creator_id is stale.
        if snapshot
            .creator
            .as_ref()
            .is_some_and(|creator| snapshot.creator_id.is_some_and(|id| id != creator.id))
        {
            snapshot.creator = None;
        }
        snapshot
    }

    /// The external location; `None` for channel-hosted events.
    pub fn location(&self) -> Option<&str> {
        match self.entity_type {
            EntityType::External => self.raw_location.as_deref(),
            _ => None,
        }
    }
}

/// The `{id, name}` pair other records use to point at an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PartialRef {
    pub id: Snowflake,
    pub name: String,
}

/// A guild scheduled event, shared by reference between every holder.
///
/// `id` and `guild_id` are fixed at construction. Everything else lives in one
/// [`EventSnapshot`] that is swapped whole, so readers never see a half-applied
/// payload. Equality and hashing use the id alone.
pub struct ScheduledEvent {
    id: Snowflake,
    guild_id: Snowflake,
    state: ClientState,
    inner: RwLock<EventSnapshot>,
}

impl ScheduledEvent {
    pub fn new(state: ClientState, payload: EventPayload) -> Self {
        let payload = store_creator(&state, payload);
        let snapshot = EventSnapshot::from_payload(&payload, None);
        Self {
            id: payload.id(),
            guild_id: payload.guild_id(),
            state,
            inner: RwLock::new(snapshot),
        }
    }

    pub fn from_partial(state: ClientState, raw: &Value) -> Result<Self, SchemaError> {
        Ok(Self::new(state, EventPayload::partial(raw)?))
    }

    pub fn from_full(state: ClientState, raw: &Value) -> Result<Self, SchemaError> {
        Ok(Self::new(state, EventPayload::full(raw)?))
    }

    /// Fetch one event by id.
    pub async fn fetch(
        state: ClientState,
        guild_id: Snowflake,
        event_id: Snowflake,
    ) -> Result<Self, EventError> {
        let raw = state
            .transport
            .fetch_scheduled_event(guild_id, event_id)
            .await?;
        tracing::debug!(%guild_id, %event_id, "fetched scheduled event");
        Ok(Self::from_full(state, &raw)?)
    }

    fn read(&self) -> RwLockReadGuard<'_, EventSnapshot> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, EventSnapshot> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Apply a fresher payload for this same event.
    ///
    /// # Panics
    ///
    /// Panics if the payload describes a different event.
    pub fn reparse(&self, payload: EventPayload) {
        assert_eq!(
            payload.id(),
            self.id,
            "payload for scheduled event {} applied to {}",
            payload.id(),
            self.id
        );
        if payload.guild_id() != self.guild_id {
            tracing::warn!(
                event_id = %self.id,
                guild_id = %self.guild_id,
                payload_guild_id = %payload.guild_id(),
                "ignoring guild_id change in scheduled event payload"
            );
        }
        let payload = store_creator(&self.state, payload);
        let mut guard = self.write();
        let next = EventSnapshot::from_payload(&payload, Some(&guard));
        *guard = next;
    }

    pub fn reparse_partial(&self, raw: &Value) -> Result<(), SchemaError> {
        self.reparse(EventPayload::partial(raw)?);
        Ok(())
    }

    pub fn reparse_full(&self, raw: &Value) -> Result<(), SchemaError> {
        self.reparse(EventPayload::full(raw)?);
        Ok(())
    }

    pub(crate) fn adjust_user_count(&self, delta: i64) {
        let mut guard = self.write();
        guard.user_count = guard.user_count.saturating_add_signed(delta);
    }

    pub fn id(&self) -> Snowflake {
        self.id
    }

    pub fn guild_id(&self) -> Snowflake {
        self.guild_id
    }

    /// A consistent copy of every mutable attribute.
    pub fn snapshot(&self) -> EventSnapshot {
        self.read().clone()
    }

    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    pub fn description(&self) -> Option<String> {
        self.read().description.clone()
    }

    pub fn channel_id(&self) -> Option<Snowflake> {
        self.read().channel_id
    }

    pub fn creator_id(&self) -> Option<Snowflake> {
        self.read().creator_id
    }

    pub fn entity_id(&self) -> Option<Snowflake> {
        self.read().entity_id
    }

    pub fn scheduled_start_time(&self) -> DateTime<Utc> {
        self.read().scheduled_start_time
    }

    pub fn scheduled_end_time(&self) -> Option<DateTime<Utc>> {
        self.read().scheduled_end_time
    }

    pub fn privacy_level(&self) -> PrivacyLevel {
        self.read().privacy_level
    }

    pub fn status(&self) -> EventStatus {
        self.read().status
    }

    pub fn entity_type(&self) -> EntityType {
        self.read().entity_type
    }

    pub fn location(&self) -> Option<String> {
        self.read().location().map(str::to_string)
    }

    pub fn user_count(&self) -> u64 {
        self.read().user_count
    }

    pub fn image(&self) -> Option<String> {
        self.read().image.clone()
    }

    pub fn is_hydrated(&self) -> bool {
        self.read().hydrated
    }

    /// Creation instant decoded from the id.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.id.created_at()
    }

    pub fn to_partial(&self) -> PartialRef {
        PartialRef {
            id: self.id,
            name: self.name(),
        }
    }

    pub fn guild(&self) -> Option<Guild> {
        self.state.resolver.guild(self.guild_id)
    }

    pub fn channel(&self) -> Option<Channel> {
        self.channel_id()
            .and_then(|channel_id| self.state.resolver.channel(channel_id))
    }

    /// `<#channel_id>`, whether or not the channel is known locally.
    pub fn channel_mention(&self) -> Option<String> {
        let channel_id = self.channel_id()?;
        Some(match self.state.resolver.channel(channel_id) {
            Some(channel) => channel.mention(),
            None => format!("<#{channel_id}>"),
        })
    }

    /// The embedded creator, falling back to a lookup of `creator_id`.
    pub fn creator(&self) -> Option<User> {
        let (creator, creator_id) = {
            let guard = self.read();
            (guard.creator.clone(), guard.creator_id)
        };
        creator.or_else(|| creator_id.and_then(|id| self.state.resolver.user(id)))
    }

    pub fn image_url(&self) -> Option<String> {
        self.image().map(|hash| {
            format!(
                "{}/guild-events/{}/{}.png",
                self.state.cdn_url.trim_end_matches('/'),
                self.id,
                hash
            )
        })
    }

    /// Present attributes as ordered `(field, value)` pairs.
    pub fn to_fields(&self) -> Vec<(&'static str, Value)> {
        let snapshot = self.snapshot();
        let mut fields = vec![
            ("id", json!(self.id)),
            ("guild_id", json!(self.guild_id)),
            ("name", json!(snapshot.name)),
        ];
        let mut push = |field: &'static str, value: Option<Value>| {
            if let Some(value) = value {
                fields.push((field, value));
            }
        };
        push("description", snapshot.description.as_ref().map(|v| json!(v)));
        push("channel_id", snapshot.channel_id.map(|v| json!(v)));
        push("creator_id", snapshot.creator_id.map(|v| json!(v)));
        push("entity_id", snapshot.entity_id.map(|v| json!(v)));
        push(
            "scheduled_start_time",
            Some(json!(snapshot.scheduled_start_time)),
        );
        push(
            "scheduled_end_time",
            snapshot.scheduled_end_time.map(|v| json!(v)),
        );
        push("privacy_level", Some(json!(snapshot.privacy_level)));
        push("status", Some(json!(snapshot.status)));
        push("entity_type", Some(json!(snapshot.entity_type)));
        push("location", snapshot.location().map(|v| json!(v)));
        push("user_count", Some(json!(snapshot.user_count)));
        push("image", snapshot.image.as_ref().map(|v| json!(v)));
        push("creator", snapshot.creator.as_ref().map(|v| json!(v)));
        fields
    }

    /// Delete the event remotely.
    ///
    /// The handle is left as it was; callers evict it from their caches.
    pub async fn delete(&self, reason: Option<&str>) -> Result<(), RemoteError> {
        self.state
            .transport
            .delete_scheduled_event(self.guild_id, self.id, reason)
            .await?;
        tracing::info!(guild_id = %self.guild_id, event_id = %self.id, "deleted scheduled event");
        Ok(())
    }

    /// Send `edit` and apply the response in place.
    ///
    /// Local checks run first and fail without a network call. On any error
    /// the handle is unchanged.
    pub async fn edit(
        &self,
        mut edit: EditScheduledEvent,
        reason: Option<&str>,
    ) -> Result<&Self, EventError> {
        validate_edit(&self.read(), &mut edit)?;
        self.check_channel(&edit)?;
        if edit.is_empty() {
            tracing::debug!(event_id = %self.id, "skipping empty scheduled event edit");
            return Ok(self);
        }

        let body = build_edit_request(&edit);
        let raw = self
            .state
            .transport
            .edit_scheduled_event(self.guild_id, self.id, &body, reason)
            .await?;
        let payload = EventPayload::full(&raw)?;
        if payload.id() != self.id {
            return Err(SchemaError::Inconsistent(format!(
                "edit of scheduled event {} answered with event {}",
                self.id,
                payload.id()
            ))
            .into());
        }
        self.reparse(payload);
        tracing::info!(
            guild_id = %self.guild_id,
            event_id = %self.id,
            fields = body.len(),
            "edited scheduled event"
        );
        Ok(self)
    }

    /// Reject a new channel the resolver knows cannot host events.
    ///
    /// Channels the resolver has not seen are left to the remote service.
    fn check_channel(&self, edit: &EditScheduledEvent) -> Result<(), EventError> {
        let Some(&channel_id) = edit.channel_id.as_set() else {
            return Ok(());
        };
        match self.state.resolver.channel(channel_id) {
            Some(channel) if !channel.channel_type.hosts_events() => Err(invalid(format!(
                "channel {channel_id} cannot host scheduled events"
            ))),
            _ => Ok(()),
        }
    }

    /// Re-fetch the event and apply the full payload.
    pub async fn refresh(&self) -> Result<(), EventError> {
        let raw = self
            .state
            .transport
            .fetch_scheduled_event(self.guild_id, self.id)
            .await?;
        self.reparse_full(&raw)?;
        Ok(())
    }

    async fn transition(&self, next: EventStatus, reason: Option<&str>) -> Result<&Self, EventError> {
        let current = self.status();
        if !current.can_transition_to(next) {
            return Err(EventError::Validation(format!(
                "cannot move scheduled event from {current} to {next}"
            )));
        }
        self.edit(EditScheduledEvent::new().status(next), reason).await
    }

    /// Mark a scheduled event as active.
    pub async fn start(&self, reason: Option<&str>) -> Result<&Self, EventError> {
        self.transition(EventStatus::Active, reason).await
    }

    /// Mark an active event as completed.
    pub async fn end(&self, reason: Option<&str>) -> Result<&Self, EventError> {
        self.transition(EventStatus::Completed, reason).await
    }

    /// Cancel an event that has not started.
    pub async fn cancel(&self, reason: Option<&str>) -> Result<&Self, EventError> {
        self.transition(EventStatus::Canceled, reason).await
    }
}

fn store_creator(state: &ClientState, payload: EventPayload) -> EventPayload {
    match payload {
        EventPayload::Full(mut full) => {
            if let Some(Some(creator)) = full.creator.take() {
                full.creator = Some(Some(state.resolver.store_user(creator)));
            }
            EventPayload::Full(full)
        }
        partial => partial,
    }
}

fn invalid(message: impl Into<String>) -> EventError {
    EventError::Validation(message.into())
}

/// Check `edit` against the current state and fill in implied changes.
///
/// Moving an event to an external location clears its channel unless the
/// caller said otherwise. Channel and end-time requirements are only checked
/// when the edit changes the entity type or clears the field, so an event
/// known only from a listing can still be renamed.
pub fn validate_edit(current: &EventSnapshot, edit: &mut EditScheduledEvent) -> Result<(), EventError> {
    if let Some(name) = edit.name.as_set() {
        let len = name.trim().chars().count();
        if len == 0 || len > MAX_EVENT_NAME_LEN {
            return Err(invalid("event name must be 1-100 characters"));
        }
    }
    if let Some(description) = edit.description.as_set() {
        if description.chars().count() > MAX_EVENT_DESCRIPTION_LEN {
            return Err(invalid("event description must be at most 1000 characters"));
        }
    }
    if let Some(location) = edit.location.as_set() {
        let len = location.trim().chars().count();
        if len == 0 || len > MAX_EVENT_LOCATION_LEN {
            return Err(invalid("event location must be 1-100 characters"));
        }
    }
    if edit.scheduled_start_time.is_clear() {
        return Err(invalid("scheduled start time cannot be cleared"));
    }
    if edit.entity_type.as_set().is_some_and(|kind| kind.is_unknown())
        || edit.status.as_set().is_some_and(|status| status.is_unknown())
        || edit.privacy_level.as_set().is_some_and(|level| level.is_unknown())
    {
        return Err(invalid("cannot send an unrecognised code"));
    }

    let target = edit
        .entity_type
        .as_set()
        .copied()
        .unwrap_or(current.entity_type);
    let type_changes = target != current.entity_type;
    let becomes_external = type_changes && target == EntityType::External;

    match target {
        EntityType::External => {
            if edit.channel_id.as_set().is_some() {
                return Err(invalid("external events cannot be hosted in a channel"));
            }
            if becomes_external && edit.channel_id.is_keep() {
                edit.channel_id = FieldUpdate::Clear;
            }
            if (type_changes || edit.scheduled_end_time.is_clear())
                && edit
                    .scheduled_end_time
                    .apply_to(current.scheduled_end_time.as_ref())
                    .is_none()
            {
                return Err(invalid("external events require a scheduled end time"));
            }
            if becomes_external
                && edit
                    .location
                    .apply_to(current.raw_location.as_ref())
                    .is_none()
            {
                return Err(invalid("external events require a location"));
            }
        }
        kind if kind.requires_channel() => {
            if (type_changes || edit.channel_id.is_clear())
                && edit
                    .channel_id
                    .apply_to(current.channel_id.as_ref())
                    .is_none()
            {
                return Err(invalid(format!("{kind} events require a channel")));
            }
            if edit.location.as_set().is_some() {
                return Err(invalid("only external events have a location"));
            }
        }
        _ => {}
    }

    if edit.scheduled_start_time.is_keep() && edit.scheduled_end_time.is_keep() {
        return Ok(());
    }
    let start = edit
        .scheduled_start_time
        .apply_to(Some(&current.scheduled_start_time));
    let end = edit
        .scheduled_end_time
        .apply_to(current.scheduled_end_time.as_ref());
    if let (Some(start), Some(end)) = (start, end) {
        if end <= start {
            return Err(invalid("scheduled end time must be after the start time"));
        }
    }
    Ok(())
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ScheduledEvent {}

impl Hash for ScheduledEvent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ScheduledEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.read().name)
    }
}

impl fmt::Debug for ScheduledEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledEvent")
            .field("id", &self.id)
            .field("guild_id", &self.guild_id)
            .field("name", &self.read().name)
            .finish_non_exhaustive()
    }
}
