use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::error::SchemaError;
use crate::snowflake::Snowflake;
use crate::user::User;

/// Integer-coded tags. Codes the remote service adds later decode to
/// `Unknown(code)` instead of failing the whole payload.
macro_rules! coded_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident { $($variant:ident = $code:literal => $label:literal,)+ }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            Unknown(u32),
        }

        impl $name {
            pub fn from_code(code: u32) -> Self {
                match code {
                    $($code => Self::$variant,)+
                    other => Self::Unknown(other),
                }
            }

            pub fn code(self) -> u32 {
                match self {
                    $(Self::$variant => $code,)+
                    Self::Unknown(code) => code,
                }
            }

            pub fn is_unknown(self) -> bool {
                matches!(self, Self::Unknown(_))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($label),)+
                    Self::Unknown(code) => write!(f, "UNKNOWN({code})"),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u32(self.code())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let code = u32::deserialize(deserializer)?;
                Ok(Self::from_code(code))
            }
        }
    };
}

coded_enum! {
    pub enum PrivacyLevel {
        GuildOnly = 2 => "GUILD_ONLY",
    }
}

coded_enum! {
    pub enum EventStatus {
        Scheduled = 1 => "SCHEDULED",
        Active = 2 => "ACTIVE",
        Completed = 3 => "COMPLETED",
        Canceled = 4 => "CANCELED",
    }
}

coded_enum! {
    /// Where an event is hosted.
    pub enum EntityType {
        StageInstance = 1 => "STAGE_INSTANCE",
        Voice = 2 => "VOICE",
        External = 3 => "EXTERNAL",
    }
}

impl EventStatus {
    /// Whether the remote service accepts a move from `self` to `next`.
    ///
    /// Transitions out of an unknown status are left to the remote service.
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        match (self, next) {
            (EventStatus::Unknown(_), _) => true,
            (EventStatus::Scheduled, EventStatus::Active | EventStatus::Canceled) => true,
            (EventStatus::Active, EventStatus::Completed) => true,
            _ => false,
        }
    }
}

impl EntityType {
    /// Channel-hosted events carry a `channel_id`; external ones never do.
    pub fn requires_channel(self) -> bool {
        matches!(self, EntityType::StageInstance | EntityType::Voice)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Distinguishes a missing key (`None`) from an explicit `null` (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// The fields every listing of a scheduled event carries.
///
/// Nullable keys use `Option<Option<T>>`: the outer layer records whether the
/// key was sent at all, so a reparse can keep what the payload left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialScheduledEvent {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    pub name: String,
    pub scheduled_start_time: DateTime<Utc>,
    pub privacy_level: PrivacyLevel,
    pub status: EventStatus,
    pub entity_type: EntityType,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Option<Snowflake>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub scheduled_end_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Option<Snowflake>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub entity_metadata: Option<Option<EntityMetadata>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub image: Option<Option<String>>,
}

/// The representation returned by a direct fetch, an edit, or a gateway
/// dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEventPayload {
    #[serde(flatten)]
    pub partial: PartialScheduledEvent,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<Option<Snowflake>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub creator: Option<Option<User>>,
    /// Only sent when the caller asked for subscriber counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_count: Option<u64>,
}

const REQUIRED_FIELDS: [&str; 7] = [
    "id",
    "guild_id",
    "name",
    "scheduled_start_time",
    "privacy_level",
    "status",
    "entity_type",
];

fn check_required(raw: &Value) -> Result<(), SchemaError> {
    let object = raw.as_object().ok_or(SchemaError::NotAnObject)?;
    for field in REQUIRED_FIELDS {
        match object.get(field) {
            None => return Err(SchemaError::MissingField(field)),
            Some(Value::Null) => {
                return Err(SchemaError::InvalidField {
                    field,
                    reason: "must not be null".to_string(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn check_name(name: &str) -> Result<(), SchemaError> {
    if name.trim().is_empty() {
        return Err(SchemaError::InvalidField {
            field: "name",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Validate a listing entry.
pub fn validate_partial(raw: &Value) -> Result<PartialScheduledEvent, SchemaError> {
    check_required(raw)?;
    let partial = PartialScheduledEvent::deserialize(raw)?;
    check_name(&partial.name)?;
    Ok(partial)
}

/// Validate a complete representation, including the
/// entity-type/channel/end-time invariant.
pub fn validate_full(raw: &Value) -> Result<ScheduledEventPayload, SchemaError> {
    check_required(raw)?;
    let full = ScheduledEventPayload::deserialize(raw)?;
    check_name(&full.partial.name)?;
    check_entity_consistency(&full.partial)?;
    Ok(full)
}

fn check_entity_consistency(event: &PartialScheduledEvent) -> Result<(), SchemaError> {
    let channel_id = event.channel_id.flatten();
    let end_time = event.scheduled_end_time.flatten();
    match event.entity_type {
        EntityType::External => {
            if let Some(channel_id) = channel_id {
                return Err(SchemaError::Inconsistent(format!(
                    "external event {} has channel_id {channel_id}",
                    event.id
                )));
            }
            if end_time.is_none() {
                return Err(SchemaError::Inconsistent(format!(
                    "external event {} has no scheduled_end_time",
                    event.id
                )));
            }
        }
        kind if kind.requires_channel() => {
            if channel_id.is_none() {
                return Err(SchemaError::Inconsistent(format!(
                    "{kind} event {} has no channel_id",
                    event.id
                )));
            }
        }
        _ => {}
    }
    if let Some(end) = end_time {
        if end < event.scheduled_start_time {
            return Err(SchemaError::Inconsistent(format!(
                "event {} ends before it starts",
                event.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn voice_event() -> Value {
        json!({
            "id": "912345678901234567",
            "guild_id": "80351110224678912",
            "channel_id": "41771983423143937",
            "creator_id": "53908232506183680",
            "name": "Movie night",
            "description": "Bring snacks",
            "scheduled_start_time": "2024-06-01T19:00:00.000000+00:00",
            "scheduled_end_time": null,
            "privacy_level": 2,
            "status": 1,
            "entity_type": 2,
            "entity_id": null,
            "entity_metadata": null,
            "user_count": 12,
            "image": null
        })
    }

    #[test]
    fn full_payload_decodes_every_field() {
        let full = validate_full(&voice_event()).expect("valid");
        assert_eq!(full.partial.id.get(), 912_345_678_901_234_567);
        assert_eq!(full.partial.channel_id, Some(Some(Snowflake::new(41_771_983_423_143_937))));
        assert_eq!(full.partial.scheduled_end_time, Some(None));
        assert_eq!(full.partial.status, EventStatus::Scheduled);
        assert_eq!(full.partial.entity_type, EntityType::Voice);
        assert_eq!(full.partial.privacy_level, PrivacyLevel::GuildOnly);
        assert_eq!(full.description, Some(Some("Bring snacks".to_string())));
        assert_eq!(full.user_count, Some(12));
        assert_eq!(full.creator, None);
    }

    #[test]
    fn partial_payload_records_absent_keys() {
        let raw = json!({
            "id": "912345678901234567",
            "guild_id": "80351110224678912",
            "name": "Movie night",
            "scheduled_start_time": "2024-06-01T19:00:00Z",
            "privacy_level": 2,
            "status": 2,
            "entity_type": 2
        });
        let partial = validate_partial(&raw).expect("valid");
        assert_eq!(partial.channel_id, None);
        assert_eq!(partial.image, None);
        assert_eq!(partial.status, EventStatus::Active);
    }

    #[test]
    fn unknown_codes_decode_to_unknown_variant() {
        let mut raw = voice_event();
        raw["status"] = json!(99);
        raw["privacy_level"] = json!(1);
        let full = validate_full(&raw).expect("unknown codes are tolerated");
        assert_eq!(full.partial.status, EventStatus::Unknown(99));
        assert_eq!(full.partial.privacy_level, PrivacyLevel::Unknown(1));
        assert_eq!(full.partial.status.code(), 99);
        assert_eq!(full.partial.status.to_string(), "UNKNOWN(99)");
    }

    #[test]
    fn codes_past_a_byte_are_still_unknown() {
        let mut raw = voice_event();
        raw["status"] = json!(300);
        raw["entity_type"] = json!(70_000);
        raw["channel_id"] = Value::Null;
        let full = validate_full(&raw).expect("wide codes are tolerated");
        assert_eq!(full.partial.status, EventStatus::Unknown(300));
        assert_eq!(full.partial.entity_type, EntityType::Unknown(70_000));
        assert!(full.partial.status.is_unknown());
        assert_eq!(serde_json::to_value(full.partial.status).unwrap(), json!(300));

        raw["status"] = json!(-1);
        assert!(matches!(validate_full(&raw), Err(SchemaError::Json(_))));
    }

    #[test]
    fn missing_required_field_is_reported_by_name() {
        let mut raw = voice_event();
        raw.as_object_mut().unwrap().remove("id");
        let err = validate_full(&raw).unwrap_err();
        assert!(matches!(err, SchemaError::MissingField("id")));

        let mut raw = voice_event();
        raw["name"] = Value::Null;
        let err = validate_partial(&raw).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidField { field: "name", .. }));
    }

    #[test]
    fn unparsable_timestamp_is_malformed() {
        let mut raw = voice_event();
        raw["scheduled_start_time"] = json!("next tuesday");
        assert!(matches!(validate_full(&raw), Err(SchemaError::Json(_))));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(
            validate_partial(&json!([1, 2, 3])),
            Err(SchemaError::NotAnObject)
        ));
    }

    #[test]
    fn external_event_requires_end_time_and_no_channel() {
        let mut raw = voice_event();
        raw["entity_type"] = json!(3);
        raw["entity_metadata"] = json!({"location": "Town hall"});
        let err = validate_full(&raw).unwrap_err();
        assert!(matches!(err, SchemaError::Inconsistent(_)));

        raw["channel_id"] = Value::Null;
        assert!(matches!(validate_full(&raw), Err(SchemaError::Inconsistent(_))));

        raw["scheduled_end_time"] = json!("2024-06-01T22:00:00Z");
        let full = validate_full(&raw).expect("consistent external event");
        assert_eq!(
            full.partial.entity_metadata,
            Some(Some(EntityMetadata {
                location: Some("Town hall".to_string())
            }))
        );
    }

    #[test]
    fn partial_validation_tolerates_unhydrated_external_event() {
        let raw = json!({
            "id": "912345678901234567",
            "guild_id": "80351110224678912",
            "name": "Meetup",
            "scheduled_start_time": "2024-06-01T19:00:00Z",
            "privacy_level": 2,
            "status": 1,
            "entity_type": 3
        });
        assert!(validate_partial(&raw).is_ok());
    }

    #[test]
    fn voice_event_without_channel_is_inconsistent() {
        let mut raw = voice_event();
        raw["channel_id"] = Value::Null;
        assert!(matches!(validate_full(&raw), Err(SchemaError::Inconsistent(_))));
    }

    #[test]
    fn status_transitions_follow_remote_rules() {
        assert!(EventStatus::Scheduled.can_transition_to(EventStatus::Active));
        assert!(EventStatus::Scheduled.can_transition_to(EventStatus::Canceled));
        assert!(EventStatus::Active.can_transition_to(EventStatus::Completed));
        assert!(!EventStatus::Active.can_transition_to(EventStatus::Canceled));
        assert!(!EventStatus::Completed.can_transition_to(EventStatus::Active));
        assert!(EventStatus::Unknown(7).can_transition_to(EventStatus::Active));
    }
}
