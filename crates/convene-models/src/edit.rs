use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::image::ImageData;
use crate::scheduled_event::{EntityType, EventStatus, PrivacyLevel};
use crate::snowflake::Snowflake;

/// A three-state edit of one field.
///
/// `Keep` leaves the key out of the request, `Clear` sends `null`, `Set`
/// sends the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Keep
    }
}

impl<T> FieldUpdate<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, FieldUpdate::Clear)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            FieldUpdate::Set(value) => Some(value),
            _ => None,
        }
    }

    /// The value the field will hold once this update lands on `current`.
    pub fn apply_to<'a>(&'a self, current: Option<&'a T>) -> Option<&'a T> {
        match self {
            FieldUpdate::Keep => current,
            FieldUpdate::Clear => None,
            FieldUpdate::Set(value) => Some(value),
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => FieldUpdate::Set(value),
            None => FieldUpdate::Clear,
        }
    }
}

impl<T: Serialize> Serialize for FieldUpdate<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldUpdate::Set(value) => value.serialize(serializer),
            FieldUpdate::Keep | FieldUpdate::Clear => serializer.serialize_none(),
        }
    }
}

fn serialize_location<S: Serializer>(
    location: &FieldUpdate<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match location {
        FieldUpdate::Set(location) => {
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry("location", location)?;
            map.end()
        }
        FieldUpdate::Keep | FieldUpdate::Clear => serializer.serialize_none(),
    }
}

/// The mutable subset of a scheduled event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditScheduledEvent {
    #[serde(skip_serializing_if = "FieldUpdate::is_keep")]
    pub name: FieldUpdate<String>,
    #[serde(skip_serializing_if = "FieldUpdate::is_keep")]
    pub channel_id: FieldUpdate<Snowflake>,
    #[serde(skip_serializing_if = "FieldUpdate::is_keep")]
    pub privacy_level: FieldUpdate<PrivacyLevel>,
    #[serde(skip_serializing_if = "FieldUpdate::is_keep")]
    pub scheduled_start_time: FieldUpdate<DateTime<Utc>>,
    #[serde(skip_serializing_if = "FieldUpdate::is_keep")]
    pub scheduled_end_time: FieldUpdate<DateTime<Utc>>,
    #[serde(skip_serializing_if = "FieldUpdate::is_keep")]
    pub description: FieldUpdate<String>,
    #[serde(skip_serializing_if = "FieldUpdate::is_keep")]
    pub entity_type: FieldUpdate<EntityType>,
    #[serde(skip_serializing_if = "FieldUpdate::is_keep")]
    pub status: FieldUpdate<EventStatus>,
    #[serde(skip_serializing_if = "FieldUpdate::is_keep")]
    pub image: FieldUpdate<ImageData>,
    #[serde(
        rename = "entity_metadata",
        serialize_with = "serialize_location",
        skip_serializing_if = "FieldUpdate::is_keep"
    )]
    pub location: FieldUpdate<String>,
}

impl EditScheduledEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = FieldUpdate::Set(name.into());
        self
    }

    pub fn channel(mut self, channel_id: Snowflake) -> Self {
        self.channel_id = FieldUpdate::Set(channel_id);
        self
    }

    pub fn clear_channel(mut self) -> Self {
        self.channel_id = FieldUpdate::Clear;
        self
    }

    pub fn privacy_level(mut self, level: PrivacyLevel) -> Self {
        self.privacy_level = FieldUpdate::Set(level);
        self
    }

    pub fn start_time(mut self, start: DateTime<Utc>) -> Self {
        self.scheduled_start_time = FieldUpdate::Set(start);
        self
    }

    pub fn end_time(mut self, end: DateTime<Utc>) -> Self {
        self.scheduled_end_time = FieldUpdate::Set(end);
        self
    }

    pub fn clear_end_time(mut self) -> Self {
        self.scheduled_end_time = FieldUpdate::Clear;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = FieldUpdate::Set(description.into());
        self
    }

    pub fn clear_description(mut self) -> Self {
        self.description = FieldUpdate::Clear;
        self
    }

    pub fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = FieldUpdate::Set(entity_type);
        self
    }

    pub fn status(mut self, status: EventStatus) -> Self {
        self.status = FieldUpdate::Set(status);
        self
    }

    pub fn image(mut self, image: ImageData) -> Self {
        self.image = FieldUpdate::Set(image);
        self
    }

    pub fn clear_image(mut self) -> Self {
        self.image = FieldUpdate::Clear;
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = FieldUpdate::Set(location.into());
        self
    }

    /// True when the request would change nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_keep()
            && self.channel_id.is_keep()
            && self.privacy_level.is_keep()
            && self.scheduled_start_time.is_keep()
            && self.scheduled_end_time.is_keep()
            && self.description.is_keep()
            && self.entity_type.is_keep()
            && self.status.is_keep()
            && self.image.is_keep()
            && self.location.is_keep()
    }
}

/// Build the outgoing JSON document. Fields left at `Keep` are omitted.
pub fn build_edit_request(edit: &EditScheduledEvent) -> Map<String, Value> {
    // Every field serialises to a string, number, null or string map, which
    // serde_json cannot fail on.
    match serde_json::to_value(edit) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn name_only_request_contains_only_name() {
        let body = build_edit_request(&EditScheduledEvent::new().name("X"));
        assert_eq!(Value::Object(body), json!({"name": "X"}));
    }

    #[test]
    fn empty_edit_builds_empty_document() {
        let edit = EditScheduledEvent::new();
        assert!(edit.is_empty());
        assert!(build_edit_request(&edit).is_empty());
    }

    #[test]
    fn clear_is_sent_as_null_and_keep_is_omitted() {
        let edit = EditScheduledEvent::new()
            .clear_description()
            .clear_channel()
            .status(EventStatus::Canceled);
        let body = build_edit_request(&edit);
        assert_eq!(body.get("description"), Some(&Value::Null));
        assert_eq!(body.get("channel_id"), Some(&Value::Null));
        assert_eq!(body.get("status"), Some(&json!(4)));
        assert!(!body.contains_key("name"));
        assert!(!body.contains_key("scheduled_end_time"));
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn wire_encoding_of_ids_times_and_location() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 19, 0, 0).unwrap();
        let edit = EditScheduledEvent::new()
            .channel(Snowflake::new(41_771_983_423_143_937))
            .start_time(start)
            .entity_type(EntityType::External)
            .location("Town hall");
        let body = build_edit_request(&edit);
        assert_eq!(body["channel_id"], json!("41771983423143937"));
        assert_eq!(body["scheduled_start_time"], json!("2024-06-01T19:00:00Z"));
        assert_eq!(body["entity_type"], json!(3));
        assert_eq!(body["entity_metadata"], json!({"location": "Town hall"}));
    }

    #[test]
    fn apply_to_resolves_the_resulting_value() {
        let current = 5;
        assert_eq!(FieldUpdate::<i32>::Keep.apply_to(Some(&current)), Some(&5));
        assert_eq!(FieldUpdate::<i32>::Clear.apply_to(Some(&current)), None);
        assert_eq!(FieldUpdate::Set(9).apply_to(Some(&current)), Some(&9));
        assert_eq!(FieldUpdate::from(None::<i32>), FieldUpdate::Clear);
    }
}
