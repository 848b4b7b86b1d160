//! Wire-format types for guild scheduled events.
//!
//! Everything the remote service sends passes through [`validate_partial`] or
//! [`validate_full`] before the rest of the workspace sees it.

pub mod channel;
pub mod edit;
pub mod error;
pub mod guild;
pub mod image;
pub mod scheduled_event;
pub mod snowflake;
pub mod user;

pub use channel::{Channel, ChannelType};
pub use edit::{build_edit_request, EditScheduledEvent, FieldUpdate};
pub use error::SchemaError;
pub use guild::Guild;
pub use image::ImageData;
pub use scheduled_event::{
    validate_full, validate_partial, EntityMetadata, EntityType, EventStatus,
    PartialScheduledEvent, PrivacyLevel, ScheduledEventPayload,
};
pub use snowflake::Snowflake;
pub use user::User;
