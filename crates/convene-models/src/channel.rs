use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::snowflake::Snowflake;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    Text,
    Voice,
    Category,
    Announcement,
    StageVoice,
    Forum,
    Unknown(u32),
}

impl ChannelType {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Text,
            2 => Self::Voice,
            4 => Self::Category,
            5 => Self::Announcement,
            13 => Self::StageVoice,
            15 => Self::Forum,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Text => 0,
            Self::Voice => 2,
            Self::Category => 4,
            Self::Announcement => 5,
            Self::StageVoice => 13,
            Self::Forum => 15,
            Self::Unknown(code) => code,
        }
    }

    /// Whether a scheduled event can be hosted in a channel of this type.
    pub fn hosts_events(self) -> bool {
        matches!(self, Self::Voice | Self::StageVoice)
    }
}

impl Serialize for ChannelType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}

impl<'de> Deserialize<'de> for ChannelType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_code(u32::deserialize(deserializer)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Channel {
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}
