use serde::{Deserialize, Serialize};

use crate::snowflake::Snowflake;

/// The slice of a guild this crate needs to render and route events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub owner_id: Option<Snowflake>,
}
