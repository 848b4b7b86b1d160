use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use convene_models::{EntityType, Snowflake};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "convene")]
#[command(about = "Inspect and manage guild scheduled events", version)]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "convene.toml")]
    pub config: String,

    /// Print raw JSON instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show one event
    Get(EventArgs),
    /// List a guild's events
    List {
        #[arg(short, long)]
        guild: Snowflake,
    },
    /// Change fields of an event
    Edit {
        #[command(flatten)]
        target: EventArgs,
        #[command(flatten)]
        changes: EditArgs,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Delete an event
    Delete {
        #[command(flatten)]
        target: EventArgs,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Mark a scheduled event as active
    Start {
        #[command(flatten)]
        target: EventArgs,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Mark an active event as completed
    End {
        #[command(flatten)]
        target: EventArgs,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Cancel an event that has not started
    Cancel {
        #[command(flatten)]
        target: EventArgs,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(ClapArgs, Debug)]
pub struct EventArgs {
    #[arg(short, long)]
    pub guild: Snowflake,
    pub event: Snowflake,
}

#[derive(ClapArgs, Debug, Default)]
pub struct EditArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,
    #[arg(long)]
    pub clear_description: bool,
    #[arg(long, conflicts_with = "clear_channel")]
    pub channel: Option<Snowflake>,
    #[arg(long)]
    pub clear_channel: bool,
    /// RFC 3339 start time
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,
    /// RFC 3339 end time
    #[arg(long, conflicts_with = "clear_end")]
    pub end: Option<DateTime<Utc>>,
    #[arg(long)]
    pub clear_end: bool,
    #[arg(long, value_enum)]
    pub entity_type: Option<EntityKind>,
    #[arg(long)]
    pub location: Option<String>,
    /// PNG, JPEG, GIF or WEBP cover image
    #[arg(long, conflicts_with = "clear_image")]
    pub image: Option<PathBuf>,
    #[arg(long)]
    pub clear_image: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Stage,
    Voice,
    External,
}

impl From<EntityKind> for EntityType {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Stage => EntityType::StageInstance,
            EntityKind::Voice => EntityType::Voice,
            EntityKind::External => EntityType::External,
        }
    }
}
