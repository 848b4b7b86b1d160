use anyhow::{Context, Result};
use convene_core::{EventCache, ScheduledEvent, Transport};
use convene_models::{EditScheduledEvent, ImageData, User};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::cli::{Command, EditArgs, EventArgs};

pub async fn run(cache: &EventCache, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Get(target) => {
            let event = fetch(cache, &target).await?;
            print_event(&event, json)
        }
        Command::List { guild } => {
            let events = cache.fetch_guild_events(guild).await?;
            if json {
                let rendered: Vec<Value> = events
                    .iter()
                    .map(|event| fields_json(event))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rendered)?);
            } else {
                for event in cache.for_guild(guild) {
                    println!(
                        "{}  {:<9}  {}  {:>4}  {}",
                        event.id(),
                        event.status().to_string(),
                        event.scheduled_start_time().to_rfc3339(),
                        event.user_count(),
                        event
                    );
                }
            }
            Ok(())
        }
        Command::Edit {
            target,
            changes,
            reason,
        } => {
            let edit = build_edit(changes)?;
            let event = fetch(cache, &target).await?;
            event.edit(edit, reason.as_deref()).await?;
            print_event(&event, json)
        }
        Command::Delete { target, reason } => {
            let event = fetch(cache, &target).await?;
            cache.delete(&event, reason.as_deref()).await?;
            println!("deleted {} ({})", event.id(), event);
            Ok(())
        }
        Command::Start { target, reason } => {
            let event = fetch(cache, &target).await?;
            event.start(reason.as_deref()).await?;
            print_event(&event, json)
        }
        Command::End { target, reason } => {
            let event = fetch(cache, &target).await?;
            event.end(reason.as_deref()).await?;
            print_event(&event, json)
        }
        Command::Cancel { target, reason } => {
            let event = fetch(cache, &target).await?;
            event.cancel(reason.as_deref()).await?;
            print_event(&event, json)
        }
    }
}

async fn fetch(cache: &EventCache, target: &EventArgs) -> Result<Arc<ScheduledEvent>> {
    let raw = cache
        .state()
        .transport
        .fetch_scheduled_event(target.guild, target.event)
        .await
        .with_context(|| format!("failed to fetch event {}", target.event))?;
    Ok(cache.upsert_full(&raw)?)
}

fn build_edit(args: EditArgs) -> Result<EditScheduledEvent> {
    let mut edit = EditScheduledEvent::new();
    if let Some(name) = args.name {
        edit = edit.name(name);
    }
    if let Some(description) = args.description {
        edit = edit.description(description);
    } else if args.clear_description {
        edit = edit.clear_description();
    }
    if let Some(channel) = args.channel {
        edit = edit.channel(channel);
    } else if args.clear_channel {
        edit = edit.clear_channel();
    }
    if let Some(start) = args.start {
        edit = edit.start_time(start);
    }
    if let Some(end) = args.end {
        edit = edit.end_time(end);
    } else if args.clear_end {
        edit = edit.clear_end_time();
    }
    if let Some(kind) = args.entity_type {
        edit = edit.entity_type(kind.into());
    }
    if let Some(location) = args.location {
        edit = edit.location(location);
    }
    if let Some(path) = args.image {
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read image {}", path.display()))?;
        edit = edit.image(ImageData::from_bytes(&bytes)?);
    } else if args.clear_image {
        edit = edit.clear_image();
    }
    Ok(edit)
}

fn fields_json(event: &ScheduledEvent) -> Value {
    let fields: Map<String, Value> = event
        .to_fields()
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    Value::Object(fields)
}

fn print_event(event: &ScheduledEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&fields_json(event))?);
        return Ok(());
    }
    for (name, value) in event.to_fields() {
        match value {
            Value::String(text) => println!("{name:>20}: {text}"),
            other => println!("{name:>20}: {other}"),
        }
    }
    if let Some(creator) = event.creator() {
        println!("{:>20}: {}", "created_by", creator_label(&creator));
    }
    if let Some(url) = event.image_url() {
        println!("{:>20}: {url}", "image_url");
    }
    Ok(())
}

fn creator_label(user: &User) -> String {
    if user.display_name() == user.username {
        format!("{} ({})", user.username, user.id)
    } else {
        format!("{} [{}] ({})", user.display_name(), user.username, user.id)
    }
}
