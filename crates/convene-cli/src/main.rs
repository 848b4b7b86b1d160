use anyhow::Result;
use clap::Parser;
use convene_core::{ClientState, EventCache, MemoryResolver};
use convene_http::HttpTransport;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("convene=info,convene_core=info,convene_http=info"));
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    let config = config::Config::load(&args.config)?;

    let transport = HttpTransport::new(config.http_config()?)?;
    tracing::debug!(?transport, "http transport ready");
    let state = ClientState::new(Arc::new(transport), Arc::new(MemoryResolver::new()))
        .with_cdn_url(config.cdn.base_url.clone());
    let cache = EventCache::new(state);

    commands::run(&cache, args.command, args.json).await
}
