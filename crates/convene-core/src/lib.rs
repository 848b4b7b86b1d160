pub mod cache;
pub mod error;
pub mod resolver;
pub mod scheduled_event;
pub mod transport;

#[cfg(test)]
mod testing;

use std::sync::Arc;

pub use cache::{DispatchOutcome, EventCache};
pub use error::{EventError, RemoteError};
pub use resolver::{IdentityResolver, MemoryResolver};
pub use scheduled_event::{EventPayload, EventSnapshot, PartialRef, ScheduledEvent};
pub use transport::Transport;

/// Default CDN root for cover images.
pub const DEFAULT_CDN_URL: &str = "https://cdn.discordapp.com";

/// Collaborators shared by every event handle created from one client.
#[derive(Clone)]
pub struct ClientState {
    pub transport: Arc<dyn Transport>,
    pub resolver: Arc<dyn IdentityResolver>,
    /// CDN root used to build cover image URLs.
    pub cdn_url: String,
}

impl ClientState {
    pub fn new(transport: Arc<dyn Transport>, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            transport,
            resolver,
            cdn_url: DEFAULT_CDN_URL.to_string(),
        }
    }

    pub fn with_cdn_url(mut self, cdn_url: impl Into<String>) -> Self {
        self.cdn_url = cdn_url.into();
        self
    }
}

impl std::fmt::Debug for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientState")
            .field("cdn_url", &self.cdn_url)
            .finish_non_exhaustive()
    }
}
