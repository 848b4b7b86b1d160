//! REST transport for guild scheduled events.

pub mod client;
pub mod config;
pub mod error;

pub use client::HttpTransport;
pub use config::HttpConfig;
pub use error::HttpError;
