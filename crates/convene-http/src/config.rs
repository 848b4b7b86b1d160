use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Settings for [`HttpTransport`](crate::HttpTransport).
#[derive(Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
    /// Extra attempts after the first for 5xx responses and network failures.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub user_agent: String,
    /// Ask the remote service to include subscriber counts on fetch and list.
    pub with_user_count: bool,
}

impl HttpConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: String::new(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            user_agent: format!("convene/{}", env!("CARGO_PKG_VERSION")),
            with_user_count: true,
        }
    }
}

impl std::fmt::Debug for HttpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("user_agent", &self.user_agent)
            .field("with_user_count", &self.with_user_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_token() {
        let config = HttpConfig::new("secret-token");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("discord.com"));
    }
}
