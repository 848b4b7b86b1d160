use anyhow::{bail, Context, Result};
use convene_core::DEFAULT_CDN_URL;
use convene_http::config::{DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES};
use convene_http::HttpConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const TOKEN_ENV: &str = "CONVENE_TOKEN";
pub const BASE_URL_ENV: &str = "CONVENE_API_BASE_URL";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub cdn: CdnConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub user_agent: Option<String>,
    pub with_user_count: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout_secs: 15,
            max_retries: DEFAULT_MAX_RETRIES,
            user_agent: None,
            with_user_count: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CdnConfig {
    pub base_url: String,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CDN_URL.to_string(),
        }
    }
}

impl Config {
    /// Load the file if it exists, then apply environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = Self::from_file(Path::new(path))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.api.token = Some(token);
        }
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = base_url;
        }
    }

    pub fn http_config(&self) -> Result<HttpConfig> {
        let Some(token) = self.api.token.clone() else {
            bail!("no bot token configured; set [api] token or {TOKEN_ENV}");
        };
        let mut http = HttpConfig::new(token).with_base_url(self.api.base_url.clone());
        http.timeout = Duration::from_secs(self.api.timeout_secs);
        http.max_retries = self.api.max_retries;
        http.with_user_count = self.api.with_user_count;
        if let Some(user_agent) = &self.api.user_agent {
            http.user_agent = user_agent.clone();
        }
        Ok(http)
    }
}
