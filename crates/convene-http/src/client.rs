use async_trait::async_trait;
use convene_core::{RemoteError, Transport};
use convene_models::Snowflake;
use reqwest::header::{HeaderMap, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

use crate::config::HttpConfig;
use crate::error::HttpError;

pub const AUDIT_LOG_REASON: &str = "X-Audit-Log-Reason";
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// [`Transport`] over the remote REST API.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    base: Url,
    config: HttpConfig,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        if config.token.trim().is_empty() {
            return Err(HttpError::MissingToken);
        }
        let base = Url::parse(config.base_url.trim_end_matches('/'))?;
        if base.cannot_be_a_base() {
            return Err(HttpError::NotABase(config.base_url.clone()));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { http, base, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// `{base}/guilds/{guild_id}/scheduled-events[/{event_id}]`
    pub fn events_url(&self, guild_id: Snowflake, event_id: Option<Snowflake>) -> Url {
        let mut url = self.base.clone();
        let guild_id = guild_id.to_string();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["guilds", guild_id.as_str(), "scheduled-events"]);
            if let Some(event_id) = event_id {
                segments.push(&event_id.to_string());
            }
        }
        url
    }

    fn with_user_count(&self, mut url: Url) -> Url {
        if self.config.with_user_count {
            url.query_pairs_mut().append_pair("with_user_count", "true");
        }
        url
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        self.config
            .retry_base_delay
            .checked_mul(2u32.saturating_pow(attempt))
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    }

    /// Send with exponential backoff. Only 5xx responses and network failures
    /// are retried.
    async fn send_with_retry(
        &self,
        method: Method,
        url: Url,
        body: Option<&Map<String, Value>>,
        reason: Option<&str>,
    ) -> Result<Response, RemoteError> {
        let attempts = self.config.max_retries.saturating_add(1);
        let mut last_err = RemoteError::Network("no attempts made".to_string());
        for attempt in 0..attempts {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header(AUTHORIZATION, format!("Bot {}", self.config.token));
            if let Some(reason) = reason {
                request = request.header(AUDIT_LOG_REASON, encode_reason(reason));
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status().is_server_error() => {
                    last_err = remote_error(resp).await;
                }
                Ok(resp) => return Err(remote_error(resp).await),
                Err(e) => {
                    last_err = RemoteError::Network(e.to_string());
                }
            }
            if attempt + 1 < attempts {
                let delay = self.retry_delay(attempt);
                tracing::warn!(
                    %method,
                    %url,
                    attempt = attempt + 1,
                    error = %last_err,
                    delay_ms = delay.as_millis() as u64,
                    "retrying scheduled event request"
                );
                tokio::time::sleep(delay).await;
            }
        }
        Err(last_err)
    }
}

/// Percent-encode a reason for the audit log header.
pub fn encode_reason(reason: &str) -> String {
    urlencoding::encode(reason).into_owned()
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

fn body_message(status: StatusCode, text: &str) -> String {
    let message = serde_json::from_str::<Value>(text).ok().and_then(|body| {
        body.get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    match message {
        Some(message) => message,
        None if text.trim().is_empty() => {
            status.canonical_reason().unwrap_or_default().to_string()
        }
        None => text.trim().to_string(),
    }
}

async fn remote_error(resp: Response) -> RemoteError {
    let status = resp.status();
    match status {
        StatusCode::FORBIDDEN => RemoteError::Forbidden,
        StatusCode::NOT_FOUND => RemoteError::NotFound,
        StatusCode::TOO_MANY_REQUESTS => {
            let header = retry_after(resp.headers());
            let body = resp.json::<Value>().await.ok();
            let retry_after = header.or_else(|| {
                body.as_ref()
                    .and_then(|body| body.get("retry_after"))
                    .and_then(Value::as_f64)
                    .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            });
            RemoteError::RateLimited { retry_after }
        }
        _ => {
            let text = resp.text().await.unwrap_or_default();
            RemoteError::ServerError {
                status: status.as_u16(),
                message: body_message(status, &text),
            }
        }
    }
}

async fn read_json(resp: Response) -> Result<Value, RemoteError> {
    let status = resp.status();
    resp.json::<Value>()
        .await
        .map_err(|e| RemoteError::ServerError {
            status: status.as_u16(),
            message: format!("invalid response body: {e}"),
        })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_scheduled_event(
        &self,
        guild_id: Snowflake,
        event_id: Snowflake,
    ) -> Result<Value, RemoteError> {
        let url = self.with_user_count(self.events_url(guild_id, Some(event_id)));
        let resp = self.send_with_retry(Method::GET, url, None, None).await?;
        read_json(resp).await
    }

    async fn list_scheduled_events(&self, guild_id: Snowflake) -> Result<Vec<Value>, RemoteError> {
        let url = self.with_user_count(self.events_url(guild_id, None));
        let resp = self.send_with_retry(Method::GET, url, None, None).await?;
        let status = resp.status();
        match read_json(resp).await? {
            Value::Array(items) => Ok(items),
            _ => Err(RemoteError::ServerError {
                status: status.as_u16(),
                message: "expected a JSON array of scheduled events".to_string(),
            }),
        }
    }

    async fn edit_scheduled_event(
        &self,
        guild_id: Snowflake,
        event_id: Snowflake,
        body: &Map<String, Value>,
        reason: Option<&str>,
    ) -> Result<Value, RemoteError> {
        let url = self.events_url(guild_id, Some(event_id));
        let resp = self
            .send_with_retry(Method::PATCH, url, Some(body), reason)
            .await?;
        read_json(resp).await
    }

    async fn delete_scheduled_event(
        &self,
        guild_id: Snowflake,
        event_id: Snowflake,
        reason: Option<&str>,
    ) -> Result<(), RemoteError> {
        let url = self.events_url(guild_id, Some(event_id));
        self.send_with_retry(Method::DELETE, url, None, reason)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base", &self.base.as_str())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
