use crate::config::ForgeConfig;
use crate::error_code::ErrorClass;
use crate::Result;
use reqwest::Proxy;
use std::env;
use std::time::Duration;
use tracing::debug;

/// How a request authenticates.
#[derive(Clone, Copy)]
pub enum Auth<'a> {
    /// `Authorization: Bearer <token>` (Groq).
    Bearer(&'a str),
    /// Named header carrying the raw key (Gemini `x-goog-api-key`).
    Header(&'static str, &'a str),
}

impl std::fmt::Debug for Auth<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Auth::Header(name, _) => write!(f, "Header({}, <redacted>)", name),
        }
    }
}

/// A fully-read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    /// Parsed `Retry-After` header, when the provider sent one in seconds.
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// `Retry-After: <seconds>`; the HTTP-date form is ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(
                env::var("QUILLFORGE_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(8),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("QUILLFORGE_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client })
    }

    pub fn from_config(config: &ForgeConfig) -> Result<Self> {
        Self::new(config.http_timeout())
    }

    /// POST a JSON body and read the whole response.
    ///
    /// Any status is returned as a reply; only failures to get a response at all
    /// (connect, timeout, body read) are errors.
    pub async fn post_json(
        &self,
        url: &str,
        auth: Auth<'_>,
        body: &serde_json::Value,
        request_id: Option<&str>,
    ) -> std::result::Result<HttpReply, TransportError> {
        let mut req = self.client.post(url).json(body);
        req = match auth {
            Auth::Bearer(token) => req.bearer_auth(token),
            Auth::Header(name, value) => req.header(name, value),
        };
        if let Some(id) = request_id {
            req = req.header("x-quillforge-request-id", id);
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await?;
        debug!(http_status = status, bytes = body.len(), "http reply");

        Ok(HttpReply {
            status,
            retry_after,
            body,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Connection and timeout failures are worth handing to another provider.
    pub fn class(&self) -> ErrorClass {
        match self {
            TransportError::Http(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                ErrorClass::Transient
            }
            TransportError::Http(e) if e.is_body() || e.is_decode() => ErrorClass::Transient,
            _ => ErrorClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_seconds_only() {
        assert_eq!(parse_retry_after(" 7 "), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
    }

    #[test]
    fn test_other_is_fatal() {
        assert_eq!(TransportError::Other("bad".into()).class(), ErrorClass::Fatal);
    }

    #[test]
    fn test_auth_debug_redacts() {
        let s = format!("{:?}", Auth::Header("x-goog-api-key", "k-123"));
        assert!(!s.contains("k-123"));
    }
}
