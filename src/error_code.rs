//! 错误分类：将厂商错误映射为四种可操作的类别。
//!
//! Provider error classification.
//!
//! Every failure that comes back from a model provider is reduced to one of four
//! classes. The class alone drives retry and failover decisions in the
//! [`orchestrator`](crate::orchestrator); the raw status and body are only kept for
//! diagnostics.
//!
//! | Class          | Meaning                                   | Retry | Failover |
//! |----------------|-------------------------------------------|-------|----------|
//! | `AuthRequired` | missing or rejected credential            | no    | no       |
//! | `RateLimited`  | quota or request-rate limit               | yes   | yes      |
//! | `Transient`    | network or server-side failure            | no    | yes      |
//! | `Fatal`        | malformed request/response, anything else | no    | no       |
//!
//! ## Example
//!
//! ```rust
//! use quillforge::error_code::ErrorClass;
//!
//! let class = ErrorClass::from_http_status(429);
//! assert_eq!(class, ErrorClass::RateLimited);
//! assert!(class.is_retryable());
//! assert!(class.is_failover_candidate());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification attached to every provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Missing or invalid credential; the user has to act.
    AuthRequired,
    /// Provider-specific quota or rate limit.
    RateLimited,
    /// Network or server error, not necessarily quota related.
    Transient,
    /// Malformed request, unparseable response, or anything not otherwise classified.
    Fatal,
}

impl ErrorClass {
    /// Stable snake_case name, used in logs.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthRequired => "auth_required",
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
        }
    }

    /// Whether the same provider may be asked again after a backoff.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    /// Whether an `auto` invocation may hand the operation to the other provider.
    #[inline]
    pub fn is_failover_candidate(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient)
    }

    /// Maps an HTTP status to its most likely class.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::AuthRequired,
            429 => Self::RateLimited,
            408 | 500 | 502 | 503 | 504 | 529 => Self::Transient,
            s if (500..600).contains(&s) => Self::Transient,
            _ => Self::Fatal,
        }
    }

    /// Maps a provider error code or status string (Gemini `status`, Groq `code`/`type`).
    pub fn from_provider_code(code: &str) -> Option<Self> {
        let class = match code {
            "UNAUTHENTICATED" | "PERMISSION_DENIED" | "invalid_api_key"
            | "authentication_error" => Self::AuthRequired,
            "RESOURCE_EXHAUSTED" | "rate_limit_exceeded" | "insufficient_quota" | "tokens"
            | "requests" => Self::RateLimited,
            "UNAVAILABLE" | "INTERNAL" | "DEADLINE_EXCEEDED" | "service_unavailable"
            | "server_error" | "overloaded_error" => Self::Transient,
            "INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "NOT_FOUND" | "invalid_request_error"
            | "model_not_found" | "model_decommissioned" => Self::Fatal,
            _ => return None,
        };
        Some(class)
    }

    /// Heuristic classification from a free-form error message.
    ///
    /// Some providers report a rejected key as a plain 400, and quota errors are not
    /// always sent with a 429, so the message is scanned before the status is trusted.
    pub fn from_message(message: &str) -> Option<Self> {
        let m = message.to_ascii_lowercase();
        if m.contains("api key not valid")
            || m.contains("api_key_invalid")
            || m.contains("invalid api key")
            || m.contains("missing api key")
        {
            return Some(Self::AuthRequired);
        }
        if m.contains("quota")
            || m.contains("resource_exhausted")
            || m.contains("rate limit")
            || m.contains("rate_limit")
            || m.contains("too many requests")
        {
            return Some(Self::RateLimited);
        }
        if m.contains("overloaded") || m.contains("temporarily unavailable") {
            return Some(Self::Transient);
        }
        None
    }

    /// Combined classification of a non-success HTTP response.
    ///
    /// Precedence: body message heuristics, then the structured provider code,
    /// then the HTTP status.
    pub fn classify_response(status: u16, provider_code: Option<&str>, message: &str) -> Self {
        if let Some(class) = Self::from_message(message) {
            // A 5xx that mentions "quota" in passing is still a server failure.
            if !(class == Self::RateLimited && status >= 500) {
                return class;
            }
        }
        provider_code
            .and_then(Self::from_provider_code)
            .unwrap_or_else(|| Self::from_http_status(status))
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorClass::from_http_status(401), ErrorClass::AuthRequired);
        assert_eq!(ErrorClass::from_http_status(403), ErrorClass::AuthRequired);
        assert_eq!(ErrorClass::from_http_status(429), ErrorClass::RateLimited);
        assert_eq!(ErrorClass::from_http_status(503), ErrorClass::Transient);
        assert_eq!(ErrorClass::from_http_status(599), ErrorClass::Transient);
        assert_eq!(ErrorClass::from_http_status(400), ErrorClass::Fatal);
        assert_eq!(ErrorClass::from_http_status(404), ErrorClass::Fatal);
    }

    #[test]
    fn test_gemini_invalid_key_is_auth() {
        let class = ErrorClass::classify_response(
            400,
            Some("INVALID_ARGUMENT"),
            "API key not valid. Please pass a valid API key.",
        );
        assert_eq!(class, ErrorClass::AuthRequired);
    }

    #[test]
    fn test_quota_message_without_429() {
        let class = ErrorClass::classify_response(400, None, "You exceeded your current quota");
        assert_eq!(class, ErrorClass::RateLimited);
    }

    #[test]
    fn test_server_error_mentioning_quota_stays_transient() {
        let class = ErrorClass::classify_response(500, None, "quota service unreachable");
        assert_eq!(class, ErrorClass::Transient);
    }

    #[test]
    fn test_provider_code_precedes_status() {
        let class = ErrorClass::classify_response(400, Some("RESOURCE_EXHAUSTED"), "");
        assert_eq!(class, ErrorClass::RateLimited);
    }

    #[test]
    fn test_retry_and_failover_flags() {
        assert!(ErrorClass::RateLimited.is_retryable());
        assert!(!ErrorClass::Transient.is_retryable());
        assert!(ErrorClass::Transient.is_failover_candidate());
        assert!(!ErrorClass::AuthRequired.is_failover_candidate());
        assert!(!ErrorClass::Fatal.is_failover_candidate());
    }
}
