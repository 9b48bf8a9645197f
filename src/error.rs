use crate::error_code::ErrorClass;
use crate::transport::TransportError;
use crate::types::provider::Provider;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "retry.base_delay_ms")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "credential_resolver")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Crate-level error for everything that is not a classified provider failure:
/// configuration, I/O, and client construction.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}

/// A classified provider failure.
///
/// This is the error half of [`ProviderResult`](crate::types::ProviderResult): it is
/// returned as a value, never raised, so callers always receive exactly one outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{class}: {message}")]
pub struct ProviderError {
    pub class: ErrorClass,
    pub message: String,
    /// Provider that produced the failure, if one was reached.
    pub provider: Option<Provider>,
    /// Offending raw completion or response body, kept for diagnostics.
    pub raw: Option<String>,
}

impl ProviderError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
            provider: None,
            raw: None,
        }
    }

    pub fn auth_required(provider: Provider) -> Self {
        Self::new(
            ErrorClass::AuthRequired,
            format!(
                "{} credential missing: set {} or supply a key",
                provider.display_name(),
                provider.env_var()
            ),
        )
        .with_provider(provider)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Fatal, message)
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// True when only the user can fix this (show a key-entry shortcut).
    pub fn needs_user_action(&self) -> bool {
        self.class == ErrorClass::AuthRequired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_formatting() {
        let err = Error::configuration_with_context(
            "retry budget out of range",
            ErrorContext::new()
                .with_field_path("retry.max_retries")
                .with_source("config_loader"),
        );
        let msg = err.to_string();
        assert!(msg.contains("retry budget out of range"));
        assert!(msg.contains("field: retry.max_retries"));
        assert!(msg.contains("source: config_loader"));
        assert_eq!(
            err.context().and_then(|c| c.source.as_deref()),
            Some("config_loader")
        );
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::auth_required(Provider::Groq);
        assert!(err.needs_user_action());
        assert_eq!(err.provider, Some(Provider::Groq));
        assert!(err.to_string().starts_with("auth_required:"));
        assert!(err.message.contains("GROQ_API_KEY"));
    }
}
