//! 运行时配置：模型、重试策略、超时与文风指令。
//!
//! Runtime configuration.
//!
//! Defaults work out of the box; a YAML file can override any subset, and
//! `QUILLFORGE_*` environment variables override the file.
//!
//! ```yaml
//! preferred_provider: gemini
//! retry:
//!   max_retries: 3
//!   base_delay_ms: 1000
//! groq:
//!   model: llama-3.3-70b-versatile
//! style:
//!   sensory_cues: ["*creak*", "*rustle*"]
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::types::Provider;
use crate::{Error, ErrorContext, Result};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Provider tried first when the caller chooses `auto`.
    pub preferred_provider: Provider,
    /// Per-request HTTP timeout.
    pub http_timeout_secs: u64,
    pub retry: RetryConfig,
    pub gemini: GeminiConfig,
    pub groq: GroqConfig,
    pub style: StyleConfig,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            preferred_provider: Provider::Gemini,
            http_timeout_secs: 120,
            retry: RetryConfig::default(),
            gemini: GeminiConfig::default(),
            groq: GroqConfig::default(),
            style: StyleConfig::default(),
        }
    }
}

/// Rate-limit retry policy for the primary provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra attempts after the first one, only on `RateLimited`.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each following retry.
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    /// Outline, memory extraction, consult and polish.
    pub text_model: String,
    /// Chapter drafting.
    pub draft_model: String,
    pub image_model: String,
    /// Read-aloud speech.
    pub tts_model: String,
    /// Prebuilt voice used for narration.
    pub voice: String,
    pub outline_temperature: f64,
    pub draft_temperature: f64,
    pub polish_temperature: f64,
    /// Attach the Google Search tool to consult calls.
    pub search_grounding: bool,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            text_model: "gemini-3-flash-preview".into(),
            draft_model: "gemini-3-pro-preview".into(),
            image_model: "gemini-2.5-flash-image".into(),
            tts_model: "gemini-2.5-flash-preview-tts".into(),
            voice: "Kore".into(),
            outline_temperature: 0.7,
            draft_temperature: 0.9,
            polish_temperature: 0.7,
            search_grounding: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroqConfig {
    pub base_url: String,
    pub model: String,
    pub json_temperature: f64,
    pub prose_temperature: f64,
    pub polish_temperature: f64,
    pub json_max_tokens: u32,
    pub prose_max_tokens: u32,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".into(),
            model: "llama-3.3-70b-versatile".into(),
            json_temperature: 0.2,
            prose_temperature: 0.85,
            polish_temperature: 0.7,
            json_max_tokens: 1024,
            prose_max_tokens: 4096,
        }
    }
}

/// Sensory style directive for mature stories.
///
/// The cue vocabulary is a product decision, so it lives here rather than in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub enabled: bool,
    /// Italicized auditory interjections the model may weave in.
    pub sensory_cues: Vec<String>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sensory_cues: [
                "*creak*", "*rustle*", "*thump*", "*gasp*", "*pant*", "*hiss*", "*mmph*", "*kiss*",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl ForgeConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let cfg: ForgeConfig = serde_yaml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw).map_err(|e| match e {
            Error::Yaml(inner) => Error::configuration_with_context(
                inner.to_string(),
                ErrorContext::new()
                    .with_details(path.as_ref().display().to_string())
                    .with_source("config_loader"),
            ),
            other => other,
        })
    }

    /// Apply `QUILLFORGE_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(v) = env::var("QUILLFORGE_PREFERRED_PROVIDER") {
            self.preferred_provider = v.parse::<Provider>().map_err(|e| {
                Error::configuration_with_context(
                    e,
                    ErrorContext::new()
                        .with_field_path("QUILLFORGE_PREFERRED_PROVIDER")
                        .with_source("env"),
                )
            })?;
        }
        if let Some(v) = env_parse::<u64>("QUILLFORGE_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = v;
        }
        if let Some(v) = env_parse::<u32>("QUILLFORGE_MAX_RETRIES") {
            self.retry.max_retries = v;
        }
        if let Some(v) = env_parse::<u64>("QUILLFORGE_BASE_DELAY_MS") {
            self.retry.base_delay_ms = v;
        }
        if let Ok(v) = env::var("QUILLFORGE_GEMINI_BASE_URL") {
            self.gemini.base_url = v;
        }
        if let Ok(v) = env::var("QUILLFORGE_GROQ_BASE_URL") {
            self.groq.base_url = v;
        }
        if let Ok(v) = env::var("QUILLFORGE_GROQ_MODEL") {
            self.groq.model = v;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, raw) in [
            ("gemini.base_url", &self.gemini.base_url),
            ("groq.base_url", &self.groq.base_url),
        ] {
            url::Url::parse(raw).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid base URL: {}", e),
                    ErrorContext::new()
                        .with_field_path(field)
                        .with_details(raw.clone())
                        .with_source("config_validator"),
                )
            })?;
        }
        if self.retry.max_retries > 10 {
            return Err(Error::configuration_with_context(
                "retry budget above 10 attempts",
                ErrorContext::new()
                    .with_field_path("retry.max_retries")
                    .with_source("config_validator"),
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(Error::configuration_with_context(
                "max_delay_ms must be at least base_delay_ms",
                ErrorContext::new()
                    .with_field_path("retry.max_delay_ms")
                    .with_source("config_validator"),
            ));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}
