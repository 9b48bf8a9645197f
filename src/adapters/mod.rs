//! 厂商适配层：统一的四个生成操作，按厂商各自实现请求方言。
//!
//! Provider adapters.
//!
//! [`ProviderAdapter`] is the whole contract between the orchestrator and a vendor:
//! four operations, each taking a [`GenerationRequest`] and returning exactly one
//! [`ProviderResult`]. Adapters never return `Err` and never panic; every failure is a
//! classified [`ProviderError`] value.
//!
//! Image generation ([`VisualAdapter`]) and read-aloud speech ([`NarrationAdapter`])
//! are separate capabilities because only one vendor offers them.

pub mod gemini;
pub mod groq;

pub use gemini::GeminiAdapter;
pub use groq::GroqAdapter;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::ProviderError;
use crate::error_code::ErrorClass;
use crate::structured::{canonicalize_keys, normalize, Expect, KeyProfile};
use crate::transport::{HttpReply, TransportError};
use crate::types::{
    BeatSuggestions, ContinuityMemory, GenerationRequest, OperationKind, Outline, Provider,
    ProviderResult,
};

/// Core trait for vendor-specific generation.
///
/// Object-safe; the orchestrator holds adapters as `Arc<dyn ProviderAdapter>`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + std::fmt::Debug {
    fn provider(&self) -> Provider;

    /// Whether a usable credential is available right now. Never touches the network.
    fn has_credential(&self) -> bool;

    /// `{ premise, outline[] }` as JSON.
    async fn generate_outline(&self, req: &GenerationRequest) -> ProviderResult;

    /// Chapter prose as text. Also serves [`OperationKind::Polish`] requests.
    async fn generate_draft_chapter(&self, req: &GenerationRequest) -> ProviderResult;

    /// `{ events, character_updates, tone_summary }` as JSON.
    async fn extract_continuity_memory(&self, req: &GenerationRequest) -> ProviderResult;

    /// `{ text, links[] }` as JSON. Also serves [`OperationKind::SuggestBeats`]
    /// requests, answering `{ beats[] }`.
    async fn consult(&self, req: &GenerationRequest) -> ProviderResult;
}

/// Image generation, offered by a subset of providers.
#[async_trait]
pub trait VisualAdapter: Send + Sync + std::fmt::Debug {
    fn provider(&self) -> Provider;

    fn has_credential(&self) -> bool;

    /// `{ mime_type, data }` as JSON for `Portrait` and `Visual` requests.
    async fn render_image(&self, req: &GenerationRequest) -> ProviderResult;
}

/// Text-to-speech, offered by a subset of providers.
#[async_trait]
pub trait NarrationAdapter: Send + Sync + std::fmt::Debug {
    fn provider(&self) -> Provider;

    fn has_credential(&self) -> bool;

    /// `{ mime_type, data }` as JSON holding base64 audio for `Narrate` requests.
    async fn speak(&self, req: &GenerationRequest) -> ProviderResult;
}

/// Route a text request to the matching adapter operation.
pub async fn dispatch(adapter: &dyn ProviderAdapter, req: &GenerationRequest) -> ProviderResult {
    match req.kind() {
        OperationKind::Outline => adapter.generate_outline(req).await,
        OperationKind::DraftChapter | OperationKind::Polish => {
            adapter.generate_draft_chapter(req).await
        }
        OperationKind::ExtractMemory => adapter.extract_continuity_memory(req).await,
        OperationKind::Consult | OperationKind::SuggestBeats => adapter.consult(req).await,
        OperationKind::Portrait | OperationKind::Visual | OperationKind::Narrate => {
            ProviderResult::Error(
                ProviderError::fatal(format!("{} is not a text operation", req.kind()))
                    .with_provider(adapter.provider()),
            )
        }
    }
}

/// Zero-valued memory for blank chapter text.
pub(crate) fn empty_memory() -> ProviderResult {
    ProviderResult::Json(ContinuityMemory::empty().to_value())
}

/// Classify a non-success HTTP reply.
///
/// Understands both `{"error": {"code": 429, "message": .., "status": "RESOURCE_EXHAUSTED"}}`
/// (Gemini) and `{"error": {"message": .., "type": .., "code": "rate_limit_exceeded"}}` (Groq).
pub(crate) fn classify_failure(
    provider: Provider,
    operation: OperationKind,
    reply: &HttpReply,
) -> ProviderError {
    let parsed = reply.json();
    let err = parsed.as_ref().and_then(|v| v.get("error"));
    let message = err
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| truncate(&reply.body, 300));
    let code = err.and_then(|e| {
        ["status", "code", "type"]
            .iter()
            .filter_map(|k| e.get(*k).and_then(|c| c.as_str()))
            .find(|c| ErrorClass::from_provider_code(c).is_some())
            .map(str::to_string)
    });

    let class = ErrorClass::classify_response(reply.status, code.as_deref(), &message);
    warn!(
        provider = provider.id(),
        operation = operation.name(),
        http_status = reply.status,
        provider_code = code.as_deref().unwrap_or(""),
        retry_after_secs = reply.retry_after.map(|d| d.as_secs()),
        error_class = class.name(),
        "provider request failed"
    );

    ProviderError::new(class, message)
        .with_provider(provider)
        .with_raw(reply.body.clone())
}

pub(crate) fn transport_failure(
    provider: Provider,
    operation: OperationKind,
    err: TransportError,
) -> ProviderError {
    let class = err.class();
    warn!(
        provider = provider.id(),
        operation = operation.name(),
        error_class = class.name(),
        error = %err,
        "provider unreachable"
    );
    ProviderError::new(class, err.to_string()).with_provider(provider)
}

/// Normalize, canonicalize and validate a JSON completion against `T`.
///
/// The returned JSON is `T` re-serialized, so key names are the same whichever
/// provider answered.
pub(crate) fn shape_json<T>(raw: &str, profile: KeyProfile) -> ProviderResult
where
    T: DeserializeOwned + Serialize,
{
    let value = match normalize(raw, Expect::Json) {
        ProviderResult::Json(v) => v,
        other => return other,
    };
    let typed: T = match ProviderResult::Json(canonicalize_keys(value, profile)).into_typed() {
        Ok(t) => t,
        Err(e) => return ProviderResult::Error(e.with_raw(raw)),
    };
    match serde_json::to_value(&typed) {
        Ok(v) => ProviderResult::Json(v),
        Err(e) => ProviderResult::Error(ProviderError::fatal(e.to_string()).with_raw(raw)),
    }
}

pub(crate) fn shape_outline(provider: Provider, raw: &str) -> ProviderResult {
    let result = shape_json::<Outline>(raw, KeyProfile::Outline);
    if let ProviderResult::Json(v) = &result {
        let len = v["outline"].as_array().map_or(0, Vec::len);
        if !(12..=20).contains(&len) {
            warn!(provider = provider.id(), chapters = len, "outline length outside 12..=20");
        }
    }
    result.attributed_to(provider)
}

pub(crate) fn shape_memory(provider: Provider, raw: &str) -> ProviderResult {
    shape_json::<ContinuityMemory>(raw, KeyProfile::Memory).attributed_to(provider)
}

pub(crate) fn shape_beats(provider: Provider, raw: &str) -> ProviderResult {
    let result = shape_json::<BeatSuggestions>(raw, KeyProfile::Beats);
    if let ProviderResult::Json(v) = &result {
        let len = v["beats"].as_array().map_or(0, Vec::len);
        if len != 3 {
            warn!(provider = provider.id(), beats = len, "expected three beats");
        }
    }
    result.attributed_to(provider)
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(status: u16, body: &str) -> HttpReply {
        HttpReply {
            status,
            retry_after: None,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_gemini_quota_body() {
        let r = reply(
            429,
            r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
        );
        let e = classify_failure(Provider::Gemini, OperationKind::DraftChapter, &r);
        assert_eq!(e.class, ErrorClass::RateLimited);
        assert_eq!(e.provider, Some(Provider::Gemini));
    }

    #[test]
    fn test_invalid_key_on_400_is_auth() {
        let r = reply(
            400,
            concat!(
                r#"{"error":{"code":400,"#,
                r#""message":"API key not valid. Please pass a valid API key.","#,
                r#""status":"INVALID_ARGUMENT"}}"#
            ),
        );
        let e = classify_failure(Provider::Gemini, OperationKind::Outline, &r);
        assert_eq!(e.class, ErrorClass::AuthRequired);
    }

    #[test]
    fn test_groq_server_error_and_plain_body() {
        let r = reply(503, "upstream connect error");
        let e = classify_failure(Provider::Groq, OperationKind::Consult, &r);
        assert_eq!(e.class, ErrorClass::Transient);
        assert_eq!(e.message, "upstream connect error");
    }

    #[test]
    fn test_shape_outline_canonical_keys() {
        let raw = "Sure!\n```json\n{\"blurb\": \"b\", \"chapters\": [\"One\"]}\n```";
        let r = shape_outline(Provider::Groq, raw);
        assert_eq!(r, ProviderResult::Json(json!({"premise": "b", "outline": ["One"]})));
    }

    #[test]
    fn test_shape_outline_missing_key_is_fatal_with_raw() {
        let r = shape_outline(Provider::Groq, r#"{"premise": "only"}"#);
        let e = r.error().unwrap();
        assert_eq!(e.class, ErrorClass::Fatal);
        assert_eq!(e.raw.as_deref(), Some(r#"{"premise": "only"}"#));
        assert_eq!(e.provider, Some(Provider::Groq));
    }

    #[test]
    fn test_shape_memory_accepts_camel_case() {
        let r = shape_memory(
            Provider::Gemini,
            r#"{"events":["met stranger"],"characterUpdates":[],"toneSummary":"tense"}"#,
        );
        let m: ContinuityMemory = r.into_typed().unwrap();
        assert_eq!(m.tone_summary, "tense");
    }

    #[test]
    fn test_shape_beats_accepts_suggestions_alias() {
        let r = shape_beats(
            Provider::Groq,
            "```json\n{\"suggestions\": [\"Ambush\", \"Escape\", \"Reveal\"]}\n```",
        );
        assert_eq!(
            r,
            ProviderResult::Json(json!({"beats": ["Ambush", "Escape", "Reveal"]}))
        );
    }
}
