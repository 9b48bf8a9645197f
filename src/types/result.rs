//! Uniform provider results and the typed views callers read them through.

use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::error_code::ErrorClass;

/// Outcome of one provider operation: text, parsed JSON, or a classified error.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResult {
    Text(String),
    Json(Value),
    Error(ProviderError),
}

impl ProviderResult {
    pub fn is_ok(&self) -> bool {
        !matches!(self, ProviderResult::Error(_))
    }

    pub fn error(&self) -> Option<&ProviderError> {
        match self {
            ProviderResult::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn error_class(&self) -> Option<ErrorClass> {
        self.error().map(|e| e.class)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ProviderResult::Text(_) => "text",
            ProviderResult::Json(_) => "json",
            ProviderResult::Error(_) => "error",
        }
    }

    /// Sorted top-level key names of a JSON result; empty for text and errors.
    pub fn json_keys(&self) -> Vec<String> {
        match self {
            ProviderResult::Json(Value::Object(map)) => {
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort();
                keys
            }
            _ => Vec::new(),
        }
    }

    pub fn into_text(self) -> Result<String, ProviderError> {
        match self {
            ProviderResult::Text(s) => Ok(s),
            ProviderResult::Json(v) => Ok(v.to_string()),
            ProviderResult::Error(e) => Err(e),
        }
    }

    pub fn into_json(self) -> Result<Value, ProviderError> {
        match self {
            ProviderResult::Json(v) => Ok(v),
            ProviderResult::Text(s) => {
                Err(ProviderError::fatal("expected a JSON result, got text").with_raw(s))
            }
            ProviderResult::Error(e) => Err(e),
        }
    }

    /// Deserialize a JSON result into a typed view; shape mismatches are `Fatal`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, ProviderError> {
        let value = self.into_json()?;
        serde_json::from_value::<T>(value.clone()).map_err(|e| {
            ProviderError::fatal(format!("unexpected response shape: {}", e))
                .with_raw(value.to_string())
        })
    }

    /// Attach the provider to an error result that does not name one yet.
    pub fn attributed_to(self, provider: crate::types::Provider) -> Self {
        match self {
            ProviderResult::Error(e) if e.provider.is_none() => {
                ProviderResult::Error(e.with_provider(provider))
            }
            other => other,
        }
    }
}

impl From<ProviderError> for ProviderResult {
    fn from(e: ProviderError) -> Self {
        ProviderResult::Error(e)
    }
}

/// Premise blurb and ordered chapter titles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    pub premise: String,
    pub outline: Vec<String>,
}

/// A web reference surfaced by a search-grounded consult.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceLink {
    pub title: String,
    pub uri: String,
}

/// Consult answer with optional grounding links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultReply {
    pub text: String,
    #[serde(default)]
    pub links: Vec<ReferenceLink>,
}

impl ConsultReply {
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "text": self.text, "links": self.links })
    }
}

/// Beats proposed for the next chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatSuggestions {
    pub beats: Vec<String>,
}

/// Base64-encoded media returned inline by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub mime_type: String,
    /// Standard base64, no data-URL prefix.
    pub data: String,
}

/// Portrait or scene visual.
pub type ImagePayload = MediaPayload;

/// Narration audio. Gemini speech arrives as raw PCM (`audio/L16;codec=pcm;rate=24000`).
pub type AudioPayload = MediaPayload;

impl MediaPayload {
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "mime_type": self.mime_type, "data": self.data })
    }

    /// `data:<mime>;base64,<data>` for direct use in an `<img>` or `<audio>` tag.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decode the payload; malformed base64 is reported as `Fatal`.
    pub fn decode(&self) -> Result<Vec<u8>, ProviderError> {
        base64::engine::general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| ProviderError::fatal(format!("invalid media payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_outline() {
        let r = ProviderResult::Json(json!({"premise": "p", "outline": ["a", "b"]}));
        assert_eq!(r.json_keys(), vec!["outline", "premise"]);
        let o: Outline = r.into_typed().unwrap();
        assert_eq!(o.outline.len(), 2);
    }

    #[test]
    fn test_shape_mismatch_is_fatal() {
        let r = ProviderResult::Json(json!({"premise": 3}));
        let err = r.into_typed::<Outline>().unwrap_err();
        assert_eq!(err.class, ErrorClass::Fatal);
        assert!(err.raw.is_some());
    }

    #[test]
    fn test_image_roundtrip_decode() {
        let img = ImagePayload {
            mime_type: "image/png".into(),
            data: "aGVsbG8=".into(),
        };
        assert_eq!(img.decode().unwrap(), b"hello");
        assert!(img.data_url().starts_with("data:image/png;base64,"));
    }
}
