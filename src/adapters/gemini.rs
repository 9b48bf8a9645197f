//! Gemini generateContent 适配器
//!
//! Google Gemini `generateContent` adapter. Differences from the chat dialect:
//! - `contents` with `parts` instead of `messages`; roles are `user` and `model`.
//! - System prompts go in the top-level `systemInstruction`.
//! - `generationConfig` carries temperature, JSON mode and the response schema.
//! - The key travels in the `x-goog-api-key` header.
//! - Response text is `candidates[0].content.parts[*].text`; images and speech arrive
//!   as `inlineData`; search grounding as `groundingMetadata.groundingChunks`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::{
    classify_failure, empty_memory, shape_beats, shape_memory, shape_outline, transport_failure,
    NarrationAdapter, ProviderAdapter, VisualAdapter,
};
use crate::config::{ForgeConfig, GeminiConfig};
use crate::credentials::{Credential, CredentialResolver};
use crate::error::ProviderError;
use crate::prompt::{self, SensoryDirective};
use crate::structured::{
    beats_schema, memory_schema, normalize, outline_schema, Expect, JsonModeConfig,
};
use crate::transport::{Auth, HttpTransport};
use crate::types::{
    ConsultReply, GenerationRequest, MediaPayload, Message, MessageRole, OperationKind, Provider,
    ProviderResult, ReferenceLink,
};

const PROVIDER: Provider = Provider::Gemini;

/// Title used for grounding chunks that carry none.
pub const DEFAULT_LINK_TITLE: &str = "Reference Source";

/// Speech output format when the response omits `mimeType`.
pub const DEFAULT_AUDIO_MIME: &str = "audio/L16;codec=pcm;rate=24000";

#[derive(Debug)]
pub struct GeminiAdapter {
    config: GeminiConfig,
    style: SensoryDirective,
    credentials: Arc<CredentialResolver>,
    transport: Arc<HttpTransport>,
}

impl GeminiAdapter {
    pub fn new(
        config: &ForgeConfig,
        credentials: Arc<CredentialResolver>,
        transport: Arc<HttpTransport>,
    ) -> Self {
        Self {
            config: config.gemini.clone(),
            style: SensoryDirective::from_config(&config.style),
            credentials,
            transport,
        }
    }

    fn credential(&self) -> Result<Arc<Credential>, ProviderError> {
        self.credentials
            .resolve(PROVIDER)
            .ok_or_else(|| ProviderError::auth_required(PROVIDER))
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    /// Separate system instructions from conversation contents.
    fn split_messages(messages: &[Message]) -> (Option<Value>, Vec<Value>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for m in messages {
            let role = match m.role {
                MessageRole::System => {
                    system_parts.push(&m.content);
                    continue;
                }
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            contents.push(json!({ "role": role, "parts": [{ "text": m.content }] }));
        }

        let system_instruction = if system_parts.is_empty() {
            None
        } else {
            Some(json!({ "parts": [{ "text": system_parts.join("\n\n") }] }))
        };
        (system_instruction, contents)
    }

    /// Request body for `generateContent`.
    pub fn build_body(
        messages: &[Message],
        generation_config: Value,
        tools: Option<Value>,
    ) -> Value {
        let (system_instruction, contents) = Self::split_messages(messages);
        let mut body = json!({ "contents": contents });
        if let Some(sys) = system_instruction {
            body["systemInstruction"] = sys;
        }
        if generation_config.as_object().map_or(false, |m| !m.is_empty()) {
            body["generationConfig"] = generation_config;
        }
        if let Some(tools) = tools {
            body["tools"] = tools;
        }
        body
    }

    async fn generate(
        &self,
        operation: OperationKind,
        model: &str,
        body: Value,
    ) -> Result<Value, ProviderError> {
        let credential = self.credential()?;
        let request_id = uuid::Uuid::new_v4().to_string();
        debug!(
            provider = PROVIDER.id(),
            operation = operation.name(),
            model,
            request_id = %request_id,
            "sending request"
        );

        let started = Instant::now();
        let reply = self
            .transport
            .post_json(
                &self.endpoint(model),
                Auth::Header("x-goog-api-key", credential.token()),
                &body,
                Some(&request_id),
            )
            .await
            .map_err(|e| transport_failure(PROVIDER, operation, e))?;

        if !reply.is_success() {
            return Err(classify_failure(PROVIDER, operation, &reply));
        }
        info!(
            provider = PROVIDER.id(),
            operation = operation.name(),
            http_status = reply.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );

        reply.json().ok_or_else(|| {
            ProviderError::fatal("response body is not JSON")
                .with_provider(PROVIDER)
                .with_raw(reply.body.clone())
        })
    }

    /// Concatenated text parts of the first candidate.
    pub fn response_text(resp: &Value) -> Result<String, ProviderError> {
        let parts = resp
            .pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array());
        let text: String = parts
            .into_iter()
            .flatten()
            .filter(|p| !p.get("thought").and_then(|t| t.as_bool()).unwrap_or(false))
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect();
        if !text.is_empty() {
            return Ok(text);
        }

        let reason = resp
            .pointer("/promptFeedback/blockReason")
            .or_else(|| resp.pointer("/candidates/0/finishReason"))
            .and_then(|r| r.as_str())
            .unwrap_or("no candidates");
        Err(ProviderError::fatal(format!("empty completion ({})", reason))
            .with_provider(PROVIDER)
            .with_raw(resp.to_string()))
    }

    /// Web references from search grounding; chunks without a URI are dropped.
    pub fn grounding_links(resp: &Value) -> Vec<ReferenceLink> {
        resp.pointer("/candidates/0/groundingMetadata/groundingChunks")
            .and_then(|c| c.as_array())
            .into_iter()
            .flatten()
            .filter_map(|chunk| {
                let web = chunk.get("web")?;
                let uri = web.get("uri")?.as_str().filter(|u| !u.is_empty())?;
                let title = web
                    .get("title")
                    .and_then(|t| t.as_str())
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or(DEFAULT_LINK_TITLE);
                Some(ReferenceLink {
                    title: title.to_string(),
                    uri: uri.to_string(),
                })
            })
            .collect()
    }

    /// First `inlineData` part of the first candidate.
    pub fn inline_media(resp: &Value, default_mime: &str) -> Option<MediaPayload> {
        resp.pointer("/candidates/0/content/parts")?
            .as_array()?
            .iter()
            .find_map(|p| {
                let inline = p.get("inlineData")?;
                Some(MediaPayload {
                    mime_type: inline
                        .get("mimeType")
                        .and_then(|m| m.as_str())
                        .unwrap_or(default_mime)
                        .to_string(),
                    data: inline.get("data")?.as_str()?.to_string(),
                })
            })
    }

    async fn text_call(
        &self,
        operation: OperationKind,
        model: &str,
        body: Value,
    ) -> Result<String, ProviderError> {
        let resp = self.generate(operation, model, body).await?;
        Self::response_text(&resp)
    }

    async fn suggest_beats(&self, req: &GenerationRequest) -> ProviderResult {
        let body = Self::build_body(
            &prompt::beats_messages(req),
            JsonModeConfig::from_schema(beats_schema()).to_gemini_format(),
            None,
        );
        match self.text_call(req.kind(), &self.config.text_model, body).await {
            Ok(raw) => shape_beats(PROVIDER, &raw),
            Err(e) => e.into(),
        }
    }
}

fn with_temperature(temperature: f64, extra: Value) -> Value {
    let mut cfg = json!({ "temperature": temperature });
    if let (Some(target), Value::Object(extra)) = (cfg.as_object_mut(), extra) {
        target.extend(extra);
    }
    cfg
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn has_credential(&self) -> bool {
        self.credentials.has_usable(PROVIDER)
    }

    async fn generate_outline(&self, req: &GenerationRequest) -> ProviderResult {
        let body = Self::build_body(
            &prompt::outline_messages(req),
            with_temperature(
                self.config.outline_temperature,
                JsonModeConfig::from_schema(outline_schema()).to_gemini_format(),
            ),
            None,
        );
        match self.text_call(req.kind(), &self.config.text_model, body).await {
            Ok(raw) => shape_outline(PROVIDER, &raw),
            Err(e) => e.into(),
        }
    }

    async fn generate_draft_chapter(&self, req: &GenerationRequest) -> ProviderResult {
        let (model, temperature) = match req.kind() {
            OperationKind::Polish => (&self.config.text_model, self.config.polish_temperature),
            _ => (&self.config.draft_model, self.config.draft_temperature),
        };
        let body = Self::build_body(
            &prompt::prose_messages(req, &self.style),
            with_temperature(temperature, json!({})),
            None,
        );
        match self.text_call(req.kind(), model, body).await {
            Ok(raw) => normalize(&raw, Expect::Text).attributed_to(PROVIDER),
            Err(e) => e.into(),
        }
    }

    async fn extract_continuity_memory(&self, req: &GenerationRequest) -> ProviderResult {
        if req.is_blank_memory_extraction() {
            return empty_memory();
        }
        let body = Self::build_body(
            &prompt::memory_messages(req),
            JsonModeConfig::from_schema(memory_schema()).to_gemini_format(),
            None,
        );
        match self.text_call(req.kind(), &self.config.text_model, body).await {
            Ok(raw) => shape_memory(PROVIDER, &raw),
            Err(e) => e.into(),
        }
    }

    async fn consult(&self, req: &GenerationRequest) -> ProviderResult {
        if req.kind() == OperationKind::SuggestBeats {
            return self.suggest_beats(req).await;
        }
        let tools = self
            .config
            .search_grounding
            .then(|| json!([{ "google_search": {} }]));
        let body = Self::build_body(&prompt::consult_messages(req), json!({}), tools);
        let resp = match self.generate(req.kind(), &self.config.text_model, body).await {
            Ok(resp) => resp,
            Err(e) => return e.into(),
        };
        let text = match Self::response_text(&resp) {
            Ok(raw) => normalize(&raw, Expect::Text),
            Err(e) => return e.into(),
        };
        match text {
            ProviderResult::Text(text) => ProviderResult::Json(
                ConsultReply {
                    text,
                    links: Self::grounding_links(&resp),
                }
                .to_value(),
            ),
            other => other.attributed_to(PROVIDER),
        }
    }
}

#[async_trait]
impl VisualAdapter for GeminiAdapter {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn has_credential(&self) -> bool {
        self.credentials.has_usable(PROVIDER)
    }

    async fn render_image(&self, req: &GenerationRequest) -> ProviderResult {
        let aspect_ratio = match req.kind() {
            OperationKind::Portrait => "1:1",
            OperationKind::Visual => "16:9",
            other => {
                return ProviderError::fatal(format!("{} is not an image operation", other))
                    .with_provider(PROVIDER)
                    .into()
            }
        };
        let Some(prompt_text) = prompt::image_prompt(req) else {
            return ProviderError::fatal("image request has no subject")
                .with_provider(PROVIDER)
                .into();
        };
        let body = Self::build_body(
            &[Message::user(prompt_text)],
            json!({
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": { "aspectRatio": aspect_ratio },
            }),
            None,
        );
        let resp = match self.generate(req.kind(), &self.config.image_model, body).await {
            Ok(resp) => resp,
            Err(e) => return e.into(),
        };
        match Self::inline_media(&resp, "image/png") {
            Some(image) => ProviderResult::Json(image.to_value()),
            None => ProviderError::fatal("no image in response")
                .with_provider(PROVIDER)
                .with_raw(resp.to_string())
                .into(),
        }
    }
}

#[async_trait]
impl NarrationAdapter for GeminiAdapter {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn has_credential(&self) -> bool {
        self.credentials.has_usable(PROVIDER)
    }

    async fn speak(&self, req: &GenerationRequest) -> ProviderResult {
        if !req.kind().is_audio() {
            return ProviderError::fatal(format!("{} is not a narration operation", req.kind()))
                .with_provider(PROVIDER)
                .into();
        }
        let Some(text) = req.subject().map(str::trim).filter(|s| !s.is_empty()) else {
            return ProviderError::fatal("narration request has no text")
                .with_provider(PROVIDER)
                .into();
        };
        let body = Self::build_body(
            &[Message::user(text)],
            json!({
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": self.config.voice } }
                },
            }),
            None,
        );
        let resp = match self.generate(req.kind(), &self.config.tts_model, body).await {
            Ok(resp) => resp,
            Err(e) => return e.into(),
        };
        match Self::inline_media(&resp, DEFAULT_AUDIO_MIME) {
            Some(audio) => ProviderResult::Json(audio.to_value()),
            None => ProviderError::fatal("no audio in response")
                .with_provider(PROVIDER)
                .with_raw(resp.to_string())
                .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_body_splits_system() {
        let body = GeminiAdapter::build_body(
            &[Message::system("be terse"), Message::user("hi")],
            json!({"temperature": 0.9}),
            None,
        );
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be terse");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["generationConfig"]["temperature"], 0.9);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_empty_generation_config_omitted() {
        let body = GeminiAdapter::build_body(&[Message::user("q")], json!({}), None);
        assert!(body.get("generationConfig").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_response_text_joins_parts_and_skips_thoughts() {
        let resp = json!({"candidates": [{"content": {"parts": [
            {"text": "plan", "thought": true},
            {"text": "Once "},
            {"text": "upon"}
        ]}}]});
        assert_eq!(GeminiAdapter::response_text(&resp).unwrap(), "Once upon");
    }

    #[test]
    fn test_blocked_prompt_is_fatal() {
        let resp = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let e = GeminiAdapter::response_text(&resp).unwrap_err();
        assert!(e.message.contains("SAFETY"));
    }

    #[test]
    fn test_grounding_links_default_title_and_drop_missing_uri() {
        let resp = json!({"candidates": [{"groundingMetadata": {"groundingChunks": [
            {"web": {"uri": "https://a.example", "title": "A"}},
            {"web": {"uri": "https://b.example"}},
            {"web": {"title": "no uri"}}
        ]}}]});
        let links = GeminiAdapter::grounding_links(&resp);
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].title, DEFAULT_LINK_TITLE);
    }

    #[test]
    fn test_inline_image() {
        let resp = json!({"candidates": [{"content": {"parts": [
            {"text": "here you go"},
            {"inlineData": {"mimeType": "image/jpeg", "data": "aGk="}}
        ]}}]});
        let img = GeminiAdapter::inline_media(&resp, "image/png").unwrap();
        assert_eq!(img.mime_type, "image/jpeg");
        assert_eq!(img.decode().unwrap(), b"hi");
    }

    #[test]
    fn test_inline_media_default_mime() {
        let resp = json!({"candidates": [{"content": {"parts": [
            {"inlineData": {"data": "AAAA"}}
        ]}}]});
        let audio = GeminiAdapter::inline_media(&resp, DEFAULT_AUDIO_MIME).unwrap();
        assert_eq!(audio.mime_type, DEFAULT_AUDIO_MIME);
        assert!(GeminiAdapter::inline_media(&json!({}), DEFAULT_AUDIO_MIME).is_none());
    }
}
