//! Groq 适配器（OpenAI 兼容的 chat completions）
//!
//! Groq adapter over the OpenAI-compatible `/chat/completions` endpoint.
//!
//! Groq has no schema enforcement and no search tool: JSON operations ask for
//! `response_format: json_object` and lean on the normalizer, and consult replies
//! always carry an empty link list. Narration and images are Gemini-only.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::{
    classify_failure, empty_memory, shape_beats, shape_memory, shape_outline, transport_failure,
    ProviderAdapter,
};
use crate::config::{ForgeConfig, GroqConfig};
use crate::credentials::{Credential, CredentialResolver};
use crate::error::ProviderError;
use crate::prompt::{self, SensoryDirective};
use crate::structured::{normalize, Expect, JsonModeConfig};
use crate::transport::{Auth, HttpTransport};
use crate::types::{
    ConsultReply, GenerationRequest, Message, OperationKind, Provider, ProviderResult,
};

const PROVIDER: Provider = Provider::Groq;

#[derive(Debug)]
pub struct GroqAdapter {
    config: GroqConfig,
    style: SensoryDirective,
    credentials: Arc<CredentialResolver>,
    transport: Arc<HttpTransport>,
}

impl GroqAdapter {
    pub fn new(
        config: &ForgeConfig,
        credentials: Arc<CredentialResolver>,
        transport: Arc<HttpTransport>,
    ) -> Self {
        Self {
            config: config.groq.clone(),
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

    /// Chat completions body.
    pub fn build_body(
        model: &str,
        messages: &[Message],
        temperature: f64,
        max_completion_tokens: u32,
        json_mode: &JsonModeConfig,
    ) -> Value {
        let mut body = json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
            "max_completion_tokens": max_completion_tokens,
        });
        if json_mode.is_json() {
            if let Value::Object(extra) = json_mode.to_groq_format() {
                for (k, v) in extra {
                    body[k.as_str()] = v;
                }
            }
        }
        body
    }

    fn json_body(&self, messages: &[Message]) -> Value {
        Self::build_body(
            &self.config.model,
            messages,
            self.config.json_temperature,
            self.config.json_max_tokens,
            &JsonModeConfig::json_object(),
        )
    }

    fn prose_body(&self, messages: &[Message], temperature: f64) -> Value {
        Self::build_body(
            &self.config.model,
            messages,
            temperature,
            self.config.prose_max_tokens,
            &JsonModeConfig::off(),
        )
    }

    /// `choices[0].message.content`.
    pub fn completion_text(resp: &Value) -> Result<String, ProviderError> {
        match resp
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
        {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            _ => {
                let reason = resp
                    .pointer("/choices/0/finish_reason")
                    .and_then(|r| r.as_str())
                    .unwrap_or("no choices");
                Err(ProviderError::fatal(format!("empty completion ({})", reason))
                    .with_provider(PROVIDER)
                    .with_raw(resp.to_string()))
            }
        }
    }

    async fn complete(
        &self,
        operation: OperationKind,
        body: Value,
    ) -> Result<String, ProviderError> {
        let credential = self.credential()?;
        let request_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(
            provider = PROVIDER.id(),
            operation = operation.name(),
            model = %self.config.model,
            request_id = %request_id,
            "sending request"
        );

        let started = Instant::now();
        let reply = self
            .transport
            .post_json(&url, Auth::Bearer(credential.token()), &body, Some(&request_id))
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

        let resp = reply.json().ok_or_else(|| {
            ProviderError::fatal("response body is not JSON")
                .with_provider(PROVIDER)
                .with_raw(reply.body.clone())
        })?;
        Self::completion_text(&resp)
    }
}

#[async_trait]
impl ProviderAdapter for GroqAdapter {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn has_credential(&self) -> bool {
        self.credentials.has_usable(PROVIDER)
    }

    async fn generate_outline(&self, req: &GenerationRequest) -> ProviderResult {
        let body = self.json_body(&prompt::outline_messages(req));
        match self.complete(req.kind(), body).await {
            Ok(raw) => shape_outline(PROVIDER, &raw),
            Err(e) => e.into(),
        }
    }

    async fn generate_draft_chapter(&self, req: &GenerationRequest) -> ProviderResult {
        let temperature = match req.kind() {
            OperationKind::Polish => self.config.polish_temperature,
            _ => self.config.prose_temperature,
        };
        let body = self.prose_body(&prompt::prose_messages(req, &self.style), temperature);
        match self.complete(req.kind(), body).await {
            Ok(raw) => normalize(&raw, Expect::Text).attributed_to(PROVIDER),
            Err(e) => e.into(),
        }
    }

    async fn extract_continuity_memory(&self, req: &GenerationRequest) -> ProviderResult {
        if req.is_blank_memory_extraction() {
            return empty_memory();
        }
        let body = self.json_body(&prompt::memory_messages(req));
        match self.complete(req.kind(), body).await {
            Ok(raw) => shape_memory(PROVIDER, &raw),
            Err(e) => e.into(),
        }
    }

    async fn consult(&self, req: &GenerationRequest) -> ProviderResult {
        if req.kind() == OperationKind::SuggestBeats {
            let body = self.json_body(&prompt::beats_messages(req));
            return match self.complete(req.kind(), body).await {
                Ok(raw) => shape_beats(PROVIDER, &raw),
                Err(e) => e.into(),
            };
        }
        let body = self.prose_body(&prompt::consult_messages(req), self.config.prose_temperature);
        let raw = match self.complete(req.kind(), body).await {
            Ok(raw) => raw,
            Err(e) => return e.into(),
        };
        match normalize(&raw, Expect::Text) {
            ProviderResult::Text(text) => ProviderResult::Json(
                ConsultReply {
                    text,
                    links: Vec::new(),
                }
                .to_value(),
            ),
            other => other.attributed_to(PROVIDER),
        }
    }
}
