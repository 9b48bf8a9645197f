//! Shared fixtures for integration tests: scripted mock adapters and story builders.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use quillforge::adapters::{NarrationAdapter, ProviderAdapter, VisualAdapter};
use quillforge::orchestrator::{FailoverOrchestrator, FailoverPolicy};
use quillforge::prompt::{self, SensoryDirective};
use quillforge::types::render_transcript;
use quillforge::{
    Character, ErrorClass, GenerationRequest, OperationKind, Provider, ProviderError,
    ProviderResult, StoryConfig,
};

type Responder = dyn Fn(&GenerationRequest, usize) -> ProviderResult + Send + Sync;

/// Scripted adapter that records every call it receives.
pub struct MockAdapter {
    provider: Provider,
    credential: AtomicBool,
    responder: Box<Responder>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    kinds: Mutex<Vec<OperationKind>>,
    prompts: Mutex<Vec<String>>,
}

impl fmt::Debug for MockAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockAdapter")
            .field("provider", &self.provider)
            .field("calls", &self.calls())
            .finish()
    }
}

impl MockAdapter {
    pub fn new<F>(provider: Provider, responder: F) -> Self
    where
        F: Fn(&GenerationRequest, usize) -> ProviderResult + Send + Sync + 'static,
    {
        Self {
            provider,
            credential: AtomicBool::new(true),
            responder: Box::new(responder),
            delay: None,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            kinds: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(provider: Provider, result: ProviderResult) -> Self {
        Self::new(provider, move |_, _| result.clone())
    }

    /// Returns the scripted results in order, repeating the last one.
    pub fn sequence(provider: Provider, results: Vec<ProviderResult>) -> Self {
        let script = Mutex::new(VecDeque::from(results));
        Self::new(provider, move |_, _| {
            let mut q = script.lock().unwrap();
            if q.len() > 1 {
                q.pop_front().unwrap()
            } else {
                q.front().cloned().unwrap()
            }
        })
    }

    pub fn without_credential(self) -> Self {
        self.credential.store(false, Ordering::SeqCst);
        self
    }

    /// Simulated latency per call (use with paused time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<OperationKind> {
        self.kinds.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Prompts built for `DraftChapter` requests, in call order.
    pub fn draft_prompts(&self) -> Vec<String> {
        let kinds = self.kinds();
        self.prompts()
            .into_iter()
            .zip(kinds)
            .filter(|(_, k)| *k == OperationKind::DraftChapter)
            .map(|(p, _)| p)
            .collect()
    }

    async fn respond(&self, req: &GenerationRequest) -> ProviderResult {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        self.kinds.lock().unwrap().push(req.kind());
        let messages = match req.kind() {
            OperationKind::Outline => prompt::outline_messages(req),
            OperationKind::ExtractMemory => prompt::memory_messages(req),
            OperationKind::Consult => prompt::consult_messages(req),
            OperationKind::SuggestBeats => prompt::beats_messages(req),
            OperationKind::DraftChapter | OperationKind::Polish => {
                prompt::prose_messages(req, &SensoryDirective::default())
            }
            _ => Vec::new(),
        };
        self.prompts.lock().unwrap().push(render_transcript(&messages));
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        (self.responder)(req, n)
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn has_credential(&self) -> bool {
        self.credential.load(Ordering::SeqCst)
    }

    async fn generate_outline(&self, req: &GenerationRequest) -> ProviderResult {
        self.respond(req).await
    }

    async fn generate_draft_chapter(&self, req: &GenerationRequest) -> ProviderResult {
        self.respond(req).await
    }

    async fn extract_continuity_memory(&self, req: &GenerationRequest) -> ProviderResult {
        self.respond(req).await
    }

    async fn consult(&self, req: &GenerationRequest) -> ProviderResult {
        self.respond(req).await
    }
}

#[async_trait]
impl VisualAdapter for MockAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn has_credential(&self) -> bool {
        self.credential.load(Ordering::SeqCst)
    }

    async fn render_image(&self, req: &GenerationRequest) -> ProviderResult {
        self.respond(req).await
    }
}

#[async_trait]
impl NarrationAdapter for MockAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn has_credential(&self) -> bool {
        self.credential.load(Ordering::SeqCst)
    }

    async fn speak(&self, req: &GenerationRequest) -> ProviderResult {
        self.respond(req).await
    }
}

pub fn error(class: ErrorClass) -> ProviderResult {
    ProviderResult::Error(ProviderError::new(class, format!("mock {}", class.name())))
}

pub fn text(s: &str) -> ProviderResult {
    ProviderResult::Text(s.to_string())
}

/// Orchestrator over a Gemini and a Groq mock with the default retry policy.
pub fn orchestrator(gemini: &Arc<MockAdapter>, groq: &Arc<MockAdapter>) -> FailoverOrchestrator {
    let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![gemini.clone(), groq.clone()];
    FailoverOrchestrator::new(adapters, FailoverPolicy::default())
}

pub fn two_chapter_story() -> Arc<StoryConfig> {
    let mut story = StoryConfig::new("Ashfall", "Fantasy");
    story.premise = "A courier crosses a burning frontier.".into();
    story.tone = vec!["grim".into()];
    story.outline = vec!["Ch1: Arrival".into(), "Ch2: Confrontation".into()];
    let mut ivo = Character::new("Ivo", "courier");
    ivo.dialogue_styles = vec!["laconic".into()];
    ivo.eye_color = "amber".into();
    story.characters.push(ivo);
    Arc::new(story)
}
