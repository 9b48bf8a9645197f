//! 故障转移编排：选择主提供方、限流退避重试、自动模式下切换到备用提供方。
//!
//! Failover orchestration.
//!
//! Per invocation:
//! 1. Select the primary: the pinned provider, or in `auto` the preferred one (switching
//!    to the other provider when only that one has a usable credential).
//! 2. Invoke it. `RateLimited` is retried with exponential backoff up to the budget.
//! 3. Success returns.
//! 4. A pinned choice propagates any error; pinned providers are never overridden.
//! 5. In `auto`, a `RateLimited`/`Transient` error hands the request to the secondary
//!    exactly once when it has a usable credential; its result is final.
//! 6. Anything else propagates the primary's error.
//!
//! Images and narration come from a single capable provider: the same retry policy
//! applies but there is no failover.
//!
//! Backoff sleeps are the only timers owned here. Dropping the returned future cancels
//! them, and [`FailoverOrchestrator::invoke_with_cancel`] aborts them explicitly.

pub mod policy;
pub mod stats;

pub use policy::{Decision, FailoverPolicy};
pub use stats::CallStats;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{
    dispatch, empty_memory, GeminiAdapter, GroqAdapter, NarrationAdapter, ProviderAdapter,
    VisualAdapter,
};
use crate::config::ForgeConfig;
use crate::credentials::CredentialResolver;
use crate::error::ProviderError;
use crate::transport::HttpTransport;
use crate::types::{GenerationRequest, Provider, ProviderChoice, ProviderResult};

enum Outcome {
    Done(ProviderResult),
    Failover(ProviderError),
}

/// Strategy object that owns the adapters and the retry policy.
#[derive(Debug)]
pub struct FailoverOrchestrator {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    visual: Option<Arc<dyn VisualAdapter>>,
    narration: Option<Arc<dyn NarrationAdapter>>,
    policy: FailoverPolicy,
    preferred: Provider,
}

impl FailoverOrchestrator {
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, policy: FailoverPolicy) -> Self {
        Self {
            adapters,
            visual: None,
            narration: None,
            policy,
            preferred: Provider::Gemini,
        }
    }

    /// Gemini and Groq adapters over one shared transport; Gemini also renders images
    /// and narrates.
    pub fn from_config(
        config: &ForgeConfig,
        credentials: Arc<CredentialResolver>,
    ) -> crate::Result<Self> {
        let transport = Arc::new(HttpTransport::from_config(config)?);
        let gemini = Arc::new(GeminiAdapter::new(config, credentials.clone(), transport.clone()));
        let groq = Arc::new(GroqAdapter::new(config, credentials, transport));
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![gemini.clone(), groq];
        Ok(Self::new(adapters, FailoverPolicy::new(config.retry.clone()))
            .with_preferred(config.preferred_provider)
            .with_visual(gemini.clone())
            .with_narration(gemini))
    }

    /// Provider tried first in `auto` mode.
    pub fn with_preferred(mut self, provider: Provider) -> Self {
        self.preferred = provider;
        self
    }

    pub fn with_visual(mut self, visual: Arc<dyn VisualAdapter>) -> Self {
        self.visual = Some(visual);
        self
    }

    pub fn with_narration(mut self, narration: Arc<dyn NarrationAdapter>) -> Self {
        self.narration = Some(narration);
        self
    }

    pub fn policy(&self) -> &FailoverPolicy {
        &self.policy
    }

    fn adapter(&self, provider: Provider) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.iter().find(|a| a.provider() == provider)
    }

    fn has_credential(&self, provider: Provider) -> bool {
        self.adapter(provider).map_or(false, |a| a.has_credential())
    }

    /// Primary provider for `choice`.
    pub fn select_primary(&self, choice: ProviderChoice) -> Provider {
        if let Some(pinned) = choice.pinned() {
            return pinned;
        }
        let preferred = self.preferred;
        if !self.has_credential(preferred) && self.has_credential(preferred.other()) {
            preferred.other()
        } else {
            preferred
        }
    }

    /// Run one logical operation and return exactly one result.
    pub async fn invoke(&self, req: &GenerationRequest, choice: ProviderChoice) -> ProviderResult {
        self.run(req, choice, None).await.0
    }

    /// Like [`invoke`](Self::invoke); cancelling `token` aborts a pending backoff with a
    /// `Fatal` "abandoned" error and no further provider calls.
    pub async fn invoke_with_cancel(
        &self,
        req: &GenerationRequest,
        choice: ProviderChoice,
        token: &CancellationToken,
    ) -> ProviderResult {
        self.run(req, choice, Some(token)).await.0
    }

    pub async fn invoke_with_stats(
        &self,
        req: &GenerationRequest,
        choice: ProviderChoice,
    ) -> (ProviderResult, CallStats) {
        self.run(req, choice, None).await
    }

    /// Image generation: same retry policy as text, no failover.
    pub async fn render(&self, req: &GenerationRequest, choice: ProviderChoice) -> ProviderResult {
        self.render_with_stats(req, choice).await.0
    }

    pub async fn render_with_stats(
        &self,
        req: &GenerationRequest,
        choice: ProviderChoice,
    ) -> (ProviderResult, CallStats) {
        self.render_inner(req, choice, None).await
    }

    /// Read-aloud speech: same retry policy as text, no failover.
    pub async fn narrate(&self, req: &GenerationRequest, choice: ProviderChoice) -> ProviderResult {
        self.narrate_with_stats(req, choice).await.0
    }

    pub async fn narrate_with_stats(
        &self,
        req: &GenerationRequest,
        choice: ProviderChoice,
    ) -> (ProviderResult, CallStats) {
        self.narrate_inner(req, choice, None).await
    }

    async fn render_inner(
        &self,
        req: &GenerationRequest,
        choice: ProviderChoice,
        cancel: Option<&CancellationToken>,
    ) -> (ProviderResult, CallStats) {
        let Some(visual) = self.visual.as_ref() else {
            let stats = CallStats::new(req.kind());
            return (ProviderError::fatal("no image provider configured").into(), stats);
        };
        self.single_provider(req, choice, cancel, visual.provider(), "generate images", || {
            visual.render_image(req)
        })
        .await
    }

    async fn narrate_inner(
        &self,
        req: &GenerationRequest,
        choice: ProviderChoice,
        cancel: Option<&CancellationToken>,
    ) -> (ProviderResult, CallStats) {
        let Some(narration) = self.narration.as_ref() else {
            let stats = CallStats::new(req.kind());
            return (ProviderError::fatal("no narration provider configured").into(), stats);
        };
        self.single_provider(req, choice, cancel, narration.provider(), "narrate", || {
            narration.speak(req)
        })
        .await
    }

    /// Retry against the one provider offering a capability; a pin to any other is fatal.
    async fn single_provider<F, Fut>(
        &self,
        req: &GenerationRequest,
        choice: ProviderChoice,
        cancel: Option<&CancellationToken>,
        provider: Provider,
        capability: &str,
        call: F,
    ) -> (ProviderResult, CallStats)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ProviderResult>,
    {
        let started = Instant::now();
        let mut stats = CallStats::new(req.kind());
        if let Some(pinned) = choice.pinned().filter(|p| *p != provider) {
            let e = ProviderError::fatal(format!("{} does not {}", pinned, capability))
                .with_provider(pinned);
            return (e.into(), stats);
        }

        let outcome = self
            .attempt_with_retry(provider, cancel, false, &mut stats, call)
            .await;
        stats.elapsed = started.elapsed();
        let result = match outcome {
            Outcome::Done(result) => result,
            Outcome::Failover(e) => e.into(),
        };
        debug!(
            request_id = %stats.request_id,
            operation = req.kind().name(),
            provider = provider.id(),
            result = result.kind_name(),
            attempts = stats.attempts.len(),
            "capability call finished"
        );
        (result, stats)
    }

    async fn run(
        &self,
        req: &GenerationRequest,
        choice: ProviderChoice,
        cancel: Option<&CancellationToken>,
    ) -> (ProviderResult, CallStats) {
        if req.kind().is_visual() {
            return self.render_inner(req, choice, cancel).await;
        }
        if req.kind().is_audio() {
            return self.narrate_inner(req, choice, cancel).await;
        }

        let started = Instant::now();
        let mut stats = CallStats::new(req.kind());
        if req.is_blank_memory_extraction() {
            debug!(
                request_id = %stats.request_id,
                "blank chapter text, skipping memory extraction"
            );
            return (empty_memory(), stats);
        }

        let primary = self.select_primary(choice);
        let Some(adapter) = self.adapter(primary) else {
            let e = ProviderError::fatal(format!("no adapter registered for {}", primary))
                .with_provider(primary);
            return (e.into(), stats);
        };
        debug!(
            request_id = %stats.request_id,
            operation = req.kind().name(),
            provider = primary.id(),
            choice = %choice,
            "invoking primary"
        );

        let secondary = primary.other();
        let can_failover = choice.is_auto();
        let outcome = self
            .attempt_with_retry(primary, cancel, can_failover, &mut stats, || {
                dispatch(adapter.as_ref(), req)
            })
            .await;

        let result = match outcome {
            Outcome::Done(result) => result,
            Outcome::Failover(primary_err) => match self.adapter(secondary) {
                Some(fallback) => {
                    info!(
                        request_id = %stats.request_id,
                        operation = req.kind().name(),
                        from = primary.id(),
                        to = secondary.id(),
                        error_class = primary_err.class.name(),
                        "failing over"
                    );
                    stats.failed_over = true;
                    stats.attempts.push(secondary);
                    dispatch(fallback.as_ref(), req).await.attributed_to(secondary)
                }
                None => primary_err.into(),
            },
        };

        stats.elapsed = started.elapsed();
        match result.error() {
            None => info!(
                request_id = %stats.request_id,
                operation = req.kind().name(),
                provider = stats.final_provider().map(|p| p.id()).unwrap_or(""),
                result = result.kind_name(),
                attempts = stats.attempts.len(),
                elapsed_ms = stats.elapsed.as_millis() as u64,
                "operation completed"
            ),
            Some(e) => warn!(
                request_id = %stats.request_id,
                operation = req.kind().name(),
                error_class = e.class.name(),
                attempts = stats.attempts.len(),
                "operation failed: {}",
                e.message
            ),
        }
        (result, stats)
    }

    /// Call `provider` until success, a terminal error, or an allowed failover.
    async fn attempt_with_retry<F, Fut>(
        &self,
        provider: Provider,
        cancel: Option<&CancellationToken>,
        allow_failover: bool,
        stats: &mut CallStats,
        call: F,
    ) -> Outcome
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ProviderResult>,
    {
        let mut attempt: u32 = 0;
        loop {
            stats.attempts.push(provider);
            let result = call().await.attributed_to(provider);
            let err = match result {
                ProviderResult::Error(e) => e,
                ok => return Outcome::Done(ok),
            };

            // Evaluated after the failure: the user may have supplied a key meanwhile.
            let can_failover = allow_failover && self.has_credential(provider.other());
            match self.policy.decide(&err, attempt, can_failover) {
                Decision::Retry { delay } => {
                    warn!(
                        request_id = %stats.request_id,
                        provider = provider.id(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error_class = err.class.name(),
                        "retrying after backoff"
                    );
                    if !sleep_or_cancel(delay, cancel).await {
                        info!(request_id = %stats.request_id, "backoff abandoned");
                        return Outcome::Done(
                            ProviderError::fatal("request abandoned during backoff")
                                .with_provider(provider)
                                .into(),
                        );
                    }
                    stats.backoffs.push(delay);
                    attempt += 1;
                }
                Decision::Failover => return Outcome::Failover(err),
                Decision::Fail => return Outcome::Done(err.into()),
            }
        }
    }
}

/// Sleep for `delay`; `false` if `cancel` fired first.
async fn sleep_or_cancel(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        },
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}
