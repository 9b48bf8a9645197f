//! # quillforge
//!
//! 连载小说协作写作的多厂商大模型生成编排层：统一响应、分类错误、自动故障转移，并在章节之间保持叙事连贯。
//!
//! Multi-provider LLM orchestration for co-authoring a serialized story: outline,
//! chapter drafts, continuity memory, polish, beat suggestions, visuals and narration,
//! across Google Gemini and Groq.
//!
//! ## Overview
//!
//! The UI owns the story and its persistence; this crate turns a read-only
//! [`StoryConfig`] snapshot into generated text, structured objects and images, or a
//! single classified [`ProviderError`].
//!
//! - **One contract per vendor**: [`ProviderAdapter`] has four operations, implemented by
//!   [`GeminiAdapter`] and [`GroqAdapter`].
//! - **Tolerant parsing**: [`structured::normalize`] extracts JSON from fenced or chatty output.
//! - **Classified failures**: every error is `AuthRequired`, `RateLimited`, `Transient` or `Fatal`.
//! - **Failover**: [`FailoverOrchestrator`] retries rate limits with backoff and, in `auto`
//!   mode, hands the request to the other provider once.
//! - **Continuity**: [`GenerationPipeline`] threads each chapter's [`ContinuityMemory`]
//!   into the next draft.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quillforge::{
//!     CredentialResolver, FailoverOrchestrator, ForgeConfig, GenerationPipeline,
//!     ProviderChoice, SessionContext, StoryConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ForgeConfig::default().with_env_overrides()?;
//!     let credentials = Arc::new(CredentialResolver::from_env());
//!     let orchestrator = Arc::new(FailoverOrchestrator::from_config(&config, credentials)?);
//!     let pipeline = GenerationPipeline::new(orchestrator);
//!
//!     let mut story = StoryConfig::new("Ashfall", "Fantasy");
//!     story.outline = vec!["Ch1: Arrival".into(), "Ch2: Confrontation".into()];
//!     let story = Arc::new(story);
//!
//!     let session = SessionContext::new(ProviderChoice::Auto);
//!     let ch1 = pipeline.run_chapter(&session, 0, story.clone(), None, None).await?;
//!     let ch2 = pipeline.run_chapter(&session, 1, story, ch1.memory, None).await?;
//!     println!("{}", ch2.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Story, request, memory and result types |
//! | [`structured`] | Response normalization and response schemas |
//! | [`adapters`] | Gemini and Groq adapters |
//! | [`credentials`] | Credential resolution and caching |
//! | [`orchestrator`] | Retry, backoff and failover |
//! | [`pipeline`] | Chapter pipeline and session context |
//! | [`prompt`] | Prompt builders and the sensory style directive |
//! | [`config`] | YAML / environment configuration |

pub mod adapters;
pub mod config;
pub mod credentials;
pub mod error;
pub mod error_code;
pub mod orchestrator;
pub mod pipeline;
pub mod prompt;
pub mod structured;
pub mod transport;
pub mod types;

pub use adapters::{GeminiAdapter, GroqAdapter, NarrationAdapter, ProviderAdapter, VisualAdapter};
pub use config::ForgeConfig;
pub use credentials::{Credential, CredentialResolver, CredentialSource};
pub use error::{Error, ErrorContext, ProviderError};
pub use error_code::ErrorClass;
pub use orchestrator::{CallStats, FailoverOrchestrator};
pub use pipeline::{ChapterOptions, ChapterOutcome, GenerationPipeline, SessionContext};
pub use types::{
    AudioPayload, BeatSuggestions, Character, ConsultReply, ContinuityMemory, GenerationRequest,
    ImagePayload, MediaPayload, OperationKind, Outline, Provider, ProviderChoice, ProviderResult,
    ReferenceLink, StoryConfig,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
