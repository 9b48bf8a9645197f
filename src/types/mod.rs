//! 类型系统模块：故事配置、生成请求与统一结果类型。
//!
//! # Types Module
//!
//! Plain data shared by every layer of the runtime.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`StoryConfig`] | Read-only story snapshot supplied by the UI |
//! | [`GenerationRequest`] | One immutable logical operation |
//! | [`ContinuityMemory`] | Per-chapter continuity summary |
//! | [`ProviderResult`] | Text, JSON, or a classified error |
//! | [`Provider`] / [`ProviderChoice`] | Backend identity and per-call selection |

pub mod memory;
pub mod message;
pub mod provider;
pub mod request;
pub mod result;
pub mod story;

pub use memory::ContinuityMemory;
pub use message::{render_transcript, Message, MessageRole};
pub use provider::{Provider, ProviderChoice};
pub use request::{GenerationRequest, OperationKind};
pub use result::{
    AudioPayload, BeatSuggestions, ConsultReply, ImagePayload, MediaPayload, Outline,
    ProviderResult, ReferenceLink,
};
pub use story::{Character, StoryConfig};
