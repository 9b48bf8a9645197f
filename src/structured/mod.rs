//! Structured output module.
//!
//! - [`normalize`]: tolerant text/JSON extraction from raw completions
//! - [`canonicalize_keys`]: alternate key spellings → canonical names
//! - [`JsonModeConfig`]: per-provider JSON mode request fields
//! - [`outline_schema`] / [`memory_schema`] / [`beats_schema`]: response schemas for
//!   providers that enforce them
//!
//! # Examples
//!
//! ```
//! use quillforge::structured::{normalize, Expect};
//! use quillforge::types::ProviderResult;
//! use serde_json::json;
//!
//! let raw = "Here is the memory:\n```json\n{\"events\": [\"met stranger\"]}\n```";
//! assert_eq!(
//!     normalize(raw, Expect::Json),
//!     ProviderResult::Json(json!({"events": ["met stranger"]}))
//! );
//! ```

pub mod json_mode;
pub mod normalizer;
pub mod schema;

pub use json_mode::{JsonMode, JsonModeConfig};
pub use normalizer::{canonicalize_keys, normalize, strip_code_fence, Expect, KeyProfile};
pub use schema::{beats_schema, memory_schema, outline_schema, SchemaGenerator};
