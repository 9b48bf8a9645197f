//! JSON mode support for structured output.
//!
//! Gemini accepts a response schema and enforces it server-side; Groq's
//! OpenAI-compatible endpoint only guarantees "some JSON object", so the
//! normalizer's tolerant extraction and typed deserialization do the rest.

use serde_json::{json, Value};

/// JSON mode options for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonMode {
    /// Any valid JSON object.
    Json,

    /// JSON constrained by a response schema.
    JsonSchema,

    /// Free text.
    Off,
}

impl JsonMode {
    /// Get the string representation for OpenAI-style `response_format`.
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonMode::Json => "json_object",
            JsonMode::JsonSchema => "json_schema",
            JsonMode::Off => "",
        }
    }
}

/// Configuration for JSON mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonModeConfig {
    pub mode: JsonMode,

    /// Response schema (only used for JsonSchema mode)
    pub schema: Option<Value>,
}

impl JsonModeConfig {
    pub fn off() -> Self {
        Self {
            mode: JsonMode::Off,
            schema: None,
        }
    }

    pub fn json_object() -> Self {
        Self {
            mode: JsonMode::Json,
            schema: None,
        }
    }

    pub fn from_schema(schema: Value) -> Self {
        Self {
            mode: JsonMode::JsonSchema,
            schema: Some(schema),
        }
    }

    pub fn is_json(&self) -> bool {
        self.mode != JsonMode::Off
    }

    /// Fields to merge into Gemini's `generationConfig`.
    ///
    /// ```
    /// use quillforge::structured::{JsonModeConfig, outline_schema};
    ///
    /// let cfg = JsonModeConfig::from_schema(outline_schema()).to_gemini_format();
    /// assert_eq!(cfg["responseMimeType"], "application/json");
    /// assert_eq!(cfg["responseSchema"]["type"], "OBJECT");
    /// ```
    pub fn to_gemini_format(&self) -> Value {
        match (self.mode, &self.schema) {
            (JsonMode::Off, _) => json!({}),
            (JsonMode::JsonSchema, Some(schema)) => json!({
                "responseMimeType": "application/json",
                "responseSchema": schema,
            }),
            _ => json!({ "responseMimeType": "application/json" }),
        }
    }

    /// Top-level body fields for Groq's chat completions endpoint.
    ///
    /// Groq has no schema enforcement, so a schema config degrades to `json_object`.
    ///
    /// ```
    /// use quillforge::structured::JsonModeConfig;
    ///
    /// let body = JsonModeConfig::json_object().to_groq_format();
    /// assert_eq!(body["response_format"]["type"], "json_object");
    /// ```
    pub fn to_groq_format(&self) -> Value {
        match self.mode {
            JsonMode::Off => json!({}),
            JsonMode::Json | JsonMode::JsonSchema => json!({
                "response_format": { "type": JsonMode::Json.as_str() }
            }),
        }
    }
}
