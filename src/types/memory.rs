//! Continuity memory: a compact summary of one chapter fed into the next draft.

use serde::{Deserialize, Serialize};

/// Plot events, character-state changes and tone of a single chapter.
///
/// Derived from exactly one chapter's text and superseded by the next chapter's
/// memory; two memories are never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuityMemory {
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default, alias = "characterUpdates")]
    pub character_updates: Vec<String>,
    #[serde(default, alias = "toneSummary")]
    pub tone_summary: String,
}

impl ContinuityMemory {
    pub fn new(
        events: Vec<String>,
        character_updates: Vec<String>,
        tone_summary: impl Into<String>,
    ) -> Self {
        Self {
            events,
            character_updates,
            tone_summary: tone_summary.into(),
        }
    }

    /// The zero value returned for empty chapter text.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.character_updates.is_empty() && self.tone_summary.is_empty()
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "events": self.events,
            "character_updates": self.character_updates,
            "tone_summary": self.tone_summary,
        })
    }

    /// Compact JSON rendering embedded verbatim in the next chapter's prompt.
    pub fn to_prompt_json(&self) -> String {
        self.to_value().to_string()
    }
}
