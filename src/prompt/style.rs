//! Sensory style directive for mature stories.

use crate::config::StyleConfig;

/// Prompt instruction asking the model to weave italicized sound cues into the prose.
///
/// This only shapes the prompt. Nothing checks whether the model complied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensoryDirective {
    cues: Vec<String>,
}

impl Default for SensoryDirective {
    fn default() -> Self {
        Self::from_config(&StyleConfig::default())
    }
}

impl SensoryDirective {
    /// A directive that never renders.
    pub fn disabled() -> Self {
        Self { cues: Vec::new() }
    }

    pub fn from_config(style: &StyleConfig) -> Self {
        if !style.enabled {
            return Self::disabled();
        }
        let cues = style
            .sensory_cues
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(|c| {
                if c.starts_with('*') && c.ends_with('*') && c.len() > 1 {
                    c.to_string()
                } else {
                    format!("*{}*", c.trim_matches('*'))
                }
            })
            .collect();
        Self { cues }
    }

    pub fn cues(&self) -> &[String] {
        &self.cues
    }

    /// Rendered rules block, or `None` when the story is not mature or no cues are configured.
    pub fn render(&self, mature: bool) -> Option<String> {
        if !mature || self.cues.is_empty() {
            return None;
        }
        Some(format!(
            "SENSORY RULES:\n\
             - Ground scenes in tactile sensation and heavy atmosphere.\n\
             - Auditory punctuation: weave in italicized cues such as {}.\n\
             - Insert them naturally during physical contact or environmental reactions.\n\
             - Keep high variety; do not repeat the same cue too often.",
            self.cues.join(", ")
        ))
    }
}
