//! Generation requests: one logical operation against a story snapshot.

use super::memory::ContinuityMemory;
use super::story::{Character, StoryConfig};
use std::fmt;
use std::sync::Arc;

/// Logical operation requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Outline,
    DraftChapter,
    /// Revision pass over an existing draft; served by the draft operation.
    Polish,
    ExtractMemory,
    Consult,
    /// Three beats for the next chapter; served by the consult operation.
    SuggestBeats,
    Portrait,
    Visual,
    /// Read-aloud audio of chapter prose.
    Narrate,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Outline => "outline",
            OperationKind::DraftChapter => "draft_chapter",
            OperationKind::Polish => "polish",
            OperationKind::ExtractMemory => "extract_memory",
            OperationKind::Consult => "consult",
            OperationKind::SuggestBeats => "suggest_beats",
            OperationKind::Portrait => "portrait",
            OperationKind::Visual => "visual",
            OperationKind::Narrate => "narrate",
        }
    }

    /// Image operations are served by the visual adapter, not the text adapters.
    pub fn is_visual(&self) -> bool {
        matches!(self, OperationKind::Portrait | OperationKind::Visual)
    }

    /// Audio operations are served by the narration adapter.
    pub fn is_audio(&self) -> bool {
        matches!(self, OperationKind::Narrate)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable generation request.
///
/// Built through the per-operation constructors; the `with_*` methods consume the
/// value and return a new one, so a request handed to the orchestrator never changes.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    kind: OperationKind,
    story: Arc<StoryConfig>,
    chapter: Option<usize>,
    directive: Option<String>,
    memory: Option<ContinuityMemory>,
    subject: Option<String>,
    character: Option<usize>,
    regenerate: bool,
}

impl GenerationRequest {
    fn base(kind: OperationKind, story: Arc<StoryConfig>) -> Self {
        Self {
            kind,
            story,
            chapter: None,
            directive: None,
            memory: None,
            subject: None,
            character: None,
            regenerate: false,
        }
    }

    pub fn outline(story: Arc<StoryConfig>) -> Self {
        Self::base(OperationKind::Outline, story)
    }

    pub fn draft_chapter(story: Arc<StoryConfig>, index: usize) -> Self {
        let mut req = Self::base(OperationKind::DraftChapter, story);
        req.chapter = Some(index);
        req
    }

    pub fn polish(story: Arc<StoryConfig>, index: usize, draft: impl Into<String>) -> Self {
        let mut req = Self::base(OperationKind::Polish, story);
        req.chapter = Some(index);
        req.subject = Some(draft.into());
        req
    }

    pub fn extract_memory(story: Arc<StoryConfig>, chapter_text: impl Into<String>) -> Self {
        let mut req = Self::base(OperationKind::ExtractMemory, story);
        req.subject = Some(chapter_text.into());
        req
    }

    pub fn consult(story: Arc<StoryConfig>, question: impl Into<String>) -> Self {
        let mut req = Self::base(OperationKind::Consult, story);
        req.subject = Some(question.into());
        req
    }

    /// Beats for chapter `next_index`, continuing from `chapter_text`.
    pub fn suggest_beats(
        story: Arc<StoryConfig>,
        next_index: usize,
        chapter_text: impl Into<String>,
    ) -> Self {
        let mut req = Self::base(OperationKind::SuggestBeats, story);
        req.chapter = Some(next_index);
        req.subject = Some(chapter_text.into());
        req
    }

    pub fn narrate(story: Arc<StoryConfig>, text: impl Into<String>) -> Self {
        let mut req = Self::base(OperationKind::Narrate, story);
        req.subject = Some(text.into());
        req
    }

    pub fn portrait(story: Arc<StoryConfig>, character_index: usize) -> Self {
        let mut req = Self::base(OperationKind::Portrait, story);
        req.character = Some(character_index);
        req
    }

    pub fn visual(story: Arc<StoryConfig>, prompt: impl Into<String>) -> Self {
        let mut req = Self::base(OperationKind::Visual, story);
        req.subject = Some(prompt.into());
        req
    }

    /// Free-text author directive (for consult: extra running context).
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        let d = directive.into();
        self.directive = if d.trim().is_empty() { None } else { Some(d) };
        self
    }

    pub fn with_memory(mut self, memory: Option<ContinuityMemory>) -> Self {
        self.memory = memory;
        self
    }

    /// Rewrite an existing chapter from the directive instead of drafting it fresh.
    pub fn as_regeneration(mut self) -> Self {
        self.regenerate = self.kind == OperationKind::DraftChapter;
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn story(&self) -> &StoryConfig {
        &self.story
    }

    pub fn chapter(&self) -> Option<usize> {
        self.chapter
    }

    pub fn directive(&self) -> Option<&str> {
        self.directive.as_deref()
    }

    pub fn is_regeneration(&self) -> bool {
        self.regenerate
    }

    pub fn memory(&self) -> Option<&ContinuityMemory> {
        self.memory.as_ref()
    }

    /// Chapter text, consult question, visual prompt or narration text depending on the kind.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn character(&self) -> Option<&Character> {
        self.character.and_then(|i| self.story.characters.get(i))
    }

    /// Memory extraction over blank text needs no model call.
    pub fn is_blank_memory_extraction(&self) -> bool {
        self.kind == OperationKind::ExtractMemory
            && self.subject.as_deref().map_or(true, |s| s.trim().is_empty())
    }
}
