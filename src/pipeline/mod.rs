//! 生成流水线：草稿 → 连贯性记忆 / 润色 → 结果。
//!
//! Generation pipeline.
//!
//! A chapter runs as: draft (with the previous chapter's memory) → memory extraction and
//! optional polish, concurrently. Memory extraction failures are swallowed: the chapter
//! still succeeds and the next prompt simply omits the memory block. A polish failure
//! keeps the unpolished draft.
//!
//! Regenerating a chapter runs the same steps with the draft prompt asking for a changed
//! scene that keeps continuity.
//!
//! The pipeline never persists anything; callers store [`ChapterOutcome::revisions`].

pub mod session;

pub use session::{ChapterOptions, SessionContext};

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::orchestrator::FailoverOrchestrator;
use crate::types::{
    AudioPayload, BeatSuggestions, ConsultReply, ContinuityMemory, GenerationRequest,
    ImagePayload, Outline, ProviderResult, StoryConfig,
};

/// Result of one chapter run.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterOutcome {
    pub index: usize,
    /// Final text: the polished revision when there is one, else the draft.
    pub text: String,
    pub draft: String,
    pub polished: Option<String>,
    /// Absent when extraction was disabled, skipped or failed.
    pub memory: Option<ContinuityMemory>,
    pub memory_error: Option<ProviderError>,
    pub polish_error: Option<ProviderError>,
}

impl ChapterOutcome {
    /// Draft, then the polished text if any, in the order a caller would persist them.
    pub fn revisions(&self) -> Vec<&str> {
        let mut out = vec![self.draft.as_str()];
        if let Some(p) = &self.polished {
            out.push(p.as_str());
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct GenerationPipeline {
    orchestrator: Arc<FailoverOrchestrator>,
}

impl GenerationPipeline {
    pub fn new(orchestrator: Arc<FailoverOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &FailoverOrchestrator {
        &self.orchestrator
    }

    /// Draft chapter `index`, then extract memory and (optionally) polish.
    ///
    /// Only a failed draft is an error.
    pub async fn run_chapter(
        &self,
        session: &SessionContext,
        index: usize,
        story: Arc<StoryConfig>,
        prior_memory: Option<ContinuityMemory>,
        directive: Option<&str>,
    ) -> Result<ChapterOutcome, ProviderError> {
        self.chapter(session, index, story, prior_memory, directive, false).await
    }

    /// Rewrite chapter `index` with the scene changed per `directive`, keeping continuity.
    pub async fn regenerate_chapter(
        &self,
        session: &SessionContext,
        index: usize,
        story: Arc<StoryConfig>,
        prior_memory: Option<ContinuityMemory>,
        directive: Option<&str>,
    ) -> Result<ChapterOutcome, ProviderError> {
        self.chapter(session, index, story, prior_memory, directive, true).await
    }

    async fn chapter(
        &self,
        session: &SessionContext,
        index: usize,
        story: Arc<StoryConfig>,
        prior_memory: Option<ContinuityMemory>,
        directive: Option<&str>,
        regenerate: bool,
    ) -> Result<ChapterOutcome, ProviderError> {
        if story.outline_entry(index).is_none() {
            return Err(ProviderError::fatal(format!(
                "chapter {} is not in the outline ({} entries)",
                index + 1,
                story.outline.len()
            )));
        }

        let mut draft_req =
            GenerationRequest::draft_chapter(story.clone(), index).with_memory(prior_memory);
        if let Some(d) = directive {
            draft_req = draft_req.with_directive(d);
        }
        if regenerate {
            draft_req = draft_req.as_regeneration();
        }
        let draft = self
            .orchestrator
            .invoke(&draft_req, session.choice)
            .await
            .into_text()?
            .trim()
            .to_string();

        let mut outcome = ChapterOutcome {
            index,
            text: draft.clone(),
            draft,
            polished: None,
            memory: None,
            memory_error: None,
            polish_error: None,
        };
        if outcome.draft.is_empty() {
            warn!(chapter = index + 1, "empty draft, skipping memory and polish");
            return Ok(outcome);
        }

        let options = session.options;
        let memory_fut = async {
            if !options.extract_memory {
                return None;
            }
            let req = GenerationRequest::extract_memory(story.clone(), outcome.draft.clone());
            Some(
                self.orchestrator
                    .invoke(&req, session.choice)
                    .await
                    .into_typed::<ContinuityMemory>(),
            )
        };
        let polish_fut = async {
            if !options.polish {
                return None;
            }
            let mut req = GenerationRequest::polish(story.clone(), index, outcome.draft.clone());
            if let Some(d) = directive {
                req = req.with_directive(d);
            }
            Some(polished_text(self.orchestrator.invoke(&req, session.choice).await))
        };
        let (memory, polished) = tokio::join!(memory_fut, polish_fut);

        match memory {
            Some(Ok(m)) => outcome.memory = Some(m),
            Some(Err(e)) => {
                warn!(
                    chapter = index + 1,
                    error_class = e.class.name(),
                    "memory extraction failed, continuing without memory: {}",
                    e.message
                );
                outcome.memory_error = Some(e);
            }
            None => {}
        }
        match polished {
            Some(Ok(p)) => {
                outcome.text = p.clone();
                outcome.polished = Some(p);
            }
            Some(Err(e)) => {
                warn!(
                    chapter = index + 1,
                    error_class = e.class.name(),
                    "polish failed, keeping draft: {}",
                    e.message
                );
                outcome.polish_error = Some(e);
            }
            None => {}
        }

        info!(
            chapter = index + 1,
            chars = outcome.text.chars().count(),
            memory = outcome.memory.is_some(),
            polished = outcome.polished.is_some(),
            regenerated = regenerate,
            "chapter ready"
        );
        Ok(outcome)
    }

    pub async fn run_outline(
        &self,
        session: &SessionContext,
        story: Arc<StoryConfig>,
        directive: Option<&str>,
    ) -> Result<Outline, ProviderError> {
        let mut req = GenerationRequest::outline(story);
        if let Some(d) = directive {
            req = req.with_directive(d);
        }
        self.orchestrator
            .invoke(&req, session.choice)
            .await
            .into_typed()
    }

    /// Polish arbitrary chapter text outside a chapter run.
    pub async fn polish(
        &self,
        session: &SessionContext,
        story: Arc<StoryConfig>,
        index: usize,
        text: &str,
    ) -> Result<String, ProviderError> {
        let req = GenerationRequest::polish(story, index, text);
        polished_text(self.orchestrator.invoke(&req, session.choice).await)
    }

    pub async fn extract_memory(
        &self,
        session: &SessionContext,
        story: Arc<StoryConfig>,
        text: &str,
    ) -> Result<ContinuityMemory, ProviderError> {
        let req = GenerationRequest::extract_memory(story, text);
        self.orchestrator
            .invoke(&req, session.choice)
            .await
            .into_typed()
    }

    /// `context` replaces the default story summary as the consult's running context.
    pub async fn consult(
        &self,
        session: &SessionContext,
        story: Arc<StoryConfig>,
        question: &str,
        context: Option<&str>,
    ) -> Result<ConsultReply, ProviderError> {
        if question.trim().is_empty() {
            return Err(ProviderError::fatal("consult question is empty"));
        }
        let mut req = GenerationRequest::consult(story, question);
        if let Some(c) = context {
            req = req.with_directive(c);
        }
        self.orchestrator
            .invoke(&req, session.choice)
            .await
            .into_typed()
    }

    /// Three beats for chapter `next_index`, drawn from the ending of `chapter_text`.
    pub async fn suggest_beats(
        &self,
        session: &SessionContext,
        story: Arc<StoryConfig>,
        next_index: usize,
        chapter_text: &str,
    ) -> Result<Vec<String>, ProviderError> {
        if chapter_text.trim().is_empty() {
            return Err(ProviderError::fatal("no chapter text to suggest beats from"));
        }
        if story.outline_entry(next_index).is_none() {
            return Err(ProviderError::fatal(format!(
                "chapter {} is not in the outline ({} entries)",
                next_index + 1,
                story.outline.len()
            )));
        }
        let req = GenerationRequest::suggest_beats(story, next_index, chapter_text);
        let suggestions: BeatSuggestions = self
            .orchestrator
            .invoke(&req, session.choice)
            .await
            .into_typed()?;
        Ok(suggestions.beats)
    }

    /// Read `text` aloud; Gemini only.
    pub async fn narrate(
        &self,
        session: &SessionContext,
        story: Arc<StoryConfig>,
        text: &str,
    ) -> Result<AudioPayload, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::fatal("nothing to narrate"));
        }
        let req = GenerationRequest::narrate(story, text);
        self.orchestrator
            .narrate(&req, session.choice)
            .await
            .into_typed()
    }

    pub async fn portrait(
        &self,
        session: &SessionContext,
        story: Arc<StoryConfig>,
        character_index: usize,
    ) -> Result<ImagePayload, ProviderError> {
        if story.characters.get(character_index).is_none() {
            return Err(ProviderError::fatal(format!(
                "no character at index {}",
                character_index
            )));
        }
        let req = GenerationRequest::portrait(story, character_index);
        self.orchestrator
            .render(&req, session.choice)
            .await
            .into_typed()
    }

    pub async fn visual(
        &self,
        session: &SessionContext,
        story: Arc<StoryConfig>,
        prompt: &str,
    ) -> Result<ImagePayload, ProviderError> {
        if prompt.trim().is_empty() {
            return Err(ProviderError::fatal("visual prompt is empty"));
        }
        let req = GenerationRequest::visual(story, prompt);
        self.orchestrator
            .render(&req, session.choice)
            .await
            .into_typed()
    }
}

fn polished_text(result: ProviderResult) -> Result<String, ProviderError> {
    let text = result.into_text()?.trim().to_string();
    if text.is_empty() {
        return Err(ProviderError::fatal("polish returned empty text"));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revisions_order() {
        let mut outcome = ChapterOutcome {
            index: 0,
            text: "d".into(),
            draft: "d".into(),
            polished: None,
            memory: None,
            memory_error: None,
            polish_error: None,
        };
        assert_eq!(outcome.revisions(), vec!["d"]);
        outcome.polished = Some("p".into());
        assert_eq!(outcome.revisions(), vec!["d", "p"]);
    }

    #[test]
    fn test_empty_polish_is_error() {
        assert!(polished_text(ProviderResult::Text("  ".into())).is_err());
        assert_eq!(polished_text(ProviderResult::Text(" ok ".into())).unwrap(), "ok");
    }
}
