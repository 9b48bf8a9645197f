//! Story-context fragments shared by every prompt.

use crate::types::{Character, ContinuityMemory, StoryConfig};

/// Characters of the previous chapter carried into the next draft.
pub const EXCERPT_CHARS: usize = 2_000;

/// Placeholder when there is no previous chapter.
pub const START_OF_BOOK: &str = "Start of the book.";

fn join(items: &[String]) -> String {
    let kept: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if kept.is_empty() {
        "unspecified".to_string()
    } else {
        kept.join(", ")
    }
}

fn character_line(c: &Character) -> String {
    let mut line = format!("- {} ({})", c.name.trim(), c.role.trim());
    if !c.description.trim().is_empty() {
        line.push_str(&format!(": {}", c.description.trim()));
    }
    line.push_str(&format!("\n  VOICE: {}", join(&c.dialogue_styles)));
    line.push_str(&format!("\n  PERSONALITY: {}", join(&c.personality)));
    let appearance = c.appearance();
    if !appearance.is_empty() {
        line.push_str(&format!("\n  APPEARANCE: {}", appearance));
    }
    if !c.expressions.is_empty() {
        line.push_str(&format!("\n  DEMEANOUR: {}", join(&c.expressions)));
    }
    line
}

/// Full roster with voice, personality and appearance per character.
pub fn character_roster(story: &StoryConfig) -> String {
    if story.characters.is_empty() {
        return "No named characters yet.".to_string();
    }
    story
        .characters
        .iter()
        .map(character_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// The last [`EXCERPT_CHARS`] characters of `text`, cut on a char boundary.
pub fn trailing_excerpt(text: &str) -> &str {
    let start = text
        .char_indices()
        .rev()
        .nth(EXCERPT_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &text[start..]
}

/// Ending of the chapter before `index`, or [`START_OF_BOOK`].
pub fn previous_excerpt(story: &StoryConfig, index: usize) -> &str {
    story
        .previous_chapter(index)
        .map(trailing_excerpt)
        .unwrap_or(START_OF_BOOK)
}

/// Memory block embedded verbatim as compact JSON; omitted when absent.
pub fn memory_block(memory: Option<&ContinuityMemory>) -> Option<String> {
    memory.map(|m| format!("Continuity memory (previous chapter): {}", m.to_prompt_json()))
}

/// Title, genre, tone and tags in one block.
pub fn story_header(story: &StoryConfig) -> String {
    let mut lines = vec![
        format!("Title: {}", story.title.trim()),
        format!("Genre: {}", story.genre.trim()),
    ];
    if !story.sub_genres.is_empty() {
        lines.push(format!("Sub-genres: {}", join(&story.sub_genres)));
    }
    lines.push(format!("Tone: {}", join(&story.tone)));
    lines.push(format!("Tags: {}", join(&story.tags)));
    if !story.content_tags.is_empty() {
        lines.push(format!("Content: {}", join(&story.content_tags)));
    }
    if !story.novel_style.trim().is_empty() {
        lines.push(format!("Style: {}", story.novel_style.trim()));
    }
    lines.push(format!("Mature: {}", if story.mature { "ON" } else { "OFF" }));
    lines.join("\n")
}

/// Running context for consult when the caller gives none.
pub fn consult_context(story: &StoryConfig) -> String {
    let mut ctx = story_header(story);
    let premise = story.working_premise().trim();
    if !premise.is_empty() {
        ctx.push_str(&format!("\nPremise: {}", premise));
    }
    if !story.outline.is_empty() {
        ctx.push_str(&format!("\nOutline: {}", story.outline.join(" | ")));
    }
    ctx
}
