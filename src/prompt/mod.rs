//! 提示词构建：大纲、章节草稿、润色、连贯性记忆与咨询。
//!
//! Prompt builders.
//!
//! Each builder returns provider-neutral [`Message`]s; the adapters translate them into
//! their own wire dialect (Gemini `systemInstruction` + `contents`, Groq chat messages).

pub mod context;
pub mod style;

pub use context::{
    character_roster, consult_context, memory_block, previous_excerpt, story_header,
    trailing_excerpt, EXCERPT_CHARS, START_OF_BOOK,
};
pub use style::SensoryDirective;

use crate::types::{GenerationRequest, Message, OperationKind};

/// Chapter outline plus blurb, as a JSON object.
pub fn outline_messages(req: &GenerationRequest) -> Vec<Message> {
    let story = req.story();
    let maturity = if story.mature {
        "Mature mode: adult themes allowed; let plot beats explore each character's expressions."
    } else {
        "Standard mode."
    };
    let system = format!(
        "You are a professional story architect. Create a cohesive premise and a 12 to 20 \
         chapter chronological outline for a {} novel.\n{}",
        story.genre.trim(),
        maturity
    );
    let mut user = format!(
        "{}\nConcept: {}\nCharacters:\n{}",
        story_header(story),
        story.premise.trim(),
        character_roster(story)
    );
    if let Some(d) = req.directive() {
        user.push_str(&format!("\nDirective: {}", d));
    }
    user.push_str(
        "\n\nReturn valid JSON only:\n{\n  \"premise\": \"Full blurb here\",\n  \
         \"outline\": [\"Chapter 1: ...\", \"Chapter 2: ...\"]\n}",
    );
    vec![Message::system(system), Message::user(user)]
}

/// Draft prompt for the request's chapter.
pub fn draft_messages(req: &GenerationRequest, style: &SensoryDirective) -> Vec<Message> {
    let story = req.story();
    let index = req.chapter().unwrap_or(0);
    let entry = story.outline_entry(index).unwrap_or("Untitled");

    let mut system = String::from(
        "Professional novelist. Maintain strict continuity and pick up exactly where the \
         previous chapter left off. Use vivid sensory description. Italicize internal thoughts.",
    );
    if let Some(rules) = style.render(story.mature) {
        system.push_str("\n\n");
        system.push_str(&rules);
    }

    let mut user = format!(
        "LAST CHAPTER ENDED WITH: \"{}\"\n\nWRITE Chapter {}: \"{}\" of \"{}\".\n",
        previous_excerpt(story, index),
        index + 1,
        entry,
        story.title.trim()
    );
    let premise = story.working_premise().trim();
    if !premise.is_empty() {
        user.push_str(&format!("Premise: {}\n", premise));
    }
    user.push_str(&story_header(story));
    user.push_str(&format!("\nCharacters:\n{}\n", character_roster(story)));
    if let Some(block) = memory_block(req.memory()) {
        user.push_str(&block);
        user.push('\n');
    }
    if let Some(d) = req.directive() {
        user.push_str(&format!("SPECIAL DIRECTIVE: {}\n", d));
    }
    if req.is_regeneration() {
        user.push_str(
            "\nREGENERATE: Change the scene based on the directive but keep the same \
             continuity. Return ONLY the chapter text.",
        );
    } else {
        user.push_str("\nWrite a complete, immersive chapter. Return ONLY the chapter text.");
    }

    vec![Message::system(system), Message::user(user)]
}

/// Revision pass over the draft carried in the request subject.
pub fn polish_messages(req: &GenerationRequest, style: &SensoryDirective) -> Vec<Message> {
    let story = req.story();
    let mut rules = String::from(
        "Rewrite and polish this novel chapter.\n\
         - Tighten pacing and enhance flow and sensory detail.\n\
         - Preserve every plot event and each character's voice.\n\
         - Remove repetitive phrasing.",
    );
    if style.render(story.mature).is_some() {
        rules.push_str(&format!(
            "\n- Perfect the timing of auditory cues ({}).",
            style.cues().join(", ")
        ));
    }
    if let Some(d) = req.directive() {
        rules.push_str(&format!("\n- Directive: {}", d));
    }
    let user = format!(
        "{}\n\nTEXT:\n{}\n\nReturn polished prose only.",
        rules,
        req.subject().unwrap_or_default()
    );
    vec![Message::user(user)]
}

/// Draft or polish depending on the request kind.
pub fn prose_messages(req: &GenerationRequest, style: &SensoryDirective) -> Vec<Message> {
    match req.kind() {
        OperationKind::Polish => polish_messages(req, style),
        _ => draft_messages(req, style),
    }
}

/// Continuity extraction over the chapter text in the request subject.
pub fn memory_messages(req: &GenerationRequest) -> Vec<Message> {
    let user = format!(
        "Analyze this chapter and extract key continuity points. Return JSON only:\n\
         {{ \"events\": [], \"character_updates\": [], \"tone_summary\": \"\" }}\n\nTEXT:\n{}",
        req.subject().unwrap_or_default()
    );
    vec![Message::user(user)]
}

/// Consult question with the running story context.
pub fn consult_messages(req: &GenerationRequest) -> Vec<Message> {
    let context = req
        .directive()
        .map(str::to_string)
        .unwrap_or_else(|| consult_context(req.story()));
    vec![
        Message::system(format!(
            "You are a lead story architect. Help the author with plot holes, character arcs \
             and themes.\nStory context:\n{}",
            context
        )),
        Message::user(req.subject().unwrap_or_default().to_string()),
    ]
}

/// Three beats for the chapter after the text in the request subject.
pub fn beats_messages(req: &GenerationRequest) -> Vec<Message> {
    let next_title = req
        .chapter()
        .and_then(|i| req.story().outline_entry(i))
        .unwrap_or("Untitled");
    let user = format!(
        "Based on this text: \"{}\", suggest 3 dialogue or plot beats for the next chapter \
         titled \"{}\".\n\nReturn JSON only:\n{{ \"beats\": [\"...\", \"...\", \"...\"] }}",
        trailing_excerpt(req.subject().unwrap_or_default()),
        next_title
    );
    vec![Message::user(user)]
}

/// Image prompt for portrait and visual requests.
pub fn image_prompt(req: &GenerationRequest) -> Option<String> {
    let story = req.story();
    match req.kind() {
        OperationKind::Portrait => {
            let c = req.character()?;
            let mut prompt = format!("Character portrait of {}", c.name.trim());
            let appearance = c.appearance();
            if !appearance.is_empty() {
                prompt.push_str(&format!(", {}", appearance));
            }
            if !c.description.trim().is_empty() {
                prompt.push_str(&format!(". {}", c.description.trim()));
            }
            prompt.push_str(&format!(
                ". Genre: {}. Style: cinematic concept art.",
                story.genre.trim()
            ));
            Some(prompt)
        }
        OperationKind::Visual => req
            .subject()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}
