//! Story configuration snapshot supplied by the UI.
//!
//! Field names follow the UI's camelCase JSON so a saved record deserializes as-is.
//! The core only ever reads these values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One cast member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Character {
    pub name: String,
    pub role: String,
    pub description: String,
    /// Voice: how the character speaks.
    pub dialogue_styles: Vec<String>,
    /// Core personality traits.
    pub personality: Vec<String>,
    /// Demeanour in intimate or emotional scenes.
    pub expressions: Vec<String>,
    pub hair_color: String,
    pub eye_color: String,
    pub body_type: String,
    pub distinguishing_features: String,
}

impl Character {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            ..Default::default()
        }
    }

    /// Comma-joined appearance attributes, skipping blanks.
    pub fn appearance(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !self.hair_color.trim().is_empty() {
            parts.push(format!("{} hair", self.hair_color.trim()));
        }
        if !self.eye_color.trim().is_empty() {
            parts.push(format!("{} eyes", self.eye_color.trim()));
        }
        if !self.body_type.trim().is_empty() {
            parts.push(format!("{} build", self.body_type.trim()));
        }
        if !self.distinguishing_features.trim().is_empty() {
            parts.push(self.distinguishing_features.trim().to_string());
        }
        parts.join(", ")
    }
}

/// The whole story as the UI knows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoryConfig {
    pub title: String,
    pub genre: String,
    #[serde(alias = "isR18")]
    pub mature: bool,
    /// The author's own concept text.
    pub premise: String,
    /// Blurb returned by outline generation.
    pub generated_premise: String,
    pub tone: Vec<String>,
    pub tags: Vec<String>,
    pub sub_genres: Vec<String>,
    pub content_tags: Vec<String>,
    pub novel_style: String,
    pub characters: Vec<Character>,
    /// Ordered chapter titles.
    pub outline: Vec<String>,
    /// Chapter index (0-based) to chapter text.
    pub chapters: BTreeMap<usize, String>,
}

impl StoryConfig {
    pub fn new(title: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            genre: genre.into(),
            ..Default::default()
        }
    }

    pub fn outline_entry(&self, index: usize) -> Option<&str> {
        self.outline.get(index).map(String::as_str)
    }

    /// Text of the chapter before `index`, if it has been written.
    pub fn previous_chapter(&self, index: usize) -> Option<&str> {
        let prev = index.checked_sub(1)?;
        self.chapters
            .get(&prev)
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
    }

    /// Premise to feed forward: the generated blurb when present, else the concept.
    pub fn working_premise(&self) -> &str {
        if self.generated_premise.trim().is_empty() {
            &self.premise
        } else {
            &self.generated_premise
        }
    }
}
