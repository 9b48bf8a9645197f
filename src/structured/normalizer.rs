//! 响应规范化：从模型原始输出中提取文本或 JSON。
//!
//! Response normalization.
//!
//! Models wrap JSON in markdown fences, prepend commentary ("Sure! Here is your
//! outline:"), or append closing remarks. [`normalize`] tolerates all of that and
//! never panics: every failure path is a `Fatal` [`ProviderResult::Error`] carrying
//! the offending raw text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::types::ProviderResult;

static LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("static regex"));
static TRAILING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n?[ \t]*```\s*$").expect("static regex"));

/// What the caller expects the completion to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Text,
    Json,
}

/// Normalize a raw completion into a [`ProviderResult`].
///
/// - `Expect::Text`: the trimmed string.
/// - `Expect::Json`: one leading and one trailing code fence are stripped, then the
///   substring from the first `{` to the last `}` is parsed.
pub fn normalize(raw: &str, expect: Expect) -> ProviderResult {
    match expect {
        Expect::Text => ProviderResult::Text(raw.trim().to_string()),
        Expect::Json => match extract_json_object(raw) {
            Ok(v) => ProviderResult::Json(v),
            Err(e) => ProviderResult::Error(e),
        },
    }
}

/// Remove a single leading and a single trailing markdown code fence.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(m) = LEADING_FENCE.find(s) {
        s = &s[m.end()..];
    }
    if let Some(m) = TRAILING_FENCE.find(s) {
        s = &s[..m.start()];
    }
    s.trim()
}

fn extract_json_object(raw: &str) -> Result<Value, ProviderError> {
    let body = strip_code_fence(raw);
    let (start, end) = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(ProviderError::fatal("no JSON object found in model output").with_raw(raw));
        }
    };

    serde_json::from_str::<Value>(&body[start..=end]).map_err(|e| {
        ProviderError::fatal(format!("malformed JSON in model output: {}", e)).with_raw(raw)
    })
}

/// Alternate key spellings seen across providers, per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyProfile {
    Outline,
    Memory,
    Beats,
}

impl KeyProfile {
    fn aliases(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            KeyProfile::Outline => &[
                ("blurb", "premise"),
                ("summary", "premise"),
                ("synopsis", "premise"),
                ("chapters", "outline"),
                ("titles", "outline"),
                ("chapter_titles", "outline"),
                ("chapterTitles", "outline"),
            ],
            KeyProfile::Memory => &[
                ("characterUpdates", "character_updates"),
                ("character_changes", "character_updates"),
                ("toneSummary", "tone_summary"),
                ("tone", "tone_summary"),
                ("plot_events", "events"),
                ("plotEvents", "events"),
            ],
            KeyProfile::Beats => &[
                ("suggestions", "beats"),
                ("plot_beats", "beats"),
                ("plotBeats", "beats"),
            ],
        }
    }
}

/// Rename alternate top-level keys to their canonical names.
///
/// A canonical key already present wins over an alias. Non-object values are
/// returned unchanged.
pub fn canonicalize_keys(value: Value, profile: KeyProfile) -> Value {
    let Value::Object(map) = value else {
        return value;
    };
    let aliases = profile.aliases();
    let mut out = Map::with_capacity(map.len());
    let mut deferred: Vec<(&'static str, Value)> = Vec::new();

    for (key, v) in map {
        match aliases.iter().find(|(alias, _)| *alias == key) {
            Some((_, canonical)) => deferred.push((canonical, v)),
            None => {
                out.insert(key, v);
            }
        }
    }
    for (canonical, v) in deferred {
        out.entry(canonical.to_string()).or_insert(v);
    }
    Value::Object(out)
}
