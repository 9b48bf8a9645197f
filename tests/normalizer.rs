//! Response normalization across the wrappings models actually produce.

use quillforge::structured::{canonicalize_keys, normalize, Expect, KeyProfile};
use quillforge::{ErrorClass, ProviderResult};
use serde_json::json;

#[test]
fn test_json_wrappings_yield_the_same_object() {
    let expected = json!({"premise": "A courier runs.", "outline": ["Arrival"]});
    let object = r#"{"premise": "A courier runs.", "outline": ["Arrival"]}"#;

    let wrappings = [
        object.to_string(),
        format!("```json\n{}\n```", object),
        format!("```\n{}\n```", object),
        format!("```JSON\r\n{}\r\n```", object),
        format!("Sure! Here is your outline:\n{}", object),
        format!("{}\n\nLet me know if you want changes.", object),
        format!("Here you go:\n```json\n{}\n```\nEnjoy!", object),
        format!("   \n\t{}  \n", object),
    ];

    for raw in &wrappings {
        assert_eq!(
            normalize(raw, Expect::Json),
            ProviderResult::Json(expected.clone()),
            "input: {:?}",
            raw
        );
    }
}

#[test]
fn test_nested_braces_and_braces_in_strings() {
    let raw = r#"Result: {"events": ["found a {sealed} letter"], "meta": {"n": 1}} done"#;
    assert_eq!(
        normalize(raw, Expect::Json),
        ProviderResult::Json(json!({"events": ["found a {sealed} letter"], "meta": {"n": 1}}))
    );
}

#[test]
fn test_malformed_inputs_are_fatal_with_raw() {
    let cases = [
        "",
        "   ",
        "no json here",
        "} backwards {",
        "{\"premise\": \"unterminated\"",
        "```json\n{\"outline\": [1, 2,]}\n```",
        "{'single': 'quotes'}",
        "[\"a bare array\"]",
    ];

    for raw in cases {
        let result = normalize(raw, Expect::Json);
        let err = result.error().unwrap_or_else(|| panic!("expected error for {:?}", raw));
        assert_eq!(err.class, ErrorClass::Fatal, "input: {:?}", raw);
        assert_eq!(err.raw.as_deref(), Some(raw));
    }
}

#[test]
fn test_text_is_trimmed_only() {
    assert_eq!(
        normalize("\n\n  The courier arrived.\n\nShe waited.  \n", Expect::Text),
        ProviderResult::Text("The courier arrived.\n\nShe waited.".into())
    );
    assert_eq!(
        normalize("```not stripped```", Expect::Text),
        ProviderResult::Text("```not stripped```".into())
    );
}

#[test]
fn test_aliases_converge_on_canonical_keys() {
    let a = normalize(r#"{"blurb": "x", "chapters": ["a", "b"]}"#, Expect::Json)
        .into_json()
        .unwrap();
    let b = normalize(r#"{"premise": "y", "outline": ["c"]}"#, Expect::Json)
        .into_json()
        .unwrap();

    let a = ProviderResult::Json(canonicalize_keys(a, KeyProfile::Outline));
    let b = ProviderResult::Json(canonicalize_keys(b, KeyProfile::Outline));
    assert_eq!(a.json_keys(), b.json_keys());
    assert_eq!(a.json_keys(), vec!["outline", "premise"]);
}

#[test]
fn test_memory_camel_case_parses_into_typed_view() {
    let raw = concat!(
        "```json\n",
        r#"{"events": ["met stranger"], "characterUpdates": ["Ivo limps"], "#,
        r#""toneSummary": "tense"}"#,
        "\n```"
    );
    let memory: quillforge::ContinuityMemory = normalize(raw, Expect::Json).into_typed().unwrap();
    assert_eq!(memory.events, vec!["met stranger"]);
    assert_eq!(memory.character_updates, vec!["Ivo limps"]);
    assert_eq!(memory.tone_summary, "tense");
}

#[test]
fn test_beat_aliases_converge() {
    let raw = normalize(r#"{"plotBeats": ["a", "b", "c"]}"#, Expect::Json)
        .into_json()
        .unwrap();
    let beats = ProviderResult::Json(canonicalize_keys(raw, KeyProfile::Beats));
    assert_eq!(beats.json_keys(), vec!["beats"]);
}
