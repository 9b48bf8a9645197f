//! Chapter pipeline: continuity memory threading, degraded follow-up steps.

mod common;

use common::{error, orchestrator, text, two_chapter_story, MockAdapter};
use quillforge::{
    ContinuityMemory, ErrorClass, GenerationPipeline, GenerationRequest, OperationKind, Provider,
    ProviderChoice, ProviderResult, SessionContext,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Answers drafts with chapter prose, memory requests with a fixed memory per chapter,
/// and polish requests with an uppercased draft.
fn story_writer(provider: Provider) -> MockAdapter {
    MockAdapter::new(provider, |req: &GenerationRequest, _| match req.kind() {
        OperationKind::DraftChapter => match req.chapter() {
            Some(0) => text("Ivo reached the gate and met a stranger in grey."),
            _ => text("Ivo confronted the stranger at the ford."),
        },
        OperationKind::ExtractMemory => ProviderResult::Json(json!({
            "events": ["met stranger"],
            "characterUpdates": [],
            "toneSummary": "tense"
        })),
        OperationKind::Polish => text(&req.subject().unwrap_or_default().to_uppercase()),
        _ => error(ErrorClass::Fatal),
    })
}

fn pipeline(gemini: &Arc<MockAdapter>, groq: &Arc<MockAdapter>) -> GenerationPipeline {
    GenerationPipeline::new(Arc::new(orchestrator(gemini, groq)))
}

#[tokio::test]
async fn chapter_memory_reaches_next_draft_prompt() {
    let gemini = Arc::new(story_writer(Provider::Gemini));
    let groq = Arc::new(MockAdapter::always(Provider::Groq, error(ErrorClass::Fatal)));
    let pipeline = pipeline(&gemini, &groq);
    let session = SessionContext::new(ProviderChoice::Auto);
    let story = two_chapter_story();

    let ch1 = pipeline
        .run_chapter(&session, 0, story.clone(), None, None)
        .await
        .unwrap();
    assert_eq!(
        ch1.memory,
        Some(ContinuityMemory::new(vec!["met stranger".into()], vec![], "tense"))
    );

    let ch2 = pipeline
        .run_chapter(&session, 1, story, ch1.memory.clone(), None)
        .await
        .unwrap();
    assert_eq!(ch2.text, "Ivo confronted the stranger at the ford.");

    let drafts = gemini.draft_prompts();
    assert_eq!(drafts.len(), 2);
    assert!(!drafts[0].contains("met stranger"));
    assert!(drafts[1].contains("met stranger"), "prompt: {}", drafts[1]);
}

#[tokio::test]
async fn memory_failure_still_delivers_chapter() {
    let gemini = Arc::new(MockAdapter::new(Provider::Gemini, |req, _| match req.kind() {
        OperationKind::DraftChapter => text("The bridge was already burning."),
        _ => error(ErrorClass::Fatal),
    }));
    let groq = Arc::new(MockAdapter::always(Provider::Groq, error(ErrorClass::Fatal)));
    let pipeline = pipeline(&gemini, &groq);

    let outcome = pipeline
        .run_chapter(&SessionContext::default(), 0, two_chapter_story(), None, None)
        .await
        .unwrap();

    assert_eq!(outcome.text, "The bridge was already burning.");
    assert!(outcome.memory.is_none());
    assert_eq!(outcome.memory_error.map(|e| e.class), Some(ErrorClass::Fatal));
}

#[tokio::test]
async fn unparseable_memory_degrades_to_none() {
    let gemini = Arc::new(MockAdapter::new(Provider::Gemini, |req, _| match req.kind() {
        OperationKind::DraftChapter => text("Smoke on the ridge."),
        _ => text("not a memory at all"),
    }));
    let groq = Arc::new(MockAdapter::always(Provider::Groq, error(ErrorClass::Fatal)));
    let pipeline = pipeline(&gemini, &groq);

    let outcome = pipeline
        .run_chapter(&SessionContext::default(), 0, two_chapter_story(), None, None)
        .await
        .unwrap();

    assert_eq!(outcome.text, "Smoke on the ridge.");
    assert!(outcome.memory.is_none());
    assert!(outcome.memory_error.is_some());
}

#[tokio::test]
async fn polish_failure_keeps_draft() {
    let gemini = Arc::new(MockAdapter::new(Provider::Gemini, |req, _| match req.kind() {
        OperationKind::DraftChapter => text("Rough draft."),
        OperationKind::Polish => error(ErrorClass::Fatal),
        _ => ProviderResult::Json(json!({
            "events": [],
            "characterUpdates": [],
            "toneSummary": "calm"
        })),
    }));
    let groq = Arc::new(MockAdapter::always(Provider::Groq, error(ErrorClass::Fatal)));
    let pipeline = pipeline(&gemini, &groq);
    let session = SessionContext::default().with_polish(true);

    let outcome = pipeline
        .run_chapter(&session, 0, two_chapter_story(), None, None)
        .await
        .unwrap();

    assert_eq!(outcome.text, "Rough draft.");
    assert!(outcome.polished.is_none());
    assert!(outcome.polish_error.is_some());
    assert_eq!(outcome.revisions(), vec!["Rough draft."]);
    assert_eq!(outcome.memory.map(|m| m.tone_summary), Some("calm".to_string()));
}

#[tokio::test]
async fn polish_success_records_both_revisions() {
    let gemini = Arc::new(story_writer(Provider::Gemini));
    let groq = Arc::new(MockAdapter::always(Provider::Groq, error(ErrorClass::Fatal)));
    let pipeline = pipeline(&gemini, &groq);
    let session = SessionContext::default().with_polish(true);

    let outcome = pipeline
        .run_chapter(&session, 0, two_chapter_story(), None, None)
        .await
        .unwrap();

    let expected = "IVO REACHED THE GATE AND MET A STRANGER IN GREY.";
    assert_eq!(outcome.text, expected);
    assert_eq!(outcome.draft, "Ivo reached the gate and met a stranger in grey.");
    assert_eq!(outcome.revisions().len(), 2);
}

#[tokio::test]
async fn draft_failure_is_the_chapter_error() {
    let gemini = Arc::new(MockAdapter::always(Provider::Gemini, error(ErrorClass::AuthRequired)));
    let groq = Arc::new(MockAdapter::always(Provider::Groq, text("unused")));
    let pipeline = pipeline(&gemini, &groq);
    let session = SessionContext::new(ProviderChoice::Gemini).with_polish(true);

    let err = pipeline
        .run_chapter(&session, 0, two_chapter_story(), None, None)
        .await
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::AuthRequired);
    assert_eq!(gemini.calls(), 1, "no memory or polish after a failed draft");
}

#[tokio::test]
async fn chapter_outside_outline_makes_no_calls() {
    let gemini = Arc::new(story_writer(Provider::Gemini));
    let groq = Arc::new(story_writer(Provider::Groq));
    let pipeline = pipeline(&gemini, &groq);

    let err = pipeline
        .run_chapter(&SessionContext::default(), 5, two_chapter_story(), None, None)
        .await
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::Fatal);
    assert_eq!(gemini.calls() + groq.calls(), 0);
}

#[tokio::test]
async fn memory_extraction_can_be_switched_off() {
    let gemini = Arc::new(story_writer(Provider::Gemini));
    let groq = Arc::new(MockAdapter::always(Provider::Groq, error(ErrorClass::Fatal)));
    let pipeline = pipeline(&gemini, &groq);
    let session = SessionContext::default().with_memory_extraction(false);

    let outcome = pipeline
        .run_chapter(&session, 0, two_chapter_story(), None, None)
        .await
        .unwrap();

    assert!(outcome.memory.is_none());
    assert!(outcome.memory_error.is_none());
    assert_eq!(gemini.kinds(), vec![OperationKind::DraftChapter]);
}

#[tokio::test(start_paused = true)]
async fn memory_and_polish_run_concurrently() {
    let gemini = Arc::new(story_writer(Provider::Gemini).with_delay(Duration::from_secs(2)));
    let groq = Arc::new(MockAdapter::always(Provider::Groq, error(ErrorClass::Fatal)));
    let pipeline = pipeline(&gemini, &groq);
    let session = SessionContext::default().with_polish(true);

    let start = tokio::time::Instant::now();
    let outcome = pipeline
        .run_chapter(&session, 0, two_chapter_story(), None, None)
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(outcome.memory.is_some() && outcome.polished.is_some());
    assert_eq!(gemini.calls(), 3);
    // draft (2s) then memory and polish side by side (2s)
    assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
}

#[tokio::test]
async fn directive_reaches_draft_prompt() {
    let gemini = Arc::new(story_writer(Provider::Gemini));
    let groq = Arc::new(MockAdapter::always(Provider::Groq, error(ErrorClass::Fatal)));
    let pipeline = pipeline(&gemini, &groq);
    let session = SessionContext::default().with_memory_extraction(false);

    pipeline
        .run_chapter(&session, 0, two_chapter_story(), None, Some("Open with rain."))
        .await
        .unwrap();

    assert!(gemini.draft_prompts()[0].contains("Open with rain."));
}

#[tokio::test]
async fn outline_and_consult_are_typed() {
    let gemini = Arc::new(MockAdapter::new(Provider::Gemini, |req, _| match req.kind() {
        OperationKind::Outline => ProviderResult::Json(json!({
            "premise": "A courier crosses a burning frontier.",
            "outline": ["Arrival", "Confrontation"]
        })),
        OperationKind::Consult => {
            ProviderResult::Json(json!({"text": "Use relay horses.", "links": []}))
        }
        _ => error(ErrorClass::Fatal),
    }));
    let groq = Arc::new(MockAdapter::always(Provider::Groq, error(ErrorClass::Fatal)));
    let pipeline = pipeline(&gemini, &groq);
    let session = SessionContext::default();
    let story = two_chapter_story();

    let outline = pipeline.run_outline(&session, story.clone(), None).await.unwrap();
    assert_eq!(outline.outline, vec!["Arrival", "Confrontation"]);

    let reply = pipeline
        .consult(&session, story, "How fast do couriers ride?", None)
        .await
        .unwrap();
    assert_eq!(reply.text, "Use relay horses.");
}

#[tokio::test]
async fn regeneration_reaches_draft_prompt_and_reruns_memory() {
    let gemini = Arc::new(story_writer(Provider::Gemini));
    let groq = Arc::new(MockAdapter::always(Provider::Groq, error(ErrorClass::Fatal)));
    let pipeline = pipeline(&gemini, &groq);

    let outcome = pipeline
        .regenerate_chapter(
            &SessionContext::default(),
            0,
            two_chapter_story(),
            None,
            Some("Move the meeting to the docks."),
        )
        .await
        .unwrap();

    assert!(outcome.memory.is_some());
    let drafts = gemini.draft_prompts();
    assert_eq!(drafts.len(), 1);
    assert!(drafts[0].contains("REGENERATE"), "prompt: {}", drafts[0]);
    assert!(drafts[0].contains("Move the meeting to the docks."));
}

#[tokio::test]
async fn beats_come_back_as_a_list() {
    let gemini = Arc::new(MockAdapter::new(Provider::Gemini, |req, _| match req.kind() {
        OperationKind::SuggestBeats => ProviderResult::Json(json!({
            "beats": ["Ivo hides the letter", "The stranger names a price", "The ford floods"]
        })),
        _ => error(ErrorClass::Fatal),
    }));
    let groq = Arc::new(MockAdapter::always(Provider::Groq, error(ErrorClass::Fatal)));
    let pipeline = pipeline(&gemini, &groq);
    let session = SessionContext::default();

    let beats = pipeline
        .suggest_beats(&session, two_chapter_story(), 1, "Ivo reached the gate.")
        .await
        .unwrap();
    assert_eq!(beats.len(), 3);
    assert!(gemini.prompts()[0].contains("Ch2: Confrontation"));

    let blank = pipeline
        .suggest_beats(&session, two_chapter_story(), 1, "  ")
        .await
        .unwrap_err();
    assert_eq!(blank.class, ErrorClass::Fatal);
    let past_outline = pipeline
        .suggest_beats(&session, two_chapter_story(), 7, "Ivo reached the gate.")
        .await
        .unwrap_err();
    assert_eq!(past_outline.class, ErrorClass::Fatal);
    assert_eq!(gemini.calls(), 1);
}
