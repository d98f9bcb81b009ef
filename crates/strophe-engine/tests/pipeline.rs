//! End-to-end pipeline scenarios with scripted services
//!
//! The generator script reads like a transcript: the pipeline is
//! deterministic, so responses are queued in the exact order the stages
//! consume them.

use std::sync::Arc;

use strophe_core::{Context, InputDelta, Stage, StropheConfig};
use strophe_engine::{
    stages, Engine, FailingCheckpointer, FileCheckpointer, MemoryCheckpointer,
};
use strophe_gen::ScriptedGenerator;
use strophe_retrieval::{Hit, InMemoryRetriever, Retriever};

const BRIEF_JSON: &str = r#"{"raw_user_message":"Write a rock ballad about city rain and late trains.","language":"en","must_include":[],"must_avoid":[]}"#;

const PACK_JSON: &str = r#"{"taboo":["overused moon"],"exemplars":["rain on the platform glass"],"user_lexicon":["rain","platform"],"theory_rules":["ABAB quatrains keep tension"],"template_digest":"rock_ballad.expert.yaml"}"#;

const PLAN_JSON: &str = r#"{"form":{"value":"ballad"},"rhyme":{"value":"ABAB"},"meter":{"value":"iamb_4"},"target_unit_count":{"value":2},"persona":{"value":"frontman"},"beats":[{"k":1,"goal":"set scene","image":"rain","turn":"arrival"},{"k":2,"goal":"turn inward","image":"window","turn":"choice"}]}"#;

const STYLE_JSON: &str = r#"{"diction":[],"syntax":[],"imagery":[],"forbidden":["broken heart"],"persona_markers":[],"meter_policy":{"target":"iamb_4","tolerance":"±1"},"rhyme_policy":{"scheme":"ABAB"}}"#;

const CRITIC_OK_JSON: &str = r#"{"k":1,"issues":[],"patch":null,"severity_max":"minor"}"#;

const STANZA_1: &str = "the city hums in rain\na window holds the light\nshe waits for one late train\nthat never comes tonight";

const STANZA_2: &str = "the platform clocks run slow\na stranger hums her name\nthe midnight lights burn low\nand nothing looks the same";

fn planner_json() -> String {
    format!(
        r#"{{"plan":{},"style":{},"toolcard":{{}}}}"#,
        PLAN_JSON, STYLE_JSON
    )
}

fn replan_json(plan: &str, diff: &str) -> String {
    format!(r#"{{"plan":{},"diff_explain":"{}"}}"#, plan, diff)
}

fn seeded_retriever() -> InMemoryRetriever {
    InMemoryRetriever::new()
        .with_collection(
            "memory",
            vec![
                Hit::new("overused moon").with_meta("type", "taboo"),
                Hit::new("rain on the platform glass").with_meta("type", "taste"),
            ],
        )
        .with_collection(
            "prosody",
            vec![
                Hit::new("ABAB quatrains keep tension"),
                Hit::new("end rhyme carries the ballad"),
            ],
        )
}

fn first_advance_script() -> ScriptedGenerator {
    ScriptedGenerator::new()
        .with_response(BRIEF_JSON)
        .with_response(PACK_JSON)
        .with_response(planner_json())
        .with_response(STYLE_JSON)
        .with_response(STANZA_1)
        .with_response(CRITIC_OK_JSON)
}

fn build_engine(gen: ScriptedGenerator, retriever: InMemoryRetriever) -> Engine {
    Engine::new(
        Arc::new(gen),
        Arc::new(retriever),
        Arc::new(MemoryCheckpointer::new()),
        StropheConfig::default(),
    )
}

// Scenario 1: fresh brief, one full per-unit cycle, suspension after present
#[tokio::test]
async fn test_first_cycle_produces_one_stanza_and_suspends() {
    let gen = first_advance_script();
    let engine = build_engine(gen.clone(), seeded_retriever());

    let state = engine
        .start_session("Write a rock ballad about city rain and late trains.")
        .await
        .unwrap();

    assert!(state.awaiting_feedback);
    assert!(state.final_text.is_none());
    let visible = state.visible.expect("a stanza should be visible");
    assert_eq!(visible.k, 1);
    assert_eq!(visible.text, STANZA_1);

    let ctx = engine
        .snapshot(&state.session_id)
        .await
        .unwrap()
        .expect("checkpoint exists");
    assert_eq!(ctx.stanzas.len(), 1);
    assert_eq!(ctx.stage, Stage::InterpretFeedback);
    assert!(ctx.awaiting_feedback);
    // one planner computation is in the cache
    assert_eq!(ctx.planner_cache.len(), 1);
    assert_eq!(gen.call_count(), 6);
}

// Scenarios 2 + 3: feedback interpretation/normalization and the lock law,
// then loop termination exactly at the target count.
#[tokio::test]
async fn test_feedback_revision_and_loop_termination() {
    let feedback_json = r#"{"like":[],"dislike":["clichés"],"targets":{"imagery":{"add":[],"ban":["Broken Heart"]},"persona":{"lock":true,"id":"frontman"},"taboo_add":[]}}"#;
    // the proposal tries to swap the persona; the lock must win
    let narrator_plan = PLAN_JSON.replace("frontman", "narrator");

    let gen = first_advance_script()
        // second advance
        .with_response(feedback_json)
        .with_response(replan_json(&narrator_plan, "ban applied"))
        .with_response(STANZA_2)
        .with_response(CRITIC_OK_JSON.replace("\"k\":1", "\"k\":2"))
        // third advance
        .with_response(r#"{"like":["the train image"],"dislike":[],"targets":{}}"#)
        .with_response(replan_json(PLAN_JSON, "no changes"));

    let retriever = seeded_retriever();
    let engine = build_engine(gen.clone(), retriever.clone());

    let state = engine.start_session("city rain ballad").await.unwrap();
    let session_id = state.session_id.clone();

    // --- resume with feedback ---
    let state = engine
        .continue_session(&session_id, "dislike: clichés; ban: broken heart")
        .await
        .unwrap();
    assert!(state.awaiting_feedback);
    assert_eq!(state.visible.as_ref().map(|s| s.k), Some(2));

    let ctx = engine.snapshot(&session_id).await.unwrap().unwrap();
    assert_eq!(ctx.stanzas.len(), 2);

    // Scenario 2: the interpreted record survives in the revision log,
    // ban terms normalized
    let entry = ctx
        .revision_log
        .iter()
        .find(|e| e.feedback.is_some())
        .expect("revision log holds the feedback");
    let record = entry.feedback.as_ref().unwrap();
    assert_eq!(record.dislike, vec!["clichés".to_string()]);
    assert!(record
        .targets
        .imagery
        .ban
        .contains(&"broken heart".to_string()));

    // the record itself was consumed after memory update
    assert!(ctx.feedback.is_none());
    // and the profile picked up the ban
    assert!(ctx.profile.taboo.contains(&"broken heart".to_string()));
    // memory collection received the appended taboo record
    let appended = retriever
        .search("memory", "broken heart", 10, Some(("type", "taboo")))
        .await
        .unwrap();
    assert!(appended.iter().any(|h| h.document == "broken heart"));

    // Scenario 3: locked persona survives the "narrator" proposal
    let plan = ctx.plan.as_ref().unwrap();
    assert_eq!(plan.persona.value, "frontman");
    assert!(plan.persona.locked);

    // --- resume again; target of 2 is reached, pipeline finalizes ---
    let state = engine
        .continue_session(&session_id, "looks good")
        .await
        .unwrap();
    assert!(!state.awaiting_feedback);
    let final_text = state.final_text.expect("artifact assembled");
    assert_eq!(final_text, format!("{}\n\n{}", STANZA_1, STANZA_2));

    let ctx = engine.snapshot(&session_id).await.unwrap().unwrap();
    assert_eq!(ctx.stage, Stage::Done);
    // never looped past the target
    assert_eq!(ctx.stanzas.len(), 2);
}

// Stanza count only grows across advances
#[tokio::test]
async fn test_stanza_count_is_monotonic() {
    let gen = first_advance_script()
        .with_response(r#"{"like":[],"dislike":[],"targets":{}}"#)
        .with_response(replan_json(PLAN_JSON, "none"))
        .with_response(STANZA_2)
        .with_response(CRITIC_OK_JSON.replace("\"k\":1", "\"k\":2"));

    let engine = build_engine(gen, seeded_retriever());
    let state = engine.start_session("ballad").await.unwrap();
    let session_id = state.session_id.clone();

    let mut last = 0;
    let ctx = engine.snapshot(&session_id).await.unwrap().unwrap();
    assert!(ctx.stanzas.len() >= last);
    last = ctx.stanzas.len();

    engine.continue_session(&session_id, "go on").await.unwrap();
    let ctx = engine.snapshot(&session_id).await.unwrap().unwrap();
    assert!(ctx.stanzas.len() >= last);
    last = ctx.stanzas.len();
    assert_eq!(last, 2);
}

// Scenario 4: re-ordered planning inputs hit the cache; the generation
// service is not consulted a second time.
#[tokio::test]
async fn test_planner_cache_hit_on_reordered_inputs() {
    let gen = ScriptedGenerator::new().with_response(planner_json());
    let retriever = InMemoryRetriever::new();
    let config = StropheConfig::default();
    let deps = stages::StageDeps {
        generator: &gen,
        retriever: &retriever,
        config: &config,
    };

    let mut ctx = Context::default();
    ctx.brief = Some(strophe_core::Brief::from_raw("city rain ballad"));
    ctx.pack = Some(strophe_core::ContextPack {
        taboo: vec!["moon".to_string(), "heart".to_string()],
        exemplars: vec!["a".to_string(), "b".to_string()],
        user_lexicon: vec![],
        theory_rules: vec![],
        template_digest: "t".to_string(),
    });

    let update = stages::run_stage(Stage::Plan, &ctx, &deps).await.unwrap();
    ctx.apply(update);
    assert_eq!(gen.call_count(), 1);
    let first_plan = ctx.plan.clone().unwrap();

    // same evidence, re-ordered
    if let Some(pack) = ctx.pack.as_mut() {
        pack.taboo.reverse();
        pack.exemplars.reverse();
    }

    let update = stages::run_stage(Stage::Plan, &ctx, &deps).await.unwrap();
    ctx.apply(update);
    // no second computation
    assert_eq!(gen.call_count(), 1);
    assert_eq!(ctx.plan.unwrap(), first_plan);
    assert_eq!(ctx.planner_cache.len(), 1);
}

// Scenario 5 (integration shape): a taboo draft triggers exactly one
// guided edit; the stored stanza is clean.
#[tokio::test]
async fn test_taboo_draft_is_guided_once_then_clean() {
    let dirty = "my broken heart in rain\na window holds the light\nshe waits for one late train\nthat never comes tonight";

    let gen = ScriptedGenerator::new()
        .with_response(BRIEF_JSON)
        .with_response(PACK_JSON)
        .with_response(planner_json())
        .with_response(STYLE_JSON)
        .with_response(dirty)
        .with_response(STANZA_1) // the guided edit
        .with_response(CRITIC_OK_JSON);

    let engine = build_engine(gen.clone(), seeded_retriever());
    let state = engine.start_session("ballad").await.unwrap();

    let ctx = engine.snapshot(&state.session_id).await.unwrap().unwrap();
    assert_eq!(ctx.stanzas.len(), 1);
    assert!(!ctx.stanzas[0].text.to_lowercase().contains("broken heart"));
    // draft + exactly one guided edit
    assert_eq!(gen.call_count(), 7);
    // the fallback is observable
    assert!(ctx
        .fallbacks
        .iter()
        .any(|e| e.kind == strophe_core::FallbackKind::GuidedEdit));
}

// Critique patch replaces at the index and records a diff
#[tokio::test]
async fn test_critique_patch_replaces_in_place() {
    let patch = "the city breathes in rain\na signal swings to green\nshe rides the last slow train\nthrough streets she's never seen";
    let critic = format!(
        r#"{{"k":1,"issues":["cliché ending"],"patch":"{}","severity_max":"major"}}"#,
        patch.replace('\n', "\\n")
    );

    let gen = ScriptedGenerator::new()
        .with_response(BRIEF_JSON)
        .with_response(PACK_JSON)
        .with_response(planner_json())
        .with_response(STYLE_JSON)
        .with_response(STANZA_1)
        .with_response(critic);

    let engine = build_engine(gen, seeded_retriever());
    let state = engine.start_session("ballad").await.unwrap();

    let ctx = engine.snapshot(&state.session_id).await.unwrap().unwrap();
    // replaced, not appended
    assert_eq!(ctx.stanzas.len(), 1);
    assert_eq!(ctx.stanzas[0].text, patch);
    assert_eq!(ctx.reviews.len(), 1);
    assert_eq!(ctx.revision_log.len(), 1);
    assert!(ctx.revision_log[0].diff.contains("cliché ending"));
    assert_eq!(state.visible.unwrap().text, patch);
}

// Crash-safe resume: a new process (new engine, same checkpoint dir)
// picks up exactly at the suspended stage.
#[tokio::test]
async fn test_restart_resumes_at_suspended_stage() {
    let dir = tempfile::tempdir().unwrap();
    let retriever = seeded_retriever();

    let session_id = {
        let engine = Engine::new(
            Arc::new(first_advance_script()),
            Arc::new(retriever.clone()),
            Arc::new(FileCheckpointer::new(dir.path())),
            StropheConfig::default(),
        );
        let state = engine.start_session("ballad").await.unwrap();
        assert!(state.awaiting_feedback);
        state.session_id
    };

    // "process restart": fresh engine, fresh generator script that only
    // covers the continuation — any re-executed earlier stage would pull
    // the wrong response and fail the assertions below
    let continuation = ScriptedGenerator::new()
        .with_response(r#"{"like":[],"dislike":[],"targets":{}}"#)
        .with_response(replan_json(PLAN_JSON, "none"))
        .with_response(STANZA_2)
        .with_response(CRITIC_OK_JSON.replace("\"k\":1", "\"k\":2"));
    let engine = Engine::new(
        Arc::new(continuation.clone()),
        Arc::new(retriever),
        Arc::new(FileCheckpointer::new(dir.path())),
        StropheConfig::default(),
    );

    let state = engine
        .continue_session(&session_id, "keep going")
        .await
        .unwrap();
    assert!(state.awaiting_feedback);

    let ctx = engine.snapshot(&session_id).await.unwrap().unwrap();
    assert_eq!(ctx.stanzas.len(), 2);
    assert_eq!(ctx.stanzas[0].text, STANZA_1);
    assert_eq!(continuation.call_count(), 4);
}

// Unknown session on continue starts fresh instead of erroring
#[tokio::test]
async fn test_continue_unknown_session_starts_fresh() {
    let engine = build_engine(first_advance_script(), seeded_retriever());
    let state = engine
        .continue_session("never-seen-before", "write about city rain")
        .await
        .unwrap();
    assert!(state.awaiting_feedback);
    assert_eq!(state.session_id, "never-seen-before");
    assert!(state.visible.is_some());
}

// A failing stage leaves the pre-stage checkpoint intact
#[tokio::test]
async fn test_stage_failure_checkpoints_pre_stage_context() {
    // no collections seeded: the context_pack stage will fail its search
    let checkpointer = Arc::new(MemoryCheckpointer::new());
    let engine = Engine::new(
        Arc::new(ScriptedGenerator::new().with_response(BRIEF_JSON)),
        Arc::new(InMemoryRetriever::new()),
        checkpointer.clone(),
        StropheConfig::default(),
    );

    let session_id = "session-under-test".to_string();
    let err = engine
        .advance(&session_id, InputDelta::brief("ballad"))
        .await
        .unwrap_err();
    assert!(matches!(err, strophe_core::StropheError::UnknownCollection(_)));

    // brief completed and was checkpointed; the failed stage left no trace
    let ctx = engine.snapshot(&session_id).await.unwrap().unwrap();
    assert_eq!(ctx.stage, Stage::ContextPack);
    assert!(ctx.brief.is_some());
    assert!(ctx.pack.is_none());
    assert!(ctx.stanzas.is_empty());
}

// Checkpoint I/O failure is fatal to the advance and surfaces generically
// at the session boundary
#[tokio::test]
async fn test_checkpoint_failure_is_fatal() {
    let engine = Engine::new(
        Arc::new(first_advance_script()),
        Arc::new(seeded_retriever()),
        Arc::new(FailingCheckpointer),
        StropheConfig::default(),
    );

    let err = engine.start_session("ballad").await.unwrap_err();
    // the entry boundary hides the raw cause
    assert!(err.to_string().contains("try again"));
}
