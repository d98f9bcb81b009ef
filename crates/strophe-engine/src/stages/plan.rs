//! Master planner: plan + style + toolcard, memoized by content digest
//!
//! The digest covers the normalized brief and the compressed pack. A
//! repeat call with the same canonical inputs returns the cached bundle
//! without touching the generation service — at most one computation per
//! digest per session.

use std::sync::Mutex;

use strophe_core::{
    Context, ContextUpdate, FallbackEvent, PlannerOutput, Result, Stage, StropheError, Style,
    Toolcard, DEFAULT_TARGET_UNITS,
};
use strophe_gen::{GenRequest, Tier};

use crate::cache::{canonical_digest, get_or_compute};
use crate::guard::structured;
use crate::stages::StageDeps;

const PLANNER_SYS: &str = "You are the master planner. Using the brief and the context pack, \
    output JSON with keys: plan, style, toolcard. \
    Plan fields form, rhyme, meter, target_unit_count, persona each carry \
    value/source/confidence/locked; beats is a list of {k, goal, image, turn}. \
    Style: diction, syntax, imagery, forbidden, persona_markers, \
    meter_policy{target,tolerance}, rhyme_policy{scheme}. \
    Toolcard: writer{max_words,vivid_images}, retrieval{top_k}, ab_strategies{a,b}.";

pub(crate) async fn run(ctx: &Context, deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let brief = ctx
        .brief
        .as_ref()
        .ok_or_else(|| StropheError::Stage("plan requires a brief".to_string()))?;
    let pack = ctx
        .pack
        .as_ref()
        .ok_or_else(|| StropheError::Stage("plan requires a context pack".to_string()))?;

    let inputs = serde_json::json!({ "brief": brief, "pack": pack });
    let digest = canonical_digest(&inputs)?;

    let collected: Mutex<Vec<FallbackEvent>> = Mutex::new(Vec::new());
    let events_sink = &collected;
    let inputs_ref = &inputs;
    let generator = deps.generator;
    let fallback_taboo = pack.taboo.clone();

    let (mut output, cached) = get_or_compute(&ctx.planner_cache, &digest, move || async move {
        let user = serde_json::to_string(inputs_ref)?;
        let req = GenRequest::new(Tier::Large, PLANNER_SYS, user)
            .with_stochasticity(0.35)
            .with_max_output(2200);

        let (output, events) =
            structured::<PlannerOutput, _>(Stage::Plan, generator, req, move || PlannerOutput {
                plan: strophe_core::Plan::fallback(),
                style: Style::fallback(fallback_taboo),
                toolcard: Toolcard::default(),
            })
            .await;
        if let Ok(mut sink) = events_sink.lock() {
            sink.extend(events);
        }
        Ok(output)
    })
    .await?;

    // Parse-boundary coercion: a zero/absent target defaults
    if output.plan.target_unit_count.value == 0 {
        output.plan.target_unit_count.value = DEFAULT_TARGET_UNITS;
    }

    let events = collected.into_inner().unwrap_or_default();
    Ok(ContextUpdate {
        plan: Some(output.plan.clone()),
        style: Some(output.style.clone()),
        toolcard: Some(output.toolcard.clone()),
        cache_insert: (!cached).then(|| (digest, output)),
        push_fallbacks: events,
        ..Default::default()
    })
}
