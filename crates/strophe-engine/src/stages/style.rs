//! Style fusion: planner style + accumulated preference profile

use strophe_core::{Context, ContextUpdate, Result, Stage, StropheError, Style};
use strophe_gen::{GenRequest, Tier};

use crate::guard::structured;
use crate::stages::{dedup_keep_order, StageDeps};

const STYLE_SYS: &str = "Fuse the plan's style with the user's preference profile. \
    Return StyleRules JSON: diction, syntax, imagery, forbidden, persona_markers, \
    meter_policy{target,tolerance}, rhyme_policy{scheme}.";

pub(crate) async fn run(ctx: &Context, deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let plan = ctx
        .plan
        .as_ref()
        .ok_or_else(|| StropheError::Stage("style_fuse requires a plan".to_string()))?;
    let base = ctx
        .style
        .as_ref()
        .ok_or_else(|| StropheError::Stage("style_fuse requires a planner style".to_string()))?;

    let user = serde_json::to_string(&serde_json::json!({
        "plan": plan,
        "style": base,
        "profile": ctx.profile,
    }))?;
    let req = GenRequest::new(Tier::Medium, STYLE_SYS, user)
        .with_stochasticity(0.25)
        .with_max_output(900);

    let fallback = base.clone();
    let (mut fused, events) =
        structured::<Style, _>(Stage::StyleFuse, deps.generator, req, move || fallback).await;

    // Profile taboos always bind, whatever the fuser returned
    let mut forbidden = fused.forbidden;
    forbidden.extend(ctx.profile.taboo.iter().cloned());
    fused.forbidden = dedup_keep_order(forbidden);

    if fused.rhyme_policy.scheme.trim().is_empty() {
        fused.rhyme_policy.scheme = plan.rhyme.value.clone();
    }

    Ok(ContextUpdate {
        style: Some(fused),
        push_fallbacks: events,
        ..Default::default()
    })
}
