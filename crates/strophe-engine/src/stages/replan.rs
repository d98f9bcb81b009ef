//! Revise the plan from feedback, preserving locks
//!
//! Locked fields survive the proposal verbatim. After the merge the plan
//! must still be structurally valid (known rhyme scheme, non-empty
//! meter); if not, one escalated regeneration is attempted, and failing
//! that the old plan is returned unchanged — a structurally invalid plan
//! never travels downstream.

use serde::Deserialize;
use strophe_core::{
    Context, ContextUpdate, FallbackEvent, FallbackKind, Plan, Result, RevisionEntry, Stage,
    StropheError, DEFAULT_TARGET_UNITS,
};
use strophe_gen::{GenRequest, Tier};

use crate::guard::structured;
use crate::revise::preserve_locks;
use crate::stages::StageDeps;

const REPLAN_SYS: &str = "Revise the plan per the feedback record with minimal changes. \
    Return JSON with keys plan (same structure, value/source/confidence/locked per field) \
    and diff_explain.";

#[derive(Debug, Clone, Deserialize)]
struct ReplanProposal {
    plan: Plan,
    #[serde(default)]
    diff_explain: String,
}

pub(crate) async fn run(ctx: &Context, deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let old = ctx
        .plan
        .as_ref()
        .ok_or_else(|| StropheError::Stage("replan requires a plan".to_string()))?;
    let feedback = match &ctx.feedback {
        Some(feedback) => feedback.clone(),
        // Nothing to act on; leave the plan untouched
        None => return Ok(ContextUpdate::default()),
    };

    // Persona lock via feedback is an explicit user directive
    let mut old = old.clone();
    if feedback.targets.persona.lock {
        if let Some(id) = &feedback.targets.persona.id {
            if !old.persona.locked {
                old.persona.value = id.clone();
                old.persona.source = "user".to_string();
            }
        }
        old.persona.locked = true;
    }

    let user = serde_json::to_string(&serde_json::json!({
        "feedback": feedback,
        "plan": old,
    }))?;
    let req = GenRequest::new(Tier::Medium, REPLAN_SYS, user.clone())
        .with_stochasticity(0.2)
        .with_max_output(1200);

    let fallback_plan = old.clone();
    let (proposal, mut events) =
        structured::<ReplanProposal, _>(Stage::Replan, deps.generator, req, move || {
            ReplanProposal {
                plan: fallback_plan,
                diff_explain: "no changes (fallback)".to_string(),
            }
        })
        .await;

    let mut merged = coerce(preserve_locks(&old, proposal.plan));
    let mut diff = proposal.diff_explain;

    if !merged.is_valid() {
        // One escalated regeneration before giving up on the proposal
        tracing::warn!("Revised plan is structurally invalid; escalating once");
        events.push(FallbackEvent::new(
            Stage::Replan,
            FallbackKind::TierEscalated,
            "merged plan failed validity check".to_string(),
        ));

        let escalated = GenRequest::new(Tier::Large, REPLAN_SYS, user)
            .with_stochasticity(0.1)
            .with_max_output(1200);
        merged = match retry_once(deps, &escalated).await {
            Some(second) => {
                diff = second.diff_explain;
                coerce(preserve_locks(&old, second.plan))
            }
            None => old.clone(),
        };

        if !merged.is_valid() {
            tracing::warn!("Escalated revision still invalid; keeping old plan");
            events.push(FallbackEvent::new(
                Stage::Replan,
                FallbackKind::PlanReverted,
                "escalated revision invalid; old plan kept".to_string(),
            ));
            merged = old.clone();
            diff = "revision rejected (invalid); plan unchanged".to_string();
        }
    }

    let entry = RevisionEntry::new(ctx.revision_log.len(), diff, ctx.stanzas.len() as u32)
        .with_feedback(feedback);

    Ok(ContextUpdate {
        plan: Some(merged),
        push_revisions: vec![entry],
        push_fallbacks: events,
        ..Default::default()
    })
}

async fn retry_once(deps: &StageDeps<'_>, req: &GenRequest) -> Option<ReplanProposal> {
    let body = deps.generator.complete_json(req).await.ok()?;
    serde_json::from_str(crate::guard::extract_json(&body)).ok()
}

fn coerce(mut plan: Plan) -> Plan {
    if plan.target_unit_count.value == 0 {
        plan.target_unit_count.value = DEFAULT_TARGET_UNITS;
    }
    plan
}
