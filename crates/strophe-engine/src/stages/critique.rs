//! Structured review of the drafted stanza; severe findings patch it

use strophe_core::{
    Context, ContextUpdate, Result, Review, RevisionEntry, Stage, Stanza, StropheError,
};
use strophe_gen::{GenRequest, Tier};

use crate::guard::structured;
use crate::stages::StageDeps;

const CRITIC_SYS: &str = "Review the stanza against the style rules and plan. \
    Return JSON: k, issues, patch, severity_max (minor|major|critical). \
    Provide a patch only when the stanza needs rewriting.";

pub(crate) async fn run(ctx: &Context, deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let stanza = ctx
        .stanzas
        .last()
        .ok_or_else(|| StropheError::Stage("critique requires a drafted stanza".to_string()))?;
    let k = stanza.k;
    let style = ctx
        .style
        .as_ref()
        .ok_or_else(|| StropheError::Stage("critique requires a style".to_string()))?;

    let user = format!(
        "Stanza k: {}\nText:\n{}\nStyle: {}\nForbidden: {}",
        k,
        stanza.text,
        serde_json::to_string(style)?,
        style.forbidden.join(", "),
    );
    let req = GenRequest::new(Tier::Medium, CRITIC_SYS, user)
        .with_stochasticity(0.15)
        .with_max_output(600);

    let (mut review, events) =
        structured::<Review, _>(Stage::Critique, deps.generator, req, || Review {
            k,
            ..Default::default()
        })
        .await;
    // Our index is authoritative, whatever the reviewer echoed back
    review.k = k;

    let mut update = ContextUpdate {
        push_fallbacks: events,
        ..Default::default()
    };

    let patch = review
        .patch
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    if review.severity_max.requires_patch() {
        if let Some(patch) = patch {
            tracing::info!("Critique patching stanza {} ({:?})", k, review.severity_max);
            update.patch_stanza = Some((k, patch.clone()));
            update.visible = Some(Stanza { k, text: patch });
            update.push_revisions = vec![RevisionEntry::new(
                ctx.revision_log.len(),
                format!("critique patch: {}", review.issues.join("; ")),
                k,
            )];
        }
    }

    update.push_reviews = vec![review];
    Ok(update)
}
