//! Deterministic A/B choice between the two fetched packs

use strophe_core::{Context, ContextUpdate, Result, StropheError};

use crate::select::{choose, score};
use crate::stages::StageDeps;

pub(crate) async fn run(ctx: &Context, _deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let packs = ctx
        .micro_packs
        .as_ref()
        .ok_or_else(|| StropheError::Stage("select_context requires micro packs".to_string()))?;

    let label = choose(&packs.a, &packs.b);
    tracing::debug!(
        "A/B selection: A={:.2} B={:.2} -> {}",
        score(&packs.a),
        score(&packs.b),
        label
    );

    Ok(ContextUpdate {
        chosen_context: Some(label),
        ..Default::default()
    })
}
