//! Assemble the final artifact

use strophe_core::{Context, ContextUpdate, Result};

use crate::stages::StageDeps;

pub(crate) async fn run(ctx: &Context, _deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let final_text = ctx
        .stanzas
        .iter()
        .map(|stanza| stanza.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    tracing::info!("Finalized artifact with {} stanzas", ctx.stanzas.len());

    Ok(ContextUpdate {
        final_text: Some(final_text),
        awaiting_feedback: Some(false),
        ..Default::default()
    })
}
