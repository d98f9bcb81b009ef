//! Present the current stanza and open the feedback window

use strophe_core::{Context, ContextUpdate, Result, StropheError};

use crate::stages::StageDeps;

const FEEDBACK_PROMPT: &str =
    "A or B? Merge? Notes: tempo, imagery add/ban, persona lock.";

pub(crate) async fn run(ctx: &Context, _deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let visible = ctx
        .visible
        .clone()
        .or_else(|| ctx.stanzas.last().cloned())
        .ok_or_else(|| StropheError::Stage("present requires a stanza".to_string()))?;

    Ok(ContextUpdate {
        visible: Some(visible),
        feedback_prompt: Some(FEEDBACK_PROMPT.to_string()),
        awaiting_feedback: Some(true),
        ..Default::default()
    })
}
