//! Intake: normalize the raw user message into a Brief

use strophe_core::{Brief, Context, ContextUpdate, Result, Stage};
use strophe_gen::{GenRequest, Tier};

use crate::guard::structured;
use crate::stages::StageDeps;

const BRIEF_SYS: &str = "Extract a normalized brief for lyric writing. \
    Return JSON with keys: raw_user_message, language, persona_request, \
    must_include, must_avoid, length_request, notes.";

const DEFAULT_BRIEF: &str = "Write a rock ballad about city rain and late trains.";

pub(crate) async fn run(ctx: &Context, deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let raw = ctx
        .brief_text
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BRIEF.to_string());

    let req = GenRequest::new(Tier::Small, BRIEF_SYS, &raw)
        .with_stochasticity(0.2)
        .with_max_output(700);

    let (mut brief, events) = structured::<Brief, _>(Stage::Brief, deps.generator, req, || {
        Brief::from_raw(&raw)
    })
    .await;

    // The raw message always survives normalization
    if brief.raw_user_message.trim().is_empty() {
        brief.raw_user_message = raw;
    }

    Ok(ContextUpdate {
        brief: Some(brief),
        push_fallbacks: events,
        ..Default::default()
    })
}
