//! Interpret raw human feedback into a FeedbackRecord

use strophe_core::{Context, ContextUpdate, FeedbackRecord, Result, Stage};
use strophe_gen::{GenRequest, Tier};

use crate::guard::structured;
use crate::stages::StageDeps;

const FB_SYS: &str = "Map raw feedback to a FeedbackRecord JSON: like, dislike, \
    targets{imagery{add,ban}, tempo, persona{lock,id}, taboo_add}.";

pub(crate) async fn run(ctx: &Context, deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let raw = ctx
        .raw_feedback
        .clone()
        .unwrap_or_else(|| "ACCEPT".to_string());

    let req = GenRequest::new(Tier::Small, FB_SYS, &raw)
        .with_stochasticity(0.2)
        .with_max_output(500);

    let (record, events) = structured::<FeedbackRecord, _>(
        Stage::InterpretFeedback,
        deps.generator,
        req,
        FeedbackRecord::default,
    )
    .await;

    Ok(ContextUpdate {
        feedback: Some(record.normalized()),
        consume_raw_feedback: true,
        awaiting_feedback: Some(false),
        push_fallbacks: events,
        ..Default::default()
    })
}
