//! Derive the two A/B micro-retrieval recipes for the next stanza

use strophe_core::{
    AbRecipes, Beat, Context, ContextUpdate, Result, RetrievalRecipe, StropheError,
};

use crate::stages::StageDeps;

/// Logical source names resolved against the configured collections
pub(crate) const SOURCE_MEMORY: &str = "memory";
pub(crate) const SOURCE_KNOWLEDGE: &str = "knowledge";

pub(crate) async fn run(ctx: &Context, _deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let plan = ctx
        .plan
        .as_ref()
        .ok_or_else(|| StropheError::Stage("retrieval_plan requires a plan".to_string()))?;

    let k = ctx.next_stanza_index();
    let default_beat = Beat::default();
    let beat = plan.beat(k).unwrap_or(&default_beat);
    let persona = &plan.persona.value;
    let top_k = ctx
        .toolcard
        .as_ref()
        .map(|card| card.retrieval.top_k)
        .unwrap_or(6);

    // A exploits the user's memory first; B hunts rare imagery in theory
    let a = RetrievalRecipe {
        priority: vec![SOURCE_MEMORY.to_string(), SOURCE_KNOWLEDGE.to_string()],
        query: format!(
            "persona:{} goal:{} image:{} recent",
            persona, beat.goal, beat.image
        ),
        top_k,
    };
    let b = RetrievalRecipe {
        priority: vec![SOURCE_KNOWLEDGE.to_string(), SOURCE_MEMORY.to_string()],
        query: format!("persona:{} rare imagery pitfalls avoid cliche", persona),
        top_k: top_k.max(4),
    };

    Ok(ContextUpdate {
        recipes: Some(AbRecipes { a, b }),
        ..Default::default()
    })
}
