//! Fold feedback into long-term memory and the preference profile
//!
//! The only write path into the retrieval collections: new preference
//! records are appended, never deleted. The FeedbackRecord is consumed
//! here; from now on it survives only in the revision log.

use strophe_core::{Context, ContextUpdate, Result};
use strophe_retrieval::MemoryItem;

use crate::stages::{dedup_keep_order, StageDeps};

pub(crate) async fn run(ctx: &Context, deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let feedback = match &ctx.feedback {
        Some(feedback) => feedback,
        None => return Ok(ContextUpdate::default()),
    };

    let mut items = Vec::new();
    for liked in &feedback.like {
        items.push(MemoryItem::taste(liked.clone(), "like"));
    }
    for banned in &feedback.targets.imagery.ban {
        items.push(MemoryItem::taboo(banned.clone(), "imagery:ban"));
    }
    for added in &feedback.targets.imagery.add {
        items.push(MemoryItem::taste(added.clone(), "imagery:add"));
    }

    if !items.is_empty() {
        deps.retriever
            .append(&deps.config.collections.memory, &items)
            .await?;
        tracing::info!("Appended {} preference records to memory", items.len());
    }

    let mut profile = ctx.profile.clone();
    profile
        .imagery_boost
        .extend(feedback.targets.imagery.add.iter().cloned());
    profile
        .taboo
        .extend(feedback.targets.imagery.ban.iter().cloned());
    profile.liked.extend(feedback.like.iter().cloned());
    profile.imagery_boost = dedup_keep_order(profile.imagery_boost);
    profile.taboo = dedup_keep_order(profile.taboo);
    profile.liked = dedup_keep_order(profile.liked);

    Ok(ContextUpdate {
        profile: Some(profile),
        consume_feedback: true,
        ..Default::default()
    })
}
