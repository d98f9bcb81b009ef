//! Stage functions
//!
//! One module per pipeline responsibility. Each stage reads from the
//! Context and returns a partial update; the engine merges it and
//! checkpoints. Service capabilities arrive through `StageDeps` — a
//! stage never constructs a client of its own.

mod brief;
mod context_pack;
mod critique;
mod draft;
mod feedback;
mod finalize;
mod memory;
mod micro_fetch;
mod plan;
mod present;
mod replan;
mod retrieval_plan;
mod select_context;
mod style;

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use strophe_core::{Context, ContextUpdate, Result, Stage, StropheError};
use strophe_gen::Generator;
use strophe_retrieval::Retriever;

/// Injected capabilities handed to every stage call
pub struct StageDeps<'a> {
    pub generator: &'a dyn Generator,
    pub retriever: &'a dyn Retriever,
    pub config: &'a strophe_core::StropheConfig,
}

/// Execute one stage function
pub async fn run_stage(
    stage: Stage,
    ctx: &Context,
    deps: &StageDeps<'_>,
) -> Result<ContextUpdate> {
    match stage {
        Stage::Brief => brief::run(ctx, deps).await,
        Stage::ContextPack => context_pack::run(ctx, deps).await,
        Stage::Plan => plan::run(ctx, deps).await,
        Stage::StyleFuse => style::run(ctx, deps).await,
        Stage::RetrievalPlan => retrieval_plan::run(ctx, deps).await,
        Stage::MicroFetch => micro_fetch::run(ctx, deps).await,
        Stage::SelectContext => select_context::run(ctx, deps).await,
        Stage::Draft => draft::run(ctx, deps).await,
        Stage::Critique => critique::run(ctx, deps).await,
        Stage::Present => present::run(ctx, deps).await,
        Stage::InterpretFeedback => feedback::run(ctx, deps).await,
        Stage::Replan => replan::run(ctx, deps).await,
        Stage::MemoryUpdate => memory::run(ctx, deps).await,
        Stage::Finalize => finalize::run(ctx, deps).await,
        Stage::Done => Err(StropheError::Stage(
            "done is terminal; nothing to execute".to_string(),
        )),
    }
}

/// Truncate an evidence snippet to a character cap
pub(crate) fn clip(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Dedup preserving first occurrence
pub(crate) fn dedup_keep_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

static WORD_RE: OnceLock<Regex> = OnceLock::new();

/// Naive lexicon: most frequent words (>3 chars) across the texts,
/// deterministic order (count desc, then alphabetic), capped at ten.
pub(crate) fn lexicon_from(texts: &[String]) -> Vec<String> {
    let re = WORD_RE.get_or_init(|| Regex::new(r"[a-zA-Z']+").expect("static regex"));

    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for text in texts {
        for token in re.find_iter(&text.to_lowercase()) {
            *counts.entry(token.as_str().to_string()).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(word, _)| word.len() > 3)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(10).map(|(word, _)| word).collect()
}
