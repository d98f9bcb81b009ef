//! Whole-session retrieval pack: query both collections, compress

use strophe_core::{Context, ContextPack, ContextUpdate, Result, Stage, StropheError};
use strophe_gen::{GenRequest, Tier};

use crate::guard::structured;
use crate::stages::{clip, dedup_keep_order, lexicon_from, StageDeps};

const PACK_SYS: &str = "Compress retrieval hits into JSON sections with strict caps. \
    Keys: taboo, exemplars, user_lexicon, theory_rules, template_digest.";

const THEORY_QUERY: &str = "prosody ballad rhyme meter pitfalls";

pub(crate) async fn run(ctx: &Context, deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let brief = ctx
        .brief
        .as_ref()
        .ok_or_else(|| StropheError::Stage("context_pack requires a brief".to_string()))?;

    let memory_hits = deps
        .retriever
        .search(&deps.config.collections.memory, &brief.raw_user_message, 8, None)
        .await?;
    let theory_hits = deps
        .retriever
        .search(&deps.config.collections.knowledge, THEORY_QUERY, 8, None)
        .await?;

    let mut taboo = Vec::new();
    let mut exemplars = Vec::new();
    for hit in &memory_hits {
        match hit.item_type() {
            Some("taboo") => taboo.push(clip(&hit.document, 200)),
            Some("exemplar") | Some("taste") => exemplars.push(clip(&hit.document, 220)),
            _ => {}
        }
    }

    let raw = ContextPack {
        taboo: dedup_keep_order(taboo).into_iter().take(30).collect(),
        user_lexicon: lexicon_from(&exemplars),
        exemplars: exemplars.into_iter().take(6).collect(),
        theory_rules: theory_hits
            .iter()
            .take(6)
            .map(|hit| clip(&hit.document, 220))
            .collect(),
        template_digest: "rock_ballad.expert.yaml".to_string(),
    };

    let user = serde_json::to_string(&raw)?;
    let req = GenRequest::new(Tier::Small, PACK_SYS, user)
        .with_stochasticity(0.2)
        .with_max_output(700);

    let (pack, events) =
        structured::<ContextPack, _>(Stage::ContextPack, deps.generator, req, || raw.clone())
            .await;

    Ok(ContextUpdate {
        pack: Some(pack),
        push_fallbacks: events,
        ..Default::default()
    })
}
