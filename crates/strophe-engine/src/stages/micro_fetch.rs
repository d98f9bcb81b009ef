//! Execute both A/B recipes and build the per-stanza micro packs

use strophe_core::{AbPacks, Context, ContextUpdate, MicroPack, Result, RetrievalRecipe, StropheError};
use strophe_retrieval::Hit;

use crate::stages::retrieval_plan::{SOURCE_KNOWLEDGE, SOURCE_MEMORY};
use crate::stages::{clip, dedup_keep_order, lexicon_from, StageDeps};

pub(crate) async fn run(ctx: &Context, deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let recipes = ctx
        .recipes
        .as_ref()
        .ok_or_else(|| StropheError::Stage("micro_fetch requires recipes".to_string()))?;

    let a = fetch_pack(&recipes.a, deps).await?;
    let b = fetch_pack(&recipes.b, deps).await?;

    Ok(ContextUpdate {
        micro_packs: Some(AbPacks { a, b }),
        ..Default::default()
    })
}

async fn fetch_pack(recipe: &RetrievalRecipe, deps: &StageDeps<'_>) -> Result<MicroPack> {
    let mut hits: Vec<Hit> = Vec::new();
    for source in &recipe.priority {
        let collection = match source.as_str() {
            SOURCE_MEMORY => &deps.config.collections.memory,
            SOURCE_KNOWLEDGE => &deps.config.collections.knowledge,
            other => {
                return Err(StropheError::UnknownCollection(other.to_string()));
            }
        };
        hits.extend(
            deps.retriever
                .search(collection, &recipe.query, recipe.top_k, None)
                .await?,
        );
    }

    let mut taboo = Vec::new();
    let mut exemplars = Vec::new();
    for hit in &hits {
        match hit.item_type() {
            Some("taboo") => taboo.push(clip(&hit.document, 80)),
            Some("exemplar") | Some("taste") => exemplars.push(clip(&hit.document, 220)),
            _ => {}
        }
    }

    Ok(MicroPack {
        taboo: dedup_keep_order(taboo).into_iter().take(30).collect(),
        lexicon: lexicon_from(&exemplars),
        exemplars: exemplars.into_iter().take(4).collect(),
    })
}
