//! Draft stanza k under the guard

use strophe_core::{AbLabel, Beat, Context, ContextUpdate, Result, Stage, Stanza, StropheError};
use strophe_gen::{GenRequest, Tier};

use crate::guard::{guarded_draft, DraftConstraints};
use crate::stages::{dedup_keep_order, StageDeps};

const WRITER_SYS: &str = "Write the stanza per the style and plan (rhyme/meter). \
    Use exactly one vivid concrete image. Avoid taboo words. Output the stanza only.";

pub(crate) async fn run(ctx: &Context, deps: &StageDeps<'_>) -> Result<ContextUpdate> {
    let plan = ctx
        .plan
        .as_ref()
        .ok_or_else(|| StropheError::Stage("draft requires a plan".to_string()))?;
    let style = ctx
        .style
        .as_ref()
        .ok_or_else(|| StropheError::Stage("draft requires a style".to_string()))?;

    let k = ctx.next_stanza_index();
    let default_beat = Beat::default();
    let beat = plan.beat(k).unwrap_or(&default_beat);

    let label = ctx.chosen_context.unwrap_or(AbLabel::A);
    let empty = strophe_core::MicroPack::default();
    let pack = match (&ctx.micro_packs, label) {
        (Some(packs), AbLabel::A) => &packs.a,
        (Some(packs), AbLabel::B) => &packs.b,
        (None, _) => &empty,
    };

    let mut taboo = style.forbidden.clone();
    taboo.extend(pack.taboo.iter().cloned());
    let taboo = dedup_keep_order(taboo);

    let scheme = if style.rhyme_policy.scheme.trim().is_empty() {
        plan.rhyme.value.clone()
    } else {
        style.rhyme_policy.scheme.clone()
    };
    let max_words = ctx
        .toolcard
        .as_ref()
        .map(|card| card.writer.max_words)
        .unwrap_or(140);

    let user = format!(
        "Stanza index: {}\n\
         Plan: rhyme={}, meter={}, persona={}\n\
         Beat: goal={} image={} turn={}\n\
         Lexicon: {}\n\
         Exemplars:\n{}\n\
         Taboo: {}\n\
         Return the stanza only.",
        k,
        scheme,
        plan.meter.value,
        plan.persona.value,
        beat.goal,
        beat.image,
        beat.turn,
        pack.lexicon.join(", "),
        pack.exemplars.join("\n"),
        taboo.join(", "),
    );

    let req = GenRequest::new(Tier::Medium, WRITER_SYS, user)
        .with_stochasticity(0.6)
        .with_max_output(320);

    let constraints = DraftConstraints {
        taboo,
        max_words,
        scheme,
    };
    let (text, events) = guarded_draft(Stage::Draft, deps.generator, req, &constraints).await?;

    let stanza = Stanza {
        k,
        text: text.trim().to_string(),
    };

    Ok(ContextUpdate {
        push_stanza: Some(stanza.clone()),
        visible: Some(stanza),
        push_fallbacks: events,
        ..Default::default()
    })
}
