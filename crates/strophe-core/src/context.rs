//! The pipeline Context and its partial-update merge
//!
//! All pipeline state lives in one Context, threaded by value through the
//! stages. A stage never mutates the Context directly; it returns a
//! ContextUpdate describing exactly the fields it is allowed to change.
//! Scalar/object fields use replace semantics, list fields append. Stanzas
//! are append-only except for the critique patch, which replaces at an
//! existing index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{
    AbLabel, AbPacks, AbRecipes, Brief, ContextPack, FallbackEvent, FeedbackRecord, Plan,
    PlannerOutput, PreferenceProfile, Review, RevisionEntry, Stage, Stanza, Style, Toolcard,
    DEFAULT_TARGET_UNITS,
};

/// Full pipeline state for one session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    /// Explicit stage marker; the next stage to execute on `advance`
    #[serde(default)]
    pub stage: Stage,

    /// Raw brief text as supplied by the caller
    #[serde(default)]
    pub brief_text: Option<String>,
    #[serde(default)]
    pub brief: Option<Brief>,
    #[serde(default)]
    pub pack: Option<ContextPack>,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub style: Option<Style>,
    #[serde(default)]
    pub toolcard: Option<Toolcard>,

    #[serde(default)]
    pub recipes: Option<AbRecipes>,
    #[serde(default)]
    pub micro_packs: Option<AbPacks>,
    #[serde(default)]
    pub chosen_context: Option<AbLabel>,

    #[serde(default)]
    pub stanzas: Vec<Stanza>,
    #[serde(default)]
    pub visible: Option<Stanza>,
    #[serde(default)]
    pub feedback_prompt: Option<String>,
    #[serde(default)]
    pub reviews: Vec<Review>,

    #[serde(default)]
    pub awaiting_feedback: bool,
    /// Unconsumed raw feedback supplied by the caller
    #[serde(default)]
    pub raw_feedback: Option<String>,
    #[serde(default)]
    pub feedback: Option<FeedbackRecord>,

    #[serde(default)]
    pub profile: PreferenceProfile,
    #[serde(default)]
    pub revision_log: Vec<RevisionEntry>,
    #[serde(default)]
    pub final_text: Option<String>,

    /// Content-addressed planner cache, scoped to this session
    #[serde(default)]
    pub planner_cache: BTreeMap<String, PlannerOutput>,
    /// Observable record of every fallback path taken
    #[serde(default)]
    pub fallbacks: Vec<FallbackEvent>,
}

impl Context {
    /// Loop-termination target; defaults when the plan is absent or carries
    /// a zero count (a mangled generation coerced at the parse boundary)
    pub fn target_unit_count(&self) -> u32 {
        self.plan
            .as_ref()
            .map(|p| p.target_unit_count.value)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_TARGET_UNITS)
    }

    /// 1-based index of the stanza the per-unit cycle is working on
    pub fn next_stanza_index(&self) -> u32 {
        self.stanzas.len() as u32 + 1
    }

    /// Merge an external input delta (shallow key overwrite)
    pub fn absorb(&mut self, delta: InputDelta) {
        if let Some(brief_text) = delta.brief_text {
            self.brief_text = Some(brief_text);
        }
        if let Some(raw) = delta.raw_feedback {
            self.raw_feedback = Some(raw);
        }
        // Explicit user override is the only way to clear a lock
        if let Some(plan) = self.plan.as_mut() {
            for field in &delta.unlock {
                match field.as_str() {
                    "form" => plan.form.locked = false,
                    "rhyme" => plan.rhyme.locked = false,
                    "meter" => plan.meter.locked = false,
                    "target_unit_count" => plan.target_unit_count.locked = false,
                    "persona" => plan.persona.locked = false,
                    _ => {}
                }
            }
        }
    }

    /// Apply a stage's partial update
    pub fn apply(&mut self, update: ContextUpdate) {
        if let Some(brief) = update.brief {
            self.brief = Some(brief);
        }
        if let Some(pack) = update.pack {
            self.pack = Some(pack);
        }
        if let Some(plan) = update.plan {
            self.plan = Some(plan);
        }
        if let Some(style) = update.style {
            self.style = Some(style);
        }
        if let Some(toolcard) = update.toolcard {
            self.toolcard = Some(toolcard);
        }
        if let Some(recipes) = update.recipes {
            self.recipes = Some(recipes);
        }
        if let Some(packs) = update.micro_packs {
            self.micro_packs = Some(packs);
        }
        if let Some(label) = update.chosen_context {
            self.chosen_context = Some(label);
        }
        if let Some(stanza) = update.push_stanza {
            self.stanzas.push(stanza);
        }
        if let Some((k, text)) = update.patch_stanza {
            // Replacement only at an existing 1-based index; never a removal
            if k >= 1 && (k as usize) <= self.stanzas.len() {
                self.stanzas[k as usize - 1].text = text;
            }
        }
        if let Some(visible) = update.visible {
            self.visible = Some(visible);
        }
        if let Some(prompt) = update.feedback_prompt {
            self.feedback_prompt = Some(prompt);
        }
        if let Some(awaiting) = update.awaiting_feedback {
            self.awaiting_feedback = awaiting;
        }
        if update.consume_raw_feedback {
            self.raw_feedback = None;
        }
        if let Some(feedback) = update.feedback {
            self.feedback = Some(feedback);
        }
        if update.consume_feedback {
            self.feedback = None;
        }
        if let Some(profile) = update.profile {
            self.profile = profile;
        }
        if let Some(text) = update.final_text {
            self.final_text = Some(text);
        }
        if let Some((digest, value)) = update.cache_insert {
            self.planner_cache.insert(digest, value);
        }
        self.reviews.extend(update.push_reviews);
        self.revision_log.extend(update.push_revisions);
        self.fallbacks.extend(update.push_fallbacks);
    }
}

/// External input merged into the Context at the top of `advance`
#[derive(Debug, Clone, Default)]
pub struct InputDelta {
    pub brief_text: Option<String>,
    pub raw_feedback: Option<String>,
    /// Plan field names whose locks the user explicitly releases
    pub unlock: Vec<String>,
}

impl InputDelta {
    pub fn brief(text: impl Into<String>) -> Self {
        Self {
            brief_text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn feedback(text: impl Into<String>) -> Self {
        Self {
            raw_feedback: Some(text.into()),
            ..Default::default()
        }
    }
}

/// Partial update returned by a stage function
#[derive(Debug, Clone, Default)]
pub struct ContextUpdate {
    pub brief: Option<Brief>,
    pub pack: Option<ContextPack>,
    pub plan: Option<Plan>,
    pub style: Option<Style>,
    pub toolcard: Option<Toolcard>,
    pub recipes: Option<AbRecipes>,
    pub micro_packs: Option<AbPacks>,
    pub chosen_context: Option<AbLabel>,
    pub push_stanza: Option<Stanza>,
    /// (1-based index, replacement text) — the critique patch path
    pub patch_stanza: Option<(u32, String)>,
    pub visible: Option<Stanza>,
    pub feedback_prompt: Option<String>,
    pub awaiting_feedback: Option<bool>,
    pub consume_raw_feedback: bool,
    pub feedback: Option<FeedbackRecord>,
    pub consume_feedback: bool,
    pub profile: Option<PreferenceProfile>,
    pub final_text: Option<String>,
    pub cache_insert: Option<(String, PlannerOutput)>,
    pub push_reviews: Vec<Review>,
    pub push_revisions: Vec<RevisionEntry>,
    pub push_fallbacks: Vec<FallbackEvent>,
}
