//! Core type definitions for Strophe orchestration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session identifier (uuid string)
pub type SessionId = String;

/// Target stanza count used when a plan is absent or mangled
pub const DEFAULT_TARGET_UNITS: u32 = 4;

/// Rhyme schemes a plan is allowed to carry
pub const VALID_SCHEMES: [&str; 3] = ["ABAB", "AABB", "ABBA"];

/// Pipeline stage tag
///
/// The Context carries this explicitly; the Router operates over it and
/// never infers position from which fields happen to be populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Brief,
    ContextPack,
    Plan,
    StyleFuse,
    RetrievalPlan,
    MicroFetch,
    SelectContext,
    Draft,
    Critique,
    Present,
    InterpretFeedback,
    Replan,
    MemoryUpdate,
    Finalize,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Brief => write!(f, "brief"),
            Self::ContextPack => write!(f, "context_pack"),
            Self::Plan => write!(f, "plan"),
            Self::StyleFuse => write!(f, "style_fuse"),
            Self::RetrievalPlan => write!(f, "retrieval_plan"),
            Self::MicroFetch => write!(f, "micro_fetch"),
            Self::SelectContext => write!(f, "select_context"),
            Self::Draft => write!(f, "draft"),
            Self::Critique => write!(f, "critique"),
            Self::Present => write!(f, "present"),
            Self::InterpretFeedback => write!(f, "interpret_feedback"),
            Self::Replan => write!(f, "replan"),
            Self::MemoryUpdate => write!(f, "memory_update"),
            Self::Finalize => write!(f, "finalize"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "brief" => Ok(Self::Brief),
            "context_pack" => Ok(Self::ContextPack),
            "plan" => Ok(Self::Plan),
            "style_fuse" => Ok(Self::StyleFuse),
            "retrieval_plan" => Ok(Self::RetrievalPlan),
            "micro_fetch" => Ok(Self::MicroFetch),
            "select_context" => Ok(Self::SelectContext),
            "draft" => Ok(Self::Draft),
            "critique" => Ok(Self::Critique),
            "present" => Ok(Self::Present),
            "interpret_feedback" => Ok(Self::InterpretFeedback),
            "replan" => Ok(Self::Replan),
            "memory_update" => Ok(Self::MemoryUpdate),
            "finalize" => Ok(Self::Finalize),
            "done" => Ok(Self::Done),
            _ => Err(format!("Invalid stage: {}", s)),
        }
    }
}

/// A plan field annotated with provenance and a lock flag
///
/// Once `locked` is true, no automated revision may change `value`; only an
/// explicit user override may clear the lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanField<T> {
    pub value: T,
    #[serde(default = "default_field_source")]
    pub source: String,
    #[serde(default = "default_field_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub locked: bool,
}

fn default_field_source() -> String {
    "planner".to_string()
}

fn default_field_confidence() -> f32 {
    0.5
}

impl<T> PlanField<T> {
    pub fn new(value: T, source: impl Into<String>) -> Self {
        Self {
            value,
            source: source.into(),
            confidence: 0.5,
            locked: false,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }
}

/// One narrative beat of the plan, keyed by stanza index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    pub k: u32,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub turn: String,
}

/// The structured creative blueprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub form: PlanField<String>,
    pub rhyme: PlanField<String>,
    pub meter: PlanField<String>,
    pub target_unit_count: PlanField<u32>,
    pub persona: PlanField<String>,
    #[serde(default)]
    pub beats: Vec<Beat>,
}

impl Plan {
    /// Hand-authored minimal plan used when every generation attempt fails
    pub fn fallback() -> Self {
        Self {
            form: PlanField::new("ballad".to_string(), "fallback"),
            rhyme: PlanField::new("ABAB".to_string(), "fallback"),
            meter: PlanField::new("iamb_4".to_string(), "fallback"),
            target_unit_count: PlanField::new(DEFAULT_TARGET_UNITS, "fallback"),
            persona: PlanField::new("frontman".to_string(), "fallback"),
            beats: vec![Beat {
                k: 1,
                goal: "set scene".to_string(),
                image: "rain".to_string(),
                turn: "choice".to_string(),
            }],
        }
    }

    /// Structural validity: known rhyme scheme and a non-empty meter
    pub fn is_valid(&self) -> bool {
        VALID_SCHEMES.contains(&self.rhyme.value.as_str()) && !self.meter.value.trim().is_empty()
    }

    /// The beat for stanza `k`, if the planner provided one
    pub fn beat(&self, k: u32) -> Option<&Beat> {
        self.beats.iter().find(|b| b.k == k)
    }
}

/// Meter policy within a style
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterPolicy {
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub tolerance: String,
}

/// Rhyme policy within a style
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RhymePolicy {
    #[serde(default)]
    pub scheme: String,
}

/// Style rules the writer must follow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Style {
    #[serde(default)]
    pub diction: Vec<String>,
    #[serde(default)]
    pub syntax: Vec<String>,
    #[serde(default)]
    pub imagery: Vec<String>,
    #[serde(default)]
    pub forbidden: Vec<String>,
    #[serde(default)]
    pub persona_markers: Vec<String>,
    #[serde(default)]
    pub meter_policy: MeterPolicy,
    #[serde(default)]
    pub rhyme_policy: RhymePolicy,
}

impl Style {
    /// Minimal style seeded from the taboo list
    pub fn fallback(forbidden: Vec<String>) -> Self {
        Self {
            forbidden,
            meter_policy: MeterPolicy {
                target: "iamb_4".to_string(),
                tolerance: "±1".to_string(),
            },
            rhyme_policy: RhymePolicy {
                scheme: "ABAB".to_string(),
            },
            ..Default::default()
        }
    }
}

/// Per-tool knobs emitted by the planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterCard {
    #[serde(default = "default_max_words")]
    pub max_words: usize,
    #[serde(default = "default_vivid_images")]
    pub vivid_images: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCard {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbStrategies {
    #[serde(default = "default_strategy_a")]
    pub a: String,
    #[serde(default = "default_strategy_b")]
    pub b: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toolcard {
    #[serde(default)]
    pub writer: WriterCard,
    #[serde(default)]
    pub retrieval: RetrievalCard,
    #[serde(default)]
    pub ab_strategies: AbStrategies,
}

fn default_max_words() -> usize {
    140
}

fn default_vivid_images() -> u32 {
    1
}

fn default_top_k() -> usize {
    6
}

fn default_strategy_a() -> String {
    "exploit".to_string()
}

fn default_strategy_b() -> String {
    "explore".to_string()
}

impl Default for WriterCard {
    fn default() -> Self {
        Self {
            max_words: default_max_words(),
            vivid_images: default_vivid_images(),
        }
    }
}

impl Default for RetrievalCard {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

impl Default for AbStrategies {
    fn default() -> Self {
        Self {
            a: default_strategy_a(),
            b: default_strategy_b(),
        }
    }
}

impl Default for Toolcard {
    fn default() -> Self {
        Self {
            writer: WriterCard::default(),
            retrieval: RetrievalCard::default(),
            ab_strategies: AbStrategies::default(),
        }
    }
}

/// Planner output bundle, also the cache value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerOutput {
    pub plan: Plan,
    pub style: Style,
    pub toolcard: Toolcard,
}

/// Normalized user brief
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Brief {
    pub raw_user_message: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub persona_request: Option<String>,
    #[serde(default)]
    pub must_include: Vec<String>,
    #[serde(default)]
    pub must_avoid: Vec<String>,
    #[serde(default)]
    pub length_request: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

impl Brief {
    /// Minimal brief carrying only the raw message
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw_user_message: raw.into(),
            language: default_language(),
            ..Default::default()
        }
    }
}

/// Compressed whole-session retrieval pack
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextPack {
    #[serde(default)]
    pub taboo: Vec<String>,
    #[serde(default)]
    pub exemplars: Vec<String>,
    #[serde(default)]
    pub user_lexicon: Vec<String>,
    #[serde(default)]
    pub theory_rules: Vec<String>,
    #[serde(default)]
    pub template_digest: String,
}

/// Per-stanza retrieval pack for one A/B variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MicroPack {
    #[serde(default)]
    pub taboo: Vec<String>,
    #[serde(default)]
    pub exemplars: Vec<String>,
    #[serde(default)]
    pub lexicon: Vec<String>,
}

/// A/B variant label; ties always resolve to A
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbLabel {
    #[default]
    A,
    B,
}

impl std::fmt::Display for AbLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// One micro-retrieval recipe
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRecipe {
    pub priority: Vec<String>,
    pub query: String,
    pub top_k: usize,
}

/// The two recipes built for the next stanza
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbRecipes {
    pub a: RetrievalRecipe,
    pub b: RetrievalRecipe,
}

/// The two fetched packs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbPacks {
    pub a: MicroPack,
    pub b: MicroPack,
}

/// One ordered piece of the artifact (1-indexed)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stanza {
    pub k: u32,
    pub text: String,
}

/// Critique severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Minor,
    Major,
    Critical,
}

impl Severity {
    /// Whether the critique patch should replace the drafted stanza
    pub fn requires_patch(&self) -> bool {
        matches!(self, Self::Major | Self::Critical)
    }
}

/// Structured review of one stanza
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub k: u32,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub patch: Option<String>,
    #[serde(default)]
    pub severity_max: Severity,
}

/// Imagery directives inside feedback targets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageryTargets {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub ban: Vec<String>,
}

/// Persona directive inside feedback targets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaTarget {
    #[serde(default)]
    pub lock: bool,
    #[serde(default)]
    pub id: Option<String>,
}

/// Nested add/ban/prefer directives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackTargets {
    #[serde(default)]
    pub imagery: ImageryTargets,
    #[serde(default)]
    pub tempo: Option<String>,
    #[serde(default)]
    pub persona: PersonaTarget,
    #[serde(default)]
    pub taboo_add: Vec<String>,
}

/// Normalized structured feedback derived from one human turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    #[serde(default)]
    pub like: Vec<String>,
    #[serde(default)]
    pub dislike: Vec<String>,
    #[serde(default)]
    pub targets: FeedbackTargets,
}

impl FeedbackRecord {
    /// Apply term normalization to every add/ban directive
    pub fn normalized(mut self) -> Self {
        let norm = |v: &mut Vec<String>| {
            for s in v.iter_mut() {
                *s = normalize_term(s);
            }
        };
        norm(&mut self.targets.imagery.add);
        norm(&mut self.targets.imagery.ban);
        norm(&mut self.targets.taboo_add);
        self
    }
}

/// Canonical form for banned/preferred terms: trimmed, lowercased,
/// inner whitespace collapsed to single spaces.
pub fn normalize_term(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One entry of the append-only revision log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionEntry {
    pub from_version: String,
    pub to_version: String,
    pub diff: String,
    pub stanza_k: u32,
    #[serde(default)]
    pub feedback: Option<FeedbackRecord>,
    pub at: DateTime<Utc>,
}

impl RevisionEntry {
    pub fn new(version: usize, diff: impl Into<String>, stanza_k: u32) -> Self {
        Self {
            from_version: format!("v{}", version),
            to_version: format!("v{}", version + 1),
            diff: diff.into(),
            stanza_k,
            feedback: None,
            at: Utc::now(),
        }
    }

    pub fn with_feedback(mut self, feedback: FeedbackRecord) -> Self {
        self.feedback = Some(feedback);
        self
    }
}

/// Long-lived user preferences accumulated from feedback
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceProfile {
    #[serde(default)]
    pub imagery_boost: Vec<String>,
    #[serde(default)]
    pub taboo: Vec<String>,
    #[serde(default)]
    pub liked: Vec<String>,
}

/// Which fallback rung fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    /// Structured output failed to parse; same-tier cool retry issued
    ParseRetry,
    /// Cool retry also failed; escalated to a higher tier
    TierEscalated,
    /// Every attempt failed; hand-authored default object used
    DefaultObject,
    /// Draft violated constraints; one guided-edit call issued
    GuidedEdit,
    /// Guided edit still violated; output accepted best-effort
    BestEffortAccept,
    /// Revised plan stayed invalid; old plan kept unchanged
    PlanReverted,
}

impl std::fmt::Display for FallbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParseRetry => write!(f, "parse_retry"),
            Self::TierEscalated => write!(f, "tier_escalated"),
            Self::DefaultObject => write!(f, "default_object"),
            Self::GuidedEdit => write!(f, "guided_edit"),
            Self::BestEffortAccept => write!(f, "best_effort_accept"),
            Self::PlanReverted => write!(f, "plan_reverted"),
        }
    }
}

/// Structured marker emitted whenever a fallback path is taken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackEvent {
    pub stage: Stage,
    pub kind: FallbackKind,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl FallbackEvent {
    pub fn new(stage: Stage, kind: FallbackKind, detail: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_roundtrip() {
        let stage: Stage = "interpret_feedback".parse().unwrap();
        assert_eq!(stage, Stage::InterpretFeedback);
        assert_eq!(stage.to_string(), "interpret_feedback");
    }

    #[test]
    fn test_invalid_stage() {
        assert!("no_such_stage".parse::<Stage>().is_err());
    }

    #[test]
    fn test_plan_fallback_is_valid() {
        let plan = Plan::fallback();
        assert!(plan.is_valid());
        assert_eq!(plan.target_unit_count.value, DEFAULT_TARGET_UNITS);
    }

    #[test]
    fn test_plan_invalid_scheme() {
        let mut plan = Plan::fallback();
        plan.rhyme.value = "ABCD".to_string();
        assert!(!plan.is_valid());
    }

    #[test]
    fn test_plan_invalid_empty_meter() {
        let mut plan = Plan::fallback();
        plan.meter.value = "  ".to_string();
        assert!(!plan.is_valid());
    }

    #[test]
    fn test_normalize_term() {
        assert_eq!(normalize_term("  Broken   Heart "), "broken heart");
        assert_eq!(normalize_term("CLICHÉS"), "clichés");
    }

    #[test]
    fn test_feedback_normalization() {
        let fb = FeedbackRecord {
            targets: FeedbackTargets {
                imagery: ImageryTargets {
                    ban: vec!["Broken  Heart".to_string()],
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        }
        .normalized();
        assert_eq!(fb.targets.imagery.ban, vec!["broken heart".to_string()]);
    }

    #[test]
    fn test_severity_gate() {
        assert!(!Severity::Minor.requires_patch());
        assert!(Severity::Major.requires_patch());
        assert!(Severity::Critical.requires_patch());
    }

    #[test]
    fn test_toolcard_defaults_from_empty_json() {
        let card: Toolcard = serde_json::from_str("{}").unwrap();
        assert_eq!(card.writer.max_words, 140);
        assert_eq!(card.retrieval.top_k, 6);
        assert_eq!(card.ab_strategies.a, "exploit");
    }

    #[test]
    fn test_plan_field_builder() {
        let field = PlanField::new("frontman".to_string(), "planner")
            .with_confidence(0.9)
            .locked();
        assert!(field.locked);
        assert!((field.confidence - 0.9).abs() < f32::EPSILON);
    }
}
