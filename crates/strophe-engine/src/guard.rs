//! Validation and bounded retry around generative calls
//!
//! Two shapes of recovery:
//!
//! - Free-text drafts: constraint checks (taboo containment, word-count
//!   ceiling, end-rhyme heuristic) with exactly one guided-edit retry at
//!   lower stochasticity. If the retry still violates, the output ships
//!   anyway — best-effort, and the acceptance is recorded as an explicit
//!   event, never silently dropped.
//! - Structured (JSON) outputs: one same-tier cool retry, one
//!   tier-escalated retry, then a hand-authored minimal default. Never an
//!   error to the caller.
//!
//! Every fallback rung appends a FallbackEvent to the stage's update so
//! degradation stays observable and testable.

use serde::de::DeserializeOwned;
use strophe_core::{FallbackEvent, FallbackKind, Result, Stage};
use strophe_gen::{GenRequest, Generator, Tier};

const RETRY_STOCHASTICITY: f32 = 0.1;
const EDIT_STOCHASTICITY: f32 = 0.3;
const EDIT_SYS: &str = "You carefully revise poetry with minimal edits to match constraints.";

/// Hard constraints applied to a drafted stanza
#[derive(Debug, Clone, Default)]
pub struct DraftConstraints {
    /// Forbidden terms, matched as case-insensitive substrings
    pub taboo: Vec<String>,
    /// Word-count ceiling
    pub max_words: usize,
    /// End-rhyme scheme (ABAB / AABB / ABBA)
    pub scheme: String,
}

/// Named violations of the constraints; empty means the draft passes
pub fn violations(text: &str, constraints: &DraftConstraints) -> Vec<String> {
    let mut found = Vec::new();
    let lower = text.to_lowercase();

    for term in &constraints.taboo {
        let term = term.trim();
        if !term.is_empty() && lower.contains(&term.to_lowercase()) {
            found.push(format!("contains taboo term \"{}\"", term));
        }
    }

    let words = text.split_whitespace().count();
    if constraints.max_words > 0 && words > constraints.max_words {
        found.push(format!(
            "{} words exceeds the {}-word ceiling",
            words, constraints.max_words
        ));
    }

    if !check_rhyme_scheme(text, &constraints.scheme) {
        found.push(format!(
            "does not follow the {} end-rhyme pattern",
            constraints.scheme
        ));
    }

    found
}

fn last_word(line: &str) -> String {
    line.trim()
        .to_lowercase()
        .split_whitespace()
        .last()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
        .to_string()
}

// Suffix heuristic, not phonetics: last three characters match, or the
// last two do.
fn ends_rhyme(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return true;
    }
    let tail = |s: &str, n: usize| -> String {
        s.chars().rev().take(n).collect::<Vec<_>>().into_iter().rev().collect()
    };
    tail(a, 3) == tail(b, 3) || tail(a, 2) == tail(b, 2)
}

/// Tolerant end-rhyme check over the first four lines; drafts shorter
/// than the minimum structural unit count pass automatically.
pub fn check_rhyme_scheme(text: &str, scheme: &str) -> bool {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() < 4 {
        return true;
    }
    let ends: Vec<String> = lines[..4].iter().map(|l| last_word(l)).collect();

    match scheme.to_uppercase().as_str() {
        "ABAB" => ends_rhyme(&ends[0], &ends[2]) && ends_rhyme(&ends[1], &ends[3]),
        "AABB" => ends_rhyme(&ends[0], &ends[1]) && ends_rhyme(&ends[2], &ends[3]),
        "ABBA" => ends_rhyme(&ends[0], &ends[3]) && ends_rhyme(&ends[1], &ends[2]),
        _ => true,
    }
}

/// Draft with the guard applied: at most one guided-edit retry, then
/// best-effort acceptance. The initial draft call itself may fail with a
/// transport error; that surfaces to the engine.
pub async fn guarded_draft(
    stage: Stage,
    generator: &dyn Generator,
    req: GenRequest,
    constraints: &DraftConstraints,
) -> Result<(String, Vec<FallbackEvent>)> {
    let max_output = req.max_output_tokens;
    let text = generator.complete_text(&req).await?;

    let found = violations(&text, constraints);
    if found.is_empty() {
        return Ok((text, Vec::new()));
    }

    let named = found.join("; ");
    tracing::warn!("Draft violates constraints ({}); issuing guided edit", named);
    let mut events = vec![FallbackEvent::new(stage, FallbackKind::GuidedEdit, &named)];

    let edit_req = GenRequest::new(
        Tier::Small,
        EDIT_SYS,
        format!(
            "Make the minimal edit that fixes these named violations: {}.\n\
             Keep the persona voice and concrete imagery.\nStanza:\n{}",
            named, text
        ),
    )
    .with_stochasticity(EDIT_STOCHASTICITY)
    .with_max_output(max_output);

    match generator.complete_text(&edit_req).await {
        Ok(edited) => {
            let still = violations(&edited, constraints);
            if still.is_empty() {
                Ok((edited, events))
            } else {
                // Best-effort policy: no second loop; the retried output
                // is accepted with its remaining violations on record.
                tracing::warn!("Guided edit still violates ({}); accepting", still.join("; "));
                events.push(FallbackEvent::new(
                    stage,
                    FallbackKind::BestEffortAccept,
                    still.join("; "),
                ));
                Ok((edited, events))
            }
        }
        Err(e) => {
            tracing::warn!("Guided edit call failed ({}); keeping original draft", e);
            events.push(FallbackEvent::new(
                stage,
                FallbackKind::BestEffortAccept,
                format!("guided edit failed: {}; original draft kept", e),
            ));
            Ok((text, events))
        }
    }
}

/// Structured-output recovery ladder: parse, cool retry, tier-escalated
/// retry, hand-authored default. Returns the value plus the fallback
/// events taken along the way.
pub async fn structured<T, F>(
    stage: Stage,
    generator: &dyn Generator,
    req: GenRequest,
    default: F,
) -> (T, Vec<FallbackEvent>)
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let mut events = Vec::new();

    match attempt::<T>(generator, &req).await {
        Ok(value) => return (value, events),
        Err(e) => {
            tracing::warn!("{}: structured output failed ({}); cool retry", stage, e);
            events.push(FallbackEvent::new(
                stage,
                FallbackKind::ParseRetry,
                format!("first attempt failed: {}", e),
            ));
        }
    }

    let cooled = req.clone().cooled(RETRY_STOCHASTICITY);
    match attempt::<T>(generator, &cooled).await {
        Ok(value) => return (value, events),
        Err(e) => {
            tracing::warn!("{}: cool retry failed ({}); escalating tier", stage, e);
            events.push(FallbackEvent::new(
                stage,
                FallbackKind::TierEscalated,
                format!("cool retry failed: {}", e),
            ));
        }
    }

    let escalated = cooled.escalated();
    match attempt::<T>(generator, &escalated).await {
        Ok(value) => (value, events),
        Err(e) => {
            tracing::warn!("{}: escalated retry failed ({}); using default", stage, e);
            events.push(FallbackEvent::new(
                stage,
                FallbackKind::DefaultObject,
                format!("escalated retry failed: {}", e),
            ));
            (default(), events)
        }
    }
}

async fn attempt<T: DeserializeOwned>(generator: &dyn Generator, req: &GenRequest) -> Result<T> {
    let body = generator.complete_json(req).await?;
    Ok(serde_json::from_str(extract_json(&body))?)
}

// Models sometimes fence their JSON; strip that before parsing.
pub(crate) fn extract_json(body: &str) -> &str {
    let trimmed = body.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}
