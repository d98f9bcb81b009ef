//! # strophe-gen
//!
//! The generation-service boundary: a `Generator` capability trait with
//! small/medium/large tier presets, an HTTP client with rate-limit
//! retry/backoff, and a scripted test double.
//!
//! The orchestrator never assumes a call succeeds; every call site in
//! `strophe-engine` carries its own fallback ladder. This crate only
//! reports transport-level failure.

#![allow(dead_code)]

mod client;
mod mock;

pub use client::HttpGenerator;
pub use mock::{RecordedCall, ScriptedGenerator};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strophe_core::Result;

/// Capability tier of a generation call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Small,
    #[default]
    Medium,
    Large,
}

impl Tier {
    /// One step up the capability ladder; Large is the ceiling
    pub fn escalate(self) -> Self {
        match self {
            Self::Small => Self::Medium,
            Self::Medium => Self::Large,
            Self::Large => Self::Large,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Small => write!(f, "small"),
            Self::Medium => write!(f, "medium"),
            Self::Large => write!(f, "large"),
        }
    }
}

/// One generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenRequest {
    pub tier: Tier,
    pub system: String,
    pub user: String,
    /// Sampling temperature; lowered for retries
    pub stochasticity: f32,
    pub max_output_tokens: usize,
}

impl GenRequest {
    pub fn new(tier: Tier, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            tier,
            system: system.into(),
            user: user.into(),
            stochasticity: 0.6,
            max_output_tokens: 512,
        }
    }

    pub fn with_stochasticity(mut self, stochasticity: f32) -> Self {
        self.stochasticity = stochasticity;
        self
    }

    pub fn with_max_output(mut self, max_output_tokens: usize) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Same request, cooler sampling — the standard retry shape
    pub fn cooled(mut self, stochasticity: f32) -> Self {
        self.stochasticity = stochasticity;
        self
    }

    /// Same request, one tier up
    pub fn escalated(mut self) -> Self {
        self.tier = self.tier.escalate();
        self
    }
}

/// Injected generation capability
///
/// Constructed once per process and shared; never instantiated inside a
/// stage function.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Free-text completion
    async fn complete_text(&self, req: &GenRequest) -> Result<String>;

    /// Completion expected to be a single JSON object (parsing and schema
    /// recovery happen in the caller's guard, not here)
    async fn complete_json(&self, req: &GenRequest) -> Result<String>;
}
