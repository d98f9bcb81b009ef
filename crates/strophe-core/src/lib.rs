//! # strophe-core
//!
//! Core types for the Strophe stanza-writing orchestrator.
//!
//! A strophe is the turning unit of a Greek ode — the pipeline turns out
//! one unit at a time, pausing for the listener between turns.
//!
//! ## Core Paradigm
//!
//! - All pipeline state lives in one Context, threaded by value through stages
//! - Stages return partial updates; they never mutate fields they don't own
//! - The current stage is an explicit tag, never inferred from field presence
//! - Every fallback path leaves an observable event in the Context

#![allow(dead_code)]

mod config;
mod context;
mod error;
mod types;

pub use config::{CollectionConfig, ModelConfig, StropheConfig};
pub use context::{Context, ContextUpdate, InputDelta};
pub use error::{Result, StropheError};
pub use types::*;
