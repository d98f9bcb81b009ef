//! # strophe-engine
//!
//! The orchestration core: a fixed stage graph driven over a single
//! checkpointed Context.
//!
//! - `router` — pure next-stage decisions, including the two conditional
//!   decision points (pause-for-feedback, continue-or-finalize)
//! - `engine` — the drive loop: execute stage, merge update, checkpoint,
//!   route; suspends at the human-feedback boundary
//! - `stages` — one function per pipeline responsibility
//! - `guard` — constraint checks with bounded guided-edit retry, and the
//!   structured-output recovery ladder
//! - `cache` — content-addressed planner memoization
//! - `checkpoint` — durable per-session snapshots
//! - `revise` — lock-preserving plan merge
//! - `select` — deterministic A/B micro-context scoring
//! - `session` — the external entry points

#![allow(dead_code)]

mod cache;
mod checkpoint;
mod engine;
mod guard;
mod revise;
mod router;
mod select;
mod session;
pub mod stages;

pub use cache::{canonical_digest, get_or_compute};
pub use checkpoint::{
    is_valid_session_id, Checkpointer, FailingCheckpointer, FileCheckpointer, MemoryCheckpointer,
};
pub use engine::Engine;
pub use guard::{check_rhyme_scheme, guarded_draft, structured, violations, DraftConstraints};
pub use revise::preserve_locks;
pub use router::{route, Next};
pub use select::{choose, score};
pub use session::SessionState;
