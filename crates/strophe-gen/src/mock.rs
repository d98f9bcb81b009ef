//! Scripted generator for tests
//!
//! Responses are queued in call order; the pipeline executes
//! deterministically, so a script reads like a transcript of the run.
//! Every call is recorded for assertions (call counts drive the cache
//! and guided-edit tests).

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use strophe_core::{Result, StropheError};

use crate::{GenRequest, Generator, Tier};

/// One recorded generation call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub tier: Tier,
    pub system: String,
    pub user: String,
    pub stochasticity: f32,
    pub json: bool,
}

/// A scripted response: a body to return, or a transport error
#[derive(Debug, Clone)]
enum Scripted {
    Ok(String),
    Err(String),
}

/// Test double returning queued responses in call order
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerator {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response
    pub fn with_response(self, body: impl Into<String>) -> Self {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Scripted::Ok(body.into()));
        self
    }

    /// Queue a transport-level failure
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Scripted::Err(message.into()));
        self
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    fn next(&self, req: &GenRequest, json: bool) -> Result<String> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            tier: req.tier,
            system: req.system.clone(),
            user: req.user.clone(),
            stochasticity: req.stochasticity,
            json,
        });
        match self.script.lock().expect("script lock").pop_front() {
            Some(Scripted::Ok(body)) => Ok(body),
            Some(Scripted::Err(message)) => Err(StropheError::Generation(message)),
            None => Err(StropheError::Generation(
                "Script exhausted: no response queued for call".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn complete_text(&self, req: &GenRequest) -> Result<String> {
        self.next(req, false)
    }

    async fn complete_json(&self, req: &GenRequest) -> Result<String> {
        self.next(req, true)
    }
}
