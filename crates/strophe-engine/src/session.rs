//! External entry points
//!
//! `start_session` and `continue_session` are the whole caller contract.
//! Raw service errors never cross this boundary: anything that fails
//! inside the pipeline is logged and mapped to a generic try-again
//! signal. An unknown or malformed session id on continue starts a
//! fresh session with the feedback text as its brief.

use strophe_core::{Context, InputDelta, Result, SessionId, Stage, Stanza, StropheError};
use uuid::Uuid;

use crate::checkpoint::is_valid_session_id;
use crate::engine::Engine;

const TRY_AGAIN: &str = "The session hit a temporary failure; please try again.";

/// Caller-facing view of a session after an advance
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: SessionId,
    /// The stanza currently shown to the user, if any
    pub visible: Option<Stanza>,
    pub awaiting_feedback: bool,
    /// The assembled artifact, once the pipeline completes
    pub final_text: Option<String>,
}

impl SessionState {
    fn from_context(session_id: SessionId, ctx: &Context) -> Self {
        Self {
            session_id,
            visible: ctx.visible.clone(),
            awaiting_feedback: ctx.awaiting_feedback && ctx.stage != Stage::Done,
            final_text: ctx.final_text.clone(),
        }
    }
}

impl Engine {
    /// Begin a new session from a raw brief
    pub async fn start_session(&self, brief_text: &str) -> Result<SessionState> {
        let session_id = Uuid::new_v4().to_string();
        let ctx = self
            .advance(&session_id, InputDelta::brief(brief_text))
            .await
            .map_err(genericize)?;
        Ok(SessionState::from_context(session_id, &ctx))
    }

    /// Resume a suspended session with raw human feedback
    pub async fn continue_session(
        &self,
        session_id: &str,
        raw_feedback: &str,
    ) -> Result<SessionState> {
        let valid = is_valid_session_id(session_id);
        let existing = if valid {
            self.checkpointer().load(session_id).await.map_err(genericize)?
        } else {
            None
        };

        match existing {
            Some(_) => {
                let ctx = self
                    .advance(&session_id.to_string(), InputDelta::feedback(raw_feedback))
                    .await
                    .map_err(genericize)?;
                Ok(SessionState::from_context(session_id.to_string(), &ctx))
            }
            None => {
                // Unknown session: treat as a fresh start, not an error
                tracing::warn!(
                    "Continue on unknown session {:?}; starting fresh",
                    session_id
                );
                let fresh_id = if valid {
                    session_id.to_string()
                } else {
                    Uuid::new_v4().to_string()
                };
                let ctx = self
                    .advance(&fresh_id, InputDelta::brief(raw_feedback))
                    .await
                    .map_err(genericize)?;
                Ok(SessionState::from_context(fresh_id, &ctx))
            }
        }
    }
}

fn genericize(e: StropheError) -> StropheError {
    tracing::error!("Session error: {}", e);
    StropheError::Other(TRY_AGAIN.to_string())
}
