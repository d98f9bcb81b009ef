//! The orchestrator drive loop
//!
//! `advance` loads (or creates) the session Context, merges the caller's
//! input delta, then repeatedly executes the current stage, merges its
//! update, checkpoints, and consults the router — until the router
//! suspends (awaiting human input) or the pipeline completes. One
//! checkpoint write per stage transition. A failing stage never has its
//! update applied: the pre-stage Context is checkpointed unchanged and
//! the error surfaces.
//!
//! Suspension is not a blocked thread. Control returns to the caller
//! entirely; resumption is a fresh `advance` with new input.

use std::sync::Arc;

use strophe_core::{Context, InputDelta, Result, SessionId, Stage, StropheConfig};
use strophe_gen::Generator;
use strophe_retrieval::Retriever;
use tracing::{debug, info};

use crate::checkpoint::Checkpointer;
use crate::router::{route, Next};
use crate::stages::{run_stage, StageDeps};

/// The orchestration engine for one process
///
/// Service capabilities are injected once at construction and shared by
/// every session this engine advances; stages never open connections of
/// their own.
pub struct Engine {
    generator: Arc<dyn Generator>,
    retriever: Arc<dyn Retriever>,
    checkpointer: Arc<dyn Checkpointer>,
    config: StropheConfig,
}

impl Engine {
    pub fn new(
        generator: Arc<dyn Generator>,
        retriever: Arc<dyn Retriever>,
        checkpointer: Arc<dyn Checkpointer>,
        config: StropheConfig,
    ) -> Self {
        Self {
            generator,
            retriever,
            checkpointer,
            config,
        }
    }

    pub(crate) fn checkpointer(&self) -> &dyn Checkpointer {
        self.checkpointer.as_ref()
    }

    /// Latest persisted Context for a session, if any
    pub async fn snapshot(&self, session_id: &SessionId) -> Result<Option<Context>> {
        self.checkpointer.load(session_id).await
    }

    /// Drive the session forward until suspension or completion
    pub async fn advance(&self, session_id: &SessionId, delta: InputDelta) -> Result<Context> {
        let mut ctx = self
            .checkpointer
            .load(session_id)
            .await?
            .unwrap_or_default();
        ctx.absorb(delta);

        loop {
            let stage = ctx.stage;
            if stage == Stage::Done {
                debug!("Session {} is complete; nothing to advance", session_id);
                break;
            }

            info!("Session {}: executing stage {}", session_id, stage);
            let deps = StageDeps {
                generator: self.generator.as_ref(),
                retriever: self.retriever.as_ref(),
                config: &self.config,
            };

            let update = match run_stage(stage, &ctx, &deps).await {
                Ok(update) => update,
                Err(e) => {
                    // ctx still holds the pre-stage state; persist it so a
                    // retry resumes exactly here, then surface the error
                    self.checkpointer.save(session_id, &ctx).await?;
                    return Err(e);
                }
            };
            ctx.apply(update);

            match route(stage, &ctx) {
                Next::Stage(next) => {
                    ctx.stage = next;
                    self.checkpointer.save(session_id, &ctx).await?;
                }
                Next::Suspend => {
                    // Park at the interpretation stage so resumption needs
                    // no inference; no stage is "in progress"
                    ctx.stage = Stage::InterpretFeedback;
                    ctx.awaiting_feedback = true;
                    self.checkpointer.save(session_id, &ctx).await?;
                    info!("Session {} suspended awaiting feedback", session_id);
                    break;
                }
                Next::Done => {
                    ctx.stage = Stage::Done;
                    ctx.awaiting_feedback = false;
                    self.checkpointer.save(session_id, &ctx).await?;
                    info!("Session {} complete", session_id);
                    break;
                }
            }
        }

        Ok(ctx)
    }
}
