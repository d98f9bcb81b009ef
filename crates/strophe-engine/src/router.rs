//! Pure routing over the stage graph
//!
//! No I/O, no async. All edges are static 1:1 except the two decision
//! points: pause-for-feedback after `Present`, and continue-or-finalize
//! after `MemoryUpdate`. Unknown situations terminate rather than loop.

use strophe_core::{Context, Stage};

/// Router verdict for the stage just executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Proceed to this stage
    Stage(Stage),
    /// Return control to the caller pending human input
    Suspend,
    /// Pipeline complete
    Done,
}

/// Decide the next stage after `stage` has executed and its update merged
pub fn route(stage: Stage, ctx: &Context) -> Next {
    match stage {
        Stage::Brief => Next::Stage(Stage::ContextPack),
        Stage::ContextPack => Next::Stage(Stage::Plan),
        Stage::Plan => Next::Stage(Stage::StyleFuse),
        Stage::StyleFuse => Next::Stage(Stage::RetrievalPlan),

        // Per-stanza cycle
        Stage::RetrievalPlan => Next::Stage(Stage::MicroFetch),
        Stage::MicroFetch => Next::Stage(Stage::SelectContext),
        Stage::SelectContext => Next::Stage(Stage::Draft),
        Stage::Draft => Next::Stage(Stage::Critique),
        Stage::Critique => Next::Stage(Stage::Present),

        // Human-in-the-loop boundary: suspend unless unconsumed raw
        // feedback is already waiting in the Context
        Stage::Present => {
            if ctx.raw_feedback.is_some() {
                Next::Stage(Stage::InterpretFeedback)
            } else {
                Next::Suspend
            }
        }

        Stage::InterpretFeedback => Next::Stage(Stage::Replan),
        Stage::Replan => Next::Stage(Stage::MemoryUpdate),

        // Loop continuation: more stanzas needed, or finalize.
        // Overshoot terminates (invariant guard, unreachable in correct runs).
        Stage::MemoryUpdate => {
            if (ctx.stanzas.len() as u32) < ctx.target_unit_count() {
                Next::Stage(Stage::RetrievalPlan)
            } else {
                Next::Stage(Stage::Finalize)
            }
        }

        Stage::Finalize => Next::Done,
        Stage::Done => Next::Done,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strophe_core::{Plan, PlanField, Stanza, DEFAULT_TARGET_UNITS};

    fn ctx_with_stanzas(n: u32, target: Option<u32>) -> Context {
        let mut ctx = Context::default();
        for k in 1..=n {
            ctx.stanzas.push(Stanza {
                k,
                text: format!("stanza {}", k),
            });
        }
        if let Some(target) = target {
            let mut plan = Plan::fallback();
            plan.target_unit_count = PlanField::new(target, "test");
            ctx.plan = Some(plan);
        }
        ctx
    }

    #[test]
    fn test_static_edges() {
        let ctx = Context::default();
        assert_eq!(route(Stage::Brief, &ctx), Next::Stage(Stage::ContextPack));
        assert_eq!(route(Stage::ContextPack, &ctx), Next::Stage(Stage::Plan));
        assert_eq!(route(Stage::Plan, &ctx), Next::Stage(Stage::StyleFuse));
        assert_eq!(
            route(Stage::StyleFuse, &ctx),
            Next::Stage(Stage::RetrievalPlan)
        );
        assert_eq!(
            route(Stage::RetrievalPlan, &ctx),
            Next::Stage(Stage::MicroFetch)
        );
        assert_eq!(
            route(Stage::MicroFetch, &ctx),
            Next::Stage(Stage::SelectContext)
        );
        assert_eq!(route(Stage::SelectContext, &ctx), Next::Stage(Stage::Draft));
        assert_eq!(route(Stage::Draft, &ctx), Next::Stage(Stage::Critique));
        assert_eq!(route(Stage::Critique, &ctx), Next::Stage(Stage::Present));
        assert_eq!(
            route(Stage::InterpretFeedback, &ctx),
            Next::Stage(Stage::Replan)
        );
        assert_eq!(route(Stage::Replan, &ctx), Next::Stage(Stage::MemoryUpdate));
        assert_eq!(route(Stage::Finalize, &ctx), Next::Done);
        assert_eq!(route(Stage::Done, &ctx), Next::Done);
    }

    #[test]
    fn test_present_suspends_without_feedback() {
        let ctx = Context::default();
        assert_eq!(route(Stage::Present, &ctx), Next::Suspend);
    }

    #[test]
    fn test_present_continues_with_unconsumed_feedback() {
        let mut ctx = Context::default();
        ctx.raw_feedback = Some("more rain imagery".to_string());
        assert_eq!(
            route(Stage::Present, &ctx),
            Next::Stage(Stage::InterpretFeedback)
        );
    }

    #[test]
    fn test_loop_continues_below_target() {
        let ctx = ctx_with_stanzas(1, Some(4));
        assert_eq!(
            route(Stage::MemoryUpdate, &ctx),
            Next::Stage(Stage::RetrievalPlan)
        );
    }

    #[test]
    fn test_loop_finalizes_at_target() {
        let ctx = ctx_with_stanzas(4, Some(4));
        assert_eq!(
            route(Stage::MemoryUpdate, &ctx),
            Next::Stage(Stage::Finalize)
        );
    }

    #[test]
    fn test_loop_terminates_on_overshoot() {
        // Should not happen in a correct run; must terminate, never loop
        let ctx = ctx_with_stanzas(6, Some(4));
        assert_eq!(
            route(Stage::MemoryUpdate, &ctx),
            Next::Stage(Stage::Finalize)
        );
    }

    #[test]
    fn test_missing_target_defaults_to_four() {
        let below = ctx_with_stanzas(DEFAULT_TARGET_UNITS - 1, None);
        assert_eq!(
            route(Stage::MemoryUpdate, &below),
            Next::Stage(Stage::RetrievalPlan)
        );

        let at = ctx_with_stanzas(DEFAULT_TARGET_UNITS, None);
        assert_eq!(route(Stage::MemoryUpdate, &at), Next::Stage(Stage::Finalize));
    }
}
