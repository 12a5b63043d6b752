//! The analysis session engine.
//!
//! A session is one bounded conversation with the model:
//!
//! 1. [`ConversationDriver`] seeds a transcript with the instruction and loops,
//!    at most `max_iterations` times, requesting completions.
//! 2. Every action the model requests goes through [`ToolDispatcher`], which
//!    always answers with exactly one [`ActionResult`].
//! 3. Charts land in the [`ArtifactAccumulator`] in production order.
//! 4. [`build_outcome`] turns the termination state into a [`SessionOutcome`].

mod action;
mod artifacts;
mod dispatcher;
mod driver;
mod outcome;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{action_definitions, Action, ActionError, EXECUTE_CODE, FINALIZE, SEARCH_INSIGHTS};
pub use artifacts::ArtifactAccumulator;
pub use dispatcher::{Dispatch, ToolDispatcher};
pub use driver::{ConversationDriver, IterationObserver, SessionRun, SKIPPED_AFTER_FINALIZE};
pub use outcome::{build_outcome, FALLBACK_SUMMARY};
pub use types::{
    ActionResult, Artifact, Findings, SessionError, SessionOutcome, SessionReport, Termination,
    TerminationKind,
};
