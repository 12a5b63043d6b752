//! Builds the terminal [`SessionOutcome`] from whatever the loop produced.

use super::types::{
    Artifact, Findings, SessionOutcome, SessionReport, Termination, TerminationKind,
};

/// Summary used when charts exist but the model never called `finalize`.
pub const FALLBACK_SUMMARY: &str = "Analysis completed but ended without explicit finalization. \
Charts were generated successfully.";

/// Decide the session's single result.
///
/// A finalized session always succeeds, even with zero charts. Otherwise
/// the session succeeds with [`FALLBACK_SUMMARY`] only if charts exist.
pub fn build_outcome(
    termination: Termination,
    artifacts: Vec<Artifact>,
    iterations: usize,
) -> SessionOutcome {
    match termination {
        Termination::Finalized(findings) => SessionOutcome::Success(SessionReport {
            artifacts,
            findings,
            finalized: true,
            termination: TerminationKind::Finalized,
            iterations,
        }),
        other if !artifacts.is_empty() => {
            tracing::info!(
                "Session ended ({}) with {} chart(s) and no finalize; using fallback summary",
                other.kind(),
                artifacts.len()
            );
            SessionOutcome::Success(SessionReport {
                artifacts,
                findings: Findings {
                    executive_summary: FALLBACK_SUMMARY.to_string(),
                    focus_findings: String::new(),
                },
                finalized: false,
                termination: other.kind(),
                iterations,
            })
        }
        other => {
            tracing::warn!(
                "Session ended ({}) after {} iteration(s) with nothing usable",
                other.kind(),
                iterations
            );
            SessionOutcome::NoUsableResult {
                termination: other.kind(),
                iterations,
            }
        }
    }
}
