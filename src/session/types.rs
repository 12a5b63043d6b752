//! Core types for analysis sessions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::{ContentBlock, LlmError};

/// One rendered chart. Identified only by its position in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub title: String,
    /// Base64-encoded PNG
    pub image_base64: String,
    pub alt_text: String,
}

impl Artifact {
    /// Build the artifact stored at 1-based `position`.
    pub fn chart(position: usize, image_base64: String) -> Self {
        Self {
            title: format!("Chart {}", position),
            image_base64,
            alt_text: format!("Analysis chart {}", position),
        }
    }

    /// Decode the image payload.
    pub fn decode_image(&self) -> Result<Vec<u8>, base64::DecodeError> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.decode(self.image_base64.trim())
    }
}

/// Answer to one action request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub request_id: String,
    pub success: bool,
    pub text: String,
}

impl ActionResult {
    pub fn success(request_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: true,
            text: text.into(),
        }
    }

    pub fn failure(request_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            text: text.into(),
        }
    }
}

impl From<ActionResult> for ContentBlock {
    fn from(result: ActionResult) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: result.request_id,
            content: result.text,
            is_error: !result.success,
        }
    }
}

/// Narrative findings attached to a successful outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    pub executive_summary: String,
    #[serde(default)]
    pub focus_findings: String,
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Termination {
    /// The model called `finalize`.
    Finalized(Findings),
    /// The model answered without requesting any action.
    IdleStop,
    /// The iteration cap was reached.
    Exhausted,
}

impl Termination {
    pub fn kind(&self) -> TerminationKind {
        match self {
            Termination::Finalized(_) => TerminationKind::Finalized,
            Termination::IdleStop => TerminationKind::IdleStop,
            Termination::Exhausted => TerminationKind::Exhausted,
        }
    }
}

/// [`Termination`] without its payload, as recorded on outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationKind {
    Finalized,
    IdleStop,
    Exhausted,
}

impl TerminationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationKind::Finalized => "finalized",
            TerminationKind::IdleStop => "idle_stop",
            TerminationKind::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for TerminationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful analysis handed to report rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub artifacts: Vec<Artifact>,
    pub findings: Findings,
    /// `true` only when the model called `finalize`
    pub finalized: bool,
    /// Termination state that produced this report
    pub termination: TerminationKind,
    pub iterations: usize,
}

/// The single terminal result of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    Success(SessionReport),
    /// Nothing usable was produced (no finalize and no charts).
    NoUsableResult {
        termination: TerminationKind,
        iterations: usize,
    },
}

impl SessionOutcome {
    pub fn report(&self) -> Option<&SessionReport> {
        match self {
            SessionOutcome::Success(report) => Some(report),
            SessionOutcome::NoUsableResult { .. } => None,
        }
    }

    pub fn into_report(self) -> Option<SessionReport> {
        match self {
            SessionOutcome::Success(report) => Some(report),
            SessionOutcome::NoUsableResult { .. } => None,
        }
    }
}

/// Failures that end a session without an outcome.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The completion service could not produce a completion.
    #[error("completion request failed in iteration {iteration}: {source}")]
    Completion {
        iteration: usize,
        #[source]
        source: LlmError,
    },

    #[error("iteration cap must be at least 1")]
    InvalidIterationCap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_title_is_position_based() {
        let artifact = Artifact::chart(3, "aGVsbG8=".to_string());
        assert_eq!(artifact.title, "Chart 3");
        assert_eq!(artifact.alt_text, "Analysis chart 3");
        assert_eq!(artifact.decode_image().unwrap(), b"hello");
    }

    #[test]
    fn test_failed_result_becomes_error_block() {
        let block: ContentBlock = ActionResult::failure("call_9", "Error: boom").into();
        assert_eq!(
            block,
            ContentBlock::ToolResult {
                tool_use_id: "call_9".to_string(),
                content: "Error: boom".to_string(),
                is_error: true,
            }
        );
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = SessionOutcome::NoUsableResult {
            termination: TerminationKind::IdleStop,
            iterations: 1,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "no_usable_result");
        assert_eq!(value["termination"], "idle_stop");
    }
}
