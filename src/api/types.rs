//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::{Stage, WorkflowSummary};

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

/// Request to start an end-of-day analysis.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    /// Optional question or area to center the analysis on
    #[serde(default)]
    pub focus: Option<String>,
}

/// Response after starting an analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub status: AnalysisStatus,
    pub message: String,
    pub analysis_id: Uuid,
}

/// Analysis lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Accepted, not yet past its first checkpoint
    Started,
    Running,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }
}

/// One checkpoint line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
}

/// Tracked state of one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub status: AnalysisStatus,
    pub stage: Stage,
    /// Latest checkpoint message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    pub iteration: usize,
    pub max_iterations: usize,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<WorkflowSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Served by the logs endpoint only
    #[serde(skip)]
    pub logs: Vec<LogEntry>,
}

/// Checkpoint log of one analysis.
#[derive(Debug, Clone, Serialize)]
pub struct LogsResponse {
    pub analysis_id: Uuid,
    pub status: AnalysisStatus,
    pub logs: Vec<LogEntry>,
}
