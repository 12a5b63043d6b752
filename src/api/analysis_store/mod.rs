//! Status tracking for analyses started through the API.
//!
//! Records are inserted when an analysis is accepted, updated at every
//! workflow checkpoint and removed either explicitly or by age once
//! finished.

mod memory;

pub use memory::InMemoryAnalysisStore;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::types::AnalysisRecord;
use crate::workflow::{Stage, WorkflowSummary};

/// Get current timestamp as RFC3339 string.
pub fn now_string() -> String {
    Utc::now().to_rfc3339()
}

/// Analysis store trait.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Insert a new record in `started` state.
    async fn create(
        &self,
        focus: Option<&str>,
        max_iterations: usize,
    ) -> Result<AnalysisRecord, String>;

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisRecord>, String>;

    /// All records, newest first.
    async fn list(&self) -> Result<Vec<AnalysisRecord>, String>;

    /// Record a stage change; moves the analysis to `running`.
    async fn record_stage(&self, id: Uuid, stage: Stage, message: &str) -> Result<(), String>;

    async fn record_iteration(
        &self,
        id: Uuid,
        iteration: usize,
        max_iterations: usize,
    ) -> Result<(), String>;

    async fn complete(&self, id: Uuid, summary: WorkflowSummary) -> Result<(), String>;

    async fn fail(&self, id: Uuid, error: &str) -> Result<(), String>;

    /// Remove a record. Returns whether it existed.
    async fn evict(&self, id: Uuid) -> Result<bool, String>;

    /// Remove finished records last updated more than `age` ago.
    async fn evict_finished_older_than(&self, age: Duration) -> Result<usize, String>;
}
