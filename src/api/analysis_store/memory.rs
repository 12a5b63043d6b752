//! In-memory analysis store (non-persistent).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{now_string, AnalysisStore};
use crate::api::types::{AnalysisRecord, AnalysisStatus, LogEntry};
use crate::workflow::{Stage, WorkflowSummary};

#[derive(Clone, Default)]
pub struct InMemoryAnalysisStore {
    records: Arc<RwLock<HashMap<Uuid, AnalysisRecord>>>,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, id: Uuid, message: String, apply: F) -> Result<(), String>
    where
        F: FnOnce(&mut AnalysisRecord) + Send,
    {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| format!("Analysis {} not found", id))?;
        apply(record);
        let now = now_string();
        record.logs.push(LogEntry {
            timestamp: now.clone(),
            message: message.clone(),
        });
        record.message = message;
        record.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn create(
        &self,
        focus: Option<&str>,
        max_iterations: usize,
    ) -> Result<AnalysisRecord, String> {
        let now = now_string();
        let message = "Analysis started".to_string();
        let record = AnalysisRecord {
            id: Uuid::new_v4(),
            status: AnalysisStatus::Started,
            stage: Stage::Initializing,
            message: message.clone(),
            focus: focus.map(|s| s.to_string()),
            iteration: 0,
            max_iterations,
            created_at: now.clone(),
            updated_at: now.clone(),
            result: None,
            error: None,
            logs: vec![LogEntry {
                timestamp: now,
                message,
            }],
        };
        self.records
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisRecord>, String> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<AnalysisRecord>, String> {
        let mut records: Vec<AnalysisRecord> =
            self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn record_stage(&self, id: Uuid, stage: Stage, message: &str) -> Result<(), String> {
        self.update(id, message.to_string(), |record| {
            record.stage = stage;
            if !record.status.is_finished() {
                record.status = AnalysisStatus::Running;
            }
        })
        .await
    }

    async fn record_iteration(
        &self,
        id: Uuid,
        iteration: usize,
        max_iterations: usize,
    ) -> Result<(), String> {
        let message = format!("Analysis iteration {}/{}", iteration, max_iterations);
        self.update(id, message, |record| {
            record.iteration = iteration;
            record.max_iterations = max_iterations;
        })
        .await
    }

    async fn complete(&self, id: Uuid, summary: WorkflowSummary) -> Result<(), String> {
        let message = summary.message.clone();
        self.update(id, message, |record| {
            record.status = AnalysisStatus::Completed;
            record.stage = Stage::Finished;
            record.result = Some(summary);
        })
        .await
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<(), String> {
        self.update(id, format!("Analysis failed: {}", error), |record| {
            record.status = AnalysisStatus::Failed;
            record.error = Some(error.to_string());
        })
        .await
    }

    async fn evict(&self, id: Uuid) -> Result<bool, String> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn evict_finished_older_than(&self, age: Duration) -> Result<usize, String> {
        let age = chrono::Duration::from_std(age).map_err(|e| e.to_string())?;
        let cutoff = Utc::now() - age;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| {
            let expired = record.status.is_finished()
                && chrono::DateTime::parse_from_rfc3339(&record.updated_at)
                    .map(|t| t <= cutoff)
                    .unwrap_or(false);
            !expired
        });
        Ok(before - records.len())
    }
}
