//! The end-of-day analysis workflow.
//!
//! Discovers exported datasets, opens a sandbox, stages the data, runs one
//! analysis session, renders the report and optionally delivers it. The
//! sandbox is closed on every path once it has been opened.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::{
    AdapterError, ExaSearch, HttpSandboxProvider, InsightSearch, SandboxProvider, SandboxSession,
};
use crate::config::Config;
use crate::datasets::{discover_csv_files, load_csv_files, stage_datasets, StagedDataset};
use crate::delivery::{DeliveryStatus, ReportDelivery, WebhookDelivery};
use crate::llm::{ChatOptions, LlmClient, OpenRouterClient};
use crate::prompt::analysis_prompt;
use crate::report::{render_html_report, save_report};
use crate::session::{
    ConversationDriver, IterationObserver, SessionError, SessionOutcome, SessionReport,
    TerminationKind,
};

/// Coarse progress of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initializing,
    Staging,
    Analyzing,
    Rendering,
    Delivering,
    Finished,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Initializing => "initializing",
            Stage::Staging => "staging",
            Stage::Analyzing => "analyzing",
            Stage::Rendering => "rendering",
            Stage::Delivering => "delivering",
            Stage::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Receives checkpoints while a workflow runs.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn stage(&self, stage: Stage, message: &str);

    async fn iteration(&self, iteration: usize, max_iterations: usize);
}

/// Reporter that only logs.
pub struct LogReporter;

#[async_trait]
impl ProgressReporter for LogReporter {
    async fn stage(&self, stage: Stage, message: &str) {
        tracing::info!("[{}] {}", stage, message);
    }

    async fn iteration(&self, iteration: usize, max_iterations: usize) {
        tracing::info!("[analyzing] iteration {}/{}", iteration, max_iterations);
    }
}

struct IterationForwarder<'a>(&'a dyn ProgressReporter);

#[async_trait]
impl IterationObserver for IterationForwarder<'_> {
    async fn iteration_started(&self, iteration: usize, max_iterations: usize) {
        self.0.iteration(iteration, max_iterations).await;
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("No CSV data files found in {0}")]
    NoData(String),

    #[error("Failed to load any CSV files from {0}")]
    LoadFailed(String),

    #[error("Failed to open analysis sandbox: {0}")]
    Sandbox(#[from] AdapterError),

    #[error("Failed to upload files to analysis sandbox")]
    UploadFailed,

    #[error("Analysis produced no usable result ({termination} after {iterations} iteration(s))")]
    NoUsableResult {
        termination: TerminationKind,
        iterations: usize,
    },

    #[error("Analysis session failed: {0}")]
    Session(#[from] SessionError),
}

/// What happened to the rendered report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryReport {
    NotConfigured,
    Delivered,
    Accepted { warning: String },
    Failed { error: String },
}

/// Result of a successful workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub chart_count: usize,
    pub file_count: usize,
    pub iterations: usize,
    pub finalized: bool,
    pub delivery: DeliveryReport,
    pub report_path: Option<PathBuf>,
    pub message: String,
}

pub struct EndOfDayWorkflow {
    driver: ConversationDriver,
    sandbox: Arc<dyn SandboxProvider>,
    search: Arc<dyn InsightSearch>,
    delivery: Option<Arc<dyn ReportDelivery>>,
    data_dir: PathBuf,
    reports_dir: PathBuf,
}

impl EndOfDayWorkflow {
    pub fn new(
        driver: ConversationDriver,
        sandbox: Arc<dyn SandboxProvider>,
        search: Arc<dyn InsightSearch>,
        data_dir: impl Into<PathBuf>,
        reports_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            driver,
            sandbox,
            search,
            delivery: None,
            data_dir: data_dir.into(),
            reports_dir: reports_dir.into(),
        }
    }

    pub fn with_delivery(mut self, delivery: Arc<dyn ReportDelivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// Wire the production adapters from configuration.
    pub fn from_config(config: &Config) -> Self {
        let llm: Arc<dyn LlmClient> = Arc::new(
            OpenRouterClient::new(config.llm.api_key.clone())
                .with_api_url(config.llm.api_url.clone())
                .with_timeout(config.adapter_timeout),
        );
        let driver = ConversationDriver::new(llm, config.llm.model.clone())
            .with_max_iterations(config.max_iterations)
            .with_options(ChatOptions {
                temperature: None,
                max_tokens: Some(config.llm.max_tokens),
            });

        let workflow = Self::new(
            driver,
            Arc::new(HttpSandboxProvider::new(&config.sandbox, config.adapter_timeout)),
            Arc::new(ExaSearch::new(&config.search, config.adapter_timeout)),
            config.data_export_path.clone(),
            config.reports_dir.clone(),
        );

        match &config.delivery_webhook_url {
            Some(url) => {
                workflow.with_delivery(Arc::new(WebhookDelivery::new(url, config.delivery_timeout)))
            }
            None => workflow,
        }
    }

    /// Run the whole workflow once.
    pub async fn run(
        &self,
        focus: Option<&str>,
        reporter: &dyn ProgressReporter,
    ) -> Result<WorkflowSummary, WorkflowError> {
        let focus = focus.map(str::trim).filter(|f| !f.is_empty());
        match focus {
            Some(focus) => tracing::info!("Starting end-of-day analysis with focus on '{}'", focus),
            None => tracing::info!("Starting end-of-day analysis"),
        }

        reporter
            .stage(Stage::Initializing, "Discovering datasets")
            .await;
        let dir = self.data_dir.display().to_string();
        let names = discover_csv_files(&self.data_dir).await;
        if names.is_empty() {
            return Err(WorkflowError::NoData(dir));
        }
        let files = load_csv_files(&self.data_dir, &names).await;
        if files.is_empty() {
            return Err(WorkflowError::LoadFailed(dir));
        }

        reporter
            .stage(
                Stage::Staging,
                &format!("Uploading {} dataset(s)", files.len()),
            )
            .await;
        let sandbox = self.sandbox.open().await?;
        tracing::info!("Opened sandbox {}", sandbox.id());

        let analysis = self.analyze(sandbox.as_ref(), &files, focus, reporter).await;

        let sandbox_id = sandbox.id().to_string();
        match sandbox.close().await {
            Ok(()) => tracing::info!("Closed sandbox {}", sandbox_id),
            Err(e) => tracing::warn!("Failed to close sandbox {}: {}", sandbox_id, e),
        }

        let (staged, report) = analysis?;
        self.publish(&staged, report, reporter).await
    }

    async fn analyze(
        &self,
        sandbox: &dyn SandboxSession,
        files: &[(String, String)],
        focus: Option<&str>,
        reporter: &dyn ProgressReporter,
    ) -> Result<(Vec<StagedDataset>, SessionReport), WorkflowError> {
        let staged = stage_datasets(sandbox.as_uploader(), files).await;
        if staged.is_empty() {
            return Err(WorkflowError::UploadFailed);
        }

        reporter
            .stage(
                Stage::Analyzing,
                &format!("Analyzing {} dataset(s)", staged.len()),
            )
            .await;
        let prompt = analysis_prompt(&staged, focus, self.driver.max_iterations());
        let forwarder = IterationForwarder(reporter);
        let run = self
            .driver
            .run(
                &prompt,
                sandbox.as_executor(),
                self.search.as_ref(),
                Some(&forwarder),
            )
            .await?;

        match run.outcome {
            SessionOutcome::Success(report) => Ok((staged, report)),
            SessionOutcome::NoUsableResult {
                termination,
                iterations,
            } => Err(WorkflowError::NoUsableResult {
                termination,
                iterations,
            }),
        }
    }

    async fn publish(
        &self,
        staged: &[StagedDataset],
        report: SessionReport,
        reporter: &dyn ProgressReporter,
    ) -> Result<WorkflowSummary, WorkflowError> {
        let chart_count = report.artifacts.len();
        reporter
            .stage(
                Stage::Rendering,
                &format!("Rendering report with {} chart(s)", chart_count),
            )
            .await;
        let html = render_html_report(staged, &report);
        let report_path = match save_report(&self.reports_dir, &html).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Failed to save HTML report: {}", e);
                None
            }
        };

        let delivery = match &self.delivery {
            Some(delivery) => {
                reporter.stage(Stage::Delivering, "Sending report").await;
                match delivery.deliver(&html).await {
                    Ok(DeliveryStatus::Delivered { .. }) => DeliveryReport::Delivered,
                    Ok(DeliveryStatus::Accepted { warning }) => DeliveryReport::Accepted { warning },
                    Err(e) => DeliveryReport::Failed {
                        error: e.to_string(),
                    },
                }
            }
            None => DeliveryReport::NotConfigured,
        };

        let message = match &delivery {
            DeliveryReport::Delivered | DeliveryReport::Accepted { .. } => format!(
                "End-of-day analysis complete! Generated {} charts and sent the report.",
                chart_count
            ),
            DeliveryReport::Failed { error } => format!(
                "Analysis completed ({} charts) but delivery failed: {}",
                chart_count, error
            ),
            DeliveryReport::NotConfigured => format!(
                "End-of-day analysis complete! Generated {} charts. Delivery not configured.",
                chart_count
            ),
        };
        match &delivery {
            DeliveryReport::Failed { .. } => tracing::warn!("{}", message),
            _ => tracing::info!("{}", message),
        }
        reporter.stage(Stage::Finished, &message).await;

        Ok(WorkflowSummary {
            chart_count,
            file_count: staged.len(),
            iterations: report.iterations,
            finalized: report.finalized,
            delivery,
            report_path,
            message,
        })
    }
}
