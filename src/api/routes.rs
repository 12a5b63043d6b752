//! HTTP route handlers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::Config;
use crate::workflow::{EndOfDayWorkflow, ProgressReporter, Stage};

use super::analysis_store::{now_string, AnalysisStore, InMemoryAnalysisStore};
use super::types::*;

/// How often the sweeper checks for expired records, at most.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Status records of analyses started through the API
    pub store: Arc<dyn AnalysisStore>,
    pub workflow: Arc<EndOfDayWorkflow>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let workflow = Arc::new(EndOfDayWorkflow::from_config(&config));
        Self {
            config,
            store: Arc::new(InMemoryAnalysisStore::new()),
            workflow,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/analyses", get(list_analyses))
        .route(
            "/api/status/:id",
            get(get_status).delete(delete_analysis),
        )
        .route("/api/logs/:id", get(get_logs))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    if let Some(ttl) = config.analysis_ttl {
        spawn_ttl_sweeper(Arc::clone(&state.store), ttl);
    }

    let app = router(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Periodically evict finished analyses older than `ttl`.
fn spawn_ttl_sweeper(store: Arc<dyn AnalysisStore>, ttl: Duration) {
    let period = ttl.min(MAX_SWEEP_INTERVAL);
    tracing::info!(
        "Evicting finished analyses after {:?} (checking every {:?})",
        ttl,
        period
    );
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match store.evict_finished_older_than(ttl).await {
                Ok(0) => {}
                Ok(n) => tracing::info!("Evicted {} expired analysis record(s)", n),
                Err(e) => tracing::warn!("Failed to evict expired analyses: {}", e),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Forwards workflow checkpoints into the status store.
struct StoreReporter {
    store: Arc<dyn AnalysisStore>,
    id: Uuid,
}

#[async_trait]
impl ProgressReporter for StoreReporter {
    async fn stage(&self, stage: Stage, message: &str) {
        tracing::info!("[{}] [{}] {}", self.id, stage, message);
        if let Err(e) = self.store.record_stage(self.id, stage, message).await {
            tracing::warn!("Failed to record stage for {}: {}", self.id, e);
        }
    }

    async fn iteration(&self, iteration: usize, max_iterations: usize) {
        if let Err(e) = self
            .store
            .record_iteration(self.id, iteration, max_iterations)
            .await
        {
            tracing::warn!("Failed to record iteration for {}: {}", self.id, e);
        }
    }
}

async fn run_analysis(state: Arc<AppState>, id: Uuid, focus: Option<String>) {
    let reporter = StoreReporter {
        store: Arc::clone(&state.store),
        id,
    };
    let recorded = match state.workflow.run(focus.as_deref(), &reporter).await {
        Ok(summary) => {
            tracing::info!("Analysis {} completed: {}", id, summary.message);
            state.store.complete(id, summary).await
        }
        Err(e) => {
            tracing::error!("Analysis {} failed: {}", id, e);
            state.store.fail(id, &e.to_string()).await
        }
    };
    if let Err(e) = recorded {
        tracing::warn!("Failed to record result of analysis {}: {}", id, e);
    }
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: now_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Start an analysis in the background.
async fn analyze(
    State(state): State<Arc<AppState>>,
    body: Option<Json<AnalyzeRequest>>,
) -> Result<Json<AnalyzeResponse>, (StatusCode, String)> {
    let Json(req) = body.unwrap_or_default();
    let focus = req
        .focus
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());

    let record = state
        .store
        .create(focus.as_deref(), state.config.max_iterations)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?;
    let id = record.id;

    let message = match &focus {
        Some(focus) => format!("End-of-day analysis started with focus on '{}'", focus),
        None => "End-of-day analysis started".to_string(),
    };
    tracing::info!("{} ({})", message, id);

    tokio::spawn(run_analysis(Arc::clone(&state), id, focus));

    Ok(Json(AnalyzeResponse {
        status: record.status,
        message,
        analysis_id: id,
    }))
}

async fn find(state: &AppState, id: Uuid) -> Result<AnalysisRecord, (StatusCode, String)> {
    state
        .store
        .get(id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Analysis {} not found", id)))
}

/// Get an analysis's status and result.
async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisRecord>, (StatusCode, String)> {
    find(&state, id).await.map(Json)
}

/// Get an analysis's checkpoint log.
async fn get_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LogsResponse>, (StatusCode, String)> {
    let record = find(&state, id).await?;
    Ok(Json(LogsResponse {
        analysis_id: record.id,
        status: record.status,
        logs: record.logs,
    }))
}

/// List all tracked analyses, newest first.
async fn list_analyses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AnalysisRecord>>, (StatusCode, String)> {
    state
        .store
        .list()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))
}

/// Drop an analysis record.
async fn delete_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let removed = state
        .store
        .evict(id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("Analysis {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_empty_data() -> (Arc<AppState>, tempfile::TempDir) {
        let data = tempfile::tempdir().unwrap();
        let mut config = Config::new("sk-test".to_string(), "test/model".to_string());
        config.data_export_path = data.path().to_path_buf();
        config.reports_dir = data.path().join("reports");
        (Arc::new(AppState::new(config)), data)
    }

    async fn wait_until_finished(state: &AppState, id: Uuid) -> AnalysisRecord {
        for _ in 0..100 {
            let record = state.store.get(id).await.unwrap().unwrap();
            if record.status.is_finished() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("analysis {} did not finish", id);
    }

    #[tokio::test]
    async fn test_health() {
        let Json(response) = health().await;
        assert_eq!(response.status, "healthy");
        assert!(!response.timestamp.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_without_data_fails_in_background() {
        let (state, _data) = state_with_empty_data();

        let Json(response) = analyze(
            State(Arc::clone(&state)),
            Some(Json(AnalyzeRequest {
                focus: Some("  energy levels ".to_string()),
            })),
        )
        .await
        .unwrap();
        assert_eq!(response.status, AnalysisStatus::Started);
        assert!(response.message.contains("'energy levels'"));

        let record = wait_until_finished(&state, response.analysis_id).await;
        assert_eq!(record.status, AnalysisStatus::Failed);
        assert!(record.error.unwrap().contains("No CSV data files found"));
        assert_eq!(record.focus.as_deref(), Some("energy levels"));

        let Json(logs) = get_logs(State(Arc::clone(&state)), Path(response.analysis_id))
            .await
            .unwrap();
        assert_eq!(logs.status, AnalysisStatus::Failed);
        assert_eq!(logs.logs.first().unwrap().message, "Analysis started");
        assert!(logs.logs.last().unwrap().message.starts_with("Analysis failed"));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let (state, _data) = state_with_empty_data();
        let id = Uuid::new_v4();

        let err = get_status(State(Arc::clone(&state)), Path(id)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        let err = get_logs(State(Arc::clone(&state)), Path(id)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        let err = delete_analysis(State(state), Path(id)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let (state, _data) = state_with_empty_data();
        let first = state.store.create(None, 20).await.unwrap();
        let second = state.store.create(Some("sleep"), 20).await.unwrap();

        let Json(records) = list_analyses(State(Arc::clone(&state))).await.unwrap();
        assert_eq!(records.len(), 2);

        let status = delete_analysis(State(Arc::clone(&state)), Path(first.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(records) = list_analyses(State(Arc::clone(&state))).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, second.id);

        let Json(record) = get_status(State(state), Path(second.id)).await.unwrap();
        assert_eq!(record.status, AnalysisStatus::Started);
    }

    #[test]
    fn test_record_serialization_hides_logs() {
        let record = AnalysisRecord {
            id: Uuid::new_v4(),
            status: AnalysisStatus::Running,
            stage: Stage::Analyzing,
            message: "Analysis iteration 3/20".to_string(),
            focus: None,
            iteration: 3,
            max_iterations: 20,
            created_at: now_string(),
            updated_at: now_string(),
            result: None,
            error: None,
            logs: vec![LogEntry {
                timestamp: now_string(),
                message: "Analysis started".to_string(),
            }],
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "running");
        assert_eq!(value["stage"], "analyzing");
        assert_eq!(value["iteration"], 3);
        assert!(value.get("logs").is_none());
        assert!(value.get("focus").is_none());
    }
}
