//! Turns one action request into exactly one action result.
//!
//! Nothing escapes this boundary: argument errors, adapter errors and even
//! adapter panics come back as failure results so the session can continue.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;

use super::action::Action;
use super::artifacts::ArtifactAccumulator;
use super::types::{ActionResult, Findings};
use crate::adapters::{CodeExecutor, InsightSearch};
use crate::util::preview;

/// Result of dispatching one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// An ordinary result; the batch continues.
    Completed(ActionResult),
    /// `finalize` was called; the session ends after recording `result`.
    Finalized {
        result: ActionResult,
        findings: Findings,
    },
}

impl Dispatch {
    pub fn result(&self) -> &ActionResult {
        match self {
            Dispatch::Completed(result) | Dispatch::Finalized { result, .. } => result,
        }
    }
}

/// Routes actions to the session's adapters.
pub struct ToolDispatcher<'a> {
    executor: &'a dyn CodeExecutor,
    search: &'a dyn InsightSearch,
}

impl<'a> ToolDispatcher<'a> {
    pub fn new(executor: &'a dyn CodeExecutor, search: &'a dyn InsightSearch) -> Self {
        Self { executor, search }
    }

    /// Dispatch a raw request as issued by the model.
    pub async fn dispatch(
        &self,
        request_id: &str,
        name: &str,
        input: &Value,
        artifacts: &mut ArtifactAccumulator,
    ) -> Dispatch {
        match Action::parse(name, input) {
            Ok(action) => self.dispatch_action(request_id, action, artifacts).await,
            Err(e) => {
                tracing::warn!("Rejected action {} ({}): {}", name, request_id, e);
                Dispatch::Completed(ActionResult::failure(request_id, format!("Error: {}", e)))
            }
        }
    }

    pub async fn dispatch_action(
        &self,
        request_id: &str,
        action: Action,
        artifacts: &mut ArtifactAccumulator,
    ) -> Dispatch {
        match action {
            Action::ExecuteCode { code } => {
                Dispatch::Completed(self.execute_code(request_id, &code, artifacts).await)
            }
            Action::SearchInsights { query, context } => Dispatch::Completed(
                self.search_insights(request_id, &query, context.as_deref())
                    .await,
            ),
            Action::Finalize {
                executive_summary,
                focus_findings,
            } => {
                tracing::info!(
                    "Finalizing analysis with {} chart(s). Summary: {}",
                    artifacts.len(),
                    preview(&executive_summary, 100)
                );
                if !focus_findings.is_empty() {
                    tracing::info!("Focus findings: {}", preview(&focus_findings, 100));
                }
                Dispatch::Finalized {
                    result: ActionResult::success(
                        request_id,
                        format!("Analysis finalized with {} chart(s).", artifacts.len()),
                    ),
                    findings: Findings {
                        executive_summary,
                        focus_findings,
                    },
                }
            }
        }
    }

    async fn execute_code(
        &self,
        request_id: &str,
        code: &str,
        artifacts: &mut ArtifactAccumulator,
    ) -> ActionResult {
        let line_count = code.lines().count();
        tracing::debug!(
            "Executing code ({} lines):\n{}",
            line_count,
            code.lines().take(10).collect::<Vec<_>>().join("\n")
        );

        let outcome = AssertUnwindSafe(self.executor.run(code)).catch_unwind().await;
        let execution = match outcome {
            Ok(Ok(execution)) => execution,
            Ok(Err(e)) => {
                tracing::warn!("Code execution adapter failed: {}", e);
                return ActionResult::failure(request_id, format!("Execution error: {}", e));
            }
            Err(_) => {
                tracing::error!("Code execution adapter panicked");
                return ActionResult::failure(
                    request_id,
                    "Execution error: code execution adapter panicked",
                );
            }
        };

        if let Some(error) = execution.error {
            tracing::info!("Code raised {}: {}", error.name, error.value);
            return ActionResult::failure(
                request_id,
                format!("Error: {} - {}", error.name, error.value),
            );
        }

        let chart_count = execution.images.len();
        for image in execution.images {
            artifacts.append_chart(image);
        }

        let mut text = "Code executed successfully".to_string();
        if chart_count > 0 {
            text.push_str(&format!(" - Generated {} chart(s)", chart_count));
        }
        match execution.stdout {
            Some(stdout) => {
                text.push_str("\n\nCode Output:\n");
                text.push_str(&stdout);
            }
            None => tracing::debug!("No stdout captured"),
        }

        tracing::info!(
            "Code executed: {} new chart(s), {} total",
            chart_count,
            artifacts.len()
        );
        ActionResult::success(request_id, text)
    }

    async fn search_insights(
        &self,
        request_id: &str,
        query: &str,
        context: Option<&str>,
    ) -> ActionResult {
        tracing::info!("Searching insights: {}", query);

        let outcome = AssertUnwindSafe(self.search.search(query, context))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(findings)) => {
                tracing::debug!(
                    "Search returned {} characters: {}",
                    findings.len(),
                    preview(&findings, 500)
                );
                ActionResult::success(request_id, findings)
            }
            Ok(Err(e)) => {
                tracing::warn!("Search failed: {}", e);
                ActionResult::failure(request_id, format!("Search error: {}", e))
            }
            Err(_) => {
                tracing::error!("Search adapter panicked");
                ActionResult::failure(request_id, "Search error: search adapter panicked")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{Execution, ExecutionError};
    use crate::session::testing::{FakeExecutor, FakeSearch};
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_code_never_reaches_adapter() {
        let executor = FakeExecutor::new(vec![]);
        let search = FakeSearch::answering("unused");
        let dispatcher = ToolDispatcher::new(&executor, &search);
        let mut artifacts = ArtifactAccumulator::new();

        for input in [json!({}), json!({"code": ""})] {
            let dispatch = dispatcher
                .dispatch("call_1", "execute_code", &input, &mut artifacts)
                .await;
            let result = dispatch.result();
            assert!(!result.success);
            assert_eq!(result.request_id, "call_1");
        }
        assert_eq!(executor.calls(), 0);
        assert!(artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_successful_execution_appends_charts_and_output() {
        let executor = FakeExecutor::new(vec![Ok(Execution {
            stdout: Some("rows: 30".to_string()),
            images: vec!["png1".to_string(), "png2".to_string()],
            error: None,
        })]);
        let search = FakeSearch::answering("unused");
        let dispatcher = ToolDispatcher::new(&executor, &search);
        let mut artifacts = ArtifactAccumulator::new();
        artifacts.append_chart("earlier".to_string());

        let dispatch = dispatcher
            .dispatch("c", "execute_code", &json!({"code": "plot()"}), &mut artifacts)
            .await;

        assert_eq!(
            dispatch,
            Dispatch::Completed(ActionResult::success(
                "c",
                "Code executed successfully - Generated 2 chart(s)\n\nCode Output:\nrows: 30"
            ))
        );
        let snapshot = artifacts.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[1].title, "Chart 2");
        assert_eq!(snapshot[2].image_base64, "png2");
    }

    #[tokio::test]
    async fn test_execution_error_drops_output_and_charts() {
        let executor = FakeExecutor::new(vec![Ok(Execution {
            stdout: Some("partial".to_string()),
            images: vec!["png".to_string()],
            error: Some(ExecutionError {
                name: "NameError".to_string(),
                value: "name 'df' is not defined".to_string(),
                traceback: None,
            }),
        })]);
        let search = FakeSearch::answering("unused");
        let dispatcher = ToolDispatcher::new(&executor, &search);
        let mut artifacts = ArtifactAccumulator::new();

        let dispatch = dispatcher
            .dispatch("c", "execute_code", &json!({"code": "df"}), &mut artifacts)
            .await;

        assert_eq!(
            dispatch.result(),
            &ActionResult::failure("c", "Error: NameError - name 'df' is not defined")
        );
        assert!(artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_adapter_failure_and_panic_become_failures() {
        let executor = FakeExecutor::new(vec![Err("connection reset".to_string())]);
        let search = FakeSearch::panicking();
        let dispatcher = ToolDispatcher::new(&executor, &search);
        let mut artifacts = ArtifactAccumulator::new();

        let dispatch = dispatcher
            .dispatch("c", "execute_code", &json!({"code": "1"}), &mut artifacts)
            .await;
        assert!(!dispatch.result().success);
        assert!(dispatch.result().text.starts_with("Execution error:"));

        let dispatch = dispatcher
            .dispatch("s", "search_insights", &json!({"query": "sleep"}), &mut artifacts)
            .await;
        assert!(!dispatch.result().success);
        assert!(dispatch.result().text.starts_with("Search error:"));
    }

    #[tokio::test]
    async fn test_search_result_is_verbatim() {
        let executor = FakeExecutor::new(vec![]);
        let search = FakeSearch::answering("Magnesium may improve sleep quality.");
        let dispatcher = ToolDispatcher::new(&executor, &search);
        let mut artifacts = ArtifactAccumulator::new();

        let dispatch = dispatcher
            .dispatch(
                "s",
                "search_insights",
                &json!({"query": "sleep supplements", "context": "restless nights"}),
                &mut artifacts,
            )
            .await;

        assert_eq!(
            dispatch.result(),
            &ActionResult::success("s", "Magnesium may improve sleep quality.")
        );
        assert_eq!(
            search.queries(),
            vec![(
                "sleep supplements".to_string(),
                Some("restless nights".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn test_search_failure_is_reported() {
        let executor = FakeExecutor::new(vec![]);
        let search = FakeSearch::failing("EXA_API_KEY is not set");
        let dispatcher = ToolDispatcher::new(&executor, &search);
        let mut artifacts = ArtifactAccumulator::new();

        let dispatch = dispatcher
            .dispatch("s", "search_insights", &json!({"query": "x"}), &mut artifacts)
            .await;
        assert!(!dispatch.result().success);
        assert!(dispatch.result().text.contains("EXA_API_KEY is not set"));
    }

    #[tokio::test]
    async fn test_finalize_yields_findings() {
        let executor = FakeExecutor::new(vec![]);
        let search = FakeSearch::answering("unused");
        let dispatcher = ToolDispatcher::new(&executor, &search);
        let mut artifacts = ArtifactAccumulator::new();

        let dispatch = dispatcher
            .dispatch("f", "finalize", &json!({"executive_summary": "X"}), &mut artifacts)
            .await;

        match dispatch {
            Dispatch::Finalized { result, findings } => {
                assert!(result.success);
                assert_eq!(findings.executive_summary, "X");
                assert_eq!(findings.focus_findings, "");
            }
            other => panic!("expected finalize, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_action_is_a_failure_result() {
        let executor = FakeExecutor::new(vec![]);
        let search = FakeSearch::answering("unused");
        let dispatcher = ToolDispatcher::new(&executor, &search);
        let mut artifacts = ArtifactAccumulator::new();

        let dispatch = dispatcher
            .dispatch("u", "drop_tables", &json!({}), &mut artifacts)
            .await;
        assert!(!dispatch.result().success);
        assert!(dispatch.result().text.contains("Unknown action 'drop_tables'"));
    }
}
