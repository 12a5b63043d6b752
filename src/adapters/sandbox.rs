//! HTTP client for a code interpreter sandbox service.
//!
//! Protocol:
//! - `POST /sandboxes` -> `{"sandbox_id": "..."}`
//! - `POST /sandboxes/{id}/execute` `{"code": "..."}` ->
//!   `{"results": [{"png": "...", "text": "..."}], "logs": {"stdout": [..], "stderr": [..]}, "error": {...}}`
//! - `POST /sandboxes/{id}/files` `{"path": "...", "content": "..."}` -> `{"path": "..."}`
//! - `DELETE /sandboxes/{id}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use super::{
    AdapterError, CodeExecutor, DatasetUploader, Execution, ExecutionError, SandboxProvider,
    SandboxSession,
};
use crate::config::SandboxConfig;

/// Opens sandboxes on the configured service.
pub struct HttpSandboxProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSandboxProvider {
    pub fn new(config: &SandboxConfig, timeout: Duration) -> Self {
        Self {
            client: crate::util::http_client(timeout),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

fn authorize(request: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    match api_key {
        Some(key) => request.header("X-API-Key", key),
        None => request,
    }
}

/// Turn a non-2xx response into an `AdapterError::Status`.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AdapterError::Status {
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Deserialize)]
struct CreateSandboxResponse {
    sandbox_id: String,
}

#[async_trait]
impl SandboxProvider for HttpSandboxProvider {
    async fn open(&self) -> Result<Box<dyn SandboxSession>, AdapterError> {
        let url = format!("{}/sandboxes", self.base_url);
        let response = authorize(self.client.post(&url), self.api_key.as_deref())
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let created: CreateSandboxResponse = check_status(response).await?.json().await?;

        tracing::info!("Opened sandbox {}", created.sandbox_id);
        Ok(Box::new(HttpSandbox {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            id: created.sandbox_id,
        }))
    }
}

/// A single sandbox owned by one analysis session.
pub struct HttpSandbox {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    id: String,
}

impl HttpSandbox {
    fn url(&self, suffix: &str) -> String {
        format!("{}/sandboxes/{}{}", self.base_url, self.id, suffix)
    }
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    results: Vec<ExecuteResult>,
    #[serde(default)]
    logs: ExecuteLogs,
    #[serde(default)]
    error: Option<ExecutionError>,
}

#[derive(Debug, Deserialize)]
struct ExecuteResult {
    #[serde(default)]
    png: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExecuteLogs {
    #[serde(default)]
    stdout: Vec<String>,
    #[serde(default)]
    stderr: Vec<String>,
}

impl From<ExecuteResponse> for Execution {
    fn from(response: ExecuteResponse) -> Self {
        let mut output = response.logs.stdout.join("\n");
        let mut images = Vec::new();
        for result in response.results {
            if let Some(text) = result.text.filter(|t| !t.is_empty()) {
                output.push('\n');
                output.push_str(&text);
            }
            if let Some(png) = result.png.filter(|p| !p.is_empty()) {
                images.push(png);
            }
        }
        if !response.logs.stderr.is_empty() {
            tracing::debug!("Sandbox stderr: {}", response.logs.stderr.join("\n"));
        }

        let trimmed = output.trim();
        Execution {
            stdout: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            images,
            error: response.error,
        }
    }
}

#[async_trait]
impl CodeExecutor for HttpSandbox {
    async fn run(&self, code: &str) -> Result<Execution, AdapterError> {
        let response = authorize(self.client.post(self.url("/execute")), self.api_key.as_deref())
            .json(&ExecuteRequest { code })
            .send()
            .await?;
        let parsed: ExecuteResponse = check_status(response).await?.json().await?;
        Ok(parsed.into())
    }
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    path: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    path: String,
}

#[async_trait]
impl DatasetUploader for HttpSandbox {
    async fn upload(&self, name: &str, content: &str) -> Result<String, AdapterError> {
        let response = authorize(self.client.post(self.url("/files")), self.api_key.as_deref())
            .json(&UploadRequest {
                path: name,
                content,
            })
            .send()
            .await?;
        let uploaded: UploadResponse = check_status(response).await?.json().await?;
        tracing::info!("Uploaded {} to sandbox at {}", name, uploaded.path);
        Ok(uploaded.path)
    }
}

#[async_trait]
impl SandboxSession for HttpSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn as_executor(&self) -> &dyn CodeExecutor {
        self
    }

    fn as_uploader(&self) -> &dyn DatasetUploader {
        self
    }

    async fn close(self: Box<Self>) -> Result<(), AdapterError> {
        let response = authorize(self.client.delete(self.url("")), self.api_key.as_deref())
            .send()
            .await?;
        check_status(response).await?;
        tracing::info!("Closed sandbox {}", self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_sandbox(server: &mut mockito::Server) -> Box<dyn SandboxSession> {
        open_sandbox_with_timeout(server, Duration::from_secs(5)).await
    }

    async fn open_sandbox_with_timeout(
        server: &mut mockito::Server,
        timeout: Duration,
    ) -> Box<dyn SandboxSession> {
        server
            .mock("POST", "/sandboxes")
            .match_header("x-api-key", "sandbox-key")
            .with_status(201)
            .with_body(r#"{"sandbox_id": "sbx-1"}"#)
            .create_async()
            .await;

        let config = SandboxConfig {
            base_url: format!("{}/", server.url()),
            api_key: Some("sandbox-key".to_string()),
        };
        HttpSandboxProvider::new(&config, timeout)
            .open()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_execute_collects_images_and_output() {
        let mut server = mockito::Server::new_async().await;
        let sandbox = open_sandbox(&mut server).await;
        assert_eq!(sandbox.id(), "sbx-1");

        let mock = server
            .mock("POST", "/sandboxes/sbx-1/execute")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"code": "plot()"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(
                r#"{
                    "results": [
                        {"png": "iVBORw0KGgo=", "text": "<Figure size 640x480>"},
                        {"png": "iVBORw0KGgp="},
                        {"text": "mean=7.2"}
                    ],
                    "logs": {"stdout": ["rows: 30"], "stderr": []}
                }"#,
            )
            .create_async()
            .await;

        let execution = sandbox.as_executor().run("plot()").await.unwrap();
        assert_eq!(execution.images, vec!["iVBORw0KGgo=", "iVBORw0KGgp="]);
        assert_eq!(
            execution.stdout.as_deref(),
            Some("rows: 30\n<Figure size 640x480>\nmean=7.2")
        );
        assert!(execution.error.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_execute_reports_code_error() {
        let mut server = mockito::Server::new_async().await;
        let sandbox = open_sandbox(&mut server).await;
        server
            .mock("POST", "/sandboxes/sbx-1/execute")
            .with_status(200)
            .with_body(r#"{"results": [], "error": {"name": "KeyError", "value": "'date'"}}"#)
            .create_async()
            .await;

        let execution = sandbox.as_executor().run("df['date']").await.unwrap();
        let error = execution.error.unwrap();
        assert_eq!(error.name, "KeyError");
        assert_eq!(error.value, "'date'");
        assert!(execution.stdout.is_none());
    }

    #[tokio::test]
    async fn test_upload_and_close() {
        let mut server = mockito::Server::new_async().await;
        let sandbox = open_sandbox(&mut server).await;
        server
            .mock("POST", "/sandboxes/sbx-1/files")
            .with_status(200)
            .with_body(r#"{"path": "/home/user/sleep.csv"}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/sandboxes/sbx-1")
            .with_status(204)
            .create_async()
            .await;

        let path = sandbox
            .as_uploader()
            .upload("sleep.csv", "date,hours\n2024-01-01,7")
            .await
            .unwrap();
        assert_eq!(path, "/home/user/sleep.csv");

        sandbox.close().await.unwrap();
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_service_error_status_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let sandbox = open_sandbox(&mut server).await;
        server
            .mock("POST", "/sandboxes/sbx-1/execute")
            .with_status(503)
            .with_body("kernel restarting")
            .create_async()
            .await;

        let err = sandbox.as_executor().run("1 + 1").await.unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Status { status: 503, ref body } if body == "kernel restarting"
        ));
    }

    #[tokio::test]
    async fn test_slow_execution_times_out_into_failed_result() {
        use crate::session::testing::FakeSearch;
        use crate::session::{ArtifactAccumulator, ToolDispatcher};
        use std::io::Write;

        let mut server = mockito::Server::new_async().await;
        let sandbox = open_sandbox_with_timeout(&mut server, Duration::from_millis(200)).await;
        server
            .mock("POST", "/sandboxes/sbx-1/execute")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_secs(2));
                w.write_all(br#"{"results": []}"#)
            })
            .expect_at_least(1)
            .create_async()
            .await;

        let err = sandbox.as_executor().run("slow()").await.unwrap_err();
        assert!(matches!(err, AdapterError::Timeout(_)), "got {:?}", err);

        let search = FakeSearch::answering("unused");
        let dispatcher = ToolDispatcher::new(sandbox.as_executor(), &search);
        let mut artifacts = ArtifactAccumulator::new();
        let result = dispatcher
            .dispatch(
                "call_1",
                "execute_code",
                &serde_json::json!({"code": "slow()"}),
                &mut artifacts,
            )
            .await
            .result()
            .clone();
        assert!(!result.success);
        assert!(result.text.starts_with("Execution error:"));
        assert!(artifacts.is_empty());
    }
}
