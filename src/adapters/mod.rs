//! Capability adapters: the narrow boundaries to external services.
//!
//! - [`CodeExecutor`]: run code in the session's sandbox, get output and charts back
//! - [`DatasetUploader`]: stage a dataset file in the sandbox
//! - [`InsightSearch`]: research search returning free text
//!
//! A sandbox is opened once per analysis session through a [`SandboxProvider`]
//! and closed when the session ends. Variables and files written by one
//! `run` call are visible to later calls on the same handle; handles are
//! never shared between sessions.

mod sandbox;
mod search;

pub use sandbox::{HttpSandbox, HttpSandboxProvider};
pub use search::ExaSearch;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised at an adapter boundary.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AdapterError::Timeout(e.to_string())
        } else if e.is_decode() {
            AdapterError::InvalidResponse(e.to_string())
        } else {
            AdapterError::Transport(e.to_string())
        }
    }
}

/// Error raised by the executed code itself (not by the transport).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub traceback: Option<String>,
}

/// Outcome of one code execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    /// Captured standard output, `None` when nothing was printed
    pub stdout: Option<String>,
    /// Base64-encoded PNG images, in the order the sandbox produced them
    pub images: Vec<String>,
    /// Set when the code raised
    pub error: Option<ExecutionError>,
}

/// Runs code in a stateful execution environment.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn run(&self, code: &str) -> Result<Execution, AdapterError>;
}

/// Stages a dataset file where executed code can read it.
#[async_trait]
pub trait DatasetUploader: Send + Sync {
    /// Upload `content` as `name`, returning the path inside the sandbox.
    async fn upload(&self, name: &str, content: &str) -> Result<String, AdapterError>;
}

/// Research search over external sources.
#[async_trait]
pub trait InsightSearch: Send + Sync {
    async fn search(&self, query: &str, context: Option<&str>) -> Result<String, AdapterError>;
}

/// One session's sandbox handle.
#[async_trait]
pub trait SandboxSession: CodeExecutor + DatasetUploader {
    /// Identifier assigned by the sandbox service.
    fn id(&self) -> &str;

    fn as_executor(&self) -> &dyn CodeExecutor;

    fn as_uploader(&self) -> &dyn DatasetUploader;

    /// Tear the sandbox down. Errors are logged by the caller, never fatal.
    async fn close(self: Box<Self>) -> Result<(), AdapterError>;
}

/// Opens sandbox sessions.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn open(&self) -> Result<Box<dyn SandboxSession>, AdapterError>;
}
