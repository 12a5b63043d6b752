//! Configuration management for the end-of-day analyst.
//!
//! Configuration is read from environment variables (a `.env` file is loaded
//! first by the binaries):
//! - `OPENROUTER_API_KEY` - Required. API key for the completion service.
//! - `DEFAULT_MODEL` - Optional. Defaults to `anthropic/claude-sonnet-4`.
//! - `LLM_API_URL` - Optional. OpenAI-compatible chat completions endpoint.
//! - `MAX_TOKENS` - Optional. Output token limit per completion. Defaults to `4000`.
//! - `MAX_ITERATIONS` - Optional. Hard cap on analysis loop passes. Defaults to `20`.
//! - `SANDBOX_URL` - Optional. Code interpreter sandbox service. Defaults to `http://127.0.0.1:49999`.
//! - `SANDBOX_API_KEY` - Optional. Sent as `X-API-Key` to the sandbox service.
//! - `EXA_API_KEY` - Optional. Enables research search.
//! - `SEARCH_API_URL` / `SEARCH_MODEL` - Optional. Research search endpoint and model.
//! - `DATA_EXPORT_PATH` - Optional. Directory holding exported CSV datasets. Defaults to `data/export`.
//! - `REPORTS_DIR` - Optional. Where rendered HTML reports are written. Defaults to `reports`.
//! - `DELIVERY_WEBHOOK_URL` (or legacy `N8N_WEBHOOK_URL`) - Optional. Report delivery webhook.
//! - `ADAPTER_TIMEOUT_SECS` - Optional. Timeout for completion/sandbox/search calls. Defaults to `120`.
//! - `DELIVERY_TIMEOUT_SECS` - Optional. Timeout for the delivery webhook. Defaults to `120`.
//! - `ANALYSIS_TTL_HOURS` - Optional. Evict finished status records after this many hours (0 = never).
//! - `HOST` / `PORT` - Optional. Server bind address. Defaults to `127.0.0.1:8001`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::util::{env_var_non_empty, env_var_parse};

pub const DEFAULT_MAX_ITERATIONS: usize = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Completion service settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u64,
}

/// Code interpreter sandbox settings.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

/// Research search settings.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,

    pub sandbox: SandboxConfig,

    pub search: SearchConfig,

    /// Hard upper bound on analysis loop passes (always >= 1)
    pub max_iterations: usize,

    /// Directory with exported CSV datasets
    pub data_export_path: PathBuf,

    /// Directory for rendered HTML reports
    pub reports_dir: PathBuf,

    /// Report delivery webhook
    pub delivery_webhook_url: Option<String>,

    /// Timeout applied to every completion, sandbox and search request
    pub adapter_timeout: Duration,

    /// Timeout for the delivery webhook
    pub delivery_timeout: Duration,

    /// Finished status records older than this are evicted (None = keep forever)
    pub analysis_ttl: Option<Duration>,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_var_parse(name, default)
        .map_err(|(raw, e)| ConfigError::InvalidValue(name.to_string(), format!("{} ({})", raw, e)))
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set,
    /// and `ConfigError::InvalidValue` for unparseable numbers or a zero
    /// iteration cap.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env_var_non_empty("OPENROUTER_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let mut config = Self::new(
            api_key,
            env_var_non_empty("DEFAULT_MODEL")
                .unwrap_or_else(|| "anthropic/claude-sonnet-4".to_string()),
        );

        if let Some(url) = env_var_non_empty("LLM_API_URL") {
            config.llm.api_url = url;
        }
        config.llm.max_tokens = parse_var("MAX_TOKENS", config.llm.max_tokens)?;

        config.max_iterations = parse_var("MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS)?;
        if config.max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        if let Some(url) = env_var_non_empty("SANDBOX_URL") {
            config.sandbox.base_url = url;
        }
        config.sandbox.api_key = env_var_non_empty("SANDBOX_API_KEY");

        config.search.api_key = env_var_non_empty("EXA_API_KEY");
        if let Some(url) = env_var_non_empty("SEARCH_API_URL") {
            config.search.api_url = url;
        }
        if let Some(model) = env_var_non_empty("SEARCH_MODEL") {
            config.search.model = model;
        }

        if let Some(path) = env_var_non_empty("DATA_EXPORT_PATH") {
            config.data_export_path = PathBuf::from(path);
        }
        if let Some(path) = env_var_non_empty("REPORTS_DIR") {
            config.reports_dir = PathBuf::from(path);
        }
        config.delivery_webhook_url =
            env_var_non_empty("DELIVERY_WEBHOOK_URL").or_else(|| env_var_non_empty("N8N_WEBHOOK_URL"));

        config.adapter_timeout = Duration::from_secs(parse_var("ADAPTER_TIMEOUT_SECS", 120u64)?);
        config.delivery_timeout = Duration::from_secs(parse_var("DELIVERY_TIMEOUT_SECS", 120u64)?);

        let ttl_hours: u64 = parse_var("ANALYSIS_TTL_HOURS", 0)?;
        config.analysis_ttl = (ttl_hours > 0).then(|| Duration::from_secs(ttl_hours * 3600));

        if let Some(host) = env_var_non_empty("HOST") {
            config.host = host;
        }
        config.port = parse_var("PORT", config.port)?;

        Ok(config)
    }

    /// Create a config with default values (useful for testing).
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            llm: LlmConfig {
                api_key,
                api_url: crate::llm::OPENROUTER_API_URL.to_string(),
                model,
                max_tokens: 4000,
            },
            sandbox: SandboxConfig {
                base_url: "http://127.0.0.1:49999".to_string(),
                api_key: None,
            },
            search: SearchConfig {
                api_key: None,
                api_url: "https://api.exa.ai/chat/completions".to_string(),
                model: "exa-pro".to_string(),
            },
            max_iterations: DEFAULT_MAX_ITERATIONS,
            data_export_path: PathBuf::from("data/export"),
            reports_dir: PathBuf::from("reports"),
            delivery_webhook_url: None,
            adapter_timeout: Duration::from_secs(120),
            delivery_timeout: Duration::from_secs(120),
            analysis_ttl: None,
            host: "127.0.0.1".to_string(),
            port: 8001,
        }
    }
}
