//! Research search through Exa's OpenAI-compatible answer endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AdapterError, InsightSearch};
use crate::config::SearchConfig;

const RESEARCH_SYSTEM_PROMPT: &str = "You are a health and fitness research assistant. \
Provide evidence-based insights, recommendations, and scientific context for quantified self \
data analysis. Focus on actionable advice and cite sources when possible.";

/// Search backed by Exa (`exa-pro` by default).
pub struct ExaSearch {
    client: Client,
    api_key: Option<String>,
    api_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ExaRequest<'a> {
    model: &'a str,
    messages: Vec<ExaMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ExaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    choices: Vec<ExaChoice>,
}

#[derive(Debug, Deserialize)]
struct ExaChoice {
    message: ExaAnswer,
}

#[derive(Debug, Deserialize)]
struct ExaAnswer {
    #[serde(default)]
    content: Option<String>,
}

impl ExaSearch {
    pub fn new(config: &SearchConfig, timeout: Duration) -> Self {
        Self {
            client: crate::util::http_client(timeout),
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            model: config.model.clone(),
        }
    }

    /// Fold optional context about the user's data into the query.
    pub fn enrich_query(query: &str, context: Option<&str>) -> String {
        match context.map(str::trim).filter(|c| !c.is_empty()) {
            Some(context) => format!(
                "Given this context: {}, find insights about: {}",
                context, query
            ),
            None => query.to_string(),
        }
    }
}

#[async_trait]
impl InsightSearch for ExaSearch {
    async fn search(&self, query: &str, context: Option<&str>) -> Result<String, AdapterError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AdapterError::NotConfigured("EXA_API_KEY is not set".to_string()))?;

        let enriched = Self::enrich_query(query, context);
        let request = ExaRequest {
            model: &self.model,
            messages: vec![
                ExaMessage {
                    role: "system",
                    content: RESEARCH_SYSTEM_PROMPT,
                },
                ExaMessage {
                    role: "user",
                    content: &enriched,
                },
            ],
            stream: false,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ExaResponse = response.json().await?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty());

        Ok(answer.unwrap_or_else(|| format!("No search results found for: {}", query)))
    }
}
