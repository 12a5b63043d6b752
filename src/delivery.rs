//! Report delivery through a webhook that emails the report.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

/// How a delivery attempt ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// The receiver acknowledged the report.
    Delivered { response: String },
    /// The request timed out; the receiver is assumed to still be processing.
    Accepted { warning: String },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to reach webhook: {0}")]
    Transport(String),
}

/// Sends a rendered report somewhere a person will read it.
#[async_trait]
pub trait ReportDelivery: Send + Sync {
    async fn deliver(&self, html: &str) -> Result<DeliveryStatus, DeliveryError>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    email: &'a str,
}

/// Posts `{"email": <html>}` to a webhook.
pub struct WebhookDelivery {
    client: Client,
    url: String,
    timeout: Duration,
}

impl WebhookDelivery {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: crate::util::http_client(timeout),
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ReportDelivery for WebhookDelivery {
    async fn deliver(&self, html: &str) -> Result<DeliveryStatus, DeliveryError> {
        let payload = WebhookPayload { email: html.trim() };
        tracing::info!(
            "Sending report to webhook {} ({} bytes)",
            self.url,
            payload.email.len()
        );

        let response = match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                tracing::warn!(
                    "Webhook timed out after {:?}; delivery is probably still in progress",
                    self.timeout
                );
                return Ok(DeliveryStatus::Accepted {
                    warning: format!(
                        "Webhook timed out after {}s but is likely still processing the report",
                        self.timeout.as_secs()
                    ),
                });
            }
            Err(e) => {
                tracing::error!("Webhook request failed: {}", e);
                return Err(DeliveryError::Transport(e.to_string()));
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            tracing::info!("Webhook accepted report ({})", status);
            Ok(DeliveryStatus::Delivered { response: body })
        } else {
            tracing::error!("Webhook rejected report: {} {}", status, body);
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
