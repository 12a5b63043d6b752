//! The bounded conversation loop.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::action::action_definitions;
use super::artifacts::ArtifactAccumulator;
use super::dispatcher::{Dispatch, ToolDispatcher};
use super::outcome::build_outcome;
use super::types::{ActionResult, SessionError, SessionOutcome, Termination};
use crate::adapters::{CodeExecutor, InsightSearch};
use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::llm::{ChatOptions, ContentBlock, LlmClient, Message, Role};
use crate::util::preview;

/// Result text for actions issued after `finalize` in the same batch.
pub const SKIPPED_AFTER_FINALIZE: &str = "Skipped: session was finalized earlier in this batch";

/// A finished session: its outcome and the full transcript that led to it.
#[derive(Debug, Clone)]
pub struct SessionRun {
    pub outcome: SessionOutcome,
    pub transcript: Vec<Message>,
}

/// Receives a checkpoint at the start of every iteration.
#[async_trait]
pub trait IterationObserver: Send + Sync {
    async fn iteration_started(&self, iteration: usize, max_iterations: usize);
}

/// Drives one analysis session against a completion service.
///
/// Each call to [`run`](Self::run) is an isolated session with its own
/// transcript and accumulator; the driver itself holds only settings.
pub struct ConversationDriver {
    llm: Arc<dyn LlmClient>,
    model: String,
    max_iterations: usize,
    options: ChatOptions,
}

impl ConversationDriver {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            options: ChatOptions::default(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Run a session seeded with `instruction` until it finalizes, goes idle
    /// or hits the iteration cap.
    ///
    /// # Errors
    ///
    /// Only a failed completion request ends the session with an error;
    /// every action failure is fed back to the model instead.
    pub async fn run(
        &self,
        instruction: &str,
        executor: &dyn CodeExecutor,
        search: &dyn InsightSearch,
        observer: Option<&dyn IterationObserver>,
    ) -> Result<SessionRun, SessionError> {
        if self.max_iterations == 0 {
            return Err(SessionError::InvalidIterationCap);
        }

        let definitions = action_definitions();
        let dispatcher = ToolDispatcher::new(executor, search);
        let mut transcript = vec![Message::user_text(instruction)];
        let mut artifacts = ArtifactAccumulator::new();
        let mut iteration = 0;
        let mut total_tokens: u64 = 0;

        tracing::info!(
            "Starting analysis session (model: {}, max iterations: {})",
            self.model,
            self.max_iterations
        );

        let termination = loop {
            if iteration >= self.max_iterations {
                tracing::warn!(
                    "Reached iteration cap ({}) without finalize",
                    self.max_iterations
                );
                break Termination::Exhausted;
            }
            iteration += 1;
            tracing::info!("Iteration {}/{}", iteration, self.max_iterations);
            if let Some(observer) = observer {
                observer
                    .iteration_started(iteration, self.max_iterations)
                    .await;
            }

            let completion = self
                .llm
                .chat_completion_with_options(&self.model, &transcript, &definitions, &self.options)
                .await
                .map_err(|source| {
                    tracing::error!("Completion failed in iteration {}: {}", iteration, source);
                    SessionError::Completion { iteration, source }
                })?;

            if let Some(usage) = &completion.usage {
                total_tokens = total_tokens.saturating_add(usage.total_tokens);
                tracing::debug!(
                    "Iteration {} used {} prompt + {} completion tokens (model: {}, finish: {})",
                    iteration,
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    completion.model.as_deref().unwrap_or(&self.model),
                    completion.finish_reason.as_deref().unwrap_or("unknown")
                );
            }

            let requests: Vec<(String, String, Value)> = completion
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.clone(), name.clone(), input.clone()))
                    }
                    _ => None,
                })
                .collect();

            let assistant = Message {
                role: Role::Assistant,
                content: completion.content,
            };
            let text = assistant.text_content();
            if !text.trim().is_empty() {
                tracing::debug!("Model: {}", preview(&text, 500));
            }
            transcript.push(assistant);

            if requests.is_empty() {
                tracing::info!("Model requested no actions; stopping");
                break Termination::IdleStop;
            }

            let mut results: Vec<ActionResult> = Vec::with_capacity(requests.len());
            let mut findings = None;
            for (id, name, input) in requests {
                if findings.is_some() {
                    tracing::info!("Skipping {} ({}) issued after finalize", name, id);
                    results.push(ActionResult::failure(id, SKIPPED_AFTER_FINALIZE));
                    continue;
                }
                tracing::info!("Dispatching {} ({})", name, id);
                match dispatcher.dispatch(&id, &name, &input, &mut artifacts).await {
                    Dispatch::Completed(result) => results.push(result),
                    Dispatch::Finalized {
                        result,
                        findings: found,
                    } => {
                        results.push(result);
                        findings = Some(found);
                    }
                }
            }

            transcript.push(Message {
                role: Role::User,
                content: results.into_iter().map(ContentBlock::from).collect(),
            });

            if let Some(findings) = findings {
                break Termination::Finalized(findings);
            }
        };

        tracing::info!(
            "Session ended ({}) after {} iteration(s) with {} chart(s), {} tokens",
            termination.kind(),
            iteration,
            artifacts.len(),
            total_tokens
        );
        Ok(SessionRun {
            outcome: build_outcome(termination, artifacts.into_artifacts(), iteration),
            transcript,
        })
    }
}
