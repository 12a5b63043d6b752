//! Scripted fakes for session tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::adapters::{AdapterError, CodeExecutor, Execution, InsightSearch};
use crate::llm::{
    ChatOptions, Completion, ContentBlock, LlmClient, LlmError, Message, ToolDefinition,
};

/// Completion client replaying a fixed script.
///
/// Once the script runs out it answers with plain text, which ends a session.
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<Completion, LlmError>>>,
    transcripts: Mutex<Vec<Vec<Message>>>,
    options: Mutex<Vec<ChatOptions>>,
}

impl ScriptedLlm {
    pub fn new(script: Vec<Result<Completion, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            transcripts: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
        }
    }

    /// Number of completion requests received.
    pub fn calls(&self) -> usize {
        self.transcripts.lock().unwrap().len()
    }

    /// Transcript sent with each request.
    pub fn transcripts(&self) -> Vec<Vec<Message>> {
        self.transcripts.lock().unwrap().clone()
    }

    pub fn options(&self) -> Vec<ChatOptions> {
        self.options.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Completion, LlmError> {
        self.chat_completion_with_options(model, messages, tools, &ChatOptions::default())
            .await
    }

    async fn chat_completion_with_options(
        &self,
        _model: &str,
        messages: &[Message],
        _tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<Completion, LlmError> {
        self.transcripts.lock().unwrap().push(messages.to_vec());
        self.options.lock().unwrap().push(options.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(text_reply("Nothing more to do.")))
    }
}

/// A completion carrying only text.
pub fn text_reply(text: &str) -> Completion {
    Completion::from_blocks(vec![ContentBlock::text(text)])
}

/// A completion requesting the given `(id, action, arguments)` triples in order.
pub fn action_reply(requests: Vec<(&str, &str, Value)>) -> Completion {
    Completion::from_blocks(
        requests
            .into_iter()
            .map(|(id, name, input)| ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            })
            .collect(),
    )
}

/// Code executor replaying scripted executions.
///
/// `Err` entries surface as transport failures. An exhausted script yields
/// a silent success.
pub struct FakeExecutor {
    script: Mutex<VecDeque<Result<Execution, String>>>,
    codes: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new(script: Vec<Result<Execution, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            codes: Mutex::new(Vec::new()),
        }
    }

    /// Executor whose every run yields `count` charts.
    pub fn charting(runs: usize, count: usize) -> Self {
        Self::new(
            (0..runs)
                .map(|run| {
                    Ok(Execution {
                        stdout: None,
                        images: (0..count).map(|i| format!("png-{}-{}", run, i)).collect(),
                        error: None,
                    })
                })
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.codes.lock().unwrap().len()
    }

    pub fn codes(&self) -> Vec<String> {
        self.codes.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeExecutor for FakeExecutor {
    async fn run(&self, code: &str) -> Result<Execution, AdapterError> {
        self.codes.lock().unwrap().push(code.to_string());
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(execution)) => Ok(execution),
            Some(Err(message)) => Err(AdapterError::Transport(message)),
            None => Ok(Execution::default()),
        }
    }
}

enum SearchBehavior {
    Answer(String),
    Fail(String),
    Panic,
}

/// Search adapter with a fixed behavior.
pub struct FakeSearch {
    behavior: SearchBehavior,
    queries: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeSearch {
    fn with(behavior: SearchBehavior) -> Self {
        Self {
            behavior,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::with(SearchBehavior::Answer(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with(SearchBehavior::Fail(message.to_string()))
    }

    pub fn panicking() -> Self {
        Self::with(SearchBehavior::Panic)
    }

    pub fn queries(&self) -> Vec<(String, Option<String>)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl InsightSearch for FakeSearch {
    async fn search(&self, query: &str, context: Option<&str>) -> Result<String, AdapterError> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), context.map(str::to_string)));
        match &self.behavior {
            SearchBehavior::Answer(text) => Ok(text.clone()),
            SearchBehavior::Fail(message) => Err(AdapterError::NotConfigured(message.clone())),
            SearchBehavior::Panic => panic!("search backend exploded"),
        }
    }
}
