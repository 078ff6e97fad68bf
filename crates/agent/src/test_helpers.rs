//! Shared test doubles for agent tests.

use crate::graph::Agent;
use crate::retry::RetryPolicy;
use crate::settings::AgentSettings;
use docassist_core::error::{ProviderError, ToolError};
use docassist_core::message::{Message, MessageToolCall};
use docassist_core::provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
use docassist_core::tool::{Tool, ToolRegistry, ToolResult};
use docassist_tools::RETRIEVER_TOOL_NAME;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A provider that replays scripted results in order.
///
/// Once the script runs out it returns an API error, or keeps repeating
/// the configured message when built with [`ScriptedProvider::repeating`].
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Message, ProviderError>>>,
    repeat: Option<Message>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<Message, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            repeat: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn repeating(message: Message) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(message),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<Message, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => self.repeat.clone().ok_or_else(|| ProviderError::ApiError {
                status_code: 500,
                message: "no scripted response left".into(),
            }),
        }
    }

    fn respond(&self) -> Result<ProviderResponse, ProviderError> {
        self.next().map(|message| ProviderResponse {
            message,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.respond()
    }

    fn complete_blocking(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.respond()
    }

    /// Streams the content word by word, then the tool calls with the final chunk.
    async fn stream(
        &self,
        _request: ProviderRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        let message = self.next()?;
        let (tx, rx) = tokio::sync::mpsc::channel(64);
        for word in message.content.split_inclusive(' ') {
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some(word.to_string()),
                    ..StreamChunk::default()
                }))
                .await;
        }
        let _ = tx
            .send(Ok(StreamChunk {
                tool_calls: message.tool_calls,
                done: true,
                ..StreamChunk::default()
            }))
            .await;
        Ok(rx)
    }
}

/// A provider whose stream panics, for exercising the run's fault boundary.
pub struct PanickingProvider;

#[async_trait::async_trait]
impl Provider for PanickingProvider {
    fn name(&self) -> &str {
        "panicking_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        panic!("provider exploded");
    }

    async fn stream(
        &self,
        _request: ProviderRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        panic!("provider exploded");
    }
}

/// A stand-in retriever with a shared call counter. Clones share state.
#[derive(Clone)]
pub struct ScriptedRetriever {
    output: Result<String, String>,
    failures_left: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedRetriever {
    pub fn always(output: &str) -> Self {
        Self::flaky(0, output)
    }

    /// Fails `failures` times, then returns `output`.
    pub fn flaky(failures: usize, output: &str) -> Self {
        Self {
            output: Ok(output.to_string()),
            failures_left: Arc::new(AtomicUsize::new(failures)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            output: Err(reason.to_string()),
            failures_left: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self) -> Result<ToolResult, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let failed = |reason: &str| ToolError::ExecutionFailed {
            tool_name: RETRIEVER_TOOL_NAME.into(),
            reason: reason.into(),
        };
        if failing {
            return Err(failed("transient failure"));
        }
        match &self.output {
            Ok(output) => Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: output.clone(),
                data: None,
            }),
            Err(reason) => Err(failed(reason)),
        }
    }
}

#[async_trait::async_trait]
impl Tool for ScriptedRetriever {
    fn name(&self) -> &str {
        RETRIEVER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Scripted documentation search"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.lookup()
    }

    fn execute_blocking(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.lookup()
    }
}

/// Default limits with zero retry delays.
pub fn test_settings() -> AgentSettings {
    AgentSettings {
        llm_retry: RetryPolicy::new(2, Duration::ZERO, Duration::ZERO),
        tool_retry: RetryPolicy::new(3, Duration::ZERO, Duration::ZERO),
        ..AgentSettings::default()
    }
}

pub fn test_agent(provider: Arc<dyn Provider>, retriever: ScriptedRetriever) -> Agent {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(retriever));
    Agent::new(provider, Arc::new(registry)).with_settings(test_settings())
}

/// An assistant turn requesting one retriever lookup.
pub fn tool_request(id: &str, query: &str) -> Message {
    Message::assistant("").with_tool_calls(vec![MessageToolCall {
        id: id.to_string(),
        name: RETRIEVER_TOOL_NAME.to_string(),
        arguments: serde_json::json!({ "query": query }).to_string(),
    }])
}

/// An assistant turn requesting one lookup per query, with ids `call_<query>`.
pub fn multi_tool_request(queries: &[&str]) -> Message {
    let calls = queries
        .iter()
        .map(|q| MessageToolCall {
            id: format!("call_{q}"),
            name: RETRIEVER_TOOL_NAME.to_string(),
            arguments: serde_json::json!({ "query": q }).to_string(),
        })
        .collect();
    Message::assistant("").with_tool_calls(calls)
}
