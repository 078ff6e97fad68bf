//! Reasoning step: validate limits, serve from cache or call the model.

use super::emit;
use crate::cache_key::llm_cache_key;
use crate::context::trim_messages;
use crate::graph::Agent;
use crate::prompts;
use crate::state::{AgentState, ExitReason, StateDelta};
use crate::stream_event::AgentEvent;
use docassist_core::error::ProviderError;
use docassist_core::message::{Message, MessageToolCall};
use docassist_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub(crate) enum Prepared {
    /// The step ends without calling the model.
    Done(StateDelta),
    /// The model must be consulted (or its cached answer served).
    Call { key: String, request: ProviderRequest },
}

/// Checks shared by every execution mode, in order: turn budget, context
/// budget, non-empty input. Then builds the request and its cache key.
pub(crate) fn prepare(agent: &Agent, state: &AgentState) -> Prepared {
    let settings = agent.settings();

    if state.turns >= settings.max_turns {
        info!(turns = state.turns, "Turn budget exhausted");
        return Prepared::Done(StateDelta::with_message(
            Message::assistant(prompts::MAX_TURNS_REPLY),
            ExitReason::MaxTurnsReached,
        ));
    }

    let history = trim_messages(&state.messages, settings.max_context_chars);
    if history.len() < state.messages.len() {
        info!(
            kept = history.len(),
            total = state.messages.len(),
            "Context budget exceeded"
        );
        return Prepared::Done(StateDelta::with_message(
            Message::assistant(prompts::MAX_CONTEXT_REPLY),
            ExitReason::MaxContextReached,
        ));
    }

    if !AgentState::has_user_input(&history) {
        return Prepared::Done(StateDelta::exit(ExitReason::EmptyInput));
    }

    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(settings.system_prompt.as_str()));
    messages.extend(history);

    let key = llm_cache_key(&settings.model, &messages);
    let request = ProviderRequest {
        model: settings.model.clone(),
        messages,
        temperature: settings.temperature,
        max_tokens: None,
        tools: agent.tools().definitions(),
        stream: false,
    };

    Prepared::Call { key, request }
}

fn on_response(message: Message) -> StateDelta {
    StateDelta {
        messages: vec![message],
        turns: 1,
        tool_calls: 0,
        exit_reason: Some(ExitReason::Completed),
    }
}

fn on_failure(error: &ProviderError) -> StateDelta {
    if error.is_rate_limit() {
        warn!(error = %error, "Model rate limited after retries");
        StateDelta::with_message(
            Message::assistant(prompts::RATE_LIMITED_REPLY),
            ExitReason::RateLimited,
        )
    } else {
        warn!(error = %error, "Model call failed after retries");
        StateDelta::with_message(
            Message::assistant(prompts::llm_error_reply(error)),
            ExitReason::LlmError,
        )
    }
}

pub(crate) fn execute_blocking(agent: &Agent, state: &AgentState) -> StateDelta {
    let (key, request) = match prepare(agent, state) {
        Prepared::Done(delta) => return delta,
        Prepared::Call { key, request } => (key, request),
    };

    if let Some(cached) = agent.llm_cache().get_blocking(&key) {
        debug!(%key, "Model response served from cache");
        return on_response(cached);
    }

    let provider = agent.provider();
    let result = agent.settings().llm_retry.run_blocking(
        |_| provider.complete_blocking(request.clone()),
        |_| true,
    );

    match result {
        Ok(response) => {
            agent
                .llm_cache()
                .set_blocking(key, response.message.clone(), agent.settings().llm_ttl);
            on_response(response.message)
        }
        Err(e) => on_failure(&e),
    }
}

/// Async variant. With `events`, the model is streamed and its tokens are
/// forwarded; a cache hit is reported as a single `cached_response` event.
pub(crate) async fn execute(
    agent: &Agent,
    state: &AgentState,
    events: Option<&mpsc::Sender<AgentEvent>>,
) -> StateDelta {
    let (key, request) = match prepare(agent, state) {
        Prepared::Done(delta) => return delta,
        Prepared::Call { key, request } => (key, request),
    };

    if let Some(cached) = agent.llm_cache().get(&key).await {
        debug!(%key, "Model response served from cache");
        emit(
            events,
            AgentEvent::CachedResponse {
                content: cached.content.clone(),
            },
        )
        .await;
        return on_response(cached);
    }

    let provider = agent.provider().clone();
    let retry = agent.settings().llm_retry;
    let result = match events {
        None => retry
            .run(
                |_| {
                    let provider = provider.clone();
                    let request = request.clone();
                    async move { provider.complete(request).await.map(|r| r.message) }
                },
                |_| true,
            )
            .await,
        Some(tx) => retry
            .run(
                |_| stream_once(provider.clone(), request.clone(), tx.clone()),
                |_| true,
            )
            .await,
    };

    match result {
        Ok(message) => {
            agent
                .llm_cache()
                .set(key, message.clone(), agent.settings().llm_ttl)
                .await;
            on_response(message)
        }
        Err(e) => on_failure(&e),
    }
}

/// One streamed model attempt, bracketed by `message_start` / `message_end`.
async fn stream_once(
    provider: Arc<dyn Provider>,
    mut request: ProviderRequest,
    tx: mpsc::Sender<AgentEvent>,
) -> Result<Message, ProviderError> {
    request.stream = true;
    let mut chunks = provider.stream(request).await?;
    let _ = tx.send(AgentEvent::MessageStart).await;

    let mut content = String::new();
    let mut tool_calls: Vec<MessageToolCall> = Vec::new();
    let mut outcome = Ok(());

    while let Some(chunk) = chunks.recv().await {
        match chunk {
            Ok(chunk) => {
                if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                    content.push_str(&text);
                    let _ = tx.send(AgentEvent::Token { content: text }).await;
                }
                tool_calls.extend(chunk.tool_calls);
                if chunk.done {
                    break;
                }
            }
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }

    let _ = tx.send(AgentEvent::MessageEnd).await;
    outcome?;
    Ok(Message::assistant(content).with_tool_calls(tool_calls))
}
