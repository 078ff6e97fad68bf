//! Tool step: run the retriever for each pending tool request.

use super::emit;
use crate::cache_key::retrieval_cache_key;
use crate::graph::Agent;
use crate::prompts;
use crate::state::{AgentState, ExitReason, StateDelta};
use crate::stream_event::AgentEvent;
use docassist_core::error::ToolError;
use docassist_core::message::{Message, MessageToolCall};
use docassist_core::tool::{ToolCall, ToolResult};
use docassist_tools::EMPTY_RESULT_SENTINEL;
use docassist_tools::retriever::query_argument;
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub(crate) enum Prepared {
    Done(StateDelta),
    Run {
        calls: Vec<MessageToolCall>,
        /// How many of `calls` may still execute.
        budget: usize,
    },
}

pub(crate) fn prepare(agent: &Agent, state: &AgentState) -> Prepared {
    let max = agent.settings().max_tool_calls;
    if state.tool_calls >= max {
        info!(tool_calls = state.tool_calls, "Tool budget exhausted");
        return Prepared::Done(StateDelta::with_message(
            Message::tool_result(prompts::TOOL_LIMIT_CALL_ID, prompts::TOOL_LIMIT_REPLY),
            ExitReason::MaxToolCallsReached,
        ));
    }

    match state.last_message() {
        Some(last) if last.requests_tools() => Prepared::Run {
            calls: last.tool_calls.clone(),
            budget: (max - state.tool_calls) as usize,
        },
        _ => Prepared::Done(StateDelta::empty()),
    }
}

/// A validated retriever lookup.
struct Lookup {
    call: ToolCall,
    cache_key: String,
}

fn validate(agent: &Agent, requested: &MessageToolCall) -> Result<Lookup, String> {
    if agent.tools().get(&requested.name).is_none() {
        return Err(format!("unknown tool '{}'", requested.name));
    }
    let arguments: serde_json::Value = serde_json::from_str(&requested.arguments)
        .map_err(|e| format!("arguments for '{}' are not valid JSON: {e}", requested.name))?;
    let query = query_argument(&arguments).map_err(|e| e.to_string())?;
    let cache_key = retrieval_cache_key(query, &agent.settings().search);

    Ok(Lookup {
        call: ToolCall {
            id: requested.id.clone(),
            name: requested.name.clone(),
            arguments,
        },
        cache_key,
    })
}

/// Empty output and the no-results marker are never cached.
fn cacheable(output: &str) -> bool {
    !output.is_empty() && output != EMPTY_RESULT_SENTINEL
}

/// Output text for a finished lookup, and whether it may be cached.
fn settle(lookup: &Lookup, result: Result<ToolResult, ToolError>) -> (String, bool) {
    match result {
        Ok(result) => {
            let cache = cacheable(&result.output);
            (result.output, cache)
        }
        Err(e) => {
            warn!(tool = %lookup.call.name, error = %e, "Tool failed after retries");
            (prompts::tool_error_reply(&lookup.call.name, &e), false)
        }
    }
}

/// What to do with one requested call.
enum Admission {
    Run(Lookup),
    Skip,
    Stop,
}

/// Turns and counters accumulated while walking the requested calls.
#[derive(Default)]
struct ToolOutputs {
    messages: Vec<Message>,
    executed: u32,
    exit_reason: Option<ExitReason>,
}

impl ToolOutputs {
    /// Calls past the budget get a limit turn; an invalid call ends the step.
    fn admit(&mut self, agent: &Agent, index: usize, budget: usize, requested: &MessageToolCall) -> Admission {
        if index >= budget {
            self.over_budget(&requested.id);
            return Admission::Skip;
        }
        match validate(agent, requested) {
            Ok(lookup) => Admission::Run(lookup),
            Err(reason) => {
                self.invalid(&requested.id, &reason);
                Admission::Stop
            }
        }
    }

    fn record(&mut self, call_id: &str, output: String) -> ControlFlow<()> {
        let empty = output == EMPTY_RESULT_SENTINEL;
        self.messages.push(Message::tool_result(call_id, output));
        self.executed += 1;
        if empty {
            info!(call_id, "Retriever found nothing; giving up");
            self.exit_reason = Some(ExitReason::LlmGenerationFailure);
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn invalid(&mut self, call_id: &str, reason: &str) {
        warn!(call_id, reason, "Invalid tool call");
        self.messages
            .push(Message::tool_result(call_id, prompts::invalid_tool_call_reply(reason)));
        self.executed += 1;
        self.exit_reason = Some(ExitReason::InvalidToolCall);
    }

    fn over_budget(&mut self, call_id: &str) {
        self.messages
            .push(Message::tool_result(call_id, prompts::TOOL_LIMIT_REPLY));
        self.exit_reason = Some(ExitReason::MaxToolCallsReached);
    }

    fn finish(self) -> StateDelta {
        StateDelta {
            messages: self.messages,
            turns: 0,
            tool_calls: self.executed,
            exit_reason: self.exit_reason,
        }
    }
}

pub(crate) fn execute_blocking(agent: &Agent, state: &AgentState) -> StateDelta {
    let (calls, budget) = match prepare(agent, state) {
        Prepared::Done(delta) => return delta,
        Prepared::Run { calls, budget } => (calls, budget),
    };

    let mut outputs = ToolOutputs::default();
    for (i, requested) in calls.iter().enumerate() {
        let lookup = match outputs.admit(agent, i, budget, requested) {
            Admission::Run(lookup) => lookup,
            Admission::Skip => continue,
            Admission::Stop => break,
        };

        let output = match agent.retrieval_cache().get_blocking(&lookup.cache_key) {
            Some(hit) => {
                debug!(key = %lookup.cache_key, "Retrieval served from cache");
                hit
            }
            None => {
                let result = agent.settings().tool_retry.run_blocking(
                    |_| agent.tools().execute_blocking(&lookup.call),
                    |_| true,
                );
                let (output, cache) = settle(&lookup, result);
                if cache {
                    agent.retrieval_cache().set_blocking(
                        lookup.cache_key.clone(),
                        output.clone(),
                        agent.settings().retrieval_ttl,
                    );
                }
                output
            }
        };

        if outputs.record(&requested.id, output).is_break() {
            break;
        }
    }

    outputs.finish()
}

/// Async variant. With `events`, each executed lookup is bracketed by
/// `tool_start` / `tool_end`.
pub(crate) async fn execute(
    agent: &Agent,
    state: &AgentState,
    events: Option<&mpsc::Sender<AgentEvent>>,
) -> StateDelta {
    let (calls, budget) = match prepare(agent, state) {
        Prepared::Done(delta) => return delta,
        Prepared::Run { calls, budget } => (calls, budget),
    };

    let mut outputs = ToolOutputs::default();
    for (i, requested) in calls.iter().enumerate() {
        let lookup = match outputs.admit(agent, i, budget, requested) {
            Admission::Run(lookup) => lookup,
            Admission::Skip => continue,
            Admission::Stop => break,
        };

        emit(
            events,
            AgentEvent::ToolStart {
                name: lookup.call.name.clone(),
                input: lookup.call.arguments.clone(),
            },
        )
        .await;

        let output = match agent.retrieval_cache().get(&lookup.cache_key).await {
            Some(hit) => {
                debug!(key = %lookup.cache_key, "Retrieval served from cache");
                hit
            }
            None => {
                let tools = agent.tools().clone();
                let result = agent
                    .settings()
                    .tool_retry
                    .run(
                        |_| {
                            let tools = tools.clone();
                            let call = lookup.call.clone();
                            async move { tools.execute(&call).await }
                        },
                        |_| true,
                    )
                    .await;
                let (output, cache) = settle(&lookup, result);
                if cache {
                    agent
                        .retrieval_cache()
                        .set(lookup.cache_key.clone(), output.clone(), agent.settings().retrieval_ttl)
                        .await;
                }
                output
            }
        };

        emit(
            events,
            AgentEvent::ToolEnd {
                name: lookup.call.name.clone(),
                output: output.clone(),
            },
        )
        .await;

        if outputs.record(&requested.id, output).is_break() {
            break;
        }
    }

    outputs.finish()
}
