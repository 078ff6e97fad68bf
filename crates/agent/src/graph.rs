//! The turn-taking state machine.
//!
//! ```text
//!  Reasoning ──(assistant requested tools)──▶ ToolExecution
//!      ▲                                          │
//!      └──────────────(not terminal)──────────────┘
//!  any terminal exit reason, or an answer without tool requests ──▶ Terminated
//! ```
//!
//! The same machine runs in three modes: [`Agent::run_blocking`] on the
//! calling thread, [`Agent::run`] on the tokio runtime, and
//! [`Agent::run_stream`], which emits [`AgentEvent`]s as the run progresses.

use crate::cache::TtlCache;
use crate::nodes::{reasoning, tools};
use crate::settings::AgentSettings;
use crate::state::AgentState;
use crate::stream_event::AgentEvent;
use docassist_config::AppConfig;
use docassist_core::message::Message;
use docassist_core::provider::Provider;
use docassist_core::tool::ToolRegistry;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Buffered events per streaming run.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Reasoning,
    ToolExecution,
    Terminated,
}

/// Route after `step` has been applied to `state`.
///
/// A terminal exit reason always wins, so no step ever runs on a terminal state.
pub fn next_step(step: Step, state: &AgentState) -> Step {
    if state.is_terminal() {
        return Step::Terminated;
    }
    match step {
        Step::Reasoning if state.wants_tools() => Step::ToolExecution,
        Step::Reasoning => Step::Terminated,
        Step::ToolExecution => Step::Reasoning,
        Step::Terminated => Step::Terminated,
    }
}

/// A retrieval-augmented documentation assistant.
///
/// Cloning is cheap; clones share the provider, the tools and both caches.
#[derive(Clone)]
pub struct Agent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    llm_cache: Arc<TtlCache<Message>>,
    retrieval_cache: Arc<TtlCache<String>>,
    settings: Arc<AgentSettings>,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            llm_cache: Arc::new(TtlCache::new()),
            retrieval_cache: Arc::new(TtlCache::new()),
            settings: Arc::new(AgentSettings::default()),
        }
    }

    /// Build an agent with limits, retries and TTLs taken from `config`.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> docassist_core::Result<Self> {
        let settings = AgentSettings::from_config(config)?;
        Ok(Self::new(provider, tools).with_settings(settings))
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    /// Share a reasoning cache with other agents.
    pub fn with_llm_cache(mut self, cache: Arc<TtlCache<Message>>) -> Self {
        self.llm_cache = cache;
        self
    }

    /// Share a retrieval cache with other agents.
    pub fn with_retrieval_cache(mut self, cache: Arc<TtlCache<String>>) -> Self {
        self.retrieval_cache = cache;
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn llm_cache(&self) -> &Arc<TtlCache<Message>> {
        &self.llm_cache
    }

    pub fn retrieval_cache(&self) -> &Arc<TtlCache<String>> {
        &self.retrieval_cache
    }

    /// Answer `query` on the current thread.
    ///
    /// Must not be called from inside an async context; use [`Agent::run`]
    /// there, or move the call onto `spawn_blocking`.
    pub fn run_blocking(&self, query: &str) -> AgentState {
        let mut state = AgentState::new(query);
        let mut step = Step::Reasoning;
        info!(model = %self.settings.model, "Agent run started");

        loop {
            let delta = match step {
                Step::Reasoning => reasoning::execute_blocking(self, &state),
                Step::ToolExecution => tools::execute_blocking(self, &state),
                Step::Terminated => break,
            };
            state.apply(delta);
            step = next_step(step, &state);
        }

        log_finished(&state);
        state
    }

    /// Answer `query` on the tokio runtime.
    pub async fn run(&self, query: &str) -> AgentState {
        self.drive(query, None).await
    }

    async fn drive(&self, query: &str, events: Option<&mpsc::Sender<AgentEvent>>) -> AgentState {
        let mut state = AgentState::new(query);
        let mut step = Step::Reasoning;
        info!(model = %self.settings.model, streaming = events.is_some(), "Agent run started");

        loop {
            if events.is_some_and(|tx| tx.is_closed()) {
                info!("Event receiver dropped; abandoning run");
                break;
            }
            let delta = match step {
                Step::Reasoning => reasoning::execute(self, &state, events).await,
                Step::ToolExecution => tools::execute(self, &state, events).await,
                Step::Terminated => break,
            };
            state.apply(delta);
            step = next_step(step, &state);
        }

        log_finished(&state);
        state
    }

    /// Answer `query` in a background task, streaming progress events.
    ///
    /// The receiver yields tokens, tool and message boundaries, and finally
    /// exactly one of `final_state` or `error`. A panic inside the run is
    /// reported as an `error` event with detail `INTERNAL_SERVER_ERROR`.
    pub fn run_stream(&self, query: &str) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let agent = self.clone();
        let query = query.to_string();
        let run_tx = tx.clone();

        let run = tokio::spawn(async move {
            let state = agent.drive(&query, Some(&run_tx)).await;
            let _ = run_tx.send(AgentEvent::FinalState { state }).await;
        });

        tokio::spawn(async move {
            if let Err(e) = run.await {
                let message = if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    e.to_string()
                };
                error!(error = %message, "Agent run aborted");
                let _ = tx.send(AgentEvent::internal_error(message)).await;
            }
        });

        rx
    }
}

fn log_finished(state: &AgentState) {
    info!(
        turns = state.turns,
        tool_calls = state.tool_calls,
        exit_reason = state.exit_reason.map(|r| r.as_str()).unwrap_or("NONE"),
        "Agent run finished"
    );
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "agent run panicked".to_string()
    }
}
