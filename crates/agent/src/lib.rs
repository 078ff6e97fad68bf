//! The retrieval agent: a small state machine that alternates between
//! asking the model and running documentation lookups.
//!
//! 1. **Reason**: check the turn and context budgets, then ask the model
//!    (or serve its cached answer for an identical prompt)
//! 2. **If tool calls**: run the retriever for each one within the tool
//!    budget, append the results, and go back to step 1
//! 3. **Otherwise**: the assistant's text is the answer
//!
//! Every way a run can end is recorded as an [`ExitReason`] on the final
//! [`AgentState`]; business outcomes never surface as errors.

pub mod cache;
pub mod cache_key;
pub mod context;
pub mod graph;
mod nodes;
pub mod prompts;
pub mod retry;
pub mod settings;
pub mod state;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use cache::TtlCache;
pub use cache_key::{generate_cache_key, llm_cache_key, retrieval_cache_key};
pub use context::trim_messages;
pub use graph::{Agent, Step, next_step};
pub use retry::{RetryPolicy, with_retry, with_retry_blocking};
pub use settings::AgentSettings;
pub use state::{AgentState, ExitReason, StateDelta};
pub use stream_event::AgentEvent;
