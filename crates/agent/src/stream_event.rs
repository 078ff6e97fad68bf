//! Agent-level streaming events.
//!
//! `AgentEvent` is what [`crate::Agent::run_stream`] yields. The gateway
//! forwards these to clients as server-sent events named by
//! [`AgentEvent::event_type`].
//!
//! - `token`           - partial text from the model
//! - `tool_start`      - a retriever lookup is starting
//! - `tool_end`        - a retriever lookup finished
//! - `message_start`   - a model response is starting
//! - `message_end`     - a model response finished
//! - `cached_response` - a cached model response was served whole
//! - `final_state`     - the run is over; carries the authoritative state
//! - `error`           - an internal fault; no `final_state` will follow

use crate::state::AgentState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Token { content: String },

    ToolStart {
        name: String,
        input: serde_json::Value,
    },

    ToolEnd { name: String, output: String },

    MessageStart,

    MessageEnd,

    CachedResponse { content: String },

    FinalState { state: AgentState },

    Error { detail: String, message: String },
}

impl AgentEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolEnd { .. } => "tool_end",
            Self::MessageStart => "message_start",
            Self::MessageEnd => "message_end",
            Self::CachedResponse { .. } => "cached_response",
            Self::FinalState { .. } => "final_state",
            Self::Error { .. } => "error",
        }
    }

    /// The fault event emitted when a run dies before producing a final state.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Error {
            detail: "INTERNAL_SERVER_ERROR".into(),
            message: message.into(),
        }
    }
}
