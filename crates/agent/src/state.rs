//! Per-request run state and step outputs.

use docassist_core::message::{Message, Role};
use serde::{Deserialize, Serialize};

/// Why a run stopped. Serialized in SCREAMING_SNAKE_CASE on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Completed,
    LlmGenerationFailure,
    MaxTurnsReached,
    MaxToolCallsReached,
    InvalidToolCall,
    MaxContextReached,
    EmptyInput,
    RateLimited,
    LlmError,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::LlmGenerationFailure => "LLM_GENERATION_FAILURE",
            Self::MaxTurnsReached => "MAX_TURNS_REACHED",
            Self::MaxToolCallsReached => "MAX_TOOL_CALLS_REACHED",
            Self::InvalidToolCall => "INVALID_TOOL_CALL",
            Self::MaxContextReached => "MAX_CONTEXT_REACHED",
            Self::EmptyInput => "EMPTY_INPUT",
            Self::RateLimited => "RATE_LIMITED",
            Self::LlmError => "LLM_ERROR",
        }
    }

    /// Every reason except `Completed` ends the run immediately.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Completed)
    }

    /// Whether a client-facing stream should report this reason as an error.
    ///
    /// Hitting the turn or tool budget still produces an explanatory answer,
    /// so only the remaining terminal reasons count.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Completed | Self::MaxTurnsReached | Self::MaxToolCallsReached
        )
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one run, moved between steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Append-only transcript (user, assistant and tool turns)
    pub messages: Vec<Message>,

    /// Model responses so far; only the reasoning step increments this
    pub turns: u32,

    /// Tool results so far; only the tool step increments this
    pub tool_calls: u32,

    pub exit_reason: Option<ExitReason>,
}

impl AgentState {
    /// Fresh state holding a single user turn.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(query)],
            turns: 0,
            tool_calls: 0,
            exit_reason: None,
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Text of the last turn, or empty if there is none.
    pub fn answer(&self) -> &str {
        self.last_message().map(|m| m.content.as_str()).unwrap_or_default()
    }

    /// True when the last turn is an assistant turn with pending tool requests.
    pub fn wants_tools(&self) -> bool {
        self.last_message().is_some_and(Message::requests_tools)
    }

    /// True when at least one user turn has non-blank content.
    pub fn has_user_input(messages: &[Message]) -> bool {
        messages
            .iter()
            .any(|m| m.role == Role::User && !m.content.trim().is_empty())
    }

    pub fn is_terminal(&self) -> bool {
        self.exit_reason.is_some_and(|r| r.is_terminal())
    }

    /// Merge a step's output: append turns, bump counters, replace the exit reason if set.
    pub fn apply(&mut self, delta: StateDelta) {
        self.messages.extend(delta.messages);
        self.turns += delta.turns;
        self.tool_calls += delta.tool_calls;
        if delta.exit_reason.is_some() {
            self.exit_reason = delta.exit_reason;
        }
    }
}

/// The output of one step. Counters are increments, never absolute values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub messages: Vec<Message>,
    pub turns: u32,
    pub tool_calls: u32,
    pub exit_reason: Option<ExitReason>,
}

impl StateDelta {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A delta that only sets the exit reason.
    pub fn exit(reason: ExitReason) -> Self {
        Self {
            exit_reason: Some(reason),
            ..Self::default()
        }
    }

    /// A delta appending one turn and setting the exit reason.
    pub fn with_message(message: Message, reason: ExitReason) -> Self {
        Self {
            messages: vec![message],
            exit_reason: Some(reason),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docassist_core::message::MessageToolCall;

    #[test]
    fn exit_reason_wire_names() {
        let json = serde_json::to_string(&ExitReason::MaxToolCallsReached).unwrap();
        assert_eq!(json, r#""MAX_TOOL_CALLS_REACHED""#);
        let parsed: ExitReason = serde_json::from_str(r#""LLM_GENERATION_FAILURE""#).unwrap();
        assert_eq!(parsed, ExitReason::LlmGenerationFailure);
        assert_eq!(ExitReason::EmptyInput.to_string(), "EMPTY_INPUT");
    }

    #[test]
    fn as_str_matches_serde_for_every_reason() {
        for reason in [
            ExitReason::Completed,
            ExitReason::LlmGenerationFailure,
            ExitReason::MaxTurnsReached,
            ExitReason::MaxToolCallsReached,
            ExitReason::InvalidToolCall,
            ExitReason::MaxContextReached,
            ExitReason::EmptyInput,
            ExitReason::RateLimited,
            ExitReason::LlmError,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json.trim_matches('"'), reason.as_str());
        }
    }

    #[test]
    fn only_completed_is_non_terminal() {
        assert!(!ExitReason::Completed.is_terminal());
        assert!(ExitReason::EmptyInput.is_terminal());
        assert!(ExitReason::MaxTurnsReached.is_terminal());
    }

    #[test]
    fn budget_reasons_are_not_client_errors() {
        assert!(!ExitReason::MaxTurnsReached.is_client_error());
        assert!(!ExitReason::MaxToolCallsReached.is_client_error());
        assert!(ExitReason::RateLimited.is_client_error());
        assert!(ExitReason::LlmGenerationFailure.is_client_error());
    }

    #[test]
    fn apply_appends_and_increments() {
        let mut state = AgentState::new("q");
        state.apply(StateDelta {
            messages: vec![Message::assistant("a")],
            turns: 1,
            tool_calls: 0,
            exit_reason: Some(ExitReason::Completed),
        });
        state.apply(StateDelta::empty());
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.turns, 1);
        assert_eq!(state.exit_reason, Some(ExitReason::Completed));
        assert_eq!(state.answer(), "a");
    }

    #[test]
    fn wants_tools_only_for_assistant_requests() {
        let mut state = AgentState::new("q");
        assert!(!state.wants_tools());
        state.messages.push(Message::assistant("").with_tool_calls(vec![MessageToolCall {
            id: "c".into(),
            name: "retriever".into(),
            arguments: "{}".into(),
        }]));
        assert!(state.wants_tools());
    }

    #[test]
    fn blank_user_turns_are_not_input() {
        assert!(!AgentState::has_user_input(&[Message::user("  \n\t")]));
        assert!(!AgentState::has_user_input(&[Message::assistant("hi")]));
        assert!(AgentState::has_user_input(&[Message::user(" hi ")]));
    }
}
