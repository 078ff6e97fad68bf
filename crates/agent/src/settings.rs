//! Runtime settings of an [`crate::Agent`].

use crate::prompts::SYSTEM_PROMPT;
use crate::retry::RetryPolicy;
use docassist_config::AppConfig;
use docassist_core::error::ToolError;
use docassist_tools::SearchParams;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Model id sent to the provider; also part of every reasoning cache key
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,

    pub max_turns: u32,
    pub max_tool_calls: u32,
    pub max_context_chars: usize,

    pub llm_retry: RetryPolicy,
    pub tool_retry: RetryPolicy,

    pub llm_ttl: Option<Duration>,
    pub retrieval_ttl: Option<Duration>,

    /// Retriever parameters; part of every retrieval cache key
    pub search: SearchParams,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-lite".into(),
            temperature: 0.0,
            system_prompt: SYSTEM_PROMPT.into(),
            max_turns: 6,
            max_tool_calls: 3,
            max_context_chars: 12_000,
            llm_retry: RetryPolicy::new(2, Duration::from_secs(1), Duration::from_secs(10)),
            tool_retry: RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10)),
            llm_ttl: Some(Duration::from_secs(3600)),
            retrieval_ttl: Some(Duration::from_secs(3600)),
            search: SearchParams::default(),
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ToolError> {
        let retry = &config.retry;
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            system_prompt: SYSTEM_PROMPT.into(),
            max_turns: config.limits.max_turns,
            max_tool_calls: config.limits.max_tool_calls,
            max_context_chars: config.limits.max_context_chars,
            llm_retry: RetryPolicy::new(retry.llm_max_retries, retry.base_delay(), retry.max_delay()),
            tool_retry: RetryPolicy::new(retry.tool_max_retries, retry.base_delay(), retry.max_delay()),
            llm_ttl: Some(config.cache.llm_ttl()),
            retrieval_ttl: Some(config.cache.retrieval_ttl()),
            search: docassist_tools::search_params(config)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_default_config() {
        let from_config = AgentSettings::from_config(&AppConfig::default()).unwrap();
        let defaults = AgentSettings::default();
        assert_eq!(from_config.model, defaults.model);
        assert_eq!(from_config.max_turns, defaults.max_turns);
        assert_eq!(from_config.max_tool_calls, defaults.max_tool_calls);
        assert_eq!(from_config.max_context_chars, defaults.max_context_chars);
        assert_eq!(from_config.llm_retry, defaults.llm_retry);
        assert_eq!(from_config.tool_retry, defaults.tool_retry);
        assert_eq!(from_config.llm_ttl, defaults.llm_ttl);
        assert_eq!(from_config.search, defaults.search);
    }
}
