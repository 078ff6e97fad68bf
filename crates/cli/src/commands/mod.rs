pub mod ask;
pub mod chat;
pub mod init;
pub mod serve;

use docassist_agent::{Agent, AgentState};
use docassist_config::AppConfig;
use std::sync::Arc;

/// Load the config and build an agent around the configured provider and docs.
pub fn build_agent() -> Result<Agent, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    DOCASSIST_API_KEY=...");
        eprintln!("    GEMINI_API_KEY=...");
        eprintln!();
        eprintln!("  Or add `api_key` to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = docassist_providers::from_config(&config)?;
    let tools = docassist_tools::default_registry(&config)?;
    Ok(Agent::from_config(Arc::new(provider), Arc::new(tools), &config)?)
}

/// The final answer followed by the exit reason tag.
pub fn render(state: &AgentState) -> String {
    let reason = state.exit_reason.map(|r| r.as_str()).unwrap_or("UNKNOWN");
    format!("{}\n[exit_reason={reason}]", state.answer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docassist_agent::ExitReason;
    use docassist_core::message::Message;

    #[test]
    fn render_appends_exit_reason() {
        let mut state = AgentState::new("q");
        state.messages.push(Message::assistant("Use the CLI."));
        state.exit_reason = Some(ExitReason::Completed);
        assert_eq!(render(&state), "Use the CLI.\n[exit_reason=COMPLETED]");
    }

    #[test]
    fn render_without_reason_is_unknown() {
        let state = AgentState::new("q");
        assert_eq!(render(&state), "q\n[exit_reason=UNKNOWN]");
    }
}
