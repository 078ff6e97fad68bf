//! `docassist chat` - Interactive question/answer loop.
//!
//! Each line is an independent query; runs share the agent's caches.

use docassist_agent::Agent;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Run one line through the agent. Blank lines are passed on and come back
/// tagged `EMPTY_INPUT`.
async fn reply(agent: &Agent, query: &str) -> String {
    let state = agent.run(query).await;
    super::render(&state)
}

/// True for the words that end the session.
fn is_exit(line: &str) -> bool {
    matches!(line.to_ascii_lowercase().as_str(), "exit" | "quit")
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let agent = super::build_agent()?;

    println!();
    println!("  docassist - interactive mode");
    println!("  Model: {}", agent.settings().model);
    println!("  Type a question and press Enter. Type 'exit' or 'quit' to leave.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if is_exit(query) {
            break;
        }

        let answer = reply(&agent, query).await;
        println!();
        for line in answer.lines() {
            println!("  Assistant > {line}");
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docassist_core::error::ProviderError;
    use docassist_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use docassist_core::tool::ToolRegistry;
    use std::sync::Arc;

    struct UnreachableProvider;

    #[async_trait::async_trait]
    impl Provider for UnreachableProvider {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::ApiError {
                status_code: 500,
                message: "model should not be called".into(),
            })
        }
    }

    #[tokio::test]
    async fn blank_line_reports_empty_input() {
        let agent = Agent::new(Arc::new(UnreachableProvider), Arc::new(ToolRegistry::new()));

        let answer = reply(&agent, "").await;

        assert!(answer.ends_with("[exit_reason=EMPTY_INPUT]"));
    }

    #[test]
    fn exit_words_are_case_insensitive() {
        assert!(is_exit("exit"));
        assert!(is_exit("QUIT"));
        assert!(!is_exit("exit now"));
        assert!(!is_exit(""));
    }
}
