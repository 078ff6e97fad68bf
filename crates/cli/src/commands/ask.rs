//! `docassist ask` - Answer one question.

pub async fn run(query: String) -> Result<(), Box<dyn std::error::Error>> {
    let agent = super::build_agent()?;

    eprint!("  Thinking...");
    let state = agent.run(&query).await;
    eprint!("\r              \r");
    println!("{}", super::render(&state));

    Ok(())
}
