//! docassist CLI, the main entry point.
//!
//! Commands:
//! - `init`   - Write a default config file
//! - `ask`    - Answer a single question
//! - `chat`   - Interactive question/answer loop
//! - `serve`  - Start the HTTP gateway

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "docassist",
    about = "docassist - documentation assistant with retrieval",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Answer a single question and exit
    Ask {
        /// The question to answer
        query: String,
    },

    /// Ask questions interactively until `exit` or `quit`
    Chat,

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(force)?,
        Commands::Ask { query } => commands::ask::run(query).await?,
        Commands::Chat => commands::chat::run().await?,
        Commands::Serve { port, host } => commands::serve::run(port, host).await?,
    }

    Ok(())
}
