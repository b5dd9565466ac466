//! deskdemo: desktop environment demo backend
//!
//! Main binary with subcommands:
//! - `serve`: HTTP server (chat relay, window API, telemetry showcase)
//! - `chat`: Terminal chat against a running server

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod chat;

#[derive(Parser)]
#[command(name = "deskdemo")]
#[command(about = "Desktop environment demo with a streaming agent chat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind
        #[arg(long, env = "DESKDEMO_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(long, env = "DESKDEMO_PORT", default_value = "3000")]
        port: u16,

        /// Static files directory, served under /static
        #[arg(long, env = "DESKDEMO_STATIC_DIR")]
        static_dir: Option<String>,

        /// Model passed to the claude CLI
        #[arg(long, env = "DESKDEMO_CLAUDE_MODEL")]
        model: Option<String>,

        /// Maximum agent turns per chat request
        #[arg(long, env = "DESKDEMO_MAX_TURNS", default_value = "10")]
        max_turns: u32,

        /// Seconds to wait for each line of agent output
        #[arg(long, env = "DESKDEMO_AGENT_TIMEOUT", default_value = "120")]
        agent_timeout: u64,

        /// Path to the claude CLI (looked up on PATH when unset)
        #[arg(long, env = "DESKDEMO_CLAUDE_BIN")]
        claude_bin: Option<PathBuf>,
    },

    /// Chat with a running server from the terminal
    Chat {
        /// Server URL
        #[arg(long, env = "DESKDEMO_URL", default_value = "http://localhost:3000")]
        url: String,

        /// Send a single message and exit instead of reading from stdin
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "deskdemo=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            static_dir,
            model,
            max_turns,
            agent_timeout,
            claude_bin,
        } => {
            run_server(
                &host,
                port,
                static_dir.as_deref(),
                model,
                max_turns,
                agent_timeout,
                claude_bin,
            )
            .await
        }

        Commands::Chat { url, message } => chat::run(&url, message).await,
    }
}

async fn run_server(
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    model: Option<String>,
    max_turns: u32,
    agent_timeout: u64,
    claude_bin: Option<PathBuf>,
) -> Result<()> {
    use deskdemo_claude::Client;
    use deskdemo_web::{AppState, relay_agent_config};

    let config = relay_agent_config(model, max_turns, agent_timeout, claude_bin)
        .map_err(|e| miette::miette!("invalid agent configuration: {}", e))?;

    tracing::info!(
        model = config.model.as_deref().unwrap_or("default"),
        max_turns,
        "chat relay configured"
    );

    let state = Arc::new(AppState::new(Arc::new(Client::new(config))));

    deskdemo_web::run_server(state, host, port, static_dir)
        .await
        .map_err(|e| miette::miette!("{}", e))
}
