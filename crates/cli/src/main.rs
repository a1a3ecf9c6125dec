//! turnstile CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Write a default config
//! - `chat`     — Interactive chat or single-message mode
//! - `session`  — Inspect and delete stored conversations
//! - `config`   — Show, validate or locate the configuration
//! - `doctor`   — Diagnose system health

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "turnstile",
    about = "turnstile — knowledge-aware conversation orchestrator",
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
    /// Create the configuration directory and a default config.toml
    Init,

    /// Chat through the orchestrator
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation thread id
        #[arg(short, long, env = "TURNSTILE_THREAD", conflicts_with = "new")]
        thread: Option<String>,

        /// Start a new thread with a generated id
        #[arg(long)]
        new: bool,

        /// Print turn events and the turn trace
        #[arg(long)]
        trace: bool,
    },

    /// Inspect stored conversations
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose system health
    Doctor,
}

#[derive(Subcommand)]
enum SessionAction {
    /// List thread ids with a checkpoint
    List,
    /// Print a thread's history and last trace
    Show { thread: String },
    /// Delete a thread's checkpoint
    Delete { thread: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API keys redacted)
    Show,
    /// Validate the configuration
    Validate,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
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
        Commands::Init => commands::init::run().await?,
        Commands::Chat {
            message,
            thread,
            new,
            trace,
        } => {
            let thread = if new { Some(uuid::Uuid::new_v4().to_string()) } else { thread };
            commands::chat::run(message, thread, trace).await?
        }
        Commands::Session { action } => match action {
            SessionAction::List => commands::session::list().await?,
            SessionAction::Show { thread } => commands::session::show(&thread).await?,
            SessionAction::Delete { thread } => commands::session::delete(&thread).await?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
