//! ferrule CLI: the main entry point.
//!
//! Commands:
//! - `run`: send one message and print the answer
//! - `chat`: interactive session over the same agent
//! - `tools`: list the tools the model can call
//! - `config`: show, locate or initialize configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "ferrule", about = "ferrule: an AI coding agent for the terminal", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.ferrule/config.toml
    #[arg(long, global = true, env = "FERRULE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the model identifier
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Override the working directory tools operate in
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// Override the maximum number of model calls per message
    #[arg(long, global = true)]
    max_turns: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single message and print the answer
    Run {
        /// The message; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },

    /// Start an interactive session
    Chat,

    /// List available tools
    Tools,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (default)
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // These must work even when the config file is broken.
    match &cli.command {
        Commands::Config {
            action: Some(ConfigAction::Path),
        } => return commands::config_cmd::path(cli.config.as_deref()),
        Commands::Config {
            action: Some(ConfigAction::Init { force }),
        } => return commands::config_cmd::init(cli.config.as_deref(), *force),
        _ => {}
    }

    let overrides = commands::Overrides {
        config: cli.config,
        model: cli.model,
        cwd: cli.cwd,
        max_turns: cli.max_turns,
    };
    let config = commands::load_config(&overrides)?;
    init_tracing(cli.verbose || config.debug);

    match cli.command {
        Commands::Run { prompt } => commands::run::run(&config, &prompt.join(" ")).await,
        Commands::Chat => commands::chat::run(&config).await,
        Commands::Tools => commands::tools::run(&config),
        Commands::Config { .. } => commands::config_cmd::show(&config),
    }
}
