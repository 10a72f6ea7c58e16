mod chat_cmd;
mod config_cmd;
mod serve_cmd;
mod status_cmd;
mod terminal_output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use chatbox_config::{apply_env_overrides, config_dir, config_file_path, load_config};
use chatbox_logging::{init_logger, LoggerOptions};

#[derive(Parser)]
#[command(name = "chatbox")]
#[command(about = "Chatbox: streaming chat gateway and terminal client")]
#[command(version)]
struct Cli {
    /// Path to config.yaml (defaults to ~/.chatbox/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the streaming chat gateway
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind to
        #[arg(long)]
        bind: Option<String>,
        /// Serve canned echo replies instead of calling an upstream model
        #[arg(long)]
        mock: bool,
    },
    /// Chat with a running gateway from the terminal
    Chat {
        /// Gateway chat endpoint
        #[arg(long)]
        endpoint: Option<String>,
        /// Model to request
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Show gateway health
    Status,
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config with secrets redacted
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli
        .config
        .unwrap_or_else(|| config_file_path(&config_dir()));

    let mut config = load_config(&path).await?;
    apply_env_overrides(&mut config);

    init_logger(&LoggerOptions {
        level: config.logging.level.clone(),
        dir: config.logging.dir.clone(),
        json: config.logging.json,
    });
    chatbox_config::check(&config, &path)?;

    match cli.command {
        Commands::Serve { port, bind, mock } => {
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            serve_cmd::run(&config, mock).await?;
        }
        Commands::Chat { endpoint, model } => {
            if let Some(endpoint) = endpoint {
                config.client.endpoint = endpoint;
            }
            if let Some(model) = model {
                config.client.model = model;
            }
            chat_cmd::run(&config).await?;
        }
        Commands::Status => status_cmd::run(&config).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => config_cmd::show(&config)?,
            ConfigAction::Path => println!("{}", path.display()),
        },
    }

    Ok(())
}
