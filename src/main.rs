use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use agrogpt::commands;
use agrogpt::{CompletionClient, Config, ReqwestTransport, SessionManager};

#[derive(Parser)]
#[command(name = "agrogpt")]
#[command(version)]
#[command(about = "Your AI-powered agricultural assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Model identifier to request
    #[arg(long, global = true)]
    model: Option<String>,

    /// Chat-completion endpoint URL
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Config file (defaults to ~/.agrogpt/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// List the quick questions
    Quick,
    /// Show agricultural tips
    Tips,
    /// Write the effective settings to the config file
    Init,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("agrogpt={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut stdout = io::stdout();
    match &cli.command {
        Some(Commands::Quick) => return commands::list_quick_questions(&mut stdout),
        Some(Commands::Tips) => return commands::show_tips(&mut stdout),
        _ => {}
    }

    let config = load_config(&cli)?;
    if let Some(Commands::Init) = &cli.command {
        return commands::write_config(&config, cli.config.as_deref(), &mut stdout);
    }

    let client = CompletionClient::from_config(&config, Box::new(ReqwestTransport::new()));
    let mut manager = SessionManager::new(config, client);
    let id = manager.create_session();

    match cli.command {
        Some(Commands::Ask { question }) => {
            commands::ask_once(&manager, id, &question.join(" "), &mut stdout).await
        }
        _ => {
            let color = stdout.is_terminal();
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            commands::run_chat(&manager, id, stdin, &mut stdout, color).await
        }
    }
}
