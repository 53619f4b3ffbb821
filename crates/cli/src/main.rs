//! Pengate CLI: the main entry point.
//!
//! Commands:
//! - `serve`:   Start the HTTP gateway
//! - `script`:  Run a batch-edit script against a JSON document
//! - `prompt`:  Print the assembled system prompt
//! - `config`:  Print the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pengate_agent::AgentMode;
use pengate_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "pengate",
    about = "Pengate: AI design-agent gateway",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./pengate.toml)
    #[arg(short, long, global = true, env = "PENGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a batch-edit script and print the report
    Script {
        /// Script file
        file: PathBuf,

        /// Document to edit (an empty document when omitted)
        #[arg(short, long)]
        document: Option<PathBuf>,

        /// Write the edited document here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the system prompt for a mode
    Prompt {
        #[arg(short, long, default_value = "edits", value_parser = parse_mode)]
        mode: AgentMode,

        /// Canvas context to append
        #[arg(long)]
        context: Option<String>,
    },

    /// Print the effective configuration (secrets redacted)
    Config,
}

fn parse_mode(s: &str) -> Result<AgentMode, String> {
    AgentMode::parse(s).ok_or_else(|| format!("unknown mode '{s}' (expected edits or fast)"))
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    Ok(config.map_err(|e| format!("Failed to load config: {e}"))?)
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let config = load_config(cli.config.as_ref())?;
            init_tracing(cli.verbose, cli.log_json || config.logging.json);
            commands::serve::run(config, port).await?;
        }
        Commands::Config => {
            let config = load_config(cli.config.as_ref())?;
            commands::config_cmd::show(&config);
        }
        Commands::Script {
            file,
            document,
            out,
        } => {
            init_tracing(cli.verbose, cli.log_json);
            commands::script::run(&file, document.as_deref(), out.as_deref()).await?;
        }
        Commands::Prompt { mode, context } => {
            commands::prompt::run(mode, context.as_deref());
        }
    }

    Ok(())
}
