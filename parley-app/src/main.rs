use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parley_common::observability::{LogConfig, LogFormat, init_logging};
use parley_config::{ParleyConfig, ParleyConfigLoader, default_config_path};
use std::path::PathBuf;
mod shell;
mod wiring;

/// Ask questions of a hosted assistant that can read the web for you.
#[derive(Debug, Parser)]
#[command(name = "parley", version)]
struct Cli {
    /// Config file. Without it, the per-user config and ./parley.yaml are read if present.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Assistant to talk to; overrides `assistant.assistant_id` from config.
    #[arg(long, env = "PARLEY_ASSISTANT_ID", global = true)]
    assistant_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat on a new thread. `/quit` exits.
    Chat {
        /// Where generated files and images are written.
        #[arg(long, default_value = "parley-out")]
        out: PathBuf,
    },
    /// Ask a single question and print the answer.
    Ask {
        message: String,
        #[arg(long, default_value = "parley-out")]
        out: PathBuf,
    },
    /// Create an assistant from the config and print its id.
    CreateAssistant,
}

fn load_config(explicit: Option<&PathBuf>) -> Result<ParleyConfig> {
    let loader = match explicit {
        Some(path) => ParleyConfigLoader::new().with_file(path),
        None => {
            let mut loader = ParleyConfigLoader::new();
            if let Some(user) = default_config_path() {
                loader = loader.with_optional_file(user);
            }
            loader.with_optional_file("parley.yaml")
        }
    };
    loader.load().context("failed to load configuration")
}

fn log_config(cfg: &ParleyConfig) -> Result<LogConfig> {
    let format: LogFormat = cfg
        .logging
        .format
        .parse()
        .map_err(|e| anyhow::anyhow!("logging.format: {e}"))?;
    Ok(LogConfig {
        app_name: "parley",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.emit_stderr,
        format,
        default_filter: cfg.logging.filter.clone(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Config (env wins over files), then logging as configured.
    let cfg = load_config(cli.config.as_ref())?;
    let log_path = init_logging(log_config(&cfg)?)?;
    tracing::info!(log = %log_path.display(), "parley starting");

    let app = wiring::build_from_config(&cfg)?;

    match cli.command {
        Command::CreateAssistant => {
            let id = app.create_assistant(&cfg.assistant).await?;
            println!("{id}");
            Ok(())
        }
        Command::Chat { out } => {
            let assistant_id = wiring::resolve_assistant_id(cli.assistant_id, &cfg.assistant)?;
            shell::chat(&app, &assistant_id, &out).await
        }
        Command::Ask { message, out } => {
            let assistant_id = wiring::resolve_assistant_id(cli.assistant_id, &cfg.assistant)?;
            shell::ask(&app, &assistant_id, &message, &out).await
        }
    }
}
