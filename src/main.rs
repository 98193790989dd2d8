//! storecrew — run a data-store task through a pipeline of workers
//!
//! Usage:
//!   storecrew run --task "Add the rules of tennis"       → default pipeline, dry-run reasoner
//!   storecrew run --config pipeline.toml --task "..."   → configured pipeline
//!   storecrew check --config pipeline.toml              → validate a pipeline and exit
//!   storecrew init                                      → print the default pipeline as TOML

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use storecrew_agent::{ConversationState, PipelineConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "storecrew",
    about = "Multi-worker pipeline that turns tasks into validated, idempotent store mutations",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one task to termination and print the conversation as JSON
    Run {
        /// Task description handed to the entry worker
        #[arg(short, long)]
        task: String,

        /// Pipeline config (TOML). Default: built-in four-worker pipeline.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// API key for the chat-completions reasoner (overrides api_key_env)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Validate a pipeline config without running it
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the default pipeline config
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Run { task, config, api_key } => {
            let config = load_config(config.as_deref())?;
            let state = run(&config, &task, api_key).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            if let Some(reason) = state.termination().and_then(|t| t.reason.error()) {
                anyhow::bail!("conversation {} ended: {}", state.id(), reason);
            }
        }
        Commands::Check { config } => {
            let config = PipelineConfig::load(&config)?;
            println!(
                "ok: {} workers, {} schemas, entry '{}'",
                config.workers.len(),
                config.schemas.len(),
                config.entry
            );
        }
        Commands::Init => {
            print!("{}", PipelineConfig::default().to_toml());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => Ok(PipelineConfig::load(path)?),
        None => {
            tracing::info!("No config given, using the built-in pipeline");
            let config = PipelineConfig::default();
            config.check()?;
            Ok(config)
        }
    }
}

async fn run(
    config: &PipelineConfig,
    task: &str,
    api_key: Option<String>,
) -> anyhow::Result<ConversationState> {
    let store = config.open_store().await?;
    let reasoner = config.reasoner(api_key);
    let orchestrator = config.build_orchestrator(reasoner, store)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping at the next turn");
            on_ctrl_c.cancel();
        }
    });

    Ok(orchestrator.run_cancellable(task, cancel).await)
}

fn init_tracing(
    log_file: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("--log-file needs a file name"))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storecrew=info,storecrew_agent=info,storecrew_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}
