mod api;
mod card;
mod commands;
mod config;
mod progress;
mod push;
mod registry;
mod scheduler;
mod service;
mod words;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;

#[derive(Parser)]
#[command(
    name = "vocabcard",
    version,
    about = "Daily vocabulary card generator and push sidecar"
)]
struct Cli {
    #[arg(short, long, default_value = "~/.vocabcard/config.toml")]
    config: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Run,
    Init,
    Status,
    /// Render one card to a file without going through the host (template work)
    Preview {
        word: String,
        #[arg(long, default_value = "card.png")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Init => {
            config::init_config_dir().await?;
            tracing::info!("Initialized ~/.vocabcard/");
        }
        Commands::Run => run(&cli.config).await?,
        Commands::Status => status(&cli.config)?,
        Commands::Preview { word, out } => preview(&cli.config, &word, &out).await?,
    }
    Ok(())
}

async fn run(config_path: &str) -> Result<()> {
    let cfg = config::load(config_path)?;
    let service = Arc::new(service::Service::new(&cfg)?);

    let sched = scheduler::Scheduler::new(service.clone(), &cfg.schedule);
    tokio::spawn(sched.run());

    let state = api::AppState { service };
    let listener = tokio::net::TcpListener::bind(&cfg.service.bind).await?;
    tracing::info!("vocabcard listening on {}", cfg.service.bind);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
        })
        .await?;
    Ok(())
}

fn status(config_path: &str) -> Result<()> {
    let cfg = config::load(config_path).unwrap_or_default();
    let data_dir = config::expand_tilde(&cfg.data.base_dir.to_string_lossy());
    let bank = words::WordBank::load(&data_dir);
    let progress = progress::ProgressStore::load(&data_dir);

    let status = progress.status(&bank, None);
    let last = if status.last_date.is_empty() {
        "never".to_string()
    } else {
        status.last_date
    };
    println!(
        "daily cards sent: {} / {} (last push: {last})",
        status.sent, status.total
    );
    Ok(())
}

async fn preview(config_path: &str, word: &str, out: &Path) -> Result<()> {
    let cfg = config::load(config_path).unwrap_or_default();
    let service = service::Service::new(&cfg)?;
    let word = service
        .bank
        .get(word)
        .cloned()
        .with_context(|| format!("No such word: {word}"))?;

    let png = service.render_card(word).await?;
    std::fs::write(out, &png)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Wrote {}", out.display());
    Ok(())
}
