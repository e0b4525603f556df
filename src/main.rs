use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gomafia_import::config::{ImportConfig, DEFAULT_BASE_URL};
use gomafia_import::domain::models::SyncType;
use gomafia_import::repository::ImportStore;
use gomafia_import::service::{run_scheduled, ClientType, HttpSession, ImportOrchestrator};
use gomafia_import::{db, lifecycle};

#[derive(Parser)]
#[command(name = "gomafia-import", version, about = "Import gomafia.pro data into SQLite")]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "GOMAFIA_DATABASE", default_value = "gomafia.db", global = true)]
    database: PathBuf,

    #[arg(long, env = "GOMAFIA_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// Minimum delay between requests
    #[arg(long, env = "GOMAFIA_RATE_LIMIT_MS", global = true)]
    rate_limit_ms: Option<u64>,

    #[arg(long, env = "GOMAFIA_BATCH_SIZE", global = true)]
    batch_size: Option<usize>,

    /// Page cap for listings in FULL mode
    #[arg(long, env = "GOMAFIA_MAX_PAGES", global = true)]
    max_pages: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one import and exit
    Run {
        #[arg(long, value_enum, default_value_t = Mode::Incremental)]
        mode: Mode,
    },
    /// Print run status, the resume checkpoint and recent sync logs
    Status {
        #[arg(long, default_value_t = 10)]
        logs: i64,
    },
    /// Run INCREMENTAL imports on a fixed cadence until Ctrl-C
    Schedule {
        #[arg(long, env = "GOMAFIA_SCHEDULE_INTERVAL_SECS", default_value_t = 3600)]
        interval_secs: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Full,
    Incremental,
}

impl From<Mode> for SyncType {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Full => SyncType::Full,
            Mode::Incremental => SyncType::Incremental,
        }
    }
}

impl Cli {
    fn import_config(&self) -> ImportConfig {
        let defaults = ImportConfig::default();
        ImportConfig {
            base_url: self.base_url.clone(),
            rate_limit_ms: self.rate_limit_ms.unwrap_or(defaults.rate_limit_ms),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            max_listing_pages: self.max_pages.or(defaults.max_listing_pages),
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lifecycle::init_logging();
    let cli = Cli::parse();
    let config = cli.import_config();

    let pool = db::init_db(&cli.database).await?;
    let store = ImportStore::new(pool);
    let session = HttpSession::new(ClientType::HeavyEmulation, config.request_timeout)
        .context("failed to create HTTP session")?;
    let orchestrator = Arc::new(ImportOrchestrator::new(store, config, Arc::new(session)));

    match cli.command {
        Command::Run { mode } => {
            let shutdown = lifecycle::shutdown_on_ctrl_c();
            let outcome = orchestrator.run_with_shutdown(mode.into(), &shutdown).await;
            orchestrator.shutdown().await;

            let outcome = outcome?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Status { logs } => {
            let report = json!({
                "status": orchestrator.status().await?,
                "checkpoint": orchestrator.inspect_checkpoint().await?,
                "recent_sync_logs": orchestrator.recent_sync_logs(logs).await?,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Schedule { interval_secs } => {
            let shutdown = lifecycle::shutdown_on_ctrl_c();
            run_scheduled(
                orchestrator.clone(),
                Duration::from_secs(interval_secs.max(1)),
                shutdown,
            )
            .await;
            orchestrator.shutdown().await;
        }
    }

    Ok(())
}
