//! clearproofd: runs the analysis worker and the startup backfill scan
//! against the configured database until interrupted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use clearproof::{load_config, logging, Database, Pipeline};
use log::info;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "clearproofd", version, about = "Background analysis daemon for clearproof")]
struct Args {
    /// Path to the JSON config file.
    #[arg(short, long, env = "CLEARPROOF_CONFIG", default_value = "clearproof.json")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_json).context("Failed to initialize logging")?;

    info!("Starting clearproofd {}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let db_path = config
        .resolved_database_path()
        .context("Could not determine a database path; set databasePath in the config")?;
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    info!("Database: {}", clearproof::sanitize::redact_path(&db_path));

    let pipeline = Pipeline::from_config(&config, db).context("Failed to build pipeline")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            info!("Shutdown requested");
            cancel.cancel();
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let handles = pipeline.start(&cancel);
    handles.join().await;

    info!("clearproofd stopped");
    Ok(())
}
