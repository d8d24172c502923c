//! Ports Ingest - load a ports JSON document from disk

use anyhow::{Context, Result};
use clap::Parser;
use ports_common::{
    logging::{init_logging, LogConfig, LogLevel},
    shutdown::shutdown_signal,
};
use ports_ingest::{
    config::{IngestConfig, StoreConfig},
    decoder::PortDecoder,
    pipeline::{with_deadline, Pipeline},
    store::{MemoryPortStore, PgPortStore, PortStore},
};
use std::{path::PathBuf, sync::Arc};
use tokio::{fs::File, io::BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ports-ingest")]
#[command(author, version, about = "Load a ports JSON document into the ports table")]
struct Cli {
    /// JSON document mapping port keys to port records
    path: PathBuf,

    /// Decode and validate only; nothing is written to the database
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("ports-ingest")
        .filter_directives("sqlx=warn")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let ingest_config = IngestConfig::from_env()?;

    let file = File::open(&cli.path)
        .await
        .with_context(|| format!("Failed to open {}", cli.path.display()))?;
    info!(path = %cli.path.display(), dry_run = cli.dry_run, "Starting ingestion");

    // Reject an empty or non-object document before touching the database.
    let mut decoder =
        PortDecoder::with_max_record_bytes(BufReader::new(file), ingest_config.max_record_bytes)
            .await
            .with_context(|| format!("Cannot decode {}", cli.path.display()))?;

    let (store, pg): (Arc<dyn PortStore>, Option<PgPortStore>) = if cli.dry_run {
        (Arc::new(MemoryPortStore::new()), None)
    } else {
        let store = PgPortStore::connect(&StoreConfig::from_env()?).await?;
        store.migrate().await?;
        (Arc::new(store.clone()), Some(store))
    };

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let run_token = with_deadline(&shutdown, ingest_config.deadline());
    let _run_guard = run_token.clone().drop_guard();

    let result = Pipeline::new(store).run(&mut decoder, &run_token).await;

    if let Some(pg) = pg {
        pg.close().await;
    }

    let summary = result.with_context(|| format!("Ingestion of {} aborted", cli.path.display()))?;

    if summary.cancelled {
        warn!(stored = summary.stored, "Ingestion stopped before the end of the document");
    }
    for failure in &summary.failures {
        warn!(
            key = failure.key.as_deref().unwrap_or_default(),
            stage = ?failure.stage,
            error = %failure.message,
            "Dropped port"
        );
    }

    info!(
        decoded = summary.decoded,
        stored = summary.stored,
        rejected = summary.rejected,
        decode_failures = summary.decode_failures,
        store_failures = summary.store_failures,
        "Ingestion complete"
    );
    Ok(())
}
