//! Ports Server - HTTP ingestion endpoints and stream client

use anyhow::Result;
use clap::{Parser, Subcommand};
use ports_common::{
    logging::{init_logging, LogConfig, LogLevel},
    shutdown::shutdown_signal,
};
use ports_ingest::{pipeline::Pipeline, store::PgPortStore};
use ports_server::{
    client::{StreamClient, DEFAULT_CHUNK_SIZE},
    config::Config,
    features::{self, AppState},
};
use std::{future::IntoFuture, path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ports-server")]
#[command(author, version, about = "Ports ingestion server")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the upload endpoints
    Serve,

    /// Send a local JSON document to a running server's stream endpoint
    Push {
        /// Server address, `host:port` or a base URL
        addr: String,

        /// JSON document to send
        path: PathBuf,

        /// Bytes per chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
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
        .log_file_prefix("ports-server")
        .filter_directives("tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    match cli.command {
        Command::Serve => serve().await,
        Command::Push {
            addr,
            path,
            chunk_size,
        } => {
            let ack = StreamClient::new(&addr)
                .with_chunk_size(chunk_size)
                .push_file(&path)
                .await?;

            info!(
                result = %ack.result,
                decoded = ack.summary.decoded,
                stored = ack.summary.stored,
                dropped = ack.summary.dropped(),
                "Upload acknowledged"
            );
            Ok(())
        },
    }
}

async fn serve() -> Result<()> {
    info!("Starting ports server");

    let config = Config::load()?;
    info!(
        address = %config.server.bind_address(),
        upload_body_limit = config.server.upload_body_limit,
        "Configuration loaded"
    );

    let store = PgPortStore::connect(&config.store).await?;
    store.migrate().await?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let pipeline = Pipeline::new(Arc::new(store.clone()))
        .with_max_record_bytes(config.ingest.max_record_bytes);
    let state = AppState::new(pipeline, shutdown.clone()).with_deadline(config.ingest.deadline());
    let app = features::router(state, config.server.upload_body_limit);

    let listener = tokio::net::TcpListener::bind(config.server.bind_address()).await?;
    info!(address = %listener.local_addr()?, "Server listening");

    let server = axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .into_future();

    let grace = config.server.shutdown_timeout();
    tokio::select! {
        result = server => result?,
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(timeout_secs = grace.as_secs(), "Shutdown timeout elapsed, dropping open connections");
        },
    }

    store.close().await;
    info!("Server shut down gracefully");
    Ok(())
}
