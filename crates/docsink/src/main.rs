//! Docsink - stream log records into MongoDB
//!
//! # Usage
//!
//! ```bash
//! # Read NDJSON records from stdin
//! tail -F access.ndjson | docsink --config docsink.toml
//!
//! # Override the configured log level
//! docsink --config docsink.toml --log-level debug < records.ndjson
//! ```

mod input;
mod sink_builder;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use docsink_config::{Config, LogConfig, LogFormat, LogLevel, LogOutput};
use docsink_sinks::MongoSink;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Chunks buffered between the reader and the sink
const CHANNEL_CAPACITY: usize = 64;

/// Docsink - stream log records into MongoDB
#[derive(Parser, Debug)]
#[command(name = "docsink")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "docsink.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long)]
    log_level: Option<LogLevel>,

    /// Records per chunk handed to the sink
    #[arg(long, default_value_t = 500)]
    chunk_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    init_logging(&config.log, cli.log_level)?;

    let mongo = sink_builder::mongo_config(&config.mongo);
    info!(
        namespace = %mongo.namespace(),
        broken_fields = ?mongo.broken_fields,
        "connecting to MongoDB"
    );

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let sink = MongoSink::connect(mongo, rx)
        .await
        .context("failed to prepare MongoDB sink")?;
    let sink_task = tokio::spawn(sink.run());

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    match input::forward(stdin, tx, cli.chunk_size, wait_for_shutdown()).await {
        Ok(stats) => info!(
            lines = stats.lines,
            records = stats.records,
            skipped = stats.skipped,
            "input finished, waiting for final flush"
        ),
        Err(e) => error!(error = %e, "input failed, flushing what was read"),
    }

    match sink_task.await {
        Ok(Ok(snapshot)) => {
            info!(
                written = snapshot.documents_written,
                recovered = snapshot.documents_recovered,
                permanent_failures = snapshot.permanent_failures,
                dropped = snapshot.dropped_documents,
                "docsink finished"
            );
            Ok(())
        }
        Ok(Err(e)) => Err(e).context("mongo sink failed"),
        Err(e) => Err(e).context("mongo sink task panicked"),
    }
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(config: &LogConfig, cli_level: Option<LogLevel>) -> Result<()> {
    let level = config.effective_level(cli_level);
    let filter = EnvFilter::try_new(level.as_str())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let writer = match &config.output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Arc::new(file))
        }
    };

    let layer = match config.format {
        LogFormat::Console => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).with(filter).init();

    Ok(())
}
