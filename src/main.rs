//! # ECB Archiver
//!
//! Archives publications from the European Central Bank's press feed.
//!
//! ## Features
//!
//! - Drives the infinite-scroll publications feed in headless Chromium until
//!   enough entries are loaded, extracting at regular checkpoints
//! - Deduplicates by URL and keeps the newest N publications
//! - Downloads PDF links directly (streaming client, then a buffered fallback)
//!   and renders every other page to PDF
//! - Writes a JSON provenance sidecar next to each archived PDF
//!
//! ## Usage
//!
//! ```sh
//! ecb_archiver collect -n 100
//! ecb_archiver retrieve --downloads-dir ./downloads
//! ecb_archiver run
//! ```
//!
//! ## Architecture
//!
//! 1. **Collection**: paginate the feed, extract, rank, write a listing
//! 2. **Retrieval**: for each listed publication, archive a PDF and its
//!    sidecar; failures are counted and skipped
//!
//! Every external call runs under a bounded retry policy. Only
//! initialisation and configuration failures stop the process.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cli;
mod config;
mod error;
mod metadata;
mod models;
mod naming;
mod outputs;
mod pipeline;
mod ranking;
mod retrieve;
mod retry;
mod scrapers;
mod transport;
mod utils;

use cli::{Cli, Command};
use config::Config;
use retrieve::RunSummary;

fn log_summary(summary: &RunSummary) {
    info!(
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Retrieval summary"
    );
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ecb_archiver starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    args.apply_overrides(&mut config);
    config.validate()?;

    let result = match &args.command {
        Command::Collect { .. } => pipeline::collect(&config).await.map(|path| {
            match path {
                Some(path) => info!(listing = %path.display(), "Collection complete"),
                None => info!("Collection complete; nothing to list"),
            }
        }),
        Command::Retrieve { input } => pipeline::retrieve(&config, input.clone())
            .await
            .map(|summary| log_summary(&summary)),
        Command::Run { .. } => match pipeline::collect(&config).await {
            Ok(Some(listing)) => pipeline::retrieve(&config, Some(listing))
                .await
                .map(|summary| log_summary(&summary)),
            Ok(None) => {
                info!("No publications collected; skipping retrieval");
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    let elapsed = start_time.elapsed();
    match result {
        Ok(()) => {
            info!(elapsed_secs = elapsed.as_secs_f64(), "ecb_archiver finished");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, elapsed_secs = elapsed.as_secs_f64(), "ecb_archiver failed");
            Err(e.into())
        }
    }
}
