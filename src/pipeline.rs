//! The two run phases and their wiring to real collaborators.
//!
//! - [`collect`]: open the feed, paginate, rank, write a listing
//! - [`retrieve`]: read a listing and archive every entry
//!
//! Both own exactly one browser session, closed before returning on every
//! path. Only the errors returned here are fatal to the process.

use crate::browser::{BrowserRenderer, BrowserSession, RenderSettings, open_feed};
use crate::config::Config;
use crate::error::PipelineError;
use crate::outputs::listing::{find_latest_listing, read_listing, write_listing};
use crate::ranking::rank;
use crate::retrieve::{RetrievalSettings, Retriever, RunSummary};
use crate::scrapers::extract::FeedLayout;
use crate::scrapers::paginate::{CollectionOutcome, PaginationSettings, Paginator};
use crate::transport::{BufferedTransport, HttpSettings, StreamingTransport};
use crate::utils::ensure_writable_dir;
use chrono::Local;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

async fn paginate_feed(
    session: &BrowserSession,
    layout: &FeedLayout,
    config: &Config,
) -> Result<CollectionOutcome, PipelineError> {
    let page = open_feed(session, &config.feed, config.retry.navigation).await?;
    let paginator = Paginator::new(layout, PaginationSettings::from_config(&config.feed, &config.retry));
    let outcome = paginator.collect(&page).await;
    if let Err(e) = page.close().await {
        warn!(error = %e, "Failed to close feed page");
    }
    Ok(outcome?)
}

/// Collect the newest publications and write them as a listing.
///
/// Returns the listing path, or `None` when nothing was found.
#[instrument(level = "info", skip_all, fields(max_records = config.feed.max_records))]
pub async fn collect(config: &Config) -> Result<Option<PathBuf>, PipelineError> {
    let layout = FeedLayout::from_config(&config.feed)?;
    let session = BrowserSession::launch(&config.browser, config.retry.launch).await?;
    let outcome = paginate_feed(&session, &layout, config).await;
    session.close().await;
    let outcome = outcome?;

    info!(
        terminal = ?outcome.terminal,
        progress_steps = outcome.progress_steps,
        stalls = outcome.stalls,
        checkpoints = outcome.checkpoints,
        extracted = outcome.publications.len(),
        "Pagination finished"
    );

    let ranked = rank(outcome.publications, config.feed.max_records);
    let path = write_listing(
        &config.paths.listing_dir,
        &config.paths.listing_prefix,
        &ranked,
        Local::now(),
    )
    .await?;
    Ok(path)
}

/// Archive every publication of `input`, or of the newest listing.
#[instrument(level = "info", skip_all)]
pub async fn retrieve(config: &Config, input: Option<PathBuf>) -> Result<RunSummary, PipelineError> {
    let input = match input {
        Some(path) => path,
        None => {
            let dir = &config.paths.listing_dir;
            find_latest_listing(dir, &config.paths.listing_prefix)?
                .ok_or_else(|| PipelineError::NoInput(dir.display().to_string()))?
        }
    };
    info!(input = %input.display(), "Using publications listing");

    let publications = read_listing(&input).await?;
    if publications.is_empty() {
        warn!("No publications found to process");
        return Ok(RunSummary::default());
    }

    let downloads_dir = config.paths.downloads_dir.clone();
    ensure_writable_dir(&downloads_dir).await?;

    let http = HttpSettings::from_config(&config.retrieval);
    let primary = StreamingTransport::new(&http)?;
    let fallback = BufferedTransport::new(&http)?;
    let render_settings = RenderSettings::from_config(config)?;

    let session = BrowserSession::launch(&config.browser, config.retry.launch).await?;
    let summary = {
        let retriever = Retriever::new(
            primary,
            fallback,
            BrowserRenderer::new(&session, render_settings),
            RetrievalSettings::from_config(config),
            config.dataset.clone(),
            downloads_dir,
        );
        retriever.retrieve_all(&publications).await
    };
    session.close().await;
    Ok(summary)
}
