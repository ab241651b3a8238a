//! Driving the infinite-scroll feed until enough publications are loaded.
//!
//! The driver is a small state machine:
//!
//! ```text
//! Idle → Loading → {Stalled, Progressing} → Extracting → {Progressing, Done, Aborted}
//! ```
//!
//! Each step measures the loaded content, compares it with the previous
//! measurement and asks the feed for more. Growth resets the stall counter
//! and counts as progress; no growth counts as a stall. Every
//! `checkpoint_every` progress steps the current snapshot is extracted to
//! check whether the target count is reached (`Done`). Reaching the stall
//! ceiling ends pagination early (`Aborted`), which is not a failure. Both
//! terminal states finish with one full-snapshot extraction.

use crate::config::{FeedConfig, RetryPresets};
use crate::error::BrowserError;
use crate::models::Publication;
use crate::retry::RetryPolicy;
use crate::scrapers::extract::{FeedLayout, extract_publications};
use crate::utils::pause;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// What the driver needs from a live feed page.
pub trait FeedSession {
    /// Resolve once `selector` matches, or fail after `timeout`.
    async fn wait_for_container(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;
    /// Current size of the loaded content (e.g. scroll height).
    async fn content_extent(&self) -> Result<i64, BrowserError>;
    /// Ask the feed to load more content.
    async fn load_more(&self) -> Result<(), BrowserError>;
    /// Current markup of the page.
    async fn snapshot(&self) -> Result<String, BrowserError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationState {
    Idle,
    Loading,
    Progressing,
    Stalled,
    Extracting,
    Done,
    Aborted,
}

impl PaginationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaginationState::Done | PaginationState::Aborted)
    }
}

/// Timing and cadence of the driver.
#[derive(Debug, Clone)]
pub struct PaginationSettings {
    pub container_selector: String,
    pub container_timeout: Duration,
    pub initial_settle: Duration,
    pub settle: Duration,
    pub checkpoint_every: u32,
    pub stall_ceiling: u32,
    pub container_wait: RetryPolicy,
    pub measurement: RetryPolicy,
    pub snapshot: RetryPolicy,
}

impl PaginationSettings {
    pub fn from_config(feed: &FeedConfig, retry: &RetryPresets) -> Self {
        Self {
            container_selector: feed.container_selector.clone(),
            container_timeout: Duration::from_secs(feed.container_timeout_secs),
            initial_settle: Duration::from_millis(feed.initial_settle_ms),
            settle: Duration::from_millis(feed.settle_ms),
            checkpoint_every: feed.checkpoint_every.max(1),
            stall_ceiling: feed.stall_ceiling.max(1),
            container_wait: retry.container_wait,
            measurement: retry.measurement,
            snapshot: retry.snapshot,
        }
    }
}

/// Result of one pagination run.
#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub terminal: PaginationState,
    pub progress_steps: u32,
    pub stalls: u32,
    pub checkpoints: u32,
    /// Publications from the final full-snapshot extraction.
    pub publications: Vec<Publication>,
}

pub struct Paginator<'a> {
    layout: &'a FeedLayout,
    settings: PaginationSettings,
}

impl<'a> Paginator<'a> {
    pub fn new(layout: &'a FeedLayout, settings: PaginationSettings) -> Self {
        Self { layout, settings }
    }

    /// Paginate `session` to a terminal state and extract the final snapshot.
    ///
    /// Only the final snapshot can fail the run; every earlier failure is
    /// absorbed as a stall or a skipped checkpoint.
    #[instrument(level = "info", skip_all, fields(max = self.layout.max_records))]
    pub async fn collect<S: FeedSession>(&self, session: &S) -> Result<CollectionOutcome, BrowserError> {
        let max = self.layout.max_records;
        let every = self.settings.checkpoint_every;
        let ceiling = self.settings.stall_ceiling;

        let mut state = PaginationState::Idle;
        let mut previous_extent: i64 = 0;
        let mut stalls = 0u32;
        let mut progress = 0u32;
        let mut checkpoints = 0u32;

        while !state.is_terminal() {
            state = match state {
                PaginationState::Idle => PaginationState::Loading,
                PaginationState::Loading => {
                    self.wait_for_container(session).await;
                    pause(self.settings.initial_settle).await;
                    info!(target_records = max, "Paginating feed");
                    PaginationState::Progressing
                }
                PaginationState::Progressing | PaginationState::Stalled if stalls >= ceiling => {
                    info!(stalls, "Stopped paginating after repeated stalls");
                    PaginationState::Aborted
                }
                PaginationState::Progressing | PaginationState::Stalled => 'step: {
                    let measured = self
                        .settings
                        .measurement
                        .run("content_extent", move || session.content_extent())
                        .await;

                    let extent = match measured {
                        Ok(extent) => extent,
                        Err(e) => {
                            // no load attempt on this step; one stall per step
                            stalls += 1;
                            warn!(error = %e, stalls, "Could not measure feed");
                            pause(self.settings.settle).await;
                            break 'step PaginationState::Stalled;
                        }
                    };

                    let next = if extent == previous_extent {
                        stalls += 1;
                        debug!(stalls, ceiling, "No new content loaded");
                        PaginationState::Stalled
                    } else {
                        stalls = 0;
                        progress += 1;
                        previous_extent = extent;
                        debug!(progress, extent, "Feed grew");
                        if progress % every == 0 {
                            PaginationState::Extracting
                        } else {
                            PaginationState::Progressing
                        }
                    };

                    let loaded = self
                        .settings
                        .measurement
                        .run("load_more", move || session.load_more())
                        .await;
                    pause(self.settings.settle).await;

                    match loaded {
                        Ok(()) => next,
                        Err(e) => {
                            if next != PaginationState::Stalled {
                                stalls += 1;
                            }
                            warn!(error = %e, stalls, "Could not trigger loading");
                            PaginationState::Stalled
                        }
                    }
                }
                PaginationState::Extracting => {
                    checkpoints += 1;
                    match self.snapshot(session).await {
                        Ok(html) => {
                            let found = extract_publications(&html, self.layout).len();
                            info!(progress, found, max, "Checkpoint extraction");
                            if found >= max {
                                PaginationState::Done
                            } else {
                                PaginationState::Progressing
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Checkpoint snapshot failed; continuing");
                            PaginationState::Progressing
                        }
                    }
                }
                PaginationState::Done | PaginationState::Aborted => state,
            };
        }

        info!(?state, progress, stalls, checkpoints, "Pagination finished; final extraction");
        let html = self.snapshot(session).await?;
        let publications = extract_publications(&html, self.layout);

        Ok(CollectionOutcome {
            terminal: state,
            progress_steps: progress,
            stalls,
            checkpoints,
            publications,
        })
    }

    async fn wait_for_container<S: FeedSession>(&self, session: &S) {
        let selector = self.settings.container_selector.as_str();
        let timeout = self.settings.container_timeout;
        let waited = self
            .settings
            .container_wait
            .run("wait_for_container", move || session.wait_for_container(selector, timeout))
            .await;
        match waited {
            Ok(()) => debug!(selector, "Feed container present"),
            Err(e) => warn!(selector, error = %e, "Feed container never appeared; proceeding anyway"),
        }
    }

    async fn snapshot<S: FeedSession>(&self, session: &S) -> Result<String, BrowserError> {
        self.settings
            .snapshot
            .run("snapshot", move || session.snapshot())
            .await
    }
}
