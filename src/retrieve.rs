//! Archiving each listed publication as a PDF plus a JSON sidecar.
//!
//! Records are handled one at a time, in listing order:
//! 1. Resolve a collision-free `{date}_{title}[_At{n}]` name pair
//! 2. Binary URLs are downloaded: the primary transport under its policy,
//!    then the fallback transport under its own policy once the primary is
//!    exhausted
//! 3. Everything else is rendered to PDF in the browser, which also yields
//!    the creator
//! 4. On success the sidecar is written next to the artifact
//!
//! A failed record is logged and counted; the run moves on to the next one.

use crate::config::{Config, DatasetConfig};
use crate::error::{RetrievalError, TransportError};
use crate::metadata::synthesize;
use crate::models::{Publication, RetrievalResult};
use crate::naming::{base_name, resolve_pair};
use crate::outputs::json::write_sidecar;
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use crate::utils::{pause, truncate_for_log};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{error, info, instrument, warn};

const ARTIFACT_EXT: &str = "pdf";
const SIDECAR_EXT: &str = "json";

/// Produces a PDF of a live page.
pub trait Renderer {
    /// Render `url` into `target` and return the page's creator, or an empty
    /// string when the page names none.
    async fn render(&self, url: &str, target: &Path) -> Result<String, RetrievalError>;
}

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub binary_suffix: String,
    pub inter_record_delay: Duration,
    pub primary: RetryPolicy,
    pub fallback: RetryPolicy,
}

impl RetrievalSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            binary_suffix: config.retrieval.binary_suffix.clone(),
            inter_record_delay: Duration::from_millis(config.retrieval.inter_record_delay_ms),
            primary: config.retry.primary_download,
            fallback: config.retry.fallback_download,
        }
    }
}

/// Counts for one retrieval run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Whether `url` ends with `suffix`, ignoring case.
///
/// The whole URL is compared, so a query or fragment after the suffix sends
/// the record down the render path.
pub fn is_binary_url(url: &str, suffix: &str) -> bool {
    url.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase())
}

async fn remove_if_present(path: &Path) {
    if fs::try_exists(path).await.unwrap_or(false) {
        if let Err(e) = fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Could not remove incomplete artifact");
        }
    }
}

pub struct Retriever<P, F, R> {
    primary: P,
    fallback: F,
    renderer: R,
    settings: RetrievalSettings,
    dataset: DatasetConfig,
    downloads_dir: PathBuf,
}

impl<P, F, R> Retriever<P, F, R>
where
    P: Transport,
    F: Transport,
    R: Renderer,
{
    pub fn new(
        primary: P,
        fallback: F,
        renderer: R,
        settings: RetrievalSettings,
        dataset: DatasetConfig,
        downloads_dir: PathBuf,
    ) -> Self {
        Self {
            primary,
            fallback,
            renderer,
            settings,
            dataset,
            downloads_dir,
        }
    }

    async fn download(&self, url: &str, target: &Path) -> Result<(), RetrievalError> {
        let primary = &self.primary;
        let attempt = self
            .settings
            .primary
            .run_if(primary.name(), TransportError::is_retryable, move || primary.fetch_to(url, target))
            .await;

        let bytes = match attempt {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, transport = self.fallback.name(), "Primary download exhausted; trying fallback");
                let fallback = &self.fallback;
                self.settings
                    .fallback
                    .run(fallback.name(), move || fallback.fetch_to(url, target))
                    .await?
            }
        };
        info!(bytes, path = %target.display(), "Downloaded");
        Ok(())
    }

    /// Archive one publication. Never fails; the result says what happened.
    #[instrument(level = "info", skip_all, fields(url = %publication.url))]
    pub async fn retrieve_one(&self, publication: &Publication) -> RetrievalResult {
        let base = base_name(&publication.date, &publication.title);
        let names = resolve_pair(&self.downloads_dir, &base, ARTIFACT_EXT, SIDECAR_EXT);
        let target = self.downloads_dir.join(&names.artifact);

        let outcome = if is_binary_url(&publication.url, &self.settings.binary_suffix) {
            self.download(&publication.url, &target).await.map(|()| None)
        } else {
            self.renderer.render(&publication.url, &target).await.map(Some)
        };

        let written = match outcome {
            Ok(creator) => {
                let descriptor = synthesize(
                    publication,
                    creator.as_deref().unwrap_or(""),
                    &self.dataset,
                    Utc::now(),
                );
                write_sidecar(&self.downloads_dir, &names.sidecar, &descriptor)
                    .await
                    .map(|_| creator)
            }
            Err(e) => Err(e),
        };

        match written {
            Ok(creator) => RetrievalResult {
                succeeded: true,
                artifact_name: names.artifact,
                creator,
            },
            Err(e) => {
                error!(error = %e, "Failed to archive publication");
                remove_if_present(&target).await;
                RetrievalResult {
                    succeeded: false,
                    artifact_name: names.artifact,
                    creator: None,
                }
            }
        }
    }

    /// Archive every publication in order, pausing after each record.
    #[instrument(level = "info", skip_all, fields(total = publications.len(), dir = %self.downloads_dir.display()))]
    pub async fn retrieve_all(&self, publications: &[Publication]) -> RunSummary {
        let total = publications.len();
        let mut summary = RunSummary::default();

        for (i, publication) in publications.iter().enumerate() {
            info!(
                "[{}/{}] {} | {}",
                i + 1,
                total,
                publication.date,
                truncate_for_log(&publication.title, 60)
            );
            let result = self.retrieve_one(publication).await;
            summary.processed += 1;
            if result.succeeded {
                summary.succeeded += 1;
                info!(artifact = %result.artifact_name, "Archived");
            } else {
                summary.failed += 1;
            }

            pause(self.settings.inter_record_delay).await;
        }

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Retrieval run finished"
        );
        summary
    }
}
