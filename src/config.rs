//! Runtime configuration.
//!
//! Everything has a default reproducing the production constants, so the
//! tool runs without a config file. A YAML file passed with `--config`
//! (or `ECB_ARCHIVER_CONFIG`) may override any subset of fields:
//!
//! ```yaml
//! feed:
//!   max_records: 250
//! retrieval:
//!   verify_tls: true
//! retry:
//!   primary_download:
//!     max_attempts: 5
//! ```

use crate::error::PipelineError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub retrieval: RetrievalConfig,
    pub browser: BrowserSettings,
    pub dataset: DatasetConfig,
    pub retry: RetryPresets,
    pub paths: PathsConfig,
}

/// Where the feed lives and how to read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    /// Origin used to absolutize relative links.
    pub origin: String,
    pub container_selector: String,
    pub group_selector: String,
    pub heading_selector: String,
    pub block_selector: String,
    pub link_selector: String,
    /// Links under a `div` with this class are duplicates and skipped.
    pub collapsed_class: String,
    pub max_records: usize,
    /// Progress steps between checkpoint extractions.
    pub checkpoint_every: u32,
    /// Consecutive stalled steps before pagination gives up.
    pub stall_ceiling: u32,
    pub settle_ms: u64,
    pub initial_settle_ms: u64,
    pub container_timeout_secs: u64,
    pub navigation_timeout_secs: u64,
    /// URL patterns blocked while paginating (images, fonts, media).
    pub blocked_resources: Vec<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "https://www.ecb.europa.eu/press/pubbydate/html/index.en.html?name_of_publication=Press%20release"
                .to_string(),
            origin: "https://www.ecb.europa.eu".to_string(),
            container_selector: "div.dl-wrapper".to_string(),
            group_selector: "dl".to_string(),
            heading_selector: "dt".to_string(),
            block_selector: "dd".to_string(),
            link_selector: "a[href]".to_string(),
            collapsed_class: "accordion".to_string(),
            max_records: 100,
            checkpoint_every: 5,
            stall_ceiling: 10,
            settle_ms: 2_000,
            initial_settle_ms: 5_000,
            container_timeout_secs: 30,
            navigation_timeout_secs: 60,
            blocked_resources: [
                "*.png", "*.jpg", "*.jpeg", "*.gif", "*.svg", "*.webp", "*.ico", "*.woff",
                "*.woff2", "*.ttf", "*.otf", "*.mp4", "*.webm", "*.mp3",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Per-record retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// URL suffix (case-insensitive) that selects the direct-download path.
    pub binary_suffix: String,
    pub render_settle_ms: u64,
    pub inter_record_delay_ms: u64,
    pub http_timeout_secs: u64,
    pub verify_tls: bool,
    pub user_agent: String,
    pub creator_selector: String,
    pub pdf: PdfLayout,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            binary_suffix: ".pdf".to_string(),
            render_settle_ms: 3_000,
            inter_record_delay_ms: 1_000,
            http_timeout_secs: 300,
            verify_tls: false,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            creator_selector: "div.author-details div.name".to_string(),
            pdf: PdfLayout::default(),
        }
    }
}

/// Page layout of rendered documents, in inches. Defaults to A4.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfLayout {
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub print_background: bool,
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self {
            paper_width: 8.27,
            paper_height: 11.69,
            margin_top: 1.0,
            margin_bottom: 1.0,
            margin_left: 0.5,
            margin_right: 0.5,
            print_background: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub no_sandbox: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            no_sandbox: false,
        }
    }
}

/// Fixed provenance fields written to every sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub dataset_name: String,
    pub dataset_code: String,
    pub publisher: String,
    pub ingest_source: String,
    pub language: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dataset_name: "Central Bank EUR".to_string(),
            dataset_code: "CB_EUR_ECB".to_string(),
            publisher: "European Central Bank".to_string(),
            ingest_source: "CB_EUR_ECB_LDR".to_string(),
            language: "English".to_string(),
        }
    }
}

/// Retry bounds for each class of external call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPresets {
    pub launch: RetryPolicy,
    pub navigation: RetryPolicy,
    pub container_wait: RetryPolicy,
    pub measurement: RetryPolicy,
    pub snapshot: RetryPolicy,
    pub pdf_render: RetryPolicy,
    pub primary_download: RetryPolicy,
    pub fallback_download: RetryPolicy,
}

impl Default for RetryPresets {
    fn default() -> Self {
        Self {
            launch: RetryPolicy::new(3, 2_000, 10_000),
            navigation: RetryPolicy::new(3, 2_000, 10_000),
            container_wait: RetryPolicy::new(3, 2_000, 10_000),
            measurement: RetryPolicy::new(3, 1_000, 5_000),
            snapshot: RetryPolicy::new(3, 2_000, 8_000),
            pdf_render: RetryPolicy::new(3, 2_000, 10_000),
            primary_download: RetryPolicy::new(3, 2_000, 10_000),
            fallback_download: RetryPolicy::new(2, 2_000, 6_000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding publication listings.
    pub listing_dir: PathBuf,
    /// Directory receiving artifacts and sidecars.
    pub downloads_dir: PathBuf,
    pub listing_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            listing_dir: PathBuf::from("."),
            downloads_dir: PathBuf::from("downloads"),
            listing_prefix: "ecb_publications".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let config: Config = serde_yaml::from_str(&raw)?;
                info!(path = %path.display(), "Loaded configuration");
                config
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.feed.max_records == 0 {
            return Err(PipelineError::Config("feed.max_records must be positive".into()));
        }
        if self.feed.checkpoint_every == 0 {
            return Err(PipelineError::Config("feed.checkpoint_every must be positive".into()));
        }
        if self.feed.stall_ceiling == 0 {
            return Err(PipelineError::Config("feed.stall_ceiling must be positive".into()));
        }
        Url::parse(&self.feed.origin)
            .map_err(|e| PipelineError::Config(format!("feed.origin: {e}")))?;
        Url::parse(&self.feed.url).map_err(|e| PipelineError::Config(format!("feed.url: {e}")))?;
        Ok(())
    }
}
