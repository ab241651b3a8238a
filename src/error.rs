//! Error taxonomy for the ingestion pipeline.
//!
//! Errors are scoped to where they can be contained:
//!
//! - [`TransportError`]: one HTTP attempt failed. Retried per policy, then
//!   escalated to the fallback strategy.
//! - [`BrowserError`]: one page-driving call failed (CDP error, timeout).
//! - [`RetrievalError`]: a whole record could not be archived. Counted in the
//!   run summary, never aborts the batch.
//! - [`PipelineError`]: run-level failures. Only initialisation and
//!   configuration problems end up here and terminate the process.

use std::io;
use thiserror::Error;

/// Failure of a single HTTP fetch attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("server responded with HTTP {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("io error while writing body: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Every transport/server failure qualifies; a URL that does not parse
    /// will never fetch.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::InvalidUrl { .. })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return TransportError::Timeout(err.to_string());
        }
        if let Some(status) = err.status() {
            return TransportError::Status(status.as_u16());
        }
        TransportError::Network(err.to_string())
    }
}

/// Failure of a page-driving operation.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },
    #[error("unexpected script result: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Record-level failure: both strategies of a path are exhausted.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("download failed via every transport: {0}")]
    Transport(#[from] TransportError),
    #[error("render failed: {0}")]
    Browser(#[from] BrowserError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("could not write sidecar: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run-level failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("initialisation failed: {0}")]
    Init(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("no publications listing found in {0}")]
    NoInput(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Browser(#[from] BrowserError),
}
