//! Data models shared by the collection and retrieval phases.
//!
//! - [`Publication`]: one announcement extracted from the feed (immutable)
//! - [`RankedSet`]: deduplicated publications, newest first
//! - [`RetrievalResult`]: outcome of archiving one publication
//! - [`ArtifactDescriptor`]: the JSON sidecar persisted next to each artifact
//! - [`Category`]: publication classification used in the sidecar

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A publication announcement as extracted from the feed.
///
/// The URL is the identity key: two publications with the same `url` are
/// the same record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    /// Calendar date in `YYYY-MM-DD` form.
    pub date: String,
    /// Display title. Never contains `|`, which separates listing fields.
    pub title: String,
    /// Absolute URL of the publication.
    pub url: String,
    /// Heading text the date was parsed from.
    pub original_date_text: String,
}

impl Publication {
    /// Build a publication, replacing pipes in the title with `-`.
    pub fn new(
        date: impl Into<String>,
        title: &str,
        url: impl Into<String>,
        original_date_text: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            title: title.replace('|', "-"),
            url: url.into(),
            original_date_text: original_date_text.into(),
        }
    }
}

/// Unique publications ordered by date, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankedSet {
    items: Vec<Publication>,
}

impl RankedSet {
    /// Wrap an already deduplicated and ordered list.
    pub(crate) fn from_ranked(items: Vec<Publication>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Publication> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Publication] {
        &self.items
    }
}

/// Outcome of archiving a single publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalResult {
    pub succeeded: bool,
    /// File name of the artifact (within the downloads directory).
    pub artifact_name: String,
    /// Creator extracted from a rendered page; empty for direct downloads.
    pub creator: Option<String>,
}

/// Publication category written to the sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Monetary policy statement")]
    MonetaryPolicyStatement,
    #[serde(rename = "Economic Bulletin")]
    EconomicBulletin,
    #[serde(rename = "Financial Stability Review")]
    FinancialStabilityReview,
    Speech,
    Interview,
    Blog,
    #[serde(rename = "Statistical release")]
    StatisticalRelease,
    #[serde(rename = "Press release")]
    PressRelease,
    Report,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::MonetaryPolicyStatement => "Monetary policy statement",
            Category::EconomicBulletin => "Economic Bulletin",
            Category::FinancialStabilityReview => "Financial Stability Review",
            Category::Speech => "Speech",
            Category::Interview => "Interview",
            Category::Blog => "Blog",
            Category::StatisticalRelease => "Statistical release",
            Category::PressRelease => "Press release",
            Category::Report => "Report",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Attributes grouped under `custom_attributes` in the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAttributes {
    pub category: Category,
    pub language: String,
}

/// Metadata sidecar describing one archived artifact.
///
/// Timestamps are RFC 3339 strings in UTC (`+00:00`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub dataset_name: String,
    pub dataset_code: String,
    pub source_uri: String,
    pub created_at: String,
    pub creator: String,
    pub publisher: String,
    pub publication_date: String,
    pub publication_title: String,
    pub ingest_source: String,
    pub custom_attributes: CustomAttributes,
    /// Reserved; always empty.
    pub raw_attributes: BTreeMap<String, serde_json::Value>,
}
