//! Sidecar synthesis: classification and provenance for archived artifacts.
//!
//! Classification walks [`RULES`] top to bottom and the first matching rule
//! wins, so specific categories (monetary policy, bulletins) must stay ahead
//! of generic URL markers such as `press`.

use crate::config::DatasetConfig;
use crate::models::{ArtifactDescriptor, Category, CustomAttributes, Publication};
use chrono::{DateTime, NaiveDate, SecondsFormat, Timelike, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// One classification rule: matches when the lowercased title contains any
/// of `title_terms` or the lowercased URL contains any of `url_terms`.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRule {
    pub category: Category,
    pub title_terms: &'static [&'static str],
    pub url_terms: &'static [&'static str],
}

impl CategoryRule {
    fn matches(&self, title: &str, url: &str) -> bool {
        self.title_terms.iter().any(|t| title.contains(t))
            || self.url_terms.iter().any(|t| url.contains(t))
    }
}

pub const RULES: &[CategoryRule] = &[
    CategoryRule {
        category: Category::MonetaryPolicyStatement,
        title_terms: &["monetary policy"],
        url_terms: &["/mopo/"],
    },
    CategoryRule {
        category: Category::EconomicBulletin,
        title_terms: &["economic bulletin"],
        url_terms: &[],
    },
    CategoryRule {
        category: Category::FinancialStabilityReview,
        title_terms: &["financial stability"],
        url_terms: &[],
    },
    CategoryRule {
        category: Category::Speech,
        title_terms: &[],
        url_terms: &["speech", "/key/"],
    },
    CategoryRule {
        category: Category::Interview,
        title_terms: &[],
        url_terms: &["interview"],
    },
    CategoryRule {
        category: Category::Blog,
        title_terms: &[],
        url_terms: &["blog"],
    },
    CategoryRule {
        category: Category::StatisticalRelease,
        title_terms: &["statistics"],
        url_terms: &["/stats/"],
    },
    CategoryRule {
        category: Category::PressRelease,
        title_terms: &[],
        url_terms: &["press", "/pr/"],
    },
];

/// Classify a publication; [`Category::Report`] when no rule matches.
pub fn classify(title: &str, url: &str) -> Category {
    let title = title.to_lowercase();
    let url = url.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.matches(&title, &url))
        .map(|rule| rule.category)
        .unwrap_or(Category::Report)
}

/// RFC 3339 with at most microsecond precision; whole seconds print no fraction.
fn rfc3339(instant: DateTime<Utc>) -> String {
    let micros = instant.timestamp_subsec_micros();
    let instant = instant.with_nanosecond(micros * 1_000).unwrap_or(instant);
    let format = if micros == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    instant.to_rfc3339_opts(format, false)
}

/// Publication instant: `date` at 09:00 UTC, or `now` when `date` is not ISO.
pub fn publication_instant(date: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|| {
            debug!(date, "Unparseable publication date; using current time");
            now
        })
}

/// Build the sidecar for a successfully archived publication.
///
/// `now` is the retrieval instant and becomes `created_at`.
pub fn synthesize(
    publication: &Publication,
    creator: &str,
    dataset: &DatasetConfig,
    now: DateTime<Utc>,
) -> ArtifactDescriptor {
    ArtifactDescriptor {
        dataset_name: dataset.dataset_name.clone(),
        dataset_code: dataset.dataset_code.clone(),
        source_uri: publication.url.clone(),
        created_at: rfc3339(now),
        creator: creator.to_string(),
        publisher: dataset.publisher.clone(),
        publication_date: rfc3339(publication_instant(&publication.date, now)),
        publication_title: publication.title.clone(),
        ingest_source: dataset.ingest_source.clone(),
        custom_attributes: CustomAttributes {
            category: classify(&publication.title, &publication.url),
            language: dataset.language.clone(),
        },
        raw_attributes: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_mopo_url_wins_without_title_keyword() {
        assert_eq!(
            classify("Account of the meeting", "https://www.ecb.europa.eu/press/mopo/2024/html/x.en.html"),
            Category::MonetaryPolicyStatement
        );
    }

    #[test]
    fn test_title_rules_are_case_insensitive() {
        assert_eq!(classify("ECONOMIC BULLETIN Issue 2", "https://x.org/a"), Category::EconomicBulletin);
        assert_eq!(
            classify("Financial Stability Review, May 2024", "https://x.org/press/fsr.pdf"),
            Category::FinancialStabilityReview
        );
    }

    #[test]
    fn test_rule_order_is_preserved() {
        // both "speech" and "press" present; speech is earlier
        assert_eq!(
            classify("Opening remarks", "https://www.ecb.europa.eu/press/key/date/2024/html/x.en.html"),
            Category::Speech
        );
        assert_eq!(classify("Interview", "https://x.org/press/inter/interview.html"), Category::Interview);
        assert_eq!(classify("Post", "https://x.org/press/blog/2024/x.html"), Category::Blog);
        assert_eq!(
            classify("Euro area bank lending statistics", "https://x.org/press/pr/x.html"),
            Category::StatisticalRelease
        );
        assert_eq!(classify("Decision", "https://x.org/press/pr/x.html"), Category::PressRelease);
    }

    #[test]
    fn test_default_is_report() {
        assert_eq!(classify("ECB publishes report", "https://example.org/x.pdf"), Category::Report);
    }

    #[test]
    fn test_publication_date_defaults_to_nine_utc() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let instant = publication_instant("2024-05-01", now);
        assert_eq!(rfc3339(instant), "2024-05-01T09:00:00+00:00");
        assert_eq!(publication_instant("2024-13-45", now), now);
    }

    #[test]
    fn test_synthesize_fills_provenance() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let publication = Publication::new(
            "2024-05-01",
            "ECB publishes report",
            "https://example.org/x.pdf",
            "2024-05-01",
        );
        let descriptor = synthesize(&publication, "", &DatasetConfig::default(), now);

        assert_eq!(descriptor.source_uri, "https://example.org/x.pdf");
        assert_eq!(descriptor.creator, "");
        assert_eq!(descriptor.created_at, "2025-01-02T03:04:05+00:00");
        assert_eq!(descriptor.publication_date, "2024-05-01T09:00:00+00:00");
        assert_eq!(descriptor.publisher, "European Central Bank");
        assert_eq!(descriptor.custom_attributes.category, Category::Report);
        assert_eq!(descriptor.custom_attributes.language, "English");
        assert!(descriptor.raw_attributes.is_empty());
    }

    #[test]
    fn test_sub_second_instants_print_microseconds() {
        let instant = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        assert_eq!(rfc3339(instant), "2025-01-02T03:04:05.123456+00:00");

        let whole_micros = instant.with_nanosecond(7_000).unwrap();
        assert_eq!(rfc3339(whole_micros), "2025-01-02T03:04:05.000007+00:00");
    }
}
