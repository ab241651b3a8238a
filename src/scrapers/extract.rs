//! Extraction of publications from a feed snapshot.
//!
//! The feed groups links by date:
//!
//! ```html
//! <div class="dl-wrapper">
//!   <dl>
//!     <dt>15 March 2024</dt>
//!     <dd><a href="/press/pr/date/2024/html/x.en.html">Title</a> ...</dd>
//!   </dl>
//! </div>
//! ```
//!
//! Each heading (`dt`) pairs with the content block (`dd`) at the same
//! position within its group. Links nested inside a collapsed region
//! (`div.accordion`) repeat entries shown elsewhere and are skipped.

use crate::config::FeedConfig;
use crate::error::PipelineError;
use crate::models::Publication;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

static DAY_MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})\s+(\w+)\s+(\d{4})").expect("valid date regex"));
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid iso regex"));

/// Parse a feed date heading into `YYYY-MM-DD`.
///
/// Accepts `D Month YYYY` (English month names) or any text containing an
/// ISO date, which is returned verbatim. Anything else yields `None`.
///
/// ```ignore
/// assert_eq!(parse_feed_date("15 March 2024").as_deref(), Some("2024-03-15"));
/// assert_eq!(parse_feed_date("not a date"), None);
/// ```
pub fn parse_feed_date(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = DAY_MONTH_YEAR.captures(text) {
        let month = MONTHS.iter().position(|m| *m == &caps[2]);
        if let Some(index) = month {
            let day: u32 = caps[1].parse().ok()?;
            return Some(format!("{}-{:02}-{:02}", &caps[3], index + 1, day));
        }
    }

    if let Some(m) = ISO_DATE.find(text) {
        return Some(m.as_str().to_string());
    }

    warn!(text, "Could not parse date");
    None
}

/// Compiled selectors and limits for one feed.
#[derive(Debug)]
pub struct FeedLayout {
    container: Selector,
    group: Selector,
    heading: Selector,
    block: Selector,
    link: Selector,
    collapsed_class: String,
    origin: Url,
    origin_prefix: String,
    pub max_records: usize,
}

fn compile(selector: &str) -> Result<Selector, PipelineError> {
    Selector::parse(selector)
        .map_err(|e| PipelineError::Config(format!("invalid selector {selector:?}: {e:?}")))
}

impl FeedLayout {
    pub fn from_config(feed: &FeedConfig) -> Result<Self, PipelineError> {
        let origin =
            Url::parse(&feed.origin).map_err(|e| PipelineError::Config(format!("feed.origin: {e}")))?;
        Ok(Self {
            container: compile(&feed.container_selector)?,
            group: compile(&feed.group_selector)?,
            heading: compile(&feed.heading_selector)?,
            block: compile(&feed.block_selector)?,
            link: compile(&feed.link_selector)?,
            collapsed_class: feed.collapsed_class.clone(),
            origin_prefix: feed.origin.trim_end_matches('/').to_string(),
            origin,
            max_records: feed.max_records,
        })
    }

    fn is_collapsed(&self, link: ElementRef<'_>) -> bool {
        link.ancestors().filter_map(ElementRef::wrap).any(|el| {
            el.value().name() == "div" && el.value().classes().any(|c| c == self.collapsed_class)
        })
    }

    /// Resolve `href` against the feed origin.
    fn absolutize(&self, href: &str) -> Option<String> {
        if href.starts_with('/') && !href.starts_with("//") {
            return Some(format!("{}{}", self.origin_prefix, href));
        }
        if Url::parse(href).is_ok() {
            return Some(href.to_string());
        }
        self.origin.join(href).ok().map(|u| u.to_string())
    }
}

/// Element text with whitespace runs collapsed to single spaces.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract publications from a feed snapshot, in document order.
///
/// Returns an empty list when the feed container is absent (the page has
/// not loaded yet). Stops as soon as `layout.max_records` publications have
/// been collected.
#[instrument(level = "debug", skip_all, fields(bytes = html.len(), max = layout.max_records))]
pub fn extract_publications(html: &str, layout: &FeedLayout) -> Vec<Publication> {
    let max = layout.max_records;
    let mut publications: Vec<Publication> = Vec::new();
    if max == 0 {
        return publications;
    }

    let document = Html::parse_document(html);
    let Some(container) = document.select(&layout.container).next() else {
        debug!("Feed container not found; content not loaded yet");
        return publications;
    };

    'groups: for group in container.select(&layout.group) {
        let blocks: Vec<ElementRef<'_>> = group.select(&layout.block).collect();

        for (i, heading) in group.select(&layout.heading).enumerate() {
            if publications.len() >= max {
                break 'groups;
            }
            let Some(block) = blocks.get(i) else {
                continue;
            };
            let date_text = element_text(heading);

            for link in block.select(&layout.link) {
                if publications.len() >= max {
                    break 'groups;
                }
                if layout.is_collapsed(link) {
                    trace!("Skipping link inside collapsed region");
                    continue;
                }

                let title = element_text(link);
                let href = link.value().attr("href").unwrap_or("").trim();
                if title.is_empty() || href.is_empty() {
                    continue;
                }
                let Some(date) = parse_feed_date(&date_text) else {
                    continue;
                };
                let Some(url) = layout.absolutize(href) else {
                    debug!(href, "Unresolvable link");
                    continue;
                };

                publications.push(Publication::new(date, &title, url, date_text.clone()));
                debug!(
                    found = publications.len(),
                    max,
                    title = %truncate_for_log(&title, 50),
                    "Found publication"
                );
            }
        }
    }

    info!(count = publications.len(), max, "Extracted publications from feed");
    publications
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(max: usize) -> FeedLayout {
        FeedLayout::from_config(&FeedConfig {
            max_records: max,
            ..FeedConfig::default()
        })
        .unwrap()
    }

    const FEED: &str = r#"
<html><body>
  <div class="dl-wrapper">
    <dl>
      <dt>15 March 2024</dt>
      <dd>
        <a href="/press/pr/date/2024/html/a.en.html">Rates | decision</a>
        <a href="https://www.ecb.europa.eu/pub/b.en.pdf">  Annual
            report </a>
        <div class="accordion"><a href="/press/pr/date/2024/html/a.en.html">Rates decision</a></div>
      </dd>
      <dt>not a date</dt>
      <dd><a href="/press/c.en.html">Undated</a></dd>
      <dt>2024-03-01</dt>
      <dd><a href="/press/d.en.html">Iso dated</a><a href="/press/e.en.html"></a></dd>
    </dl>
    <dl>
      <dt>1 February 2024</dt>
      <dd><a href="/press/f.en.html">Older</a><a>no href</a></dd>
    </dl>
  </div>
</body></html>"#;

    #[test]
    fn test_parse_day_month_year() {
        assert_eq!(parse_feed_date("15 March 2024").as_deref(), Some("2024-03-15"));
        assert_eq!(parse_feed_date(" 1 May 2023 ").as_deref(), Some("2023-05-01"));
    }

    #[test]
    fn test_parse_iso_is_verbatim() {
        assert_eq!(parse_feed_date("2024-03-15").as_deref(), Some("2024-03-15"));
        assert_eq!(parse_feed_date("Published 2024-03-15 CET").as_deref(), Some("2024-03-15"));
    }

    #[test]
    fn test_parse_rejects_other_forms() {
        assert_eq!(parse_feed_date("not a date"), None);
        assert_eq!(parse_feed_date(""), None);
        assert_eq!(parse_feed_date("15 Mars 2024"), None);
    }

    #[test]
    fn test_extracts_in_document_order() {
        let pubs = extract_publications(FEED, &layout(100));
        let titles: Vec<&str> = pubs.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Rates - decision", "Annual report", "Iso dated", "Older"]);

        assert_eq!(pubs[0].date, "2024-03-15");
        assert_eq!(pubs[0].url, "https://www.ecb.europa.eu/press/pr/date/2024/html/a.en.html");
        assert_eq!(pubs[0].original_date_text, "15 March 2024");
        assert_eq!(pubs[1].url, "https://www.ecb.europa.eu/pub/b.en.pdf");
        assert_eq!(pubs[2].date, "2024-03-01");
        assert_eq!(pubs[3].date, "2024-02-01");
    }

    #[test]
    fn test_collapsed_links_are_skipped() {
        let pubs = extract_publications(FEED, &layout(100));
        let dupes = pubs.iter().filter(|p| p.url.ends_with("a.en.html")).count();
        assert_eq!(dupes, 1);
    }

    #[test]
    fn test_cap_is_exact_and_in_document_order() {
        let pubs = extract_publications(FEED, &layout(2));
        assert_eq!(pubs.len(), 2);
        assert_eq!(pubs[0].title, "Rates - decision");
        assert_eq!(pubs[1].title, "Annual report");

        let pubs = extract_publications(FEED, &layout(3));
        assert_eq!(pubs.len(), 3);
        assert_eq!(pubs[2].title, "Iso dated");
    }

    #[test]
    fn test_missing_container_yields_empty() {
        let html = "<html><body><dl><dt>1 May 2024</dt><dd><a href='/x'>X</a></dd></dl></body></html>";
        assert!(extract_publications(html, &layout(10)).is_empty());
    }

    #[test]
    fn test_relative_link_without_root_is_resolved() {
        let html = r#"<div class="dl-wrapper"><dl><dt>2 June 2024</dt>
            <dd><a href="press/x.html">Relative</a></dd></dl></div>"#;
        let pubs = extract_publications(html, &layout(10));
        assert_eq!(pubs.len(), 1);
        assert_eq!(pubs[0].url, "https://www.ecb.europa.eu/press/x.html");
    }

    #[test]
    fn test_invalid_selector_is_config_error() {
        let feed = FeedConfig {
            container_selector: "div[".to_string(),
            ..FeedConfig::default()
        };
        assert!(matches!(FeedLayout::from_config(&feed), Err(PipelineError::Config(_))));
    }
}
