//! Deduplication and ordering of extracted publications.

use crate::models::{Publication, RankedSet};
use itertools::Itertools;
use tracing::{info, instrument};

/// Collapse duplicate URLs and order by date, newest first.
///
/// The first occurrence of each URL wins. Sorting is stable, so publications
/// sharing a date keep their extraction order. At most `max_records`
/// publications are kept.
#[instrument(level = "info", skip_all, fields(input = publications.len(), max_records = max_records))]
pub fn rank(publications: Vec<Publication>, max_records: usize) -> RankedSet {
    let input = publications.len();
    let mut unique = publications
        .into_iter()
        .unique_by(|p| p.url.clone())
        .collect::<Vec<Publication>>();

    unique.sort_by(|a, b| b.date.cmp(&a.date));
    unique.truncate(max_records);

    info!(input, unique = unique.len(), "Ranked publications");
    RankedSet::from_ranked(unique)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publication(date: &str, url: &str) -> Publication {
        Publication::new(date, &format!("Title {url}"), url, date)
    }

    #[test]
    fn test_first_occurrence_wins() {
        let input = vec![
            publication("2024-01-01", "A"),
            publication("2024-01-01", "B"),
            Publication::new("2024-01-01", "Second A", "A", "x"),
            publication("2024-01-01", "C"),
        ];
        let ranked = rank(input, 10);
        let urls: Vec<&str> = ranked.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["A", "B", "C"]);
        assert_eq!(ranked.as_slice()[0].title, "Title A");
    }

    #[test]
    fn test_orders_newest_first() {
        let input = vec![
            publication("2024-01-01", "x1"),
            publication("2024-03-01", "x3"),
            publication("2024-02-01", "x2"),
        ];
        let ranked = rank(input, 10);
        let dates: Vec<&str> = ranked.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-02-01", "2024-01-01"]);
    }

    #[test]
    fn test_equal_dates_keep_extraction_order() {
        let input = vec![
            publication("2024-01-01", "old"),
            publication("2024-02-01", "first"),
            publication("2024-02-01", "second"),
            publication("2024-02-01", "third"),
        ];
        let ranked = rank(input, 10);
        let urls: Vec<&str> = ranked.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["first", "second", "third", "old"]);
    }

    #[test]
    fn test_truncates_to_max_records() {
        let input = (0..5)
            .map(|i| publication(&format!("2024-01-0{}", i + 1), &format!("u{i}")))
            .collect();
        let ranked = rank(input, 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked.as_slice()[0].date, "2024-01-05");
    }

    #[test]
    fn test_empty_input() {
        assert!(rank(Vec::new(), 10).is_empty());
    }
}
