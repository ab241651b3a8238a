//! The publications listing: one `date | title | url` line per publication.
//!
//! Collection writes `<prefix>_<YYYYmmdd_HHMMSS>.txt`, newest publication
//! first. Retrieval reads either an explicit listing or the most recently
//! modified one in the listing directory.

use crate::models::{Publication, RankedSet};
use crate::utils::truncate_for_log;
use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

const SEPARATOR: &str = " | ";

/// Render one listing line.
pub fn format_line(publication: &Publication) -> String {
    format!(
        "{}{SEPARATOR}{}{SEPARATOR}{}",
        publication.date, publication.title, publication.url
    )
}

/// Parse one listing line; `None` unless it has exactly three fields.
pub fn parse_line(line: &str) -> Option<Publication> {
    let line = line.trim();
    if line.is_empty() || !line.contains(SEPARATOR) {
        return None;
    }
    let parts: Vec<&str> = line.splitn(3, SEPARATOR).collect();
    match parts.as_slice() {
        [date, title, url] => Some(Publication::new(*date, title, *url, *date)),
        _ => None,
    }
}

/// File name of a listing written at `now`.
pub fn listing_file_name(prefix: &str, now: DateTime<Local>) -> String {
    format!("{}_{}.txt", prefix, now.format("%Y%m%d_%H%M%S"))
}

/// First free listing path for `now`; later writes in the same second get `_1`, `_2`, ...
fn free_listing_path(dir: &Path, prefix: &str, now: DateTime<Local>) -> PathBuf {
    let stamp = now.format("%Y%m%d_%H%M%S");
    let mut path = dir.join(listing_file_name(prefix, now));
    let mut n = 0u32;
    while path.exists() {
        n += 1;
        path = dir.join(format!("{prefix}_{stamp}_{n}.txt"));
    }
    path
}

/// Write the ranked set as a timestamped listing in `dir`.
///
/// Returns `None` without touching the disk when there is nothing to write.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), count = ranked.len()))]
pub async fn write_listing(
    dir: &Path,
    prefix: &str,
    ranked: &RankedSet,
    now: DateTime<Local>,
) -> io::Result<Option<PathBuf>> {
    if ranked.is_empty() {
        warn!("No publications to save");
        return Ok(None);
    }

    fs::create_dir_all(dir).await?;
    let path = free_listing_path(dir, prefix, now);
    let content = ranked.iter().map(format_line).collect::<Vec<_>>().join("\n");
    fs::write(&path, content).await?;
    info!(path = %path.display(), count = ranked.len(), "Saved publications listing");

    for (i, publication) in ranked.iter().take(5).enumerate() {
        info!(
            "{}. {} | {}",
            i + 1,
            publication.date,
            truncate_for_log(&publication.title, 60)
        );
    }

    Ok(Some(path))
}

/// Read every well-formed line of a listing.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_listing(path: &Path) -> io::Result<Vec<Publication>> {
    let raw = fs::read_to_string(path).await?;
    let mut skipped = 0usize;
    let publications: Vec<Publication> = raw
        .lines()
        .filter_map(|line| {
            let parsed = parse_line(line);
            if parsed.is_none() && !line.trim().is_empty() {
                skipped += 1;
            }
            parsed
        })
        .collect();

    if skipped > 0 {
        debug!(skipped, "Skipped malformed listing lines");
    }
    info!(count = publications.len(), "Read publications listing");
    Ok(publications)
}

/// Most recently modified `<prefix>_*.txt` in `dir`.
pub fn find_latest_listing(dir: &Path, prefix: &str) -> io::Result<Option<PathBuf>> {
    let wanted = format!("{prefix}_");
    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(&wanted) || !name.ends_with(".txt") {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if latest.as_ref().is_none_or(|(best, _)| modified > *best) {
            latest = Some((modified, entry.path()));
        }
    }

    Ok(latest.map(|(_, path)| path))
}
