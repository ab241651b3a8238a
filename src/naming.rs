//! Deterministic, collision-free artifact names.
//!
//! A publication dated `2024-05-01` titled `ECB publishes report` is stored as
//! `2024-05-01_ECB_publishes_report.pdf` with its sidecar at
//! `2024-05-01_ECB_publishes_report.json`. When that name is taken, the
//! resolver probes `_At1`, `_At2`, … until a free name is found; it never
//! returns a name that already exists on disk.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

/// Longest sanitized title kept, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

static SPECIAL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[;:'"{}^%~#|<>\\\[\]\s/]"#).expect("valid special-char regex"));
static UNDERSCORE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("valid underscore regex"));
static AT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_At\d+$").expect("valid suffix regex"));

/// Make `title` safe to use in a file name.
///
/// Special characters and whitespace become `_`, runs of `_` collapse, and
/// leading/trailing `_` are trimmed. The result is cut to
/// [`MAX_TITLE_CHARS`] characters.
pub fn sanitize_title(title: &str) -> String {
    let replaced = SPECIAL_CHARS.replace_all(title, "_");
    let collapsed = UNDERSCORE_RUNS.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');

    let mut clean = if trimmed.chars().count() > MAX_TITLE_CHARS {
        trimmed
            .chars()
            .take(MAX_TITLE_CHARS)
            .collect::<String>()
            .trim_end_matches('_')
            .to_string()
    } else {
        trimmed.to_string()
    };

    if clean.is_empty() {
        clean.push_str("untitled");
    }
    clean
}

/// `<date>_<sanitized title>`, without extension.
pub fn base_name(date: &str, title: &str) -> String {
    format!("{}_{}", date, sanitize_title(title))
}

/// File name for `base` with collision counter `n` (0 = no suffix).
fn candidate(base: &str, n: u32, ext: &str) -> String {
    if n == 0 {
        return format!("{base}.{ext}");
    }
    match base.split_once('_') {
        Some((date, title)) => {
            let title = AT_SUFFIX.replace(title, "");
            format!("{date}_{title}_At{n}.{ext}")
        }
        None => format!("{base}_At{n}.{ext}"),
    }
}

/// Names for an artifact and its sidecar, sharing one collision counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNames {
    pub artifact: String,
    pub sidecar: String,
}

/// Smallest counter for which both the artifact and the sidecar name are free.
///
/// Resolving the pair together keeps `x_At2.pdf` next to `x_At2.json` even
/// when an earlier run left only one of the two behind.
pub fn resolve_pair(dir: &Path, base: &str, artifact_ext: &str, sidecar_ext: &str) -> ResolvedNames {
    let mut n = 0;
    loop {
        let artifact = candidate(base, n, artifact_ext);
        let sidecar = candidate(base, n, sidecar_ext);
        if !dir.join(&artifact).exists() && !dir.join(&sidecar).exists() {
            if n > 0 {
                debug!(base, n, "Resolved name collision");
            }
            return ResolvedNames { artifact, sidecar };
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_sanitize_replaces_special_and_whitespace() {
        assert_eq!(sanitize_title("ECB publishes report"), "ECB_publishes_report");
        assert_eq!(sanitize_title("Q&A: rates / \"outlook\""), "Q&A_rates_outlook");
        assert_eq!(sanitize_title("  [draft]  notes\t#1 "), "draft_notes_1");
        assert_eq!(sanitize_title("a|b<c>d\\e"), "a_b_c_d_e");
    }

    #[test]
    fn test_sanitize_keeps_non_ascii() {
        assert_eq!(sanitize_title("Präsident Lagarde"), "Präsident_Lagarde");
    }

    #[test]
    fn test_sanitize_truncates_by_chars_and_trims() {
        let long = "é".repeat(250);
        assert_eq!(sanitize_title(&long).chars().count(), MAX_TITLE_CHARS);

        let mut title = "a".repeat(199);
        title.push_str(" tail");
        let clean = sanitize_title(&title);
        assert_eq!(clean, "a".repeat(199));
    }

    #[test]
    fn test_empty_title_gets_placeholder() {
        assert_eq!(base_name("2024-01-01", " ;; "), "2024-01-01_untitled");
    }

    #[test]
    fn test_free_name_is_returned_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_pair(dir.path(), "2024-01-01_Title", "pdf", "json").artifact,
            "2024-01-01_Title.pdf"
        );
    }

    #[test]
    fn test_collision_probes_next_counter() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2024-01-01_Title.pdf"), b"x").unwrap();
        fs::write(dir.path().join("2024-01-01_Title_At1.pdf"), b"x").unwrap();
        assert_eq!(
            resolve_pair(dir.path(), "2024-01-01_Title", "pdf", "json").artifact,
            "2024-01-01_Title_At2.pdf"
        );
    }

    #[test]
    fn test_existing_at_suffix_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2024-01-01_Title_At3.pdf"), b"x").unwrap();
        assert_eq!(
            resolve_pair(dir.path(), "2024-01-01_Title_At3", "pdf", "json").artifact,
            "2024-01-01_Title_At1.pdf"
        );
    }

    #[test]
    fn test_pair_shares_counter() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2024-01-01_Title.pdf"), b"x").unwrap();
        fs::write(dir.path().join("2024-01-01_Title_At1.json"), b"{}").unwrap();

        let names = resolve_pair(dir.path(), "2024-01-01_Title", "pdf", "json");
        assert_eq!(names.artifact, "2024-01-01_Title_At2.pdf");
        assert_eq!(names.sidecar, "2024-01-01_Title_At2.json");
    }
}
