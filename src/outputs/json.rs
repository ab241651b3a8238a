//! JSON sidecar output.
//!
//! Each archived artifact gets a sidecar with the same stem:
//! ```text
//! downloads_dir/
//! ├── 2024-05-01_ECB_publishes_report.pdf
//! └── 2024-05-01_ECB_publishes_report.json
//! ```
//!
//! Sidecars are pretty-printed with 2-space indentation and keep non-ASCII
//! characters as-is.

use crate::error::RetrievalError;
use crate::models::ArtifactDescriptor;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Serialize a descriptor the way sidecars are stored.
pub fn render_sidecar(descriptor: &ArtifactDescriptor) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(descriptor)
}

/// Write `descriptor` to `{dir}/{file_name}`.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), file = %file_name))]
pub async fn write_sidecar(
    dir: &Path,
    file_name: &str,
    descriptor: &ArtifactDescriptor,
) -> Result<PathBuf, RetrievalError> {
    let json = render_sidecar(descriptor)?;
    let path = dir.join(file_name);
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Saved metadata");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetConfig;
    use crate::metadata::synthesize;
    use crate::models::Publication;
    use chrono::Utc;

    fn descriptor(title: &str) -> ArtifactDescriptor {
        let publication = Publication::new("2024-05-01", title, "https://x.org/a.pdf", "1 May 2024");
        synthesize(&publication, "Christine Lagarde", &DatasetConfig::default(), Utc::now())
    }

    #[test]
    fn test_sidecar_uses_two_space_indent() {
        let json = render_sidecar(&descriptor("Report")).unwrap();
        assert!(json.starts_with("{\n  \"dataset_name\": \"Central Bank EUR\""));
        assert!(json.contains("\n  \"custom_attributes\": {\n    \"category\": \"Report\""));
    }

    #[test]
    fn test_sidecar_preserves_non_ascii() {
        let json = render_sidecar(&descriptor("Geldpolitik – Überblick")).unwrap();
        assert!(json.contains("Geldpolitik – Überblick"));
        assert!(!json.contains("\\u"));
    }

    #[tokio::test]
    async fn test_write_sidecar_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let original = descriptor("Report");
        let path = write_sidecar(dir.path(), "2024-05-01_Report.json", &original)
            .await
            .unwrap();
        let raw = std::fs::read_to_string(path).unwrap();
        let parsed: ArtifactDescriptor = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, original);
    }
}
