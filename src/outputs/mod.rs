//! Persisted outputs of both pipeline phases.
//!
//! # Submodules
//!
//! - [`listing`]: the flat `date | title | url` publications listing written
//!   by collection and read back by retrieval
//! - [`json`]: the JSON metadata sidecar written next to each artifact
//!
//! # Output Structure
//!
//! ```text
//! listing_dir/
//! └── ecb_publications_20240501_093000.txt
//!
//! downloads_dir/
//! ├── 2024-05-01_ECB_publishes_report.pdf
//! ├── 2024-05-01_ECB_publishes_report.json
//! ├── 2024-05-01_ECB_publishes_report_At1.pdf
//! └── 2024-05-01_ECB_publishes_report_At1.json
//! ```

pub mod json;
pub mod listing;
