//! Command-line interface for the ECB publications archiver.
//!
//! Every flag overrides the matching field of the YAML configuration.

use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for `ecb_archiver`.
///
/// # Examples
///
/// ```sh
/// # Collect the 50 newest publications into a listing
/// ecb_archiver collect --max-records 50
///
/// # Archive the newest listing in the current directory
/// ecb_archiver retrieve --downloads-dir ./downloads
///
/// # Both phases, with a config file
/// ecb_archiver --config ecb.yaml run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "ECB_ARCHIVER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding publication listings
    #[arg(long, global = true)]
    pub listing_dir: Option<PathBuf>,

    /// Directory receiving PDFs and JSON sidecars
    #[arg(long, global = true)]
    pub downloads_dir: Option<PathBuf>,

    /// Chrome/Chromium executable to drive
    #[arg(long, global = true)]
    pub chrome: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headful: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Paginate the feed and write a publications listing
    Collect {
        /// Number of publications to keep
        #[arg(short = 'n', long)]
        max_records: Option<usize>,
    },
    /// Archive every publication of a listing
    Retrieve {
        /// Listing to read; defaults to the newest one in the listing directory
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Collect, then retrieve the listing just written
    Run {
        #[arg(short = 'n', long)]
        max_records: Option<usize>,
    },
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(dir) = &self.listing_dir {
            config.paths.listing_dir = dir.clone();
        }
        if let Some(dir) = &self.downloads_dir {
            config.paths.downloads_dir = dir.clone();
        }
        if let Some(chrome) = &self.chrome {
            config.browser.executable = Some(chrome.clone());
        }
        if self.headful {
            config.browser.headless = false;
        }
        if let Command::Collect { max_records: Some(n) } | Command::Run { max_records: Some(n) } = self.command {
            config.feed.max_records = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["ecb_archiver", "collect", "--max-records", "25"]);
        assert_eq!(cli.command, Command::Collect { max_records: Some(25) });
        assert!(!cli.headful);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "ecb_archiver",
            "retrieve",
            "-i",
            "/tmp/list.txt",
            "--downloads-dir",
            "/tmp/out",
            "--headful",
        ]);
        assert_eq!(
            cli.command,
            Command::Retrieve {
                input: Some(PathBuf::from("/tmp/list.txt"))
            }
        );
        assert_eq!(cli.downloads_dir, Some(PathBuf::from("/tmp/out")));
        assert!(cli.headful);
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = Cli::parse_from([
            "ecb_archiver",
            "--chrome",
            "/usr/bin/chromium",
            "--listing-dir",
            "lists",
            "run",
            "-n",
            "3",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.feed.max_records, 3);
        assert_eq!(config.paths.listing_dir, PathBuf::from("lists"));
        assert_eq!(config.browser.executable, Some(PathBuf::from("/usr/bin/chromium")));
        assert!(config.browser.headless);
    }

    #[test]
    fn test_no_overrides_keep_defaults() {
        let cli = Cli::parse_from(["ecb_archiver", "retrieve"]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.feed.max_records, 100);
        assert_eq!(config.paths.downloads_dir, PathBuf::from("downloads"));
    }
}
