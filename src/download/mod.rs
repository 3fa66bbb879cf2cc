//! Download executor
//!
//! Retrieves every URL the traversal ended on and stores it in the output
//! directory. Downloads always go through the shared HTTP client, whatever
//! mode was used to fetch pages.

mod executor;
mod naming;

pub use executor::Downloader;
pub use naming::{
    assign_names, base_name, filename_from_disposition, sanitize_filename, url_digest, url_hash,
};

use std::fmt;
use std::path::PathBuf;
use url::Url;

/// How one download ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    /// The file was transferred and written
    Downloaded { bytes: u64 },
    /// A file with the target name already existed; nothing was transferred
    AlreadyPresent,
    /// The transfer failed; no file was left behind
    Failed(String),
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadStatus::Downloaded { bytes } => write!(f, "downloaded ({} bytes)", bytes),
            DownloadStatus::AlreadyPresent => write!(f, "already present"),
            DownloadStatus::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// Result of downloading one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub url: Url,
    /// Where the file was, or would have been, written
    pub path: PathBuf,
    pub status: DownloadStatus,
}

impl DownloadOutcome {
    /// Returns true if the file is on disk after this run
    pub fn success(&self) -> bool {
        !matches!(self.status, DownloadStatus::Failed(_))
    }

    /// Returns the failure message, if the download failed
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            DownloadStatus::Failed(message) => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: DownloadStatus) -> DownloadOutcome {
        DownloadOutcome {
            url: Url::parse("https://example.com/a.mp3").unwrap(),
            path: PathBuf::from("downloads/a.mp3"),
            status,
        }
    }

    #[test]
    fn test_outcome_success_and_error() {
        let done = outcome(DownloadStatus::Downloaded { bytes: 10 });
        assert!(done.success());
        assert_eq!(done.error(), None);

        let present = outcome(DownloadStatus::AlreadyPresent);
        assert!(present.success());

        let failed = outcome(DownloadStatus::Failed("HTTP 404".into()));
        assert!(!failed.success());
        assert_eq!(failed.error(), Some("HTTP 404"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(
            DownloadStatus::Downloaded { bytes: 3 }.to_string(),
            "downloaded (3 bytes)"
        );
        assert_eq!(DownloadStatus::AlreadyPresent.to_string(), "already present");
        assert_eq!(
            DownloadStatus::Failed("timeout".into()).to_string(),
            "failed: timeout"
        );
    }
}
