//! Run statistics
//!
//! Collects the traversal's stage reports and the download outcomes into
//! one summary and renders it for the terminal.

use crate::crawler::{CrawlResult, StageReport};
use crate::download::{DownloadOutcome, DownloadStatus};
use std::fmt::Write;
use std::time::Duration;

/// Summary of a complete run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Per-stage traversal statistics
    pub stages: Vec<StageReport>,

    /// Number of URLs the last stage matched
    pub matched: usize,

    /// Files transferred during this run
    pub downloaded: usize,

    /// Total bytes written
    pub bytes: u64,

    /// Files that were already on disk
    pub already_present: usize,

    /// Failed downloads as (url, message)
    pub failures: Vec<(String, String)>,

    /// Wall-clock time of the run
    pub elapsed: Option<Duration>,

    /// Downloads were skipped on request
    pub dry_run: bool,
}

impl RunSummary {
    /// Builds a summary from a traversal and its downloads
    pub fn new(result: &CrawlResult, outcomes: &[DownloadOutcome]) -> Self {
        let mut summary = Self {
            stages: result.stages.clone(),
            matched: result.len(),
            ..Self::default()
        };

        for outcome in outcomes {
            match &outcome.status {
                DownloadStatus::Downloaded { bytes } => {
                    summary.downloaded += 1;
                    summary.bytes += bytes;
                }
                DownloadStatus::AlreadyPresent => summary.already_present += 1,
                DownloadStatus::Failed(message) => summary
                    .failures
                    .push((outcome.url.to_string(), message.clone())),
            }
        }

        summary
    }

    /// Number of files on disk after the run
    pub fn succeeded(&self) -> usize {
        self.downloaded + self.already_present
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Renders the summary as plain text
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Run Summary ===\n");

    if !summary.stages.is_empty() {
        let _ = writeln!(out, "Stages:");
        for stage in &summary.stages {
            let _ = write!(
                out,
                "  {}. {}: {} page(s) fetched, {} failed, {} link(s) seen, {} matched",
                stage.index + 1,
                stage.stage,
                stage.pages_fetched,
                stage.pages_failed,
                stage.links_seen,
                stage.matched
            );
            if stage.fallback_pages > 0 {
                let _ = write!(out, " ({} via fallback)", stage.fallback_pages);
            }
            let _ = writeln!(out);
        }
        let _ = writeln!(out);
    }

    if summary.dry_run {
        let _ = writeln!(
            out,
            "Dry run: {} file(s) matched, nothing downloaded",
            summary.matched
        );
    } else {
        let _ = writeln!(out, "Downloads:");
        let _ = writeln!(
            out,
            "  Succeeded: {} ({} new, {} bytes)",
            summary.succeeded(),
            summary.downloaded,
            summary.bytes
        );
        let _ = writeln!(out, "  Already present: {}", summary.already_present);
        let _ = writeln!(out, "  Failed: {}", summary.failed());

        if !summary.failures.is_empty() {
            let _ = writeln!(out, "\nFailures:");
            for (url, message) in &summary.failures {
                let _ = writeln!(out, "  - {}: {}", url, message);
            }
        }
    }

    if let Some(elapsed) = summary.elapsed {
        let _ = writeln!(out, "\nCompleted in {:.1}s", elapsed.as_secs_f64());
    }

    out
}

/// Prints the summary to stdout
pub fn print_summary(summary: &RunSummary) {
    print!("{}", render_summary(summary));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use url::Url;

    fn outcome(path: &str, status: DownloadStatus) -> DownloadOutcome {
        DownloadOutcome {
            url: Url::parse(&format!("https://example.com{}", path)).unwrap(),
            path: PathBuf::from(path.trim_start_matches('/')),
            status,
        }
    }

    fn crawl_result() -> CrawlResult {
        CrawlResult {
            urls: ["https://example.com/a.flac", "https://example.com/b.flac"]
                .iter()
                .map(|u| Url::parse(u).unwrap())
                .collect::<BTreeSet<_>>(),
            stages: vec![StageReport {
                index: 0,
                stage: "*.flac>*.mp3".to_string(),
                pages_fetched: 1,
                pages_failed: 0,
                links_seen: 7,
                fallback_pages: 1,
                matched: 2,
            }],
        }
    }

    #[test]
    fn test_summary_counts() {
        let outcomes = vec![
            outcome("/a.flac", DownloadStatus::Downloaded { bytes: 100 }),
            outcome("/b.flac", DownloadStatus::AlreadyPresent),
            outcome("/c.flac", DownloadStatus::Failed("HTTP 500".to_string())),
        ];
        let summary = RunSummary::new(&crawl_result(), &outcomes);

        assert_eq!(summary.matched, 2);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.bytes, 100);
        assert_eq!(summary.already_present, 1);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
    }

    #[test]
    fn test_render_lists_failures_and_stages() {
        let outcomes = vec![outcome(
            "/c.flac",
            DownloadStatus::Failed("HTTP 500".to_string()),
        )];
        let text = render_summary(&RunSummary::new(&crawl_result(), &outcomes));

        assert!(text.contains("1. *.flac>*.mp3: 1 page(s) fetched"));
        assert!(text.contains("(1 via fallback)"));
        assert!(text.contains("Failed: 1"));
        assert!(text.contains("https://example.com/c.flac: HTTP 500"));
    }

    #[test]
    fn test_render_dry_run() {
        let summary = RunSummary {
            dry_run: true,
            ..RunSummary::new(&crawl_result(), &[])
        };
        let text = render_summary(&summary);
        assert!(text.contains("Dry run: 2 file(s) matched"));
        assert!(!text.contains("Already present"));
    }
}
