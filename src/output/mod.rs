//! Output module for run reports
//!
//! This module handles:
//! - Summarizing traversal stages and download outcomes
//! - Printing the final report and the dry-run URL listing

pub mod stats;

pub use stats::{print_summary, render_summary, RunSummary};

use crate::crawler::CrawlResult;

/// Prints the URLs a dry run would have downloaded, one per line
pub fn print_matches(result: &CrawlResult) {
    for url in &result.urls {
        println!("{}", url);
    }
}
