//! recursive-dl: a staged link follower and downloader
//!
//! This crate walks a seed page through an ordered list of filename patterns.
//! Each stage fetches the pages found by the previous one, keeps the links
//! whose final path segment matches the stage's pattern (or its first
//! matching fallback), and the links matched by the last stage are
//! downloaded to disk.

pub mod config;
pub mod crawler;
pub mod download;
pub mod output;
pub mod pattern;

use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Main error type for recursive-dl operations
#[derive(Debug, Error)]
pub enum DlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pattern error: {0}")]
    Pattern(#[from] PatternError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Seed page {url} could not be fetched: {source}")]
    SeedUnreachable { url: String, source: FetchError },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while parsing `--search` tokens
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("at least one search pattern is required")]
    Empty,

    #[error("empty alternative in fallback chain '{0}'")]
    EmptyAlternative(String),

    #[error("pattern '{pattern}' contains invalid character '{ch}'")]
    InvalidCharacter { pattern: String, ch: char },
}

/// Failure to retrieve one page or file
///
/// These are recovered at the granularity of a single URL: the page
/// contributes no links, or the download is recorded as failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Expected HTML from {url}, got {content_type}")]
    ContentMismatch { url: String, content_type: String },

    #[error("Browser failed on {url}: {message}")]
    Browser { url: String, message: String },
}

impl FetchError {
    /// Classifies a reqwest error for the given URL
    pub fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Http {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

/// Failure to pull links out of a fetched page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Page {url} has an empty document")]
    EmptyDocument { url: String },
}

/// Result type alias for recursive-dl operations
pub type Result<T> = std::result::Result<T, DlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, FetchMode};
pub use crawler::{CrawlResult, Traversal};
pub use download::{DownloadOutcome, DownloadStatus, Downloader};
pub use pattern::{parse_stages, Pattern, SearchStage};

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// The traversal's result
    pub crawl: CrawlResult,
    /// One outcome per downloaded URL; empty for dry runs
    pub downloads: Vec<DownloadOutcome>,
}

/// Runs a complete traversal and download
///
/// This is the main entry point. It will:
/// 1. Parse the configured search stages
/// 2. Build the HTTP client and the page fetcher for the configured mode
/// 3. Walk the stages from `seed`
/// 4. Release the fetcher's browser sessions
/// 5. Download the final stage's matches unless `dry_run` is set
///
/// The fetcher is closed whether or not the traversal succeeded.
pub async fn run(config: &Config, seed: &Url, dry_run: bool) -> Result<RunOutput> {
    let stages = parse_stages(&config.crawl.search)?;
    let client = crawler::build_http_client(&config.http)?;
    let fetcher = crawler::build_fetcher(config, client.clone())?;

    let traversal = Traversal::new(Arc::clone(&fetcher), config.crawl.workers);
    let crawled = traversal.run(seed, &stages).await;
    fetcher.close().await;
    let crawl = crawled?;

    let downloads = if dry_run || crawl.is_empty() {
        Vec::new()
    } else {
        Downloader::new(client, &config.crawl.output, &config.http)
            .download_all(&crawl.urls, config.crawl.workers)
            .await
    };

    Ok(RunOutput { crawl, downloads })
}
