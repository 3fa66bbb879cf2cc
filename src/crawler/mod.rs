//! Crawler module for page fetching and staged traversal
//!
//! This module contains the core crawling logic, including:
//! - Page fetching over plain HTTP or through a driven browser
//! - HTML parsing and link extraction
//! - The bounded worker pool shared with the download executor
//! - The multi-stage traversal itself

pub mod browser;
mod fetcher;
mod parser;
mod pool;
mod traversal;

pub use browser::{BrowserFetcher, BrowserPool, BrowserSession, FirefoxSession, SessionGuard};
pub use fetcher::{build_http_client, is_markup_content_type, HttpFetcher};
pub use parser::extract_links;
pub use pool::run_pool;
pub use traversal::{CrawlResult, StageReport, Traversal, TraversalNode};

#[cfg(feature = "browser")]
pub use browser::ChromeSession;

use crate::config::{Config, FetchMode};
use crate::{DlError, FetchError};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

/// Raw HTML retrieved for one URL
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL the content was served from, after redirects
    pub url: Url,
    /// Document markup
    pub body: String,
}

/// Retrieves the HTML of a page
///
/// One implementation exists per fetch mode. Implementations are shared by
/// every traversal worker, so they must tolerate concurrent `fetch` calls.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Short name of the backend, as given on the command line
    fn name(&self) -> &'static str;

    /// Fetches one page
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;

    /// Releases any resources held by the backend
    async fn close(&self) {}
}

/// Page fetcher rendering through headless Chrome
#[cfg(feature = "browser")]
pub type ChromeFetcher = BrowserFetcher<ChromeSession>;

/// Page fetcher rendering through Firefox via geckodriver
pub type FirefoxFetcher = BrowserFetcher<FirefoxSession>;

/// Builds the page fetcher for the configured mode
///
/// Browser modes size their session pool to the worker count, capped by what
/// the backend supports (one session for a geckodriver endpoint). Sessions
/// are launched on first use, so a browser that cannot start surfaces as a
/// failure of the first page fetch.
pub fn build_fetcher(config: &Config, client: Client) -> Result<Arc<dyn PageFetcher>, DlError> {
    let workers = config.crawl.workers;

    match config.crawl.mode {
        FetchMode::Requests => Ok(Arc::new(HttpFetcher::new(client, &config.http))),
        FetchMode::Firefox => {
            let fetcher = FirefoxFetcher::new("firefox", config.browser.clone(), workers);
            log_sessions(config.crawl.mode, fetcher.pool().max_sessions());
            Ok(Arc::new(fetcher))
        }
        #[cfg(feature = "browser")]
        FetchMode::Chrome => {
            let fetcher = ChromeFetcher::new("chrome", config.browser.clone(), workers);
            log_sessions(config.crawl.mode, fetcher.pool().max_sessions());
            Ok(Arc::new(fetcher))
        }
        #[cfg(not(feature = "browser"))]
        FetchMode::Chrome => Err(DlError::Browser(
            "chrome mode requires the 'browser' feature".to_string(),
        )),
    }
}

fn log_sessions(mode: FetchMode, sessions: usize) {
    tracing::debug!("Rendering pages with {} (up to {} session(s))", mode, sessions);
}
