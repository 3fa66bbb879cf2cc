//! HTTP fetcher implementation
//!
//! This module handles plain HTTP page retrieval ("requests" mode):
//! - Building the shared HTTP client with browser-like headers
//! - GET requests for pages, bounded by the page timeout
//! - Rejecting responses that are clearly not HTML before reading the body
//! - Error classification into [`FetchError`]

use crate::config::HttpConfig;
use crate::crawler::{FetchedPage, PageFetcher};
use crate::FetchError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Accept header sent with page requests
const PAGE_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Builds an HTTP client with proper configuration
///
/// The client is shared by the requests-mode page fetcher and the download
/// executor. Redirects are followed with reqwest's default policy. Per-request
/// timeouts are applied by the callers.
///
/// # Example
///
/// ```no_run
/// use recursive_dl::config::HttpConfig;
/// use recursive_dl::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("dnt", HeaderValue::from_static("1"));

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Page fetcher backed by plain HTTP requests
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher around an existing client
    pub fn new(client: Client, config: &HttpConfig) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(config.page_timeout_secs),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "requests"
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let url_str = url.as_str();

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, PAGE_ACCEPT)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url_str, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url_str.to_string(),
                status: status.as_u16(),
            });
        }

        // Check Content-Type before pulling what may be a large binary body
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_markup_content_type(content_type) {
                return Err(FetchError::ContentMismatch {
                    url: url_str.to_string(),
                    content_type: content_type.to_string(),
                });
            }
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url_str, e))?;

        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }
}

/// Returns true for content types links can be extracted from
///
/// Missing parameters and case are tolerated; anything textual or
/// HTML/XML-like passes.
pub fn is_markup_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    mime.is_empty() || mime.starts_with("text/") || mime.contains("html") || mime.contains("xml")
}
