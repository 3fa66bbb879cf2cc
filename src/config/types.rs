use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Default desktop-browser user agent sent in requests mode
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main configuration structure for recursive-dl
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// How pages are retrieved during traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Plain HTTP requests
    #[default]
    Requests,
    /// Headless Chrome/Chromium over the DevTools protocol
    Chrome,
    /// Firefox through a running geckodriver
    Firefox,
}

impl FetchMode {
    /// Returns true if pages are rendered by a browser
    pub fn is_browser(&self) -> bool {
        matches!(self, Self::Chrome | Self::Firefox)
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Requests => "requests",
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
        })
    }
}

/// Traversal and download behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlConfig {
    /// Search tokens, one per stage, `>` separating fallbacks
    #[serde(default)]
    pub search: Vec<String>,

    /// Page fetching backend
    #[serde(default)]
    pub mode: FetchMode,

    /// Size of the worker pool (also the browser session limit)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Directory downloaded files are written to
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

/// HTTP client settings used for requests-mode pages and all downloads
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// User-Agent header value
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for fetching a page (seconds)
    #[serde(rename = "page-timeout-secs", default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// Timeout for one whole file download (seconds)
    #[serde(rename = "download-timeout-secs", default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

/// Browser automation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrowserConfig {
    /// Run without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Extra wait after `<body>` appears, for scripts to render (milliseconds)
    #[serde(rename = "settle-ms", default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Page load timeout (seconds)
    #[serde(rename = "page-timeout-secs", default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// geckodriver endpoint used in firefox mode
    #[serde(rename = "webdriver-url", default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Chrome executable; searched for in well-known locations when unset
    #[serde(rename = "chrome-path", default)]
    pub chrome_path: Option<PathBuf>,

    /// Additional Chrome command line arguments
    #[serde(rename = "chrome-args", default)]
    pub chrome_args: Vec<String>,
}

fn default_workers() -> usize {
    4
}

fn default_output() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_page_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    60
}

fn default_headless() -> bool {
    true
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            search: Vec::new(),
            mode: FetchMode::default(),
            workers: default_workers(),
            output: default_output(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            page_timeout_secs: default_page_timeout(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            settle_ms: default_settle_ms(),
            page_timeout_secs: default_page_timeout(),
            webdriver_url: default_webdriver_url(),
            chrome_path: None,
            chrome_args: Vec::new(),
        }
    }
}

/// Values supplied on the command line or through the environment
///
/// Every field is optional; `None` leaves the file or default value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub search: Option<Vec<String>>,
    pub mode: Option<FetchMode>,
    pub workers: Option<usize>,
    pub output: Option<PathBuf>,
}

impl Config {
    /// Layers command line and environment values over this configuration
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(search) = overrides.search {
            if !search.is_empty() {
                self.crawl.search = search;
            }
        }
        if let Some(mode) = overrides.mode {
            self.crawl.mode = mode;
        }
        if let Some(workers) = overrides.workers {
            self.crawl.workers = workers;
        }
        if let Some(output) = overrides.output {
            self.crawl.output = output;
        }
    }
}
