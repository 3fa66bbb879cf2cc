//! Chrome sessions over the DevTools protocol

use super::{BrowserSession, RenderedPage, SessionError, WEBDRIVER_MASK_SCRIPT};
use crate::config::BrowserConfig;
use crate::DlError;
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig as LaunchConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// Well-known Chrome/Chromium install locations
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

/// Executable names looked up on PATH
const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// A launched Chrome process with one reusable tab
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    page_timeout: Duration,
    settle: Duration,
}

fn find_chrome(configured: Option<&PathBuf>) -> Result<PathBuf, DlError> {
    if let Some(path) = configured {
        return if path.exists() {
            Ok(path.clone())
        } else {
            Err(DlError::Browser(format!(
                "configured chrome-path {} does not exist",
                path.display()
            )))
        };
    }

    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            tracing::debug!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in CHROME_COMMANDS {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    tracing::debug!("Found Chrome in PATH: {}", path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(DlError::Browser(
        "Chrome/Chromium not found; install it or set browser.chrome-path".to_string(),
    ))
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn open(config: &BrowserConfig) -> Result<Self, DlError> {
        let executable = find_chrome(config.chrome_path.as_ref())?;
        tracing::info!("Launching Chrome (headless={})", config.headless);

        let mut builder = LaunchConfig::builder().chrome_executable(executable);

        // with_head means a visible window
        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let launch = builder
            .build()
            .map_err(|e| DlError::Browser(format!("invalid Chrome configuration: {}", e)))?;

        let (browser, mut events) = Browser::launch(launch)
            .await
            .map_err(|e| DlError::Browser(format!("failed to launch Chrome: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DlError::Browser(format!("failed to open tab: {}", e)))?;

        Ok(Self {
            browser,
            page,
            handler,
            page_timeout: Duration::from_secs(config.page_timeout_secs),
            settle: Duration::from_millis(config.settle_ms),
        })
    }

    async fn render(&mut self, url: &Url) -> Result<RenderedPage, SessionError> {
        // The event loop ends when the browser connection drops
        if self.handler.is_finished() {
            return Err(SessionError::broken("Chrome connection closed"));
        }

        match tokio::time::timeout(self.page_timeout, self.page.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(self.classify(format!("navigation failed: {}", e))),
            Err(_) => return Err(SessionError::page("timed out loading page")),
        }

        match tokio::time::timeout(self.page_timeout, self.page.find_element("body")).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(self.classify(format!("page has no body: {}", e))),
            Err(_) => return Err(SessionError::page("timed out waiting for body")),
        }

        if let Err(e) = self.page.evaluate(WEBDRIVER_MASK_SCRIPT.to_string()).await {
            tracing::debug!("webdriver mask skipped on {}: {}", url, e);
        }

        tokio::time::sleep(self.settle).await;

        let html = self
            .page
            .content()
            .await
            .map_err(|e| self.classify(format!("could not read DOM: {}", e)))?;
        let final_url = self.page.url().await.ok().flatten();

        Ok(RenderedPage { final_url, html })
    }

    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!("Chrome did not close cleanly: {}", e);
        }
        self.handler.abort();
    }
}

impl ChromeSession {
    fn classify(&self, message: String) -> SessionError {
        if self.handler.is_finished() {
            SessionError::broken(message)
        } else {
            SessionError::page(message)
        }
    }
}
