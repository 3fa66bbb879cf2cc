//! Firefox sessions over the W3C WebDriver protocol
//!
//! Talks JSON over HTTP to a running geckodriver. Every command answers with
//! `{"value": ...}`; failures carry `{"value": {"error": ..., "message": ...}}`
//! and a non-success status.

use super::{BrowserSession, RenderedPage, SessionError, WEBDRIVER_MASK_SCRIPT};
use crate::config::BrowserConfig;
use crate::DlError;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// WebDriver error codes after which the session cannot continue
const FATAL_ERRORS: &[&str] = &["invalid session id", "session not created"];

/// Minimal WebDriver HTTP client
#[derive(Clone)]
pub struct WebDriverClient {
    client: Client,
    base: String,
}

/// Error reply from the driver, or a transport failure
#[derive(Debug)]
struct CommandError {
    code: Option<String>,
    message: String,
}

impl CommandError {
    fn is_fatal(&self) -> bool {
        match &self.code {
            Some(code) => FATAL_ERRORS.contains(&code.as_str()),
            // Transport failures mean the driver is gone
            None => true,
        }
    }

    fn into_session_error(self) -> SessionError {
        if self.is_fatal() {
            SessionError::broken(self.message)
        } else {
            SessionError::page(self.message)
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl WebDriverClient {
    /// Creates a client for the driver listening at `base`
    pub fn new(base: &str, timeout: Duration) -> Result<Self, DlError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, CommandError> {
        let url = format!("{}{}", self.base, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| CommandError {
            code: None,
            message: format!("WebDriver request to {} failed: {}", url, e),
        })?;
        let status = response.status();
        let reply: Value = response.json().await.map_err(|e| CommandError {
            code: None,
            message: format!("invalid WebDriver reply from {}: {}", url, e),
        })?;

        let value = reply.get("value").cloned().unwrap_or(Value::Null);
        if !status.is_success() {
            let code = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            return Err(CommandError {
                code: Some(code),
                message,
            });
        }

        Ok(value)
    }

    /// Starts a new Firefox session and returns its id
    async fn new_session(&self, headless: bool) -> Result<String, CommandError> {
        let args: Vec<&str> = if headless { vec!["-headless"] } else { Vec::new() };
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "firefox",
                    "moz:firefoxOptions": {
                        "args": args,
                        "prefs": { "dom.webdriver.enabled": false }
                    }
                }
            }
        });

        let value = self
            .command(Method::POST, "/session", Some(capabilities))
            .await?;
        value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CommandError {
                code: None,
                message: "WebDriver reply has no sessionId".to_string(),
            })
    }
}

/// A geckodriver-managed Firefox session
pub struct FirefoxSession {
    driver: WebDriverClient,
    id: String,
    settle: Duration,
}

impl FirefoxSession {
    fn path(&self, suffix: &str) -> String {
        format!("/session/{}{}", self.id, suffix)
    }
}

#[async_trait]
impl BrowserSession for FirefoxSession {
    async fn open(config: &BrowserConfig) -> Result<Self, DlError> {
        let driver = WebDriverClient::new(
            &config.webdriver_url,
            Duration::from_secs(config.page_timeout_secs),
        )?;

        tracing::info!(
            "Starting Firefox session via {} (headless={})",
            config.webdriver_url,
            config.headless
        );
        let id = driver
            .new_session(config.headless)
            .await
            .map_err(|e| DlError::Browser(format!("failed to start Firefox: {}", e)))?;

        Ok(Self {
            driver,
            id,
            settle: Duration::from_millis(config.settle_ms),
        })
    }

    // geckodriver serves one session per process, so a second `POST /session`
    // is refused while the first is alive
    fn session_limit(_config: &BrowserConfig, _requested: usize) -> usize {
        1
    }

    async fn render(&mut self, url: &Url) -> Result<RenderedPage, SessionError> {
        self.driver
            .command(
                Method::POST,
                &self.path("/url"),
                Some(json!({ "url": url.as_str() })),
            )
            .await
            .map_err(CommandError::into_session_error)?;

        self.driver
            .command(
                Method::POST,
                &self.path("/element"),
                Some(json!({ "using": "css selector", "value": "body" })),
            )
            .await
            .map_err(CommandError::into_session_error)?;

        if let Err(e) = self
            .driver
            .command(
                Method::POST,
                &self.path("/execute/sync"),
                Some(json!({ "script": WEBDRIVER_MASK_SCRIPT, "args": [] })),
            )
            .await
        {
            tracing::debug!("webdriver mask skipped on {}: {}", url, e);
        }

        tokio::time::sleep(self.settle).await;

        let html = self
            .driver
            .command(Method::GET, &self.path("/source"), None)
            .await
            .map_err(CommandError::into_session_error)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SessionError::page("page source is not a string"))?;

        let final_url = self
            .driver
            .command(Method::GET, &self.path("/url"), None)
            .await
            .ok()
            .and_then(|v| v.as_str().map(str::to_string));

        Ok(RenderedPage { final_url, html })
    }

    async fn close(self) {
        if let Err(e) = self
            .driver
            .command(Method::DELETE, &self.path(""), None)
            .await
        {
            tracing::debug!("Firefox session {} did not close cleanly: {}", self.id, e);
        }
    }
}
