//! Browser-driven page fetching
//!
//! Browser sessions are expensive and not safe to drive from two workers at
//! once. [`BrowserPool`] hands each worker exclusive use of one session,
//! launching sessions lazily up to the pool size and keeping released ones
//! for reuse. [`BrowserPool::close`] shuts every session down at the end of a
//! run.

#[cfg(feature = "browser")]
mod chrome;
mod firefox;

#[cfg(feature = "browser")]
pub use chrome::ChromeSession;
pub use firefox::{FirefoxSession, WebDriverClient};

use crate::config::BrowserConfig;
use crate::crawler::{FetchedPage, PageFetcher};
use crate::{DlError, FetchError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Script that hides the automation flag from page scripts
pub const WEBDRIVER_MASK_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

/// DOM snapshot of a rendered page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL the browser ended up on, when it reports one
    pub final_url: Option<String>,
    /// Serialized DOM after scripts ran
    pub html: String,
}

/// Failure while rendering one page
#[derive(Debug, Clone)]
pub struct SessionError {
    pub message: String,
    /// The session can no longer be used and must be retired
    pub broken: bool,
}

impl SessionError {
    /// A failure limited to the current page
    pub fn page(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            broken: false,
        }
    }

    /// A failure that leaves the session unusable
    pub fn broken(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            broken: true,
        }
    }
}

/// One exclusively-owned browser session
#[async_trait]
pub trait BrowserSession: Send + Sized + 'static {
    /// Launches or connects a new session
    async fn open(config: &BrowserConfig) -> Result<Self, DlError>;

    /// How many sessions a pool may hold when `requested` are wanted
    fn session_limit(_config: &BrowserConfig, requested: usize) -> usize {
        requested
    }

    /// Navigates to `url`, waits for the page to render and returns its DOM
    async fn render(&mut self, url: &Url) -> Result<RenderedPage, SessionError>;

    /// Shuts the session down
    async fn close(self);
}

/// Pool of browser sessions, at most one per worker
pub struct BrowserPool<S: BrowserSession> {
    config: BrowserConfig,
    idle: Mutex<Vec<S>>,
    permits: Arc<Semaphore>,
    max_sessions: usize,
}

impl<S: BrowserSession> BrowserPool<S> {
    /// Creates an empty pool that will hold at most `max_sessions` sessions
    ///
    /// The session type may lower that bound; extra workers then wait for a
    /// session to be released.
    pub fn new(config: BrowserConfig, max_sessions: usize) -> Self {
        let max_sessions = S::session_limit(&config, max_sessions).max(1);
        Self {
            config,
            idle: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(max_sessions)),
            max_sessions,
        }
    }

    /// Most sessions this pool will open at once
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Checks out a session, launching one if none is idle
    ///
    /// Waits while every session is in use.
    pub async fn acquire(&self) -> Result<SessionGuard<'_, S>, DlError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| DlError::Browser("browser pool is closed".to_string()))?;

        let existing = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let session = match existing {
            Some(session) => session,
            None => {
                tracing::debug!("Opening new browser session");
                S::open(&self.config).await?
            }
        };

        Ok(SessionGuard {
            pool: self,
            session: Some(session),
            _permit: permit,
        })
    }

    /// Number of sessions waiting for reuse
    pub fn idle_count(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Refuses further checkouts and shuts down every idle session
    pub async fn close(&self) {
        self.permits.close();
        let sessions = std::mem::take(&mut *self.idle.lock().unwrap_or_else(PoisonError::into_inner));
        if !sessions.is_empty() {
            tracing::debug!("Closing {} browser session(s)", sessions.len());
        }
        for session in sessions {
            session.close().await;
        }
    }

    fn release(&self, session: S) {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session);
    }
}

/// Exclusive lease on one pooled session; returns it to the pool on drop
pub struct SessionGuard<'a, S: BrowserSession> {
    pool: &'a BrowserPool<S>,
    session: Option<S>,
    _permit: OwnedSemaphorePermit,
}

impl<S: BrowserSession> SessionGuard<'_, S> {
    /// Renders a page with the leased session
    pub async fn render(&mut self, url: &Url) -> Result<RenderedPage, SessionError> {
        match self.session.as_mut() {
            Some(session) => session.render(url).await,
            None => Err(SessionError::broken("session already retired")),
        }
    }

    /// Shuts the leased session down instead of returning it to the pool
    pub async fn retire(mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

impl<S: BrowserSession> Drop for SessionGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session);
        }
    }
}

/// Page fetcher that renders pages in pooled browser sessions
pub struct BrowserFetcher<S: BrowserSession> {
    pool: BrowserPool<S>,
    name: &'static str,
}

impl<S: BrowserSession> BrowserFetcher<S> {
    /// Creates a fetcher whose pool holds at most `max_sessions` sessions
    pub fn new(name: &'static str, config: BrowserConfig, max_sessions: usize) -> Self {
        Self {
            pool: BrowserPool::new(config, max_sessions),
            name,
        }
    }

    /// The underlying session pool
    pub fn pool(&self) -> &BrowserPool<S> {
        &self.pool
    }
}

#[async_trait]
impl<S: BrowserSession> PageFetcher for BrowserFetcher<S> {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let mut guard = self.pool.acquire().await.map_err(|e| FetchError::Browser {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        match guard.render(url).await {
            Ok(rendered) => {
                let final_url = rendered
                    .final_url
                    .as_deref()
                    .and_then(|u| Url::parse(u).ok())
                    .filter(|u| u.scheme() == "http" || u.scheme() == "https")
                    .unwrap_or_else(|| url.clone());

                Ok(FetchedPage {
                    url: final_url,
                    body: rendered.html,
                })
            }
            Err(e) => {
                if e.broken {
                    tracing::warn!("Retiring broken browser session: {}", e.message);
                    guard.retire().await;
                }
                Err(FetchError::Browser {
                    url: url.to_string(),
                    message: e.message,
                })
            }
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
