//! Shared headless-browser session pool.
//!
//! One browser process for the whole tracker, lazily launched by the
//! first job that needs a page; one isolated page per job, never shared
//! or reused. Pages block image/media/font fetches to cut render time.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::extract::extract;
use crate::traits::session::{OrderPage, PagePool};
use crate::types::ScrapeSnapshot;

/// Resource types blocked on every tracked page.
const BLOCKED_URL_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.ico", "*.mp4", "*.webm",
    "*.woff", "*.woff2", "*.ttf", "*.otf",
];

/// Tunables for browser navigation and rendering.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for one navigation.
    pub nav_timeout: Duration,
    /// Wait after navigation (and on every revisit) for the client app
    /// to re-render in place.
    pub settle_delay: Duration,
    /// Pause before the single transient-fault retry.
    pub retry_delay: Duration,
    /// Host substrings that mark an authentication domain.
    pub auth_host_markers: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            nav_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(4),
            retry_delay: Duration::from_secs(1),
            auth_host_markers: vec![
                "identity.".to_string(),
                "login.".to_string(),
                "auth.".to_string(),
            ],
        }
    }
}

struct SharedBrowser {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

/// Lazily-launched shared browser handing out one page per job.
pub struct SessionPool {
    config: SessionConfig,
    shared: tokio::sync::Mutex<Option<SharedBrowser>>,
}

impl SessionPool {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            shared: tokio::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl PagePool for SessionPool {
    async fn open_page(&self) -> SessionResult<Arc<dyn OrderPage>> {
        let mut shared = self.shared.lock().await;

        if shared.is_none() {
            info!("launching shared browser process");
            let config = BrowserConfig::builder()
                .build()
                .map_err(|e| SessionError::Launch(e.into()))?;
            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| SessionError::Launch(Box::new(e)))?;

            // The handler stream must be polled for the browser to work
            let handler_task = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            *shared = Some(SharedBrowser {
                browser,
                handler_task,
            });
        }

        let browser = &shared.as_ref().ok_or(SessionError::Closed)?.browser;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Browser(Box::new(e)))?;

        if let Err(e) = page.execute(EnableParams::default()).await {
            warn!(error = %e, "failed to enable network domain");
        }
        let patterns = BLOCKED_URL_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect();
        if let Err(e) = page.execute(SetBlockedUrLsParams { urls: patterns }).await {
            warn!(error = %e, "failed to block resource fetches");
        }

        Ok(Arc::new(SessionPage {
            page,
            config: self.config.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn shutdown(&self) {
        let taken = self.shared.lock().await.take();
        if let Some(mut shared) = taken {
            info!("closing shared browser process");
            if let Err(e) = shared.browser.close().await {
                warn!(error = %e, "browser close failed");
            }
            shared.handler_task.abort();
        }
    }
}

/// One isolated page owned by a single job.
///
/// Explicit async [`OrderPage::close`] is the preferred cleanup path;
/// dropping an unclosed page spawns a background close so error paths
/// cannot leak CDP targets.
pub struct SessionPage {
    page: Page,
    config: SessionConfig,
    closed: AtomicBool,
}

#[async_trait]
impl OrderPage for SessionPage {
    async fn fetch_snapshot(&self, url: &str) -> SessionResult<ScrapeSnapshot> {
        let current = self
            .page
            .url()
            .await
            .map_err(|e| SessionError::Browser(Box::new(e)))?;

        // The destination is a client-rendered app that mutates in
        // place; navigate only when we are somewhere else entirely.
        if current.as_deref() != Some(url) {
            debug!(url = %url, "navigating");
            tokio::time::timeout(self.config.nav_timeout, self.page.goto(url))
                .await
                .map_err(|_| SessionError::Timeout {
                    url: url.to_string(),
                })?
                .map_err(classify_fault)?;
        }
        tokio::time::sleep(self.config.settle_delay).await;

        let location = self.page.url().await.ok().flatten().unwrap_or_default();
        if is_auth_location(&location, &self.config.auth_host_markers) {
            debug!(location = %location, "landed on an authentication domain");
            return Ok(ScrapeSnapshot::login_wall());
        }

        let markup = match self.page.content().await {
            Ok(markup) => markup,
            Err(e) if is_transient(&e) => {
                warn!(url = %url, error = %e, "transient render fault, retrying once");
                tokio::time::sleep(self.config.retry_delay).await;
                self.page
                    .content()
                    .await
                    .map_err(|e| SessionError::Transient(e.to_string()))?
            }
            Err(e) => return Err(SessionError::Browser(Box::new(e))),
        };

        Ok(extract(&markup))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.page.clone().close().await {
            warn!(error = %e, "page close failed");
        }
    }
}

impl Drop for SessionPage {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let page = self.page.clone();
            handle.spawn(async move {
                let _ = page.close().await;
            });
        }
    }
}

/// Whether the final location sits on an authentication domain.
fn is_auth_location(location: &str, markers: &[String]) -> bool {
    let host = match url::Url::parse(location) {
        Ok(u) => u.host_str().map(|h| h.to_string()).unwrap_or_default(),
        Err(_) => return false,
    };
    markers.iter().any(|m| host.contains(m.as_str()))
}

/// Whether a CDP fault is the known disappearing-frame race.
fn is_transient(error: &CdpError) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("frame") || msg.contains("detached")
}

fn classify_fault(error: CdpError) -> SessionError {
    if is_transient(&error) {
        SessionError::Transient(error.to_string())
    } else {
        SessionError::Browser(Box::new(error))
    }
}
