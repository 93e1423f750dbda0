//! Chromium-backed [`BrowserLauncher`] / [`BrowserSession`] over CDP.
//!
//! Each launch spawns a private headless Chromium process via
//! [`chromiumoxide`] — no pooling, no reuse. The sandbox is disabled so the
//! service runs in containers that lack the setuid helper.
//!
//! # The settle wait
//!
//! Offline channels don't 404 — the page loads, then client-side script
//! redirects to a URL ending in `/null`. After navigation we therefore poll
//! the page URL: if a redirect is observed and the new URL holds still for a
//! few polls we're done early; otherwise we wait out a hard 5 second
//! ceiling, which is also the worst-case added latency of a check.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, warn};

use crate::browser::{BrowserLauncher, BrowserSession};
use crate::probe::ProbeError;

/// Upper bound on the initial navigation (connect + load).
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Hard ceiling on the post-navigation settle wait.
const SETTLE_CEILING: Duration = Duration::from_secs(5);

/// How often the settle wait samples the page URL.
const SETTLE_POLL: Duration = Duration::from_millis(250);

/// Consecutive identical samples before a redirected URL counts as stable.
const SETTLE_STABLE_POLLS: u32 = 2;

/// Runs inside the page; mirrors what a link-preview crawler would read.
const OG_TAGS_FN: &str = r#"
() => {
    const tags = {};
    for (const meta of document.getElementsByTagName('meta')) {
        const property = meta.getAttribute('property');
        if (property === 'og:title' || property === 'og:image' || property === 'og:description') {
            tags[property] = meta.getAttribute('content');
        }
    }
    return tags;
}
"#;

fn driver(err: impl fmt::Display) -> ProbeError {
    ProbeError::new(err.to_string())
}

// ── Launcher ──────────────────────────────────────────────────────────────────

/// Launches a fresh headless Chromium per session.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChromiumLauncher;

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self) -> Result<ChromiumSession, ProbeError> {
        let config = BrowserConfig::builder()
            .args(["--no-sandbox", "--disable-setuid-sandbox"])
            .build()
            .map_err(ProbeError::new)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(driver)?;

        // The handler drives the CDP websocket; it must be polled for the
        // whole session lifetime.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("cdp handler: {e}");
                }
            }
        });

        // If the page can't be opened the process is already running — tear
        // it down here, nobody downstream owns it yet.
        match browser.new_page("about:blank").await {
            Ok(page) => Ok(ChromiumSession { browser, page, handler_task }),
            Err(e) => {
                if let Err(close_err) = teardown(browser, handler_task).await {
                    warn!("teardown after failed page open: {close_err}");
                }
                Err(driver(e))
            }
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// One Chromium process with one open tab.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), ProbeError> {
        timeout(NAVIGATION_TIMEOUT, self.page.goto(url))
            .await
            .map_err(|_| {
                ProbeError::new(format!(
                    "navigation to {url} timed out after {}s",
                    NAVIGATION_TIMEOUT.as_secs()
                ))
            })?
            .map_err(driver)?;

        self.settle().await;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, ProbeError> {
        self.page
            .url()
            .await
            .map_err(driver)?
            .ok_or_else(|| ProbeError::new("page reported no URL"))
    }

    async fn open_graph_tags(&self) -> Result<HashMap<String, String>, ProbeError> {
        self.page
            .evaluate_function(OG_TAGS_FN)
            .await
            .map_err(driver)?
            .into_value()
            .map_err(driver)
    }

    async fn close(self) -> Result<(), ProbeError> {
        teardown(self.browser, self.handler_task).await
    }
}

impl ChromiumSession {
    /// Waits for the client-side redirect window to pass.
    ///
    /// Early exit only when the URL has moved away from its post-load value
    /// and then held still for [`SETTLE_STABLE_POLLS`] samples. A page that
    /// never redirects waits out the full ceiling, matching the worst case a
    /// live channel always pays.
    async fn settle(&self) {
        let deadline = Instant::now() + SETTLE_CEILING;
        let initial = self.page.url().await.ok().flatten();
        let mut last: Option<String> = None;
        let mut held = 0u32;

        while Instant::now() < deadline {
            sleep(SETTLE_POLL).await;

            let current = match self.page.url().await {
                Ok(Some(url)) => url,
                // Mid-redirect the URL can be briefly unreadable; keep polling.
                _ => continue,
            };

            if initial.as_deref() == Some(current.as_str()) {
                last = None;
                held = 0;
            } else if last.as_deref() == Some(current.as_str()) {
                held += 1;
                if held >= SETTLE_STABLE_POLLS {
                    return;
                }
            } else {
                last = Some(current);
                held = 0;
            }
        }
    }
}

/// Closes the browser, reaps the process, and stops the CDP handler task.
async fn teardown(mut browser: Browser, handler_task: JoinHandle<()>) -> Result<(), ProbeError> {
    let closed = browser.close().await;
    if let Err(e) = browser.wait().await {
        warn!("waiting for browser exit: {e}");
    }
    handler_task.abort();
    closed.map(|_| ()).map_err(driver)
}
