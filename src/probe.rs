//! The broadcast-status probe.
//!
//! One call to [`StatusProbe::check`] answers one question: is this channel
//! live right now? The probe launches a fresh browser session, navigates to
//! the channel's public page, waits for client-side redirects to settle, and
//! classifies the outcome from the final URL:
//!
//! - URL ends in `/null` → the platform redirected to its "no such
//!   broadcast" page → **OFF**
//! - anything else → **ON**, and the page's Open Graph tags carry the
//!   broadcaster name, category, title, and thumbnail
//!
//! The probe is generic over [`BrowserLauncher`] so tests run against stub
//! sessions instead of a real Chromium process.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{error, info};

use crate::browser::{BrowserLauncher, BrowserSession};

/// URL suffix the platform redirects to when a channel is not broadcasting.
const OFFLINE_URL_SUFFIX: &str = "/null";

// ── Result shape ──────────────────────────────────────────────────────────────

/// Outcome of one status check, serialized as the response body.
///
/// The `status` tag takes one of three values:
///
/// | JSON | Meaning |
/// |---|---|
/// | `{"status":"ERROR"}` | no target supplied |
/// | `{"status":"OFF"}` | channel is offline |
/// | `{"status":"OFF","detail":…}` | the probe itself failed |
/// | `{"status":"ON",…}` | channel is live, metadata attached |
///
/// A probe failure is deliberately indistinguishable from a genuine OFF
/// except for the presence of `detail` — callers treat `detail` as the
/// retriable-error signal.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum BroadcastStatus {
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "OFF")]
    Off {
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    #[serde(rename = "ON")]
    On {
        user: String,
        category: String,
        title: String,
        thumbnail: String,
    },
}

// ── Probe error ───────────────────────────────────────────────────────────────

/// A failure anywhere in the browser automation chain.
///
/// Launch failures, navigation timeouts, DOM evaluation errors, and
/// malformed metadata all collapse into this one opaque message — the
/// upstream page gives us no reliable way to tell them apart, so the probe
/// does not pretend to.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ProbeError(String);

impl ProbeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

// ── StatusProbe ───────────────────────────────────────────────────────────────

/// Checks whether a channel is currently broadcasting.
///
/// Holds no state beyond the launcher and the base URL; every call to
/// [`check`](StatusProbe::check) gets its own isolated browser session, so
/// concurrent checks never share anything.
pub struct StatusProbe<L> {
    launcher: L,
    base_url: String,
}

impl<L: BrowserLauncher> StatusProbe<L> {
    /// `base_url` is the public host channel pages live under; the channel
    /// identifier is appended to it per check. A trailing slash is tolerated.
    pub fn new(launcher: L, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { launcher, base_url }
    }

    /// Runs one status check for `target`.
    ///
    /// Never fails: every internal error is folded into
    /// [`BroadcastStatus::Off`] with a `detail` message. An empty target
    /// short-circuits to [`BroadcastStatus::Error`] without launching a
    /// browser.
    pub async fn check(&self, target: &str) -> BroadcastStatus {
        if target.is_empty() {
            info!("no target provided");
            return BroadcastStatus::Error;
        }

        let url = format!("{}/{}", self.base_url, target);

        match self.probe(&url).await {
            Ok(status) => status,
            Err(e) => {
                error!(channel = target, "probe failed: {e}");
                BroadcastStatus::Off { detail: Some(e.to_string()) }
            }
        }
    }

    /// Launches a session, inspects the page, and tears the session down on
    /// every exit path. Teardown happens exactly once per launched session;
    /// a teardown failure is logged but never overrides the inspection
    /// outcome.
    async fn probe(&self, url: &str) -> Result<BroadcastStatus, ProbeError> {
        let mut session = self.launcher.launch().await?;
        let outcome = inspect(&mut session, url).await;
        if let Err(e) = session.close().await {
            tracing::warn!("browser teardown failed: {e}");
        }
        outcome
    }
}

/// Navigates and classifies. Split out of `probe` so the session teardown in
/// the caller covers every `?` in here.
async fn inspect<S: BrowserSession>(
    session: &mut S,
    url: &str,
) -> Result<BroadcastStatus, ProbeError> {
    session.navigate(url).await?;

    let current = session.current_url().await?;
    if current.ends_with(OFFLINE_URL_SUFFIX) {
        info!("broadcast status: OFF");
        return Ok(BroadcastStatus::Off { detail: None });
    }
    info!("broadcast status: ON");

    let tags = session.open_graph_tags().await?;
    extract_metadata(&tags)
}

/// Builds the ON result from the page's Open Graph tags.
///
/// `og:description` is `<category>|<user>`; a missing separator is an error
/// rather than a partial result — the platform always emits it for live
/// pages, and anything else means we are looking at markup we don't
/// understand.
fn extract_metadata(tags: &HashMap<String, String>) -> Result<BroadcastStatus, ProbeError> {
    let tag = |name: &str| {
        tags.get(name)
            .cloned()
            .ok_or_else(|| ProbeError::new(format!("page metadata missing {name}")))
    };

    let title = tag("og:title")?;
    let thumbnail = tag("og:image")?;
    let description = tag("og:description")?;

    let (category, user) = description
        .split_once('|')
        .ok_or_else(|| ProbeError::new("og:description missing `|` separator"))?;

    Ok(BroadcastStatus::On {
        user: user.to_owned(),
        category: category.to_owned(),
        title,
        thumbnail,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    const BASE: &str = "https://play.example.test";

    /// What the stub pretends the page looks like after navigation settles.
    #[derive(Clone, Default)]
    struct StubPage {
        final_url: String,
        tags: HashMap<String, String>,
        nav_error: Option<String>,
    }

    impl StubPage {
        fn at(url: &str) -> Self {
            Self { final_url: url.to_owned(), ..Self::default() }
        }

        fn tag(mut self, property: &str, content: &str) -> Self {
            self.tags.insert(property.to_owned(), content.to_owned());
            self
        }

        fn failing(message: &str) -> Self {
            Self { nav_error: Some(message.to_owned()), ..Self::default() }
        }
    }

    /// Stub launcher: hands out sessions backed by a URL → page map and
    /// counts launches and teardowns.
    #[derive(Default)]
    struct StubLauncher {
        pages: HashMap<String, StubPage>,
        launches: AtomicUsize,
        closes: Arc<AtomicUsize>,
    }

    impl StubLauncher {
        fn single(target: &str, page: StubPage) -> Self {
            let mut pages = HashMap::new();
            pages.insert(format!("{BASE}/{target}"), page);
            Self { pages, ..Self::default() }
        }

        fn launches(&self) -> usize {
            self.launches.load(Ordering::SeqCst)
        }

        fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BrowserLauncher for StubLauncher {
        type Session = StubSession;

        async fn launch(&self) -> Result<StubSession, ProbeError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(StubSession {
                pages: self.pages.clone(),
                current: None,
                closes: Arc::clone(&self.closes),
            })
        }
    }

    struct StubSession {
        pages: HashMap<String, StubPage>,
        current: Option<StubPage>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserSession for StubSession {
        async fn navigate(&mut self, url: &str) -> Result<(), ProbeError> {
            let page = self
                .pages
                .get(url)
                .cloned()
                .ok_or_else(|| ProbeError::new(format!("no stub page for {url}")))?;
            if let Some(message) = &page.nav_error {
                return Err(ProbeError::new(message.clone()));
            }
            self.current = Some(page);
            Ok(())
        }

        async fn current_url(&self) -> Result<String, ProbeError> {
            let page = self.current.as_ref().ok_or_else(|| ProbeError::new("not navigated"))?;
            Ok(page.final_url.clone())
        }

        async fn open_graph_tags(&self) -> Result<HashMap<String, String>, ProbeError> {
            let page = self.current.as_ref().ok_or_else(|| ProbeError::new("not navigated"))?;
            Ok(page.tags.clone())
        }

        async fn close(self) -> Result<(), ProbeError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn live_page(url: &str, title: &str, description: &str, image: &str) -> StubPage {
        StubPage::at(url)
            .tag("og:title", title)
            .tag("og:description", description)
            .tag("og:image", image)
    }

    #[tokio::test]
    async fn empty_target_is_error_without_launching() {
        let probe = StatusProbe::new(StubLauncher::default(), BASE);

        assert_eq!(probe.check("").await, BroadcastStatus::Error);
        assert_eq!(probe.launcher.launches(), 0);
    }

    #[tokio::test]
    async fn null_suffix_classifies_off_with_no_detail() {
        let page = StubPage::at(&format!("{BASE}/alice/null"));
        let probe = StatusProbe::new(StubLauncher::single("alice", page), BASE);

        let status = probe.check("alice").await;

        assert_eq!(status, BroadcastStatus::Off { detail: None });
        // The serialized body must not carry a `detail` key at all.
        assert_eq!(serde_json::to_value(&status).unwrap(), json!({"status": "OFF"}));
    }

    #[tokio::test]
    async fn live_page_yields_on_with_metadata() {
        let url = format!("{BASE}/alice");
        let page = live_page(&url, "Foo", "CategoryX|UserY", "http://img/1.png");
        let probe = StatusProbe::new(StubLauncher::single("alice", page), BASE);

        let status = probe.check("alice").await;

        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "status": "ON",
                "user": "UserY",
                "category": "CategoryX",
                "title": "Foo",
                "thumbnail": "http://img/1.png",
            })
        );
    }

    #[tokio::test]
    async fn navigation_failure_surfaces_message_in_detail() {
        let page = StubPage::failing("navigation timed out");
        let probe = StatusProbe::new(StubLauncher::single("alice", page), BASE);

        assert_eq!(
            probe.check("alice").await,
            BroadcastStatus::Off { detail: Some("navigation timed out".into()) }
        );
    }

    #[tokio::test]
    async fn missing_description_separator_is_a_probe_failure() {
        let url = format!("{BASE}/alice");
        let page = live_page(&url, "Foo", "no separator here", "http://img/1.png");
        let probe = StatusProbe::new(StubLauncher::single("alice", page), BASE);

        match probe.check("alice").await {
            BroadcastStatus::Off { detail: Some(detail) } => {
                assert!(detail.contains("og:description"), "unexpected detail: {detail}");
            }
            other => panic!("expected OFF with detail, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_tag_is_a_probe_failure() {
        let url = format!("{BASE}/alice");
        let page = StubPage::at(&url).tag("og:title", "Foo");
        let probe = StatusProbe::new(StubLauncher::single("alice", page), BASE);

        match probe.check("alice").await {
            BroadcastStatus::Off { detail: Some(detail) } => {
                assert!(detail.contains("og:image"), "unexpected detail: {detail}");
            }
            other => panic!("expected OFF with detail, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn session_closes_exactly_once_on_every_path() {
        let on = live_page(&format!("{BASE}/a"), "T", "C|U", "http://img/a.png");
        let off = StubPage::at(&format!("{BASE}/b/null"));
        let broken = StubPage::failing("boom");

        for (target, page) in [("a", on), ("b", off), ("c", broken)] {
            let probe = StatusProbe::new(StubLauncher::single(target, page), BASE);
            probe.check(target).await;
            assert_eq!(probe.launcher.launches(), 1, "target {target}");
            assert_eq!(probe.launcher.closes(), 1, "target {target}");
        }
    }

    #[tokio::test]
    async fn concurrent_probes_keep_metadata_isolated() {
        let probes: Vec<_> = (0..8)
            .map(|i| {
                let target = format!("chan{i}");
                let url = format!("{BASE}/{target}");
                let page = live_page(
                    &url,
                    &format!("Title {i}"),
                    &format!("Cat{i}|User{i}"),
                    &format!("http://img/{i}.png"),
                );
                (target.clone(), StatusProbe::new(StubLauncher::single(&target, page), BASE))
            })
            .collect();

        let results = futures_util::future::join_all(
            probes.iter().map(|(target, probe)| probe.check(target)),
        )
        .await;

        for (i, status) in results.into_iter().enumerate() {
            assert_eq!(
                status,
                BroadcastStatus::On {
                    user: format!("User{i}"),
                    category: format!("Cat{i}"),
                    title: format!("Title {i}"),
                    thumbnail: format!("http://img/{i}.png"),
                }
            );
        }
    }
}
