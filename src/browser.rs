//! The seam between the probe and the browser it drives.
//!
//! # Why a trait pair instead of calling Chromium directly
//!
//! The probe's logic — build a URL, classify the final URL, pick apart the
//! Open Graph tags — is trivially testable. Spawning a real Chromium process
//! is not. These two traits split ownership along that line:
//!
//! - [`BrowserLauncher`] hands out fresh, isolated sessions — one per check,
//!   never reused, never pooled.
//! - [`BrowserSession`] is one live browser + page. `close` consumes the
//!   session, so the type system makes "torn down exactly once" the only
//!   thing you can write.
//!
//! Production uses [`ChromiumLauncher`](crate::ChromiumLauncher); tests
//! substitute counting stubs.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::probe::ProbeError;

/// Hands out fresh browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Session: BrowserSession;

    /// Starts a new isolated browser instance with a single blank page.
    async fn launch(&self) -> Result<Self::Session, ProbeError>;
}

/// One live browser instance with one open page.
///
/// `'static` because a session rides inside a spawned request task; it owns
/// its resources outright.
#[async_trait]
pub trait BrowserSession: Send + 'static {
    /// Navigates to `url` and returns once the page has settled — the load
    /// completed and any client-side redirect has had its chance to run.
    /// The wait is bounded; a hung navigation becomes an error.
    async fn navigate(&mut self, url: &str) -> Result<(), ProbeError>;

    /// The page's URL after navigation and redirects.
    async fn current_url(&self) -> Result<String, ProbeError>;

    /// `property → content` for every `<meta>` tag whose `property` is one
    /// of `og:title`, `og:image`, `og:description`.
    async fn open_graph_tags(&self) -> Result<HashMap<String, String>, ProbeError>;

    /// Tears the browser down. Consumes the session: after `close` there is
    /// nothing left to leak.
    async fn close(self) -> Result<(), ProbeError>;
}
