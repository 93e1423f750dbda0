//! # onair
//!
//! Is a live-streaming channel broadcasting right now? This service answers
//! over HTTP by actually looking: each request launches a fresh headless
//! Chromium, loads the channel's public page, waits for client-side
//! redirects to settle, and classifies ON/OFF from the URL the page ends up
//! at. No API keys, no protocol parsing — just what a browser sees.
//!
//! ## The contract
//!
//! One route:
//!
//! ```text
//! GET /{target}/check
//! ```
//!
//! Always `200` with a JSON body shaped by [`BroadcastStatus`]:
//!
//! - `{"status":"ERROR"}` — no target supplied
//! - `{"status":"OFF"}` — the channel is not broadcasting
//! - `{"status":"OFF","detail":"…"}` — the probe itself failed; `detail` is
//!   the only retriable-error signal callers get
//! - `{"status":"ON","user":…,"category":…,"title":…,"thumbnail":…}` — live,
//!   metadata read from the page's Open Graph tags
//!
//! The rare `500` (a panic escaping the probe task) reuses the OFF+detail
//! shape.
//!
//! What onair intentionally skips: retries, browser pooling, caching,
//! authentication, rate limiting. Each check pays for a full browser launch
//! — put a cache or a proxy in front if you need more than a handful of
//! checks per second.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use onair::{ChromiumLauncher, Config, Server, StatusProbe};
//!
//! #[tokio::main]
//! async fn main() {
//!     let probe = StatusProbe::new(ChromiumLauncher, "https://play.sooplive.co.kr");
//!     Server::bind("0.0.0.0:3000").serve(probe).await.unwrap();
//! }
//! ```

mod browser;
mod chromium;
mod config;
mod error;
mod probe;
mod server;

pub use browser::{BrowserLauncher, BrowserSession};
pub use chromium::{ChromiumLauncher, ChromiumSession};
pub use config::Config;
pub use error::Error;
pub use probe::{BroadcastStatus, ProbeError, StatusProbe};
pub use server::Server;
