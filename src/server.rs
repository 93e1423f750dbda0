//! HTTP surface: one route, graceful shutdown.
//!
//! The route table has a single entry — `GET /{target}/check` — dispatching
//! into the [`StatusProbe`]. Everything else is 404. The probe never fails
//! (it folds its own errors into the OFF+detail shape), so the only way a
//! request produces a 500 is a panic escaping the probe task; that is caught
//! at the join point and mapped to the same OFF+detail body.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server stops accepting new connections
//! immediately and drains in-flight ones before returning. A probe mid-check
//! finishes its browser teardown rather than being cut off. Size your
//! orchestrator's grace period above the probe's worst case (navigation
//! timeout + settle ceiling).

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use http_body_util::Full;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::browser::BrowserLauncher;
use crate::error::Error;
use crate::probe::{BroadcastStatus, StatusProbe};

/// The only route this service serves.
const CHECK_ROUTE: &str = "/{target}/check";

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and dispatching them into `probe`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve<L>(self, probe: StatusProbe<L>) -> Result<(), Error>
    where
        L: BrowserLauncher + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;

        // Shared across connection tasks; the probe itself is stateless.
        let probe = Arc::new(probe);
        let routes = Arc::new(route_table());

        info!(addr = %self.addr, "onair listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` makes select! check arms top-to-bottom; shutdown
                // wins over queued connections.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let probe = Arc::clone(&probe);
                    let routes = Arc::clone(&routes);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection, not once
                        // per connection.
                        let svc = service_fn(move |req| {
                            let probe = Arc::clone(&probe);
                            let routes = Arc::clone(&routes);
                            async move { dispatch(probe, routes, req).await }
                        });

                        // `auto::Builder` handles both HTTP/1.1 and HTTP/2,
                        // whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: wait for every in-flight connection to finish.
        while tasks.join_next().await.is_some() {}

        info!("onair stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

fn route_table() -> matchit::Router<()> {
    let mut routes = matchit::Router::new();
    routes
        .insert(CHECK_ROUTE, ())
        .unwrap_or_else(|e| panic!("invalid route `{CHECK_ROUTE}`: {e}"));
    routes
}

/// Routes one request and produces one response.
///
/// The error type is [`Infallible`] — every failure is expressed as an HTTP
/// response, so hyper never sees an error.
async fn dispatch<L>(
    probe: Arc<StatusProbe<L>>,
    routes: Arc<matchit::Router<()>>,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    L: BrowserLauncher + 'static,
{
    if req.method() != http::Method::GET {
        return Ok(empty(StatusCode::NOT_FOUND));
    }

    let path = req.uri().path().to_owned();
    let target = match routes.at(&path) {
        Ok(matched) => matched.params.get("target").unwrap_or_default().to_owned(),
        Err(_) => return Ok(empty(StatusCode::NOT_FOUND)),
    };

    info!("status check: {target}");

    // The probe runs in its own task so a panic surfaces here as a JoinError
    // instead of tearing down the whole connection.
    let checked = tokio::spawn(async move { probe.check(&target).await }).await;

    Ok(match checked {
        Ok(status) => json(StatusCode::OK, &status),
        Err(e) => {
            error!("probe task failed: {e}");
            json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &BroadcastStatus::Off { detail: Some(e.to_string()) },
            )
        }
    })
}

// ── Response shaping ──────────────────────────────────────────────────────────

fn json(code: StatusCode, value: &impl serde::Serialize) -> http::Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_else(|e| {
        error!("response serialization failed: {e}");
        br#"{"status":"OFF"}"#.to_vec()
    });
    let mut res = http::Response::new(Full::new(Bytes::from(body)));
    *res.status_mut() = code;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    res
}

fn empty(code: StatusCode) -> http::Response<Full<Bytes>> {
    let mut res = http::Response::new(Full::new(Bytes::new()));
    *res.status_mut() = code;
    res
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C, for
/// local dev). On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // `pending()` never resolves — on non-Unix platforms the SIGTERM arm is
    // effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
