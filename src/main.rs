//! Service entry point: parse config, wire up logging, serve.

use clap::Parser;
use tracing::error;

use onair::{ChromiumLauncher, Config, Server, StatusProbe};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    // The guard flushes the file writer on drop; it must outlive the server.
    let _guard = init_logging(&config);

    let probe = StatusProbe::new(ChromiumLauncher, config.base_url.clone());

    if let Err(e) = Server::bind(&config.bind).serve(probe).await {
        error!("server error: {e}");
        std::process::exit(1);
    }
}

/// Initializes the process-wide tracing subscriber: compact console output
/// plus an append-only log file (never rotated).
fn init_logging(config: &Config) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let dir = match config.log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => std::path::Path::new("."),
    };
    let filename = config
        .log_file
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("onair.log"));

    let appender = tracing_appender::rolling::never(dir, filename);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(EnvFilter::new(&config.log_level))
        .with(fmt::layer().compact())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    guard
}
