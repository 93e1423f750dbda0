//! Runtime configuration.
//!
//! Everything is a flag with an env fallback, so the container image needs
//! no config file:
//!
//! ```sh
//! onair --bind 0.0.0.0:3000
//! ONAIR_BASE_URL=https://play.sooplive.co.kr onair
//! ```

use std::path::PathBuf;

use clap::Parser;

/// Command-line / environment configuration.
#[derive(Debug, Parser)]
#[command(name = "onair", about = "Reports whether a live-streaming channel is on air", version)]
pub struct Config {
    /// Socket address to listen on.
    #[arg(long, env = "ONAIR_BIND", default_value = "0.0.0.0:3000")]
    pub bind: String,

    /// Public host channel pages live under; the channel identifier is
    /// appended to this per check.
    #[arg(long, env = "ONAIR_BASE_URL", default_value = "https://play.sooplive.co.kr")]
    pub base_url: String,

    /// Log file appended to alongside console output. Never rotated.
    #[arg(long, env = "ONAIR_LOG_FILE", default_value = "onair.log")]
    pub log_file: PathBuf,

    /// Log filter directive (tracing `EnvFilter` syntax).
    #[arg(long, env = "ONAIR_LOG", default_value = "info")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_service_contract() {
        let config = Config::parse_from(["onair"]);

        assert_eq!(config.bind, "0.0.0.0:3000");
        assert_eq!(config.base_url, "https://play.sooplive.co.kr");
        assert_eq!(config.log_file, PathBuf::from("onair.log"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn flags_override_defaults() {
        let config =
            Config::parse_from(["onair", "--bind", "127.0.0.1:8080", "--base-url", "https://x.test/"]);

        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.base_url, "https://x.test/");
    }
}
