//! Runtime configuration.
//!
//! Values come from environment variables (a `.env` file is loaded first if
//! present), and command-line flags override them. The upstream endpoint is a
//! constant, not configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::proxy::DEFAULT_CACHE_TTL;
use crate::upstream::{DEFAULT_TIMEOUT, UpstreamOptions};

/// Errors raised while assembling a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Command-line flags.
#[derive(Parser, Debug, Default)]
#[command(name = "dexproxy")]
#[command(about = "Caching proxy for the DexScreener search API")]
#[command(version)]
pub struct Cli {
    /// Interface to bind (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// TCP port to listen on (overrides PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Serve this HTML file at `/` instead of the built-in page
    #[arg(long, value_name = "FILE")]
    pub index: Option<PathBuf>,

    /// Upstream request timeout in seconds (overrides UPSTREAM_TIMEOUT_SECS)
    #[arg(long, value_name = "SECS")]
    pub upstream_timeout: Option<u64>,

    /// Verify the upstream TLS certificate (verification is off by default)
    #[arg(long)]
    pub verify_tls: bool,
}

/// Fully resolved settings for one process.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// How long a successful upstream payload stays cached.
    pub cache_ttl: Duration,
    /// Period of the background sweep of expired entries; zero disables it.
    pub cache_check_period: Duration,
    pub upstream_timeout: Duration,
    /// Accept invalid upstream TLS certificates. On by default.
    pub insecure_skip_verify: bool,
    /// Landing page on disk; `None` serves the embedded page.
    pub index_path: Option<PathBuf>,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3000,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_check_period: Duration::from_secs(600),
            upstream_timeout: DEFAULT_TIMEOUT,
            insecure_skip_verify: true,
            index_path: None,
            log_level: "info".to_owned(),
        }
    }
}

impl Config {
    /// Loads `.env` (if any) and reads the process environment.
    ///
    /// Recognised variables: `HOST`, `PORT`, `DEX_CACHE_TTL_SECS`,
    /// `DEX_CACHE_CHECK_PERIOD_SECS`, `UPSTREAM_TIMEOUT_SECS`,
    /// `UPSTREAM_INSECURE_SKIP_VERIFY`, `INDEX_HTML_PATH`, `LOG_LEVEL`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] when a variable is set but malformed.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] when a variable is set but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let defaults = Self::default();

        let cache_ttl_secs =
            parse_var(&lookup, "DEX_CACHE_TTL_SECS", defaults.cache_ttl.as_secs())?;
        if cache_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                var: "DEX_CACHE_TTL_SECS".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            host: lookup("HOST")
                .filter(|h| !h.trim().is_empty())
                .unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT", defaults.port)?,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            cache_check_period: Duration::from_secs(parse_var(
                &lookup,
                "DEX_CACHE_CHECK_PERIOD_SECS",
                defaults.cache_check_period.as_secs(),
            )?),
            upstream_timeout: Duration::from_secs(parse_var(
                &lookup,
                "UPSTREAM_TIMEOUT_SECS",
                defaults.upstream_timeout.as_secs(),
            )?),
            insecure_skip_verify: parse_bool(
                &lookup,
                "UPSTREAM_INSECURE_SKIP_VERIFY",
                defaults.insecure_skip_verify,
            )?,
            index_path: lookup("INDEX_HTML_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }

    /// Applies command-line overrides.
    #[must_use]
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(host) = &cli.host {
            self.host.clone_from(host);
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(index) = &cli.index {
            self.index_path = Some(index.clone());
        }
        if let Some(secs) = cli.upstream_timeout {
            self.upstream_timeout = Duration::from_secs(secs);
        }
        if cli.verify_tls {
            self.insecure_skip_verify = false;
        }
        self
    }

    /// `host:port` for [`Server::bind`](crate::Server::bind).
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn upstream_options(&self) -> UpstreamOptions {
        UpstreamOptions {
            timeout: self.upstream_timeout,
            insecure_skip_verify: self.insecure_skip_verify,
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: T,
) -> ConfigResult<T> {
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_owned(),
            reason: format!("expected a non-negative integer, got: {raw}"),
        }),
        None => Ok(default),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: bool,
) -> ConfigResult<bool> {
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var: var.to_owned(),
            reason: format!("expected true or false, got: {raw}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> ConfigResult<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert_eq!(config.cache_check_period, Duration::from_secs(600));
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
        assert!(config.insecure_skip_verify);
        assert!(config.index_path.is_none());
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn reads_every_variable() {
        let config = from_pairs(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("DEX_CACHE_TTL_SECS", "5"),
            ("DEX_CACHE_CHECK_PERIOD_SECS", "0"),
            ("UPSTREAM_TIMEOUT_SECS", "3"),
            ("UPSTREAM_INSECURE_SKIP_VERIFY", "false"),
            ("INDEX_HTML_PATH", "public/index.html"),
            ("LOG_LEVEL", "debug"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.cache_ttl, Duration::from_secs(5));
        assert_eq!(config.cache_check_period, Duration::ZERO);
        assert_eq!(config.upstream_timeout, Duration::from_secs(3));
        assert!(!config.insecure_skip_verify);
        assert_eq!(config.index_path, Some(PathBuf::from("public/index.html")));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn invalid_port_names_the_variable() {
        match from_pairs(&[("PORT", "http")]) {
            Err(ConfigError::InvalidValue { var, .. }) => assert_eq!(var, "PORT"),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
        assert!(from_pairs(&[("PORT", "70000")]).is_err());
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let err = from_pairs(&[("DEX_CACHE_TTL_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("DEX_CACHE_TTL_SECS"));
    }

    #[tokio::test]
    async fn max_durations_build_a_working_app() {
        let config = from_pairs(&[
            ("DEX_CACHE_TTL_SECS", "18446744073709551615"),
            ("DEX_CACHE_CHECK_PERIOD_SECS", "18446744073709551615"),
        ])
        .unwrap();
        assert_eq!(config.cache_ttl, Duration::from_secs(u64::MAX));

        let app = crate::app::App::from_config(&config).unwrap();
        let sweeper = app.spawn_cache_sweeper(&config).unwrap();
        assert!(sweeper.await.is_ok());

        app.proxy.cache().insert("dex:200", std::sync::Arc::new(serde_json::json!({})));
        assert!(app.proxy.cache().contains_key("dex:200"));
    }

    #[test]
    fn bool_spellings() {
        for raw in ["1", "TRUE", "yes", " on "] {
            let config = from_pairs(&[("UPSTREAM_INSECURE_SKIP_VERIFY", raw)]).unwrap();
            assert!(config.insecure_skip_verify, "{raw}");
        }
        assert!(from_pairs(&[("UPSTREAM_INSECURE_SKIP_VERIFY", "maybe")]).is_err());
    }

    #[test]
    fn cli_overrides_environment() {
        let cli = Cli::parse_from([
            "dexproxy",
            "--port",
            "4000",
            "--host",
            "localhost",
            "--index",
            "site/index.html",
            "--upstream-timeout",
            "2",
            "--verify-tls",
        ]);
        let config = from_pairs(&[("PORT", "8080")]).unwrap().with_cli(&cli);

        assert_eq!(config.bind_addr(), "localhost:4000");
        assert_eq!(config.index_path, Some(PathBuf::from("site/index.html")));
        assert_eq!(config.upstream_timeout, Duration::from_secs(2));
        assert!(!config.insecure_skip_verify);

        let options = config.upstream_options();
        assert_eq!(options.timeout, Duration::from_secs(2));
        assert!(!options.insecure_skip_verify);
    }

    #[test]
    fn empty_cli_changes_nothing() {
        let base = from_pairs(&[("PORT", "8080")]).unwrap();
        let config = base.clone().with_cli(&Cli::default());
        assert_eq!(config.port, 8080);
        assert!(config.insecure_skip_verify);
    }
}
