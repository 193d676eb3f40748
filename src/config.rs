use log::warn;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

// Defaults
const DEFAULT_DATABASE_DIR: &str = "database";
const DEFAULT_MAX_UPLOAD_MB: usize = 25;
const DEFAULT_SUMMARY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Settings for the external text-generation service.
#[derive(Clone, Debug, PartialEq)]
pub struct TextGenConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Runtime configuration of the server.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub summary_timeout: Duration,
    /// `None` when no API key is set; narrative summaries then fail cleanly.
    pub text_gen: Option<TextGenConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config::from_lookup(|_| None)
    }
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from any key lookup.
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = parse_or_default(get("EXCELVIZ_ADDR"), "EXCELVIZ_ADDR", default_addr());
        let database_dir = get("EXCELVIZ_DATABASE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_DIR));
        let max_upload_mb: usize = parse_or_default(
            get("EXCELVIZ_MAX_UPLOAD_MB"),
            "EXCELVIZ_MAX_UPLOAD_MB",
            DEFAULT_MAX_UPLOAD_MB,
        );
        let timeout_secs: u64 = parse_or_default(
            get("EXCELVIZ_SUMMARY_TIMEOUT_SECS"),
            "EXCELVIZ_SUMMARY_TIMEOUT_SECS",
            DEFAULT_SUMMARY_TIMEOUT_SECS,
        );
        let summary_timeout = Duration::from_secs(timeout_secs);

        let text_gen = get("OPENAI_API_KEY").map(|api_key| TextGenConfig {
            api_key,
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            timeout: summary_timeout,
        });

        Config {
            bind_addr,
            database_dir,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            summary_timeout,
            text_gen,
        }
    }
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn parse_or_default<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("ignoring invalid {}={:?}; using default", key, raw);
            default
        }),
        None => default,
    }
}
