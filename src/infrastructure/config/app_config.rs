//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use crate::infrastructure::image::limits::{
    DEFAULT_ERROR_TTL, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_ENTRIES,
    DEFAULT_TTL,
};
use crate::infrastructure::image::{CacheLimits, DEFAULT_USER_AGENT};

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, loaded from `config.toml` and merged with CLI arguments.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path. Logs go to stderr when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Cache limits.
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP fetcher settings.
    #[serde(default)]
    pub http: HttpConfig,
}

/// `[cache]` section, in counts and seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum cached entries.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Lifetime of loaded images in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Lifetime of failed lookups in seconds.
    #[serde(default = "default_error_ttl_secs")]
    pub error_ttl_secs: u64,

    /// Maximum concurrent fetches.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

/// Longest `ttl_secs` / `error_ttl_secs` accepted from config (one year).
pub const MAX_TTL_SECS: u64 = 365 * 86_400;

impl CacheConfig {
    /// Pulls out-of-range values back into range and describes each change.
    pub fn clamp(&mut self) -> Vec<String> {
        let mut adjustments = Vec::new();
        for (name, secs) in [
            ("ttl_secs", &mut self.ttl_secs),
            ("error_ttl_secs", &mut self.error_ttl_secs),
            ("fetch_timeout_secs", &mut self.fetch_timeout_secs),
        ] {
            if *secs > MAX_TTL_SECS {
                adjustments.push(format!("cache.{name} = {secs} exceeds {MAX_TTL_SECS}, clamped"));
                *secs = MAX_TTL_SECS;
            }
        }
        if self.max_concurrent == 0 {
            adjustments.push("cache.max_concurrent = 0 raised to 1".to_string());
            self.max_concurrent = 1;
        }
        adjustments
    }

    /// Converts to cache limits.
    #[must_use]
    pub const fn limits(&self) -> CacheLimits {
        CacheLimits {
            max_entries: self.max_entries,
            ttl: Duration::from_secs(self.ttl_secs),
            error_ttl: Duration::from_secs(self.error_ttl_secs),
            max_concurrent: self.max_concurrent,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
            error_ttl_secs: default_error_ttl_secs(),
            max_concurrent: default_max_concurrent(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

/// `[http]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// API base URL relative image paths are resolved against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// `User-Agent` header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// API token. Prefer `PATCHBAY_API_TOKEN` over storing it here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user_agent: default_user_agent(),
            token: None,
        }
    }
}

const fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

const fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

const fn default_error_ttl_secs() -> u64 {
    DEFAULT_ERROR_TTL.as_secs()
}

const fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

const fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT.as_secs()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(base_url) = &args.base_url {
            self.http.base_url = Some(base_url.clone());
        }
        if let Some(max_entries) = args.max_entries {
            self.cache.max_entries = max_entries;
        }
        if let Some(max_concurrent) = args.max_concurrent {
            self.cache.max_concurrent = max_concurrent;
        }
        if let Some(timeout_secs) = args.timeout_secs {
            self.cache.fetch_timeout_secs = timeout_secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
            log_level = "debug"

            [cache]
            max_entries = 50
            ttl_secs = 600

            [http]
            base_url = "https://api.patchbay.example/v1"
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.cache.error_ttl_secs, 120);
        assert_eq!(
            config.http.base_url.as_deref(),
            Some("https://api.patchbay.example/v1")
        );
        assert_eq!(config.http.user_agent, DEFAULT_USER_AGENT);

        let limits = config.cache.limits();
        assert_eq!(limits.ttl, Duration::from_secs(600));
        assert_eq!(limits.max_concurrent, 5);
    }

    #[test]
    fn test_default_config_matches_cache_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.cache.limits(), CacheLimits::default());
        assert!(config.http.token.is_none());
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let mut config: AppConfig = toml::from_str("[cache]\nmax_concurrent = 2\n").unwrap();
        let args = CliArgs::parse_from([
            "patchbay-images",
            "--max-concurrent",
            "8",
            "--log-level",
            "trace",
            "--base-url",
            "http://localhost:8080",
        ]);

        config.merge_with_args(&args);

        assert_eq!(config.cache.max_concurrent, 8);
        assert_eq!(config.log_level, LogLevel::Trace);
        assert_eq!(config.http.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.cache.max_entries, 200);
    }

    #[test]
    fn test_clamp_reports_each_adjustment() {
        let mut cache = CacheConfig {
            ttl_secs: u64::MAX,
            error_ttl_secs: MAX_TTL_SECS + 1,
            max_concurrent: 0,
            ..CacheConfig::default()
        };

        let adjustments = cache.clamp();

        assert_eq!(adjustments.len(), 3);
        assert_eq!(cache.ttl_secs, MAX_TTL_SECS);
        assert_eq!(cache.error_ttl_secs, MAX_TTL_SECS);
        assert_eq!(cache.max_concurrent, 1);
        assert!(cache.clamp().is_empty());
        assert_eq!(CacheConfig::default().clamp(), Vec::<String>::new());
    }

    #[test]
    fn test_serialized_default_omits_secrets() {
        let content = toml::to_string_pretty(&AppConfig::default()).unwrap();
        assert!(content.contains("[cache]"));
        assert!(!content.contains("token"));
    }
}
