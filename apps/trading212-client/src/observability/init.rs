//! Process-wide logging setup.
//!
//! Call [`init_logging`] once from the entry point. Later calls are no-ops.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: full filter directive, takes precedence over `LOG_LEVEL`
//! - `LOG_LEVEL`: base level (default: info)
//! - `CONTAINER_ENV`: `true` quiets HTTP/TLS library targets to warn
//! - `LOG_FILE_PATH`: also append log lines to this file

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use super::format::key_value_layer;

/// Third-party targets that are chatty at info/debug.
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

/// Default filter when nothing is configured.
const DEFAULT_LEVEL: &str = "info";

static INITIALIZED: Mutex<bool> = Mutex::new(false);

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Filter directive could not be parsed.
    #[error("invalid log filter '{directive}': {message}")]
    Filter {
        /// Offending directive.
        directive: String,
        /// Parser message.
        message: String,
    },
    /// Log file could not be opened.
    #[error("failed to open log file {path}: {source}")]
    File {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A global subscriber was already installed by someone else.
    #[error("failed to initialize tracing subscriber: {0}")]
    Subscriber(String),
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `trading212_client=debug,info`.
    pub level: String,
    /// Containerized setup: noisy library targets capped at warn.
    pub containerized: bool,
    /// Optional file receiving the same lines as stdout.
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            containerized: false,
            file_path: None,
        }
    }
}

impl LoggingConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let level = std::env::var("RUST_LOG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| std::env::var("LOG_LEVEL").ok())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());

        let containerized = std::env::var("CONTAINER_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let file_path = std::env::var("LOG_FILE_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            level,
            containerized,
            file_path,
        }
    }

    /// Set the filter directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Enable the containerized setup.
    #[must_use]
    pub const fn containerized(mut self, containerized: bool) -> Self {
        self.containerized = containerized;
        self
    }

    /// Also write to `path`.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }
}

/// Build the filter for `config`.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    let parse_error = |directive: &str, e: &dyn std::fmt::Display| LoggingError::Filter {
        directive: directive.to_string(),
        message: e.to_string(),
    };

    let mut filter =
        EnvFilter::try_new(&config.level).map_err(|e| parse_error(&config.level, &e))?;

    if config.containerized {
        for target in NOISY_TARGETS {
            let directive = format!("{target}=warn");
            filter = filter.add_directive(
                directive
                    .parse::<Directive>()
                    .map_err(|e| parse_error(&directive, &e))?,
            );
        }
    }

    Ok(filter)
}

/// Install the global subscriber. Idempotent: once a call succeeds, further
/// calls return `Ok(())` without touching the installed subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let mut initialized = INITIALIZED.lock().unwrap_or_else(PoisonError::into_inner);
    if *initialized {
        return Ok(());
    }

    let filter = build_filter(config)?;

    let file_layer = match &config.file_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::File {
                    path: path.display().to_string(),
                    source,
                })?;
            Some(key_value_layer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(key_value_layer(std::io::stdout))
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Subscriber(e.to_string()))?;

    *initialized = true;

    tracing::debug!(
        level = %config.level,
        containerized = config.containerized,
        "Logging initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.containerized);
        assert!(config.file_path.is_none());
    }

    #[test]
    fn builder_methods() {
        let config = LoggingConfig::default()
            .with_level("debug")
            .containerized(true)
            .with_file("/tmp/t212.log");
        assert_eq!(config.level, "debug");
        assert!(config.containerized);
        assert_eq!(config.file_path, Some(PathBuf::from("/tmp/t212.log")));
    }

    #[test]
    fn plain_filter_keeps_level() {
        let filter = build_filter(&LoggingConfig::default().with_level("debug")).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("debug"));
        assert!(!rendered.contains("hyper=warn"));
    }

    #[test]
    fn containerized_filter_quiets_libraries() {
        let filter = build_filter(&LoggingConfig::default().containerized(true)).unwrap();
        let rendered = filter.to_string();
        for target in NOISY_TARGETS {
            assert!(rendered.contains(&format!("{target}=warn")), "{rendered}");
        }
    }

    #[test]
    fn invalid_filter_is_reported() {
        let config = LoggingConfig::default().with_level("trading212_client=verbose");
        let err = build_filter(&config).unwrap_err();
        assert!(matches!(err, LoggingError::Filter { .. }));
    }
}
