//! Trading212 client configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::BrokerError;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Trading212 environment (demo vs live).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Demo account (practice money).
    #[default]
    Demo,
    /// Live account (real money).
    Live,
}

impl Environment {
    /// Get the base URL for the REST API.
    #[must_use]
    pub const fn base_url(&self) -> &'static str {
        match self {
            Self::Demo => "https://demo.trading212.com",
            Self::Live => "https://live.trading212.com",
        }
    }

    /// Check if this is live trading.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Live => "live",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "demo" | "paper" => Ok(Self::Demo),
            "live" => Ok(Self::Live),
            other => Err(BrokerError::Config(format!(
                "unknown environment '{other}', expected demo or live"
            ))),
        }
    }
}

/// Trading212 API key.
///
/// Sent verbatim in the `Authorization` header. Formatting only ever shows the
/// last four characters.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key for the authorization header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the key is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    fn masked(&self) -> String {
        let tail: String = {
            let chars: Vec<char> = self.0.chars().collect();
            let start = chars.len().saturating_sub(4);
            chars[start..].iter().collect()
        };
        format!("****{tail}")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&self.masked()).finish()
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Configuration for the Trading212 client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key.
    pub api_key: ApiKey,
    /// Trading environment.
    pub environment: Environment,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Replaces the environment's host, e.g. for a local mock server.
    pub base_url_override: Option<String>,
}

impl ClientConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(api_key: impl Into<String>, environment: Environment) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            environment,
            timeout: DEFAULT_TIMEOUT,
            base_url_override: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `T212_API_KEY` (required), `T212_ENV` (default `demo`) and
    /// `T212_TIMEOUT_SECS` (default 30).
    pub fn from_env() -> Result<Self, BrokerError> {
        let api_key = std::env::var("T212_API_KEY")
            .map_err(|_| BrokerError::Config("T212_API_KEY is not set".to_string()))?;

        let environment = match std::env::var("T212_ENV") {
            Ok(value) => value.parse()?,
            Err(_) => Environment::Demo,
        };

        let timeout = match std::env::var("T212_TIMEOUT_SECS") {
            Ok(value) => value.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                BrokerError::Config(format!("invalid T212_TIMEOUT_SECS '{value}': {e}"))
            })?,
            Err(_) => DEFAULT_TIMEOUT,
        };

        let config = Self::new(api_key, environment).with_timeout(timeout);
        config.validate()?;
        Ok(config)
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Point the client at a different host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// Base URL requests are built against, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.base_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// Reject configurations that can never authenticate.
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.api_key.is_empty() {
            return Err(BrokerError::Config("API key is empty".to_string()));
        }
        Ok(())
    }
}
