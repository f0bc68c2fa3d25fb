//! Trading212 client error types.

use thiserror::Error;

/// Errors from the Trading212 client.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// API answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Caller supplied invalid order parameters. No request was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Response body was not the expected JSON.
    #[error("JSON parsing error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Transport failed before a response was received.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BrokerError {
    /// HTTP status carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the error was raised before any request left the client.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_display_includes_status_and_body() {
        let err = BrokerError::Http {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404: not found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn parse_error_converts_from_serde() {
        let err: BrokerError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, BrokerError::Parse(_)));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn validation_flag() {
        assert!(BrokerError::Validation("bad".to_string()).is_validation());
        assert!(!BrokerError::Transport("down".to_string()).is_validation());
    }
}
