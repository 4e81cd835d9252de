use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Error taxonomy for provider adapters, the retry/circuit-breaker layer, and
/// the durable state manager. `kind()` is what `retry.rs` switches on;
/// `severity()` is purely for operator-facing log emphasis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigurationMissing,
    Auth,
    InvalidInput,
    Timeout,
    Transport,
    ParseError,
    EmptyResponse,
    PayloadTooLarge,
    CircuitOpen,
    Unknown,
}

impl ErrorKind {
    pub fn retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::Transport
                | ErrorKind::ParseError
                | ErrorKind::EmptyResponse
                | ErrorKind::Unknown
        )
    }
}

/// Log-emphasis bucket, analogous to the host's `NodeError::ErrorSeverity`
/// split, but purely informational: control flow is governed by
/// `ErrorKind::retryable`, never by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Terminal,
    Transient,
    Rejected,
}

impl ErrorKind {
    pub fn severity(self) -> ErrorSeverity {
        match self {
            ErrorKind::ConfigurationMissing => ErrorSeverity::Terminal,
            ErrorKind::Timeout
            | ErrorKind::Transport
            | ErrorKind::ParseError
            | ErrorKind::EmptyResponse
            | ErrorKind::Unknown => ErrorSeverity::Transient,
            ErrorKind::Auth
            | ErrorKind::InvalidInput
            | ErrorKind::PayloadTooLarge
            | ErrorKind::CircuitOpen => ErrorSeverity::Rejected,
        }
    }
}

/// Error surfaced by a provider adapter, the retry wrapper, or the durable
/// state manager, preserving the original cause for `Display`/`source()`.
#[derive(Debug)]
pub struct CollectorError {
    pub kind: ErrorKind,
    pub message: String,
    pub attempt: Option<u32>,
    pub cause: Option<Box<dyn Error + Send + Sync>>,
}

impl CollectorError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        CollectorError {
            kind,
            message: message.into(),
            attempt: None,
            cause: None,
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn retryable(&self) -> bool {
        self.kind.retryable()
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.kind.severity()
    }
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for CollectorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_ref().map(|c| c.as_ref() as &(dyn Error + 'static))
    }
}

impl From<serde_json::Error> for CollectorError {
    fn from(e: serde_json::Error) -> Self {
        CollectorError::new(ErrorKind::ParseError, e.to_string())
    }
}

/// Centralized transport-error classification shared by every adapter, so
/// `is_timeout`/`is_connect` checks live in one place instead of being
/// hand-rolled per adapter.
impl From<reqwest::Error> for CollectorError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            ErrorKind::Timeout
        } else if e.is_connect() {
            ErrorKind::Transport
        } else if e.is_decode() {
            ErrorKind::ParseError
        } else {
            ErrorKind::Transport
        };
        CollectorError::new(kind, e.to_string())
    }
}

/// Errors from the durable store collaborator. Kept distinct from
/// `CollectorError` because a store failure is never itself retried by the
/// provider-facing retry loop; callers decide case by case (see
/// `state_manager.rs`'s tolerant `raw_response_json` write).
#[derive(Debug)]
pub struct StoreError {
    pub message: String,
    pub too_large: bool,
    pub cause: Option<Box<dyn Error + Send + Sync>>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        StoreError {
            message: message.into(),
            too_large: false,
            cause: None,
        }
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        StoreError {
            message: message.into(),
            too_large: true,
            cause: None,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store error: {}", self.message)
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_ref().map(|c| c.as_ref() as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_retryable_kinds_stop_retry_loop() {
        for kind in [
            ErrorKind::ConfigurationMissing,
            ErrorKind::Auth,
            ErrorKind::InvalidInput,
            ErrorKind::PayloadTooLarge,
            ErrorKind::CircuitOpen,
        ] {
            assert!(!kind.retryable(), "{kind:?} should not be retryable");
        }
    }

    #[test]
    fn retryable_kinds_permit_retry_loop() {
        for kind in [
            ErrorKind::Timeout,
            ErrorKind::Transport,
            ErrorKind::ParseError,
            ErrorKind::EmptyResponse,
            ErrorKind::Unknown,
        ] {
            assert!(kind.retryable(), "{kind:?} should be retryable");
        }
    }

    #[test]
    fn configuration_missing_is_terminal() {
        assert_eq!(
            ErrorKind::ConfigurationMissing.severity(),
            ErrorSeverity::Terminal
        );
    }
}
