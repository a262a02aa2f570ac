//! Error types for message handling and consumption.

use std::fmt;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error kinds determine acknowledgment behavior.
///
/// # Priority
///
/// Classification is checked in this order and the first match wins:
///
/// 1. **NonRecoverable**: the message can never succeed, acknowledge it so it
///    is not redelivered
/// 2. **Expected**: a known business outcome, not logged as an error and left
///    for redelivery
/// 3. **Recoverable**: transient failure, left for redelivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed payload, unknown schema version, invariant violation
    NonRecoverable,

    /// Record already exists, message is stale
    Expected,

    /// Store unavailable, timeout, connection reset
    Recoverable,
}

impl ErrorKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NonRecoverable => "non_recoverable",
            ErrorKind::Expected => "expected",
            ErrorKind::Recoverable => "recoverable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a [`Handler`](crate::Handler).
///
/// The variant is the classification. A non-recoverable error can additionally
/// be marked expected with [`HandlerError::mark_expected`], which silences the
/// error log without changing the acknowledgment.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The message can never be processed successfully
    #[error("non-recoverable error: {message}")]
    NonRecoverable {
        message: String,
        expected: bool,
        #[source]
        source: Option<BoxError>,
    },

    /// Known, non-exceptional outcome
    #[error("expected error: {message}")]
    Expected {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Temporary failure, the message should be redelivered
    #[error("recoverable error: {message}")]
    Recoverable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl HandlerError {
    /// Create a non-recoverable error.
    pub fn non_recoverable(message: impl Into<String>) -> Self {
        Self::NonRecoverable {
            message: message.into(),
            expected: false,
            source: None,
        }
    }

    /// Create a non-recoverable error with a source.
    pub fn non_recoverable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::NonRecoverable {
            message: message.into(),
            expected: false,
            source: Some(Box::new(source)),
        }
    }

    /// Create an expected error.
    pub fn expected(message: impl Into<String>) -> Self {
        Self::Expected {
            message: message.into(),
            source: None,
        }
    }

    /// Create an expected error with a source.
    pub fn expected_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Expected {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a recoverable error.
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self::Recoverable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a recoverable error with a source.
    pub fn recoverable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Recoverable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Flag a non-recoverable error as also expected.
    ///
    /// Other kinds are returned unchanged.
    pub fn mark_expected(self) -> Self {
        match self {
            Self::NonRecoverable {
                message, source, ..
            } => Self::NonRecoverable {
                message,
                expected: true,
                source,
            },
            other => other,
        }
    }

    /// Get the error kind. NonRecoverable wins over the expected marking.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::NonRecoverable { .. } => ErrorKind::NonRecoverable,
            HandlerError::Expected { .. } => ErrorKind::Expected,
            HandlerError::Recoverable { .. } => ErrorKind::Recoverable,
        }
    }

    /// Whether this error is a known outcome that should not be reported.
    pub fn is_expected(&self) -> bool {
        match self {
            HandlerError::NonRecoverable { expected, .. } => *expected,
            HandlerError::Expected { .. } => true,
            HandlerError::Recoverable { .. } => false,
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::non_recoverable_with_source("failed to decode JSON payload", err)
    }
}

impl From<prost::DecodeError> for HandlerError {
    fn from(err: prost::DecodeError) -> Self {
        Self::non_recoverable_with_source("failed to decode protobuf payload", err)
    }
}

/// Errors raised by a subscription backend.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Creating the subscription or its durable consumer failed
    #[error("subscription setup failed: {0}")]
    Setup(String),

    /// A pull request failed; the fetch loop retries
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The broker rejected an acknowledgment
    #[error("ack failed: {0}")]
    Ack(String),

    /// The subscription is gone
    #[error("subscription closed")]
    Closed,
}

/// Fatal errors reported on the process error channel.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A consumer could not subscribe and never started fetching
    #[error("failed to subscribe '{subscription}': {source}")]
    Subscribe {
        subscription: String,
        #[source]
        source: SubscriptionError,
    },

    /// Connecting to the broker or provisioning streams failed
    #[error("broker error: {0}")]
    Broker(String),

    /// Invalid pipeline configuration
    #[error("configuration error: {0}")]
    Config(#[from] core_config::ConfigError),
}
