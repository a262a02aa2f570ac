//! Handler trait for message processing.

use crate::error::HandlerError;
use crate::message::Headers;
use crate::shutdown::ShutdownToken;
use async_trait::async_trait;
use std::sync::Arc;

/// Per-message context passed to a [`Handler`].
#[derive(Clone, Debug)]
pub struct HandlerContext {
    event: Arc<str>,
    headers: Headers,
    shutdown: ShutdownToken,
}

impl HandlerContext {
    pub fn new(event: Arc<str>, headers: Headers, shutdown: ShutdownToken) -> Self {
        Self {
            event,
            headers,
            shutdown,
        }
    }

    /// Name of the event being handled.
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Whether the service is shutting down.
    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_shutdown()
    }

    /// Resolves once the service starts shutting down.
    pub async fn cancelled(&self) {
        let mut token = self.shutdown.clone();
        token.wait().await;
    }
}

/// Message handler trait.
///
/// Implement this trait to define how one event's payloads are processed.
/// Decoding the payload is the handler's job. Messages are delivered at least
/// once, so side effects must be idempotent.
///
/// # Error Handling
///
/// Return a `HandlerError` with the appropriate kind:
/// - `NonRecoverable`: acknowledged and never redelivered
/// - `Expected`: not reported, left for redelivery
/// - `Recoverable`: reported and left for redelivery
///
/// # Example
///
/// ```rust,ignore
/// use messaging::{Handler, HandlerContext, HandlerError};
/// use async_trait::async_trait;
///
/// struct OrderHandler {
///     orders: Arc<dyn OrderStore>,
/// }
///
/// #[async_trait]
/// impl Handler for OrderHandler {
///     async fn handle(&self, _ctx: &HandlerContext, payload: &[u8]) -> Result<(), HandlerError> {
///         let order: Order = serde_json::from_slice(payload)?;
///
///         self.orders.insert(&order).await.map_err(|e| {
///             if e.is_duplicate() {
///                 HandlerError::expected(e.to_string())
///             } else {
///                 HandlerError::recoverable_with_source("order store unavailable", e)
///             }
///         })
///     }
///
///     fn name(&self) -> &'static str {
///         "order_handler"
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle one payload.
    ///
    /// App events call this with an empty payload.
    async fn handle(&self, ctx: &HandlerContext, payload: &[u8]) -> Result<(), HandlerError>;

    /// Get the handler name.
    ///
    /// Used for logging and span fields.
    fn name(&self) -> &'static str;
}

/// A no-op handler for testing.
#[derive(Debug, Clone, Default)]
pub struct NoOpHandler;

#[async_trait]
impl Handler for NoOpHandler {
    async fn handle(&self, _ctx: &HandlerContext, _payload: &[u8]) -> Result<(), HandlerError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop_handler"
    }
}

#[derive(Debug, Clone, Copy)]
enum FailureMode {
    NonRecoverable,
    Expected,
    Recoverable,
}

/// A handler that always fails (for testing).
#[derive(Debug, Clone)]
pub struct FailingHandler {
    error_message: String,
    mode: FailureMode,
}

impl FailingHandler {
    /// Create a handler that fails with non-recoverable errors.
    pub fn non_recoverable(message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            mode: FailureMode::NonRecoverable,
        }
    }

    /// Create a handler that fails with expected errors.
    pub fn expected(message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            mode: FailureMode::Expected,
        }
    }

    /// Create a handler that fails with recoverable errors.
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            mode: FailureMode::Recoverable,
        }
    }
}

#[async_trait]
impl Handler for FailingHandler {
    async fn handle(&self, _ctx: &HandlerContext, _payload: &[u8]) -> Result<(), HandlerError> {
        Err(match self.mode {
            FailureMode::NonRecoverable => HandlerError::non_recoverable(&self.error_message),
            FailureMode::Expected => HandlerError::expected(&self.error_message),
            FailureMode::Recoverable => HandlerError::recoverable(&self.error_message),
        })
    }

    fn name(&self) -> &'static str {
        "failing_handler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::shutdown::shutdown_channel;

    fn context() -> HandlerContext {
        let (_sender, token) = shutdown_channel();
        let mut headers = Headers::new();
        headers.insert("traceparent".to_string(), "00-1-2-01".to_string());
        // The sender is dropped here, so the context reads as cancelled.
        HandlerContext::new(Arc::from("example"), headers, token)
    }

    #[tokio::test]
    async fn test_noop_handler() {
        let handler = NoOpHandler;
        let result = handler.handle(&context(), b"payload").await;
        assert!(result.is_ok());
        assert_eq!(handler.name(), "noop_handler");
    }

    #[tokio::test]
    async fn test_failing_handler_kinds() {
        let ctx = context();

        let err = FailingHandler::non_recoverable("bad")
            .handle(&ctx, b"")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonRecoverable);

        let err = FailingHandler::expected("dup")
            .handle(&ctx, b"")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Expected);

        let err = FailingHandler::recoverable("down")
            .handle(&ctx, b"")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Recoverable);
    }

    #[tokio::test]
    async fn test_context_accessors() {
        let ctx = context();
        assert_eq!(ctx.event(), "example");
        assert_eq!(ctx.header("traceparent"), Some("00-1-2-01"));
        assert_eq!(ctx.header("missing"), None);
        assert!(ctx.is_cancelled());
        ctx.cancelled().await;
    }
}
