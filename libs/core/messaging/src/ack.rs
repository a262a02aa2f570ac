//! Acknowledgment policy.

use crate::error::{ErrorKind, HandlerError};
use crate::message::Acker;
use tracing::debug;

/// What to do with a message once its handler returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    /// Acknowledge; the broker will not redeliver
    Ack,
    /// Leave un-acknowledged; the broker redelivers after its ack wait
    NoAck,
}

/// Decide the acknowledgment for a handler outcome.
///
/// | Outcome | Decision |
/// |---|---|
/// | `Ok(())` | Ack |
/// | NonRecoverable (expected or not) | Ack |
/// | Expected | NoAck |
/// | Recoverable | NoAck |
pub fn decide(outcome: &Result<(), HandlerError>) -> AckDecision {
    match outcome {
        Ok(()) => AckDecision::Ack,
        Err(err) => match err.kind() {
            ErrorKind::NonRecoverable => AckDecision::Ack,
            ErrorKind::Expected | ErrorKind::Recoverable => AckDecision::NoAck,
        },
    }
}

/// Acknowledge a message, swallowing broker errors.
///
/// Returns whether the broker accepted the ack. A failed ack only means the
/// message may be redelivered, which handlers must tolerate anyway.
pub async fn acknowledge(acker: Box<dyn Acker>, message_id: &str) -> bool {
    match acker.ack().await {
        Ok(()) => true,
        Err(e) => {
            debug!(message_id = %message_id, error = %e, "Failed to ack message");
            false
        }
    }
}
