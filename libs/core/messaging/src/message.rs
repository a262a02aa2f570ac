//! Inbound messages and their single-use acknowledgment capability.

use crate::error::SubscriptionError;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::fmt;

/// Message metadata. Multi-valued headers are joined with `", "`.
pub type Headers = BTreeMap<String, String>;

/// Acknowledgment capability bound to one delivered message.
///
/// `ack` consumes the box, so a message can be acknowledged at most once.
/// Dropping an acker without calling `ack` leaves the message for redelivery.
pub trait Acker: Send + Sync {
    fn ack(self: Box<Self>) -> BoxFuture<'static, Result<(), SubscriptionError>>;
}

/// A message pulled from a subscription.
///
/// Not `Clone`: ownership moves from the fetch loop through the work queue to
/// exactly one worker.
pub struct InboundMessage {
    id: String,
    payload: Vec<u8>,
    headers: Headers,
    acker: Box<dyn Acker>,
}

impl InboundMessage {
    pub fn new(
        id: impl Into<String>,
        payload: Vec<u8>,
        headers: Headers,
        acker: Box<dyn Acker>,
    ) -> Self {
        Self {
            id: id.into(),
            payload,
            headers,
            acker,
        }
    }

    /// Backend identifier, used for logging only.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Split the message so the payload can be handled while the acker is held.
    pub fn into_parts(self) -> (String, Vec<u8>, Headers, Box<dyn Acker>) {
        (self.id, self.payload, self.headers, self.acker)
    }
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("id", &self.id)
            .field("payload_len", &self.payload.len())
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
