//! NATS JetStream backend.
//!
//! - [`connect`] opens a client and a JetStream context
//! - [`ensure_streams`] provisions streams declared by the service
//! - [`JetStreamSubscriber`] opens one durable pull consumer per descriptor:
//!   the descriptor's `queue` is the durable name shared by replicas, its
//!   `subscription_name` the filter subject

mod client;
mod subscription;

pub use client::{connect, ensure_streams, StreamSpec};
pub use subscription::{JetStreamSubscriber, JetStreamSubscription};
