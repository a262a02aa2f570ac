//! Subscription capability implemented by broker backends.

use crate::error::SubscriptionError;
use crate::message::InboundMessage;
use crate::registry::SubscriptionDescriptor;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// An open subscription that can be polled for batches.
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Pull up to `max` messages, waiting at most `wait` for the first one.
    ///
    /// An empty batch is a normal result.
    async fn pull_batch(
        &self,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<InboundMessage>, SubscriptionError>;
}

/// Opens subscriptions for descriptors.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn subscribe(
        &self,
        descriptor: &SubscriptionDescriptor,
    ) -> Result<Arc<dyn Subscription>, SubscriptionError>;
}
