//! In-memory subscription for tests and local runs.
//!
//! Behaves like a durable pull consumer with explicit acks: pulled messages
//! stay in flight until acknowledged, and [`MemorySubscription::redeliver_unacked`]
//! plays the role of the broker's ack-wait expiry.

use crate::error::SubscriptionError;
use crate::message::{Acker, Headers, InboundMessage};
use crate::registry::SubscriptionDescriptor;
use crate::subscription::{Subscriber, Subscription};
use async_trait::async_trait;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
struct StoredMessage {
    sequence: u64,
    payload: Vec<u8>,
    headers: Headers,
    deliveries: u32,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_sequence: u64,
    pending: VecDeque<StoredMessage>,
    in_flight: BTreeMap<u64, StoredMessage>,
    acked: Vec<u64>,
    delivered: u64,
    fetch_errors: usize,
}

#[derive(Debug, Default)]
struct MemoryInner {
    state: Mutex<MemoryState>,
    published: Notify,
}

impl MemoryInner {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// An in-memory subject with a single durable pull consumer.
///
/// Clones share the same messages.
#[derive(Debug, Clone, Default)]
pub struct MemorySubscription {
    inner: Arc<MemoryInner>,
}

impl MemorySubscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a payload, returning its sequence number.
    pub fn publish(&self, payload: impl Into<Vec<u8>>) -> u64 {
        self.publish_with_headers(payload, Headers::new())
    }

    pub fn publish_with_headers(&self, payload: impl Into<Vec<u8>>, headers: Headers) -> u64 {
        let sequence = {
            let mut state = self.inner.state();
            state.next_sequence += 1;
            let sequence = state.next_sequence;
            state.pending.push_back(StoredMessage {
                sequence,
                payload: payload.into(),
                headers,
                deliveries: 0,
            });
            sequence
        };
        self.inner.published.notify_waiters();
        sequence
    }

    /// Make the next `count` pulls fail.
    pub fn inject_fetch_errors(&self, count: usize) {
        self.inner.state().fetch_errors += count;
    }

    /// Put every un-acknowledged in-flight message back in front of the
    /// pending queue. Returns how many were requeued.
    pub fn redeliver_unacked(&self) -> usize {
        let count = {
            let mut state = self.inner.state();
            let in_flight = std::mem::take(&mut state.in_flight);
            let count = in_flight.len();
            for (_, message) in in_flight.into_iter().rev() {
                state.pending.push_front(message);
            }
            count
        };
        if count > 0 {
            self.inner.published.notify_waiters();
        }
        count
    }

    /// Sequence numbers acknowledged so far, in ack order.
    pub fn acked_sequences(&self) -> Vec<u64> {
        self.inner.state().acked.clone()
    }

    pub fn ack_count(&self) -> usize {
        self.inner.state().acked.len()
    }

    /// Total deliveries, counting redeliveries.
    pub fn delivered_count(&self) -> u64 {
        self.inner.state().delivered
    }

    /// Messages published but not yet pulled.
    pub fn pending_len(&self) -> usize {
        self.inner.state().pending.len()
    }

    /// Messages pulled but not yet acknowledged.
    pub fn unacked_len(&self) -> usize {
        self.inner.state().in_flight.len()
    }

    /// How many times a message has been delivered.
    pub fn deliveries(&self, sequence: u64) -> u32 {
        let state = self.inner.state();
        state
            .in_flight
            .get(&sequence)
            .or_else(|| state.pending.iter().find(|m| m.sequence == sequence))
            .map(|m| m.deliveries)
            .unwrap_or(0)
    }

    fn take_batch(&self, max: usize) -> Result<Option<Vec<InboundMessage>>, SubscriptionError> {
        let mut state = self.inner.state();
        if state.fetch_errors > 0 {
            state.fetch_errors -= 1;
            return Err(SubscriptionError::Fetch("injected fetch error".to_string()));
        }
        if state.pending.is_empty() {
            return Ok(None);
        }

        let take = max.min(state.pending.len());
        let mut batch = Vec::with_capacity(take);
        for _ in 0..take {
            let Some(mut stored) = state.pending.pop_front() else {
                break;
            };
            stored.deliveries += 1;
            state.delivered += 1;

            let acker = MemoryAcker {
                inner: Arc::downgrade(&self.inner),
                sequence: stored.sequence,
            };
            batch.push(InboundMessage::new(
                stored.sequence.to_string(),
                stored.payload.clone(),
                stored.headers.clone(),
                Box::new(acker),
            ));
            state.in_flight.insert(stored.sequence, stored);
        }
        Ok(Some(batch))
    }
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn pull_batch(
        &self,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<InboundMessage>, SubscriptionError> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            // Register before checking so a publish in between is not missed
            let notified = self.inner.published.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(batch) = self.take_batch(max)? {
                return Ok(batch);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }
}

struct MemoryAcker {
    inner: Weak<MemoryInner>,
    sequence: u64,
}

impl Acker for MemoryAcker {
    fn ack(self: Box<Self>) -> BoxFuture<'static, Result<(), SubscriptionError>> {
        let result = match self.inner.upgrade() {
            None => Err(SubscriptionError::Closed),
            Some(inner) => {
                let mut state = inner.state();
                match state.in_flight.remove(&self.sequence) {
                    Some(_) => {
                        state.acked.push(self.sequence);
                        Ok(())
                    }
                    None => Err(SubscriptionError::Ack(format!(
                        "message {} is not in flight",
                        self.sequence
                    ))),
                }
            }
        };
        future::ready(result).boxed()
    }
}

/// Hands out [`MemorySubscription`]s by subject.
///
/// Subscribing to an unknown subject fails with [`SubscriptionError::Setup`].
#[derive(Debug, Default)]
pub struct MemorySubscriber {
    subjects: HashMap<String, MemorySubscription>,
    subscribe_calls: AtomicUsize,
}

impl MemorySubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `subscription` for descriptors whose subscription name is `subject`.
    pub fn with_subscription(
        mut self,
        subject: impl Into<String>,
        subscription: MemorySubscription,
    ) -> Self {
        self.subjects.insert(subject.into(), subscription);
        self
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Subscriber for MemorySubscriber {
    async fn subscribe(
        &self,
        descriptor: &SubscriptionDescriptor,
    ) -> Result<Arc<dyn Subscription>, SubscriptionError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        match self.subjects.get(descriptor.subscription_name()) {
            Some(subscription) => Ok(Arc::new(subscription.clone())),
            None => Err(SubscriptionError::Setup(format!(
                "no stream for subject '{}'",
                descriptor.subscription_name()
            ))),
        }
    }
}
