//! Event registry: binds subscriptions and scheduled events to handlers.

use crate::app_event::AppEvent;
use crate::handler::Handler;
use std::sync::Arc;
use std::time::Duration;

/// Identifies one logical consumption stream.
///
/// Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionDescriptor {
    name: String,
    queue: String,
    subscription_name: String,
}

impl SubscriptionDescriptor {
    /// # Arguments
    ///
    /// * `name` - Event name used in logs and metric labels
    /// * `queue` - Queue group shared by every replica (durable consumer name)
    /// * `subscription_name` - Subject the subscription filters on
    pub fn new(
        name: impl Into<String>,
        queue: impl Into<String>,
        subscription_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            queue: queue.into(),
            subscription_name: subscription_name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn subscription_name(&self) -> &str {
        &self.subscription_name
    }
}

/// A subscription bound to its handler.
#[derive(Clone)]
pub struct EventRegistration {
    pub descriptor: SubscriptionDescriptor,
    pub handler: Arc<dyn Handler>,
}

/// Static list of everything the service consumes.
#[derive(Clone, Default)]
pub struct EventRegistry {
    events: Vec<EventRegistration>,
    app_events: Vec<AppEvent>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a subscription.
    pub fn subscribe(
        mut self,
        descriptor: SubscriptionDescriptor,
        handler: impl Handler + 'static,
    ) -> Self {
        self.events.push(EventRegistration {
            descriptor,
            handler: Arc::new(handler),
        });
        self
    }

    /// Register a handler invoked every `rate`.
    pub fn schedule(
        mut self,
        name: impl Into<String>,
        rate: Duration,
        handler: impl Handler + 'static,
    ) -> Self {
        self.app_events
            .push(AppEvent::new(name, rate, Arc::new(handler)));
        self
    }

    pub fn events(&self) -> &[EventRegistration] {
        &self.events
    }

    pub fn app_events(&self) -> &[AppEvent] {
        &self.app_events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.app_events.is_empty()
    }
}
