//! Per-consumer context threaded through the fetch loop and workers.

use crate::metrics::EventMetrics;
use std::sync::Arc;

/// Everything a consumer's tasks need to label logs and record metrics.
#[derive(Clone, Debug)]
pub struct PipelineContext {
    event: Arc<str>,
    handler: &'static str,
    metrics: EventMetrics,
}

impl PipelineContext {
    pub fn new(event: &str, handler: &'static str, metrics: EventMetrics) -> Self {
        Self {
            event: Arc::from(event),
            handler,
            metrics,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Shared event name, cheap to hand to every [`HandlerContext`](crate::HandlerContext).
    pub fn event_arc(&self) -> Arc<str> {
        self.event.clone()
    }

    pub fn handler(&self) -> &'static str {
        self.handler
    }

    pub fn metrics(&self) -> &EventMetrics {
        &self.metrics
    }
}
