//! Prometheus metrics for event consumers.

use metrics::{counter, describe_counter, describe_histogram, histogram, Counter, Histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const MESSAGES_RECEIVED: &str = "subscriber_messages_received_total";
pub const ERRORS_OCCURRED: &str = "subscriber_errors_occurred_total";
pub const TASK_DURATION: &str = "subscriber_task_duration_seconds";

const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder once and return its handle.
///
/// Later calls return the handle installed by the first one.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    PROMETHEUS.get_or_try_init(|| {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(TASK_DURATION.to_string()), DURATION_BUCKETS)?
            .install_recorder()?;

        describe_counter!(
            MESSAGES_RECEIVED,
            Unit::Count,
            "Messages taken off the work queue by a worker"
        );
        describe_counter!(
            ERRORS_OCCURRED,
            Unit::Count,
            "Handler failures that were not marked expected"
        );
        describe_histogram!(
            TASK_DURATION,
            Unit::Seconds,
            "Time spent inside the handler per message"
        );

        Ok(handle)
    })
}

/// In-process counters mirrored alongside the Prometheus series.
#[derive(Debug, Default)]
struct EventStats {
    received: AtomicU64,
    errors: AtomicU64,
    expected: AtomicU64,
    panicked: AtomicU64,
    acked: AtomicU64,
    not_acked: AtomicU64,
}

/// Point-in-time copy of one event's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventStatsSnapshot {
    pub event: String,
    pub received: u64,
    pub errors: u64,
    pub expected: u64,
    pub panicked: u64,
    pub acked: u64,
    pub not_acked: u64,
}

/// Metric handles for one event, labelled `event=<name>`.
///
/// Clones share the same counters.
#[derive(Clone)]
pub struct EventMetrics {
    event: Arc<str>,
    received: Counter,
    errors: Counter,
    duration: Histogram,
    stats: Arc<EventStats>,
}

impl EventMetrics {
    /// Create metrics for an event.
    pub fn new(event: &str) -> Self {
        let label = event.to_string();
        Self {
            event: Arc::from(event),
            received: counter!(MESSAGES_RECEIVED, "event" => label.clone()),
            errors: counter!(ERRORS_OCCURRED, "event" => label.clone()),
            duration: histogram!(TASK_DURATION, "event" => label),
            stats: Arc::new(EventStats::default()),
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Record a message received.
    pub fn message_received(&self) {
        self.received.increment(1);
        self.stats.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record handler duration.
    pub fn task_duration(&self, duration: Duration) {
        self.duration.record(duration.as_secs_f64());
    }

    /// Record a reported handler failure.
    pub fn error_occurred(&self) {
        self.errors.increment(1);
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failure marked expected. Not exported to Prometheus.
    pub fn expected_error(&self) {
        self.stats.expected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a handler panic. Also counted as an error.
    pub fn handler_panicked(&self) {
        self.stats.panicked.fetch_add(1, Ordering::Relaxed);
        self.error_occurred();
    }

    /// Record the acknowledgment outcome.
    pub fn acknowledged(&self, acked: bool) {
        if acked {
            self.stats.acked.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.not_acked.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> EventStatsSnapshot {
        EventStatsSnapshot {
            event: self.event.to_string(),
            received: self.stats.received.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
            expected: self.stats.expected.load(Ordering::Relaxed),
            panicked: self.stats.panicked.load(Ordering::Relaxed),
            acked: self.stats.acked.load(Ordering::Relaxed),
            not_acked: self.stats.not_acked.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for EventMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventMetrics")
            .field("event", &self.event)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = EventMetrics::new("example");
        let clone = metrics.clone();

        metrics.message_received();
        clone.message_received();
        clone.error_occurred();
        metrics.expected_error();
        metrics.acknowledged(true);
        clone.acknowledged(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.event, "example");
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.expected, 1);
        assert_eq!(snapshot.acked, 1);
        assert_eq!(snapshot.not_acked, 1);
    }

    #[test]
    fn test_panic_counts_as_error() {
        let metrics = EventMetrics::new("example");
        metrics.handler_panicked();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.panicked, 1);
        assert_eq!(snapshot.errors, 1);
    }

    #[test]
    fn test_init_metrics_is_idempotent() {
        let first = init_metrics().unwrap() as *const PrometheusHandle;
        let second = init_metrics().unwrap() as *const PrometheusHandle;
        assert_eq!(first, second);
    }
}
