//! Everything this service consumes.

use crate::example::ExampleRecorder;
use crate::handlers::{ExampleHandler, ExampleRecordHandler, RecorderProbe};
use messaging::nats::StreamSpec;
use messaging::{EventRegistry, SubscriptionDescriptor};
use std::sync::Arc;
use std::time::Duration;

pub const EXAMPLE_STREAM: &str = "example";
pub const EXAMPLE_SUBJECT: &str = "example";
pub const EXAMPLE_RECORD_SUBJECT: &str = "example.record";

/// How often the example store is pinged.
pub const RECORDER_PROBE_RATE: Duration = Duration::from_secs(30);

/// Streams provisioned at startup.
pub fn streams() -> Vec<StreamSpec> {
    vec![StreamSpec::new(
        EXAMPLE_STREAM,
        [EXAMPLE_SUBJECT, EXAMPLE_RECORD_SUBJECT],
    )]
}

/// Subscriptions and app events, all sharing one recorder.
pub fn registry(recorder: Arc<dyn ExampleRecorder>) -> EventRegistry {
    EventRegistry::new()
        .subscribe(
            SubscriptionDescriptor::new("Example", "example", EXAMPLE_SUBJECT),
            ExampleHandler::new(Arc::clone(&recorder)),
        )
        .subscribe(
            SubscriptionDescriptor::new("ExampleRecord", "example-record", EXAMPLE_RECORD_SUBJECT),
            ExampleRecordHandler::new(Arc::clone(&recorder)),
        )
        .schedule(
            "RecorderProbe",
            RECORDER_PROBE_RATE,
            RecorderProbe::new(recorder),
        )
}
