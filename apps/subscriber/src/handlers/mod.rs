//! Event handlers
//!
//! Each handler decodes its own payload and classifies failures:
//! decode errors are non-recoverable, duplicate records are expected,
//! store outages are recoverable.

use crate::example::{ExampleData, ExampleRecorder, RecordError};
use messaging::HandlerError;
use std::time::Duration;

mod example;
mod example_record;
mod recorder_probe;

pub use example::ExampleHandler;
pub use example_record::{ExampleRecord, ExampleRecordHandler};
pub use recorder_probe::RecorderProbe;

/// Upper bound on a single store write.
pub const RECORD_TIMEOUT: Duration = Duration::from_secs(10);

async fn record(recorder: &dyn ExampleRecorder, data: &ExampleData) -> Result<(), HandlerError> {
    tokio::time::timeout(RECORD_TIMEOUT, recorder.record(data))
        .await
        .map_err(|_| RecordError::Unavailable("timed out recording example data".to_string()))??;
    Ok(())
}
