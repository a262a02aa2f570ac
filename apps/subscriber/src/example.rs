//! Example domain: the data carried by example events and where it is recorded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use messaging::HandlerError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

/// Example payload, `{"isFake": bool, "date": RFC 3339}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleData {
    pub is_fake: bool,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// Recorder failures.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("example data already recorded")]
    AlreadyExists,

    #[error("example store unavailable: {0}")]
    Unavailable(String),
}

impl From<RecordError> for HandlerError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::AlreadyExists => {
                HandlerError::expected_with_source("duplicate example data", err)
            }
            RecordError::Unavailable(_) => {
                HandlerError::recoverable_with_source("failed to record example data", err)
            }
        }
    }
}

/// Where example data ends up.
#[async_trait]
pub trait ExampleRecorder: Send + Sync {
    async fn record(&self, data: &ExampleData) -> Result<(), RecordError>;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<(), RecordError> {
        Ok(())
    }
}

/// In-process recorder rejecting duplicates.
pub struct MemoryRecorder {
    seen: Mutex<HashSet<ExampleData>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|seen| seen.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashSet<ExampleData>>, RecordError> {
        self.seen
            .lock()
            .map_err(|_| RecordError::Unavailable("recorder lock poisoned".to_string()))
    }
}

impl Default for MemoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExampleRecorder for MemoryRecorder {
    async fn record(&self, data: &ExampleData) -> Result<(), RecordError> {
        if self.lock()?.insert(data.clone()) {
            info!(is_fake = data.is_fake, date = ?data.date, "Recorded example data");
            Ok(())
        } else {
            Err(RecordError::AlreadyExists)
        }
    }

    async fn ping(&self) -> Result<(), RecordError> {
        self.lock().map(|_| ())
    }
}
