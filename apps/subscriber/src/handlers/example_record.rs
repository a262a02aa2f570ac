use crate::example::{ExampleData, ExampleRecorder};
use async_trait::async_trait;
use chrono::DateTime;
use messaging::{Handler, HandlerContext, HandlerError};
use prost::Message;
use std::sync::Arc;

/// Protobuf form of [`ExampleData`].
#[derive(Clone, PartialEq, Message)]
pub struct ExampleRecord {
    #[prost(bool, tag = "1")]
    pub is_fake: bool,
    /// Milliseconds since the Unix epoch
    #[prost(int64, optional, tag = "2")]
    pub date_unix_ms: Option<i64>,
}

impl TryFrom<ExampleRecord> for ExampleData {
    type Error = HandlerError;

    fn try_from(record: ExampleRecord) -> Result<Self, Self::Error> {
        let date = match record.date_unix_ms {
            Some(ms) => Some(DateTime::from_timestamp_millis(ms).ok_or_else(|| {
                HandlerError::non_recoverable(format!("date out of range: {}", ms))
            })?),
            None => None,
        };

        Ok(ExampleData {
            is_fake: record.is_fake,
            date,
        })
    }
}

/// Records protobuf example events.
pub struct ExampleRecordHandler {
    recorder: Arc<dyn ExampleRecorder>,
}

impl ExampleRecordHandler {
    pub fn new(recorder: Arc<dyn ExampleRecorder>) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl Handler for ExampleRecordHandler {
    async fn handle(&self, _ctx: &HandlerContext, payload: &[u8]) -> Result<(), HandlerError> {
        let record = ExampleRecord::decode(payload)?;
        let data = ExampleData::try_from(record)?;

        super::record(self.recorder.as_ref(), &data).await
    }

    fn name(&self) -> &'static str {
        "example_record_handler"
    }
}
