use crate::example::ExampleRecorder;
use async_trait::async_trait;
use messaging::{Handler, HandlerContext, HandlerError};
use std::sync::Arc;

/// App event handler checking the example store is reachable.
pub struct RecorderProbe {
    recorder: Arc<dyn ExampleRecorder>,
}

impl RecorderProbe {
    pub fn new(recorder: Arc<dyn ExampleRecorder>) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl Handler for RecorderProbe {
    async fn handle(&self, _ctx: &HandlerContext, _payload: &[u8]) -> Result<(), HandlerError> {
        self.recorder.ping().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recorder_probe"
    }
}
