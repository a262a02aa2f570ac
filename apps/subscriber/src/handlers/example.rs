use crate::example::{ExampleData, ExampleRecorder};
use async_trait::async_trait;
use messaging::{Handler, HandlerContext, HandlerError};
use std::sync::Arc;
use tracing::debug;

/// Records JSON example events.
pub struct ExampleHandler {
    recorder: Arc<dyn ExampleRecorder>,
}

impl ExampleHandler {
    pub fn new(recorder: Arc<dyn ExampleRecorder>) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl Handler for ExampleHandler {
    async fn handle(&self, ctx: &HandlerContext, payload: &[u8]) -> Result<(), HandlerError> {
        let data: ExampleData = serde_json::from_slice(payload)?;
        debug!(event = %ctx.event(), is_fake = data.is_fake, "Decoded example data");

        super::record(self.recorder.as_ref(), &data).await
    }

    fn name(&self) -> &'static str {
        "example_handler"
    }
}
