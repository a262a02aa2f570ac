use crate::error::PipelineError;
use async_nats::jetstream::{self, stream::Config as StreamConfig, Context};
use core_config::nats::NatsConfig;
use tracing::{debug, info};

/// A stream the service expects to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSpec {
    pub name: String,
    pub subjects: Vec<String>,
}

impl StreamSpec {
    pub fn new(name: impl Into<String>, subjects: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            subjects: subjects.into_iter().map(Into::into).collect(),
        }
    }
}

/// Connect to NATS and build a JetStream context.
pub async fn connect(config: &NatsConfig) -> Result<Context, PipelineError> {
    let client = async_nats::ConnectOptions::new()
        .name(&config.client_name)
        .connect(&config.url)
        .await
        .map_err(|e| {
            PipelineError::Broker(format!("failed to connect to NATS at {}: {}", config.url, e))
        })?;

    info!(url = %config.url, name = %config.client_name, "Connected to NATS");
    Ok(jetstream::new(client))
}

/// Create every stream that does not exist yet.
pub async fn ensure_streams(jetstream: &Context, streams: &[StreamSpec]) -> Result<(), PipelineError> {
    for spec in streams {
        match jetstream.get_stream(&spec.name).await {
            Ok(_) => {
                debug!(stream = %spec.name, "Stream already exists");
            }
            Err(_) => {
                info!(stream = %spec.name, subjects = ?spec.subjects, "Creating stream");

                jetstream
                    .create_stream(StreamConfig {
                        name: spec.name.clone(),
                        subjects: spec.subjects.clone(),
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| {
                        PipelineError::Broker(format!(
                            "failed to create stream '{}': {}",
                            spec.name, e
                        ))
                    })?;

                info!(stream = %spec.name, "Stream created");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_spec_new() {
        let spec = StreamSpec::new("example", ["example"]);
        assert_eq!(spec.name, "example");
        assert_eq!(spec.subjects, vec!["example".to_string()]);
    }
}
