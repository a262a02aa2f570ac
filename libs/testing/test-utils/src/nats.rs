//! NATS test infrastructure
//!
//! Provides a `TestNats` helper that starts a NATS container with JetStream.

use async_nats::Client;
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use core_config::nats::NatsConfig;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::nats::Nats;

// Re-export for test convenience (used by consumers of this crate)
#[allow(unused_imports)]
pub use futures::StreamExt;

/// Test NATS wrapper that ensures proper cleanup
///
/// The container is stopped and removed when this struct is dropped.
///
/// # Example
///
/// ```no_run
/// use test_utils::TestNats;
///
/// # async fn example() {
/// let nats = TestNats::new().await;
///
/// // Config for code under test
/// let config = nats.config();
///
/// // Provision a stream and publish into it
/// nats.create_stream("ORDERS", "orders.>").await;
/// nats.publish("orders.created", b"{}".to_vec()).await;
/// # }
/// ```
pub struct TestNats {
    #[allow(dead_code)]
    container: ContainerAsync<Nats>,
    client: Client,
    pub connection_string: String,
}

impl TestNats {
    /// Start NATS (latest) with JetStream enabled (`-js`)
    pub async fn new() -> Self {
        let nats_image = Nats::default().with_tag("latest").with_cmd(["-js"]);

        let container = nats_image
            .start()
            .await
            .expect("Failed to start NATS container");

        let host_port = container
            .get_host_port_ipv4(4222)
            .await
            .expect("Failed to get NATS port");

        let connection_string = format!("nats://127.0.0.1:{}", host_port);

        let client = async_nats::connect(&connection_string)
            .await
            .expect("Failed to connect to NATS");

        tracing::info!(port = host_port, "Test NATS ready with JetStream");

        Self {
            container,
            client,
            connection_string,
        }
    }

    /// Get a cloned client
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Get a JetStream context for stream operations
    pub fn jetstream(&self) -> jetstream::Context {
        jetstream::new(self.client.clone())
    }

    /// Get the connection string for manual client creation
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Connection config pointing at this container
    pub fn config(&self) -> NatsConfig {
        NatsConfig::new(self.connection_string.clone())
    }

    /// Create a stream capturing `subject`
    pub async fn create_stream(&self, name: &str, subject: &str) {
        self.jetstream()
            .create_stream(StreamConfig {
                name: name.to_string(),
                subjects: vec![subject.to_string()],
                ..Default::default()
            })
            .await
            .expect("Failed to create stream");
    }

    /// Publish to JetStream and wait for the stream ack, returning the sequence
    pub async fn publish(&self, subject: &str, payload: impl Into<Vec<u8>>) -> u64 {
        let payload: Vec<u8> = payload.into();
        self.jetstream()
            .publish(subject.to_string(), payload.into())
            .await
            .expect("Failed to publish")
            .await
            .expect("Failed to get publish ack")
            .sequence
    }

    /// Number of messages currently stored in a stream
    pub async fn stream_messages(&self, name: &str) -> u64 {
        let mut stream = self
            .jetstream()
            .get_stream(name)
            .await
            .expect("Failed to get stream");

        let info = stream.info().await.expect("Failed to get stream info");
        info.state.messages
    }
}

// Container is automatically cleaned up when TestNats is dropped
impl Drop for TestNats {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test NATS container");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestDataBuilder;

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_publish_into_stream() {
        let nats = TestNats::new().await;
        let builder = TestDataBuilder::from_test_name("test_publish_into_stream");
        let stream = builder.stream("example");
        let subject = builder.subject("example", "created");

        nats.create_stream(&stream, &subject).await;
        let first = nats.publish(&subject, b"one".to_vec()).await;
        let second = nats.publish(&subject, b"two".to_vec()).await;

        assert!(second > first);
        assert_eq!(nats.stream_messages(&stream).await, 2);
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_config_connects() {
        let nats = TestNats::new().await;
        let config = nats.config();

        let client = async_nats::connect(&config.url)
            .await
            .expect("config should point at the container");
        client.flush().await.unwrap();
    }
}
