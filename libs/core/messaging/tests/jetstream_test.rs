//! JetStream integration tests
//!
//! These tests run a consumer against a real NATS server started with
//! testcontainers. They need Docker and are ignored by default:
//!
//! ```text
//! cargo test -p messaging --features nats --test jetstream_test -- --ignored
//! ```

#![cfg(feature = "nats")]

use async_trait::async_trait;
use messaging::nats::{ensure_streams, JetStreamSubscriber, StreamSpec};
use messaging::{
    shutdown_channel, EventConsumer, EventRegistration, FetchState, Handler, HandlerContext,
    HandlerError, PipelineConfig, Subscriber, Subscription, SubscriptionDescriptor,
};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use test_utils::{TestDataBuilder, TestNats};
use tokio::sync::mpsc;

#[derive(Default)]
struct CollectingHandler {
    payloads: Mutex<Vec<Vec<u8>>>,
    traceparents: Mutex<Vec<String>>,
}

#[async_trait]
impl Handler for CollectingHandler {
    async fn handle(&self, ctx: &HandlerContext, payload: &[u8]) -> Result<(), HandlerError> {
        if let Some(traceparent) = ctx.header("traceparent") {
            self.traceparents.lock().unwrap().push(traceparent.to_string());
        }
        self.payloads.lock().unwrap().push(payload.to_vec());
        if payload == b"retry" {
            return Err(HandlerError::recoverable("store unavailable"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collecting_handler"
    }
}

async fn wait_for(handler: &CollectingHandler, count: usize) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while handler.payloads.lock().unwrap().len() < count {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("messages not handled in time");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_consume_and_ack_from_jetstream() {
    let nats = TestNats::new().await;
    let builder = TestDataBuilder::from_test_name("test_consume_and_ack_from_jetstream");
    let stream = builder.stream("example");
    let subject = builder.subject("example", "created");
    let durable = builder.durable("example");

    let jetstream = messaging::nats::connect(&nats.config()).await.unwrap();
    ensure_streams(&jetstream, &[StreamSpec::new(&stream, [subject.clone()])])
        .await
        .unwrap();
    // Idempotent
    ensure_streams(&jetstream, &[StreamSpec::new(&stream, [subject.clone()])])
        .await
        .unwrap();

    let mut headers = async_nats::HeaderMap::new();
    headers.insert("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01");
    nats.jetstream()
        .publish_with_headers(subject.clone(), headers, "first".into())
        .await
        .unwrap()
        .await
        .unwrap();
    nats.publish(&subject, b"second".to_vec()).await;

    let handler = Arc::new(CollectingHandler::default());
    let registration = EventRegistration {
        descriptor: SubscriptionDescriptor::new("Example", &durable, &subject),
        handler: handler.clone(),
    };
    let subscriber = JetStreamSubscriber::new(jetstream.clone());
    let (shutdown, token) = shutdown_channel();
    let (errors_tx, mut errors) = mpsc::channel(1);

    let consumer = EventConsumer::new(registration, PipelineConfig::default());
    let task = tokio::spawn(async move { consumer.run(&subscriber, token, errors_tx).await });

    wait_for(&handler, 2).await;
    shutdown.shutdown();
    assert_eq!(task.await.unwrap(), FetchState::Terminated);
    assert!(errors.try_recv().is_err());

    assert_eq!(
        handler.traceparents.lock().unwrap().as_slice(),
        ["00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01".to_string()]
    );

    // Both acked: a new subscription on the same durable sees nothing
    let subscription = JetStreamSubscriber::new(jetstream)
        .subscribe(&SubscriptionDescriptor::new("Example", &durable, &subject))
        .await
        .unwrap();
    let batch = subscription
        .pull_batch(10, Duration::from_millis(200))
        .await
        .unwrap();
    assert!(batch.is_empty());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_unknown_subject_fails_setup() {
    let nats = TestNats::new().await;
    let jetstream = messaging::nats::connect(&nats.config()).await.unwrap();

    let result = JetStreamSubscriber::new(jetstream)
        .subscribe(&SubscriptionDescriptor::new("Missing", "missing", "no.such.subject"))
        .await;

    assert!(result.is_err());
}
