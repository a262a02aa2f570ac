//! Pipeline scenario tests
//!
//! These tests run full consumers (subscribe, fetch loop, worker pool, ack)
//! against the in-memory subscription:
//! - Acknowledgment per handler outcome
//! - Backpressure through the bounded work queue
//! - Exactly one worker per message
//! - Shutdown draining and setup failures

use async_trait::async_trait;
use messaging::memory::{MemorySubscriber, MemorySubscription};
use messaging::{
    shutdown_channel, EventConsumer, EventRegistration, FailingHandler, FetchState, Handler,
    HandlerContext, HandlerError, PipelineConfig, PipelineError, ShutdownSender, SubscriptionDescriptor,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExampleData {
    #[allow(dead_code)]
    is_fake: bool,
}

/// Decodes `{"isFake": bool}` and counts successes.
#[derive(Default)]
struct DecodingHandler {
    handled: AtomicUsize,
}

#[async_trait]
impl Handler for DecodingHandler {
    async fn handle(&self, _ctx: &HandlerContext, payload: &[u8]) -> Result<(), HandlerError> {
        let _data: ExampleData = serde_json::from_slice(payload)?;
        self.handled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "decoding_handler"
    }
}

/// Records which payloads it saw, failing the ones listed as recoverable.
#[derive(Default)]
struct RecordingHandler {
    seen: Mutex<Vec<Vec<u8>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    recoverable: HashSet<Vec<u8>>,
}

#[async_trait]
impl Handler for RecordingHandler {
    async fn handle(&self, _ctx: &HandlerContext, payload: &[u8]) -> Result<(), HandlerError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.seen.lock().unwrap().push(payload.to_vec());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.recoverable.contains(payload) {
            Err(HandlerError::recoverable("store unavailable"))
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &'static str {
        "recording_handler"
    }
}

/// Blocks every call until a permit is released.
struct GatedHandler {
    gate: Arc<Semaphore>,
    started: AtomicUsize,
}

#[async_trait]
impl Handler for GatedHandler {
    async fn handle(&self, _ctx: &HandlerContext, _payload: &[u8]) -> Result<(), HandlerError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| HandlerError::recoverable_with_source("gate closed", e))?;
        permit.forget();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gated_handler"
    }
}

struct Running {
    shutdown: ShutdownSender,
    task: JoinHandle<FetchState>,
    errors: mpsc::Receiver<PipelineError>,
    consumer_metrics: messaging::metrics::EventMetrics,
}

fn start(
    subscription: &MemorySubscription,
    handler: Arc<dyn Handler>,
    config: PipelineConfig,
) -> Running {
    let subscriber = MemorySubscriber::new().with_subscription("example", subscription.clone());
    let registration = EventRegistration {
        descriptor: SubscriptionDescriptor::new("Example", "example", "example"),
        handler,
    };
    let consumer = EventConsumer::new(registration, config);
    let consumer_metrics = consumer.metrics();
    let (shutdown, token) = shutdown_channel();
    let (errors_tx, errors) = mpsc::channel(4);

    let task = tokio::spawn(async move { consumer.run(&subscriber, token, errors_tx).await });

    Running {
        shutdown,
        task,
        errors,
        consumer_metrics,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn stop(running: Running) -> FetchState {
    running.shutdown.shutdown();
    tokio::time::timeout(TIMEOUT, running.task)
        .await
        .expect("consumer should terminate after shutdown")
        .unwrap()
}

#[tokio::test]
async fn test_valid_payload_is_acked_once() {
    let subscription = MemorySubscription::new();
    let sequence = subscription.publish(br#"{"isFake":false}"#.to_vec());
    let handler = Arc::new(DecodingHandler::default());

    let running = start(&subscription, handler.clone(), PipelineConfig::default());
    wait_until(|| subscription.ack_count() == 1).await;
    let metrics = running.consumer_metrics.clone();
    assert_eq!(stop(running).await, FetchState::Terminated);

    assert_eq!(subscription.acked_sequences(), vec![sequence]);
    assert_eq!(handler.handled.load(Ordering::SeqCst), 1);
    let stats = metrics.snapshot();
    assert_eq!(stats.received, 1);
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn test_undecodable_payload_is_acked_and_counted() {
    let subscription = MemorySubscription::new();
    subscription.publish(b"not-json".to_vec());

    let running = start(
        &subscription,
        Arc::new(DecodingHandler::default()),
        PipelineConfig::default(),
    );
    wait_until(|| subscription.ack_count() == 1).await;
    let metrics = running.consumer_metrics.clone();
    stop(running).await;

    let stats = metrics.snapshot();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.acked, 1);
    assert_eq!(subscription.unacked_len(), 0);
}

#[tokio::test]
async fn test_recoverable_failure_is_left_for_redelivery() {
    let subscription = MemorySubscription::new();
    let sequence = subscription.publish(br#"{"isFake":true}"#.to_vec());

    let running = start(
        &subscription,
        Arc::new(FailingHandler::recoverable("store unavailable")),
        PipelineConfig::default(),
    );
    let metrics = running.consumer_metrics.clone();
    wait_until(|| metrics.snapshot().not_acked == 1).await;
    stop(running).await;

    assert_eq!(subscription.ack_count(), 0);
    assert_eq!(subscription.unacked_len(), 1);
    assert_eq!(metrics.snapshot().errors, 1);

    // The broker's ack-wait expiry puts it back
    assert_eq!(subscription.redeliver_unacked(), 1);
    assert_eq!(subscription.deliveries(sequence), 1);
    assert_eq!(subscription.pending_len(), 1);
}

#[tokio::test]
async fn test_expected_failure_is_silent_and_not_acked() {
    let subscription = MemorySubscription::new();
    subscription.publish(b"{}".to_vec());

    let running = start(
        &subscription,
        Arc::new(FailingHandler::expected("already exists")),
        PipelineConfig::default(),
    );
    let metrics = running.consumer_metrics.clone();
    wait_until(|| metrics.snapshot().expected == 1).await;
    stop(running).await;

    let stats = metrics.snapshot();
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.not_acked, 1);
    assert_eq!(subscription.ack_count(), 0);
}

#[tokio::test]
async fn test_burst_is_handled_exactly_once() {
    let subscription = MemorySubscription::new();
    let mut recoverable = HashSet::new();
    for i in 0..25u8 {
        let payload = format!("message-{}", i).into_bytes();
        if i % 5 == 0 {
            recoverable.insert(payload.clone());
        }
        subscription.publish(payload);
    }
    let handler = Arc::new(RecordingHandler {
        recoverable,
        ..Default::default()
    });

    let config = PipelineConfig::default()
        .with_queue_capacity(10)
        .with_worker_count(10);
    let running = start(&subscription, handler.clone(), config);
    wait_until(|| handler.seen.lock().unwrap().len() == 25).await;
    stop(running).await;

    let seen = handler.seen.lock().unwrap().clone();
    let unique: HashSet<_> = seen.iter().cloned().collect();
    assert_eq!(unique.len(), 25, "every message handled exactly once");
    assert!(handler.max_in_flight.load(Ordering::SeqCst) <= 10);

    assert_eq!(subscription.ack_count(), 20);
    assert_eq!(subscription.unacked_len(), 5);
    assert_eq!(subscription.pending_len(), 0);
    assert_eq!(subscription.delivered_count(), 25);
}

#[tokio::test]
async fn test_full_queue_applies_backpressure() {
    let subscription = MemorySubscription::new();
    for i in 0..20u8 {
        subscription.publish(vec![i]);
    }
    let gate = Arc::new(Semaphore::new(0));
    let handler = Arc::new(GatedHandler {
        gate: gate.clone(),
        started: AtomicUsize::new(0),
    });

    // One worker holding one message, two queued, one held by the blocked
    // fetch loop; the rest of the pulled batch waits with it.
    let config = PipelineConfig::default()
        .with_batch_size(10)
        .with_queue_capacity(2)
        .with_worker_count(1);
    let running = start(&subscription, handler.clone(), config);

    wait_until(|| handler.started.load(Ordering::SeqCst) == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handler.started.load(Ordering::SeqCst), 1);
    assert_eq!(subscription.delivered_count(), 10, "no pull while blocked");
    assert_eq!(subscription.pending_len(), 10);

    gate.add_permits(20);
    wait_until(|| subscription.ack_count() == 20).await;
    stop(running).await;
}

#[tokio::test]
async fn test_shutdown_drains_queue_and_terminates() {
    let subscription = MemorySubscription::new();
    for i in 0..4u8 {
        subscription.publish(vec![i]);
    }
    let gate = Arc::new(Semaphore::new(0));
    let handler = Arc::new(GatedHandler {
        gate: gate.clone(),
        started: AtomicUsize::new(0),
    });

    let config = PipelineConfig::default()
        .with_queue_capacity(4)
        .with_worker_count(1);
    let running = start(&subscription, handler.clone(), config);
    wait_until(|| handler.started.load(Ordering::SeqCst) == 1).await;

    // Release the gate only after shutdown so queued messages drain afterwards
    running.shutdown.shutdown();
    gate.add_permits(4);

    let state = tokio::time::timeout(TIMEOUT, running.task)
        .await
        .expect("consumer should terminate after shutdown")
        .unwrap();
    assert_eq!(state, FetchState::Terminated);
    assert_eq!(handler.started.load(Ordering::SeqCst), 4);
    assert_eq!(subscription.ack_count(), 4);
}

#[tokio::test]
async fn test_idle_consumer_shuts_down() {
    let subscription = MemorySubscription::new();
    let running = start(
        &subscription,
        Arc::new(DecodingHandler::default()),
        PipelineConfig::default(),
    );

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(stop(running).await, FetchState::Terminated);
}

#[tokio::test]
async fn test_subscribe_failure_reports_once() {
    let subscription = MemorySubscription::new();
    subscription.publish(b"{}".to_vec());
    let subscriber = MemorySubscriber::new();
    let registration = EventRegistration {
        descriptor: SubscriptionDescriptor::new("Example", "example", "example"),
        handler: Arc::new(DecodingHandler::default()),
    };
    let (_shutdown, token) = shutdown_channel();
    let (errors_tx, mut errors) = mpsc::channel(4);

    let state = EventConsumer::new(registration, PipelineConfig::default())
        .run(&subscriber, token, errors_tx)
        .await;

    assert_eq!(state, FetchState::Terminated);
    assert_eq!(subscriber.subscribe_calls(), 1);
    match errors.recv().await {
        Some(PipelineError::Subscribe { subscription, .. }) => assert_eq!(subscription, "example"),
        other => panic!("expected subscribe error, got {:?}", other),
    }
    // Sender dropped with the consumer: exactly one report
    assert!(errors.recv().await.is_none());
    assert_eq!(subscription.delivered_count(), 0);
}

#[tokio::test]
async fn test_zero_sized_config_is_rejected() {
    let configs = [
        PipelineConfig::default().with_queue_capacity(0),
        PipelineConfig::default().with_worker_count(0),
    ];

    for config in configs {
        let subscription = MemorySubscription::new();
        subscription.publish(b"{}".to_vec());
        let subscriber = MemorySubscriber::new().with_subscription("example", subscription.clone());
        let registration = EventRegistration {
            descriptor: SubscriptionDescriptor::new("Example", "example", "example"),
            handler: Arc::new(DecodingHandler::default()),
        };
        let (_shutdown, token) = shutdown_channel();
        let (errors_tx, mut errors) = mpsc::channel(4);

        let state = tokio::spawn(async move {
            EventConsumer::new(registration, config)
                .run(&subscriber, token, errors_tx)
                .await
        })
        .await
        .expect("consumer task must not panic");

        assert_eq!(state, FetchState::Terminated);
        match errors.recv().await {
            Some(PipelineError::Config(e)) => assert!(e.to_string().contains("must be at least 1")),
            other => panic!("expected config error, got {:?}", other),
        }
        assert!(errors.recv().await.is_none());
        assert_eq!(subscription.delivered_count(), 0);
    }
}

#[tokio::test]
async fn test_running_consumer_reports_no_errors() {
    let subscription = MemorySubscription::new();
    let mut running = start(
        &subscription,
        Arc::new(DecodingHandler::default()),
        PipelineConfig::default(),
    );
    subscription.publish(b"not-json".to_vec());
    wait_until(|| subscription.ack_count() == 1).await;

    assert!(running.errors.try_recv().is_err());
    stop(running).await;
}
