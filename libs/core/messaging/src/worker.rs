//! Worker pool draining the work queue.

use crate::ack::{acknowledge, decide, AckDecision};
use crate::context::PipelineContext;
use crate::handler::{Handler, HandlerContext};
use crate::message::InboundMessage;
use crate::shutdown::ShutdownToken;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, field, info, info_span, Instrument};

/// W3C trace context header recorded on the message span.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Fixed set of workers sharing one receiver.
///
/// Each worker exits once the queue is closed and empty.
pub struct WorkerPool {
    workers: JoinSet<()>,
    event: Arc<str>,
}

impl WorkerPool {
    /// Spawn `count` workers on the current runtime.
    pub fn spawn(
        count: usize,
        queue: mpsc::Receiver<InboundMessage>,
        handler: Arc<dyn Handler>,
        ctx: PipelineContext,
        shutdown: ShutdownToken,
    ) -> Self {
        let queue = Arc::new(Mutex::new(queue));
        let mut workers = JoinSet::new();

        for worker_id in 0..count {
            let queue = queue.clone();
            let handler = handler.clone();
            let ctx = ctx.clone();
            let shutdown = shutdown.clone();
            workers.spawn(async move {
                run_worker(worker_id, queue, handler, ctx, shutdown).await;
            });
        }

        debug!(event = %ctx.event(), workers = count, "Worker pool started");

        Self {
            workers,
            event: ctx.event_arc(),
        }
    }

    /// Wait for every worker to exit.
    pub async fn join(mut self) {
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                error!(event = %self.event, error = %e, "Worker task failed");
            }
        }
        info!(event = %self.event, "Worker pool drained");
    }
}

async fn run_worker(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<InboundMessage>>>,
    handler: Arc<dyn Handler>,
    ctx: PipelineContext,
    shutdown: ShutdownToken,
) {
    loop {
        // Release the lock before handling so other workers can receive
        let next = { queue.lock().await.recv().await };
        let Some(message) = next else {
            break;
        };
        process_message(message, handler.as_ref(), &ctx, &shutdown).await;
    }
    debug!(event = %ctx.event(), worker_id, "Worker exiting, queue closed");
}

/// Handle one message and perform its acknowledgment.
///
/// A panicking handler is contained here and its message is left
/// un-acknowledged.
pub async fn process_message(
    message: InboundMessage,
    handler: &dyn Handler,
    ctx: &PipelineContext,
    shutdown: &ShutdownToken,
) -> AckDecision {
    let (message_id, payload, headers, acker) = message.into_parts();
    let metrics = ctx.metrics();
    metrics.message_received();

    let span = info_span!(
        "handle_message",
        event = %ctx.event(),
        handler = ctx.handler(),
        message_id = %message_id,
        traceparent = field::Empty,
    );
    if let Some(traceparent) = headers.get(TRACEPARENT_HEADER) {
        span.record("traceparent", traceparent.as_str());
    }

    async move {
        let handler_ctx = HandlerContext::new(ctx.event_arc(), headers, shutdown.clone());

        let started = Instant::now();
        let outcome = AssertUnwindSafe(handler.handle(&handler_ctx, &payload))
            .catch_unwind()
            .await;
        let elapsed = started.elapsed();
        metrics.task_duration(elapsed);

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                metrics.handler_panicked();
                metrics.acknowledged(false);
                error!(panic = %panic_message(panic.as_ref()), "Handler panicked, leaving message for redelivery");
                drop(acker);
                return AckDecision::NoAck;
            }
        };

        match &result {
            Ok(()) => debug!(duration_ms = elapsed.as_millis() as u64, "Message handled"),
            Err(e) if e.is_expected() => {
                metrics.expected_error();
                debug!(kind = %e.kind(), error = %e, "Handler returned expected error");
            }
            Err(e) => {
                metrics.error_occurred();
                error!(kind = %e.kind(), error = %e, "Handler failed");
            }
        }

        let decision = decide(&result);
        match decision {
            AckDecision::Ack => {
                let acked = acknowledge(acker, &message_id).await;
                metrics.acknowledged(acked);
            }
            AckDecision::NoAck => {
                drop(acker);
                metrics.acknowledged(false);
            }
        }
        decision
    }
    .instrument(span)
    .await
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
