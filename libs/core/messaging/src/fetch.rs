//! Fetch loop feeding the work queue.

use crate::config::PipelineConfig;
use crate::context::PipelineContext;
use crate::message::InboundMessage;
use crate::shutdown::ShutdownToken;
use crate::subscription::Subscription;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle of a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Pulling batches and enqueueing them
    Fetching,
    /// Queue closed, workers finishing what was already enqueued
    Draining,
    /// Every worker has exited
    Terminated,
}

/// Pulls batches from a subscription into the bounded work queue.
pub struct FetchLoop {
    subscription: Arc<dyn Subscription>,
    sender: mpsc::Sender<InboundMessage>,
    config: PipelineConfig,
    ctx: PipelineContext,
}

impl FetchLoop {
    pub fn new(
        subscription: Arc<dyn Subscription>,
        sender: mpsc::Sender<InboundMessage>,
        config: PipelineConfig,
        ctx: PipelineContext,
    ) -> Self {
        Self {
            subscription,
            sender,
            config,
            ctx,
        }
    }

    /// Run until shutdown, then close the queue.
    ///
    /// Returns [`FetchState::Draining`]: the sender is dropped on return, so
    /// workers see the queue close once it is empty. Messages still in hand
    /// when shutdown is observed are dropped un-acknowledged.
    pub async fn run(self, mut shutdown: ShutdownToken) -> FetchState {
        let FetchLoop {
            subscription,
            sender,
            config,
            ctx,
        } = self;

        info!(
            event = %ctx.event(),
            batch_size = config.batch_size,
            wait_ms = config.wait_timeout.as_millis() as u64,
            "Fetch loop started"
        );

        'fetching: loop {
            if shutdown.is_shutdown() {
                break;
            }

            let batch = match subscription
                .pull_batch(config.batch_size, config.wait_timeout)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(event = %ctx.event(), error = %e, "Fetch failed, retrying");
                    if pause(&mut shutdown, config.wait_timeout).await {
                        break;
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                if pause(&mut shutdown, config.wait_timeout).await {
                    break;
                }
                continue;
            }

            debug!(event = %ctx.event(), messages = batch.len(), "Fetched batch");

            for message in batch {
                tokio::select! {
                    biased;
                    _ = shutdown.wait() => {
                        debug!(
                            event = %ctx.event(),
                            "Shutdown while enqueueing, leaving batch for redelivery"
                        );
                        break 'fetching;
                    }
                    sent = sender.send(message) => {
                        if sent.is_err() {
                            warn!(event = %ctx.event(), "Work queue closed, stopping fetch loop");
                            break 'fetching;
                        }
                    }
                }
            }
        }

        drop(sender);
        info!(event = %ctx.event(), "Fetch loop stopped, draining work queue");
        FetchState::Draining
    }
}

/// Sleep for `wait`, returning `true` if shutdown arrived first.
async fn pause(shutdown: &mut ShutdownToken, wait: Duration) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.wait() => true,
        _ = tokio::time::sleep(wait) => false,
    }
}
