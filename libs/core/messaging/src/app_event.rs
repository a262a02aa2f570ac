//! Ticker-driven events that run a handler on a fixed rate.

use crate::handler::{Handler, HandlerContext};
use crate::message::Headers;
use crate::metrics::EventMetrics;
use crate::shutdown::ShutdownToken;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// A handler invoked every `rate` with an empty payload.
#[derive(Clone)]
pub struct AppEvent {
    name: Arc<str>,
    rate: Duration,
    handler: Arc<dyn Handler>,
}

impl AppEvent {
    pub fn new(name: impl Into<String>, rate: Duration, handler: Arc<dyn Handler>) -> Self {
        Self {
            name: Arc::from(name.into()),
            rate,
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rate(&self) -> Duration {
        self.rate
    }

    /// Tick until shutdown, then wait for in-flight invocations.
    ///
    /// The first invocation happens one `rate` after start. Each tick runs in
    /// its own task, so a slow handler does not delay the next tick.
    pub async fn run(&self, metrics: EventMetrics, mut shutdown: ShutdownToken) {
        if self.rate.is_zero() {
            warn!(event = %self.name, "App event has a zero rate, not scheduling");
            return;
        }

        info!(event = %self.name, rate_ms = self.rate.as_millis() as u64, "Starting app event");

        let start = tokio::time::Instant::now() + self.rate;
        let mut ticker = interval_at(start, self.rate);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(event = %self.name, error = %e, "App event task failed");
                        metrics.handler_panicked();
                    }
                }
                _ = ticker.tick() => {
                    let name = self.name.clone();
                    let handler = self.handler.clone();
                    let metrics = metrics.clone();
                    let ctx = HandlerContext::new(name.clone(), Headers::new(), shutdown.clone());
                    in_flight.spawn(async move {
                        invoke(&name, handler.as_ref(), &ctx, &metrics).await;
                    });
                }
            }
        }

        debug!(event = %self.name, in_flight = in_flight.len(), "App event stopping");
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(event = %self.name, error = %e, "App event task failed");
                metrics.handler_panicked();
            }
        }
        info!(event = %self.name, "App event stopped");
    }
}

async fn invoke(name: &str, handler: &dyn Handler, ctx: &HandlerContext, metrics: &EventMetrics) {
    metrics.message_received();
    let started = Instant::now();
    let result = handler.handle(ctx, &[]).await;
    metrics.task_duration(started.elapsed());

    match result {
        Ok(()) => debug!(event = %name, handler = handler.name(), "App event handled"),
        Err(e) if e.is_expected() => {
            metrics.expected_error();
            debug!(event = %name, handler = handler.name(), error = %e, "App event expected error");
        }
        Err(e) => {
            metrics.error_occurred();
            error!(
                event = %name,
                handler = handler.name(),
                kind = %e.kind(),
                error = %e,
                "App event handler failed"
            );
        }
    }
}
