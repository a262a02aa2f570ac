//! Consumer lifecycle: subscribe, fetch, drain.

use crate::config::PipelineConfig;
use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::fetch::{FetchLoop, FetchState};
use crate::metrics::EventMetrics;
use crate::registry::EventRegistration;
use crate::shutdown::ShutdownToken;
use crate::subscription::Subscriber;
use crate::worker::WorkerPool;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Runs one registered event: a fetch loop plus its worker pool.
pub struct EventConsumer {
    registration: EventRegistration,
    config: PipelineConfig,
    metrics: EventMetrics,
}

impl EventConsumer {
    pub fn new(registration: EventRegistration, config: PipelineConfig) -> Self {
        let metrics = EventMetrics::new(registration.descriptor.name());
        Self {
            registration,
            config,
            metrics,
        }
    }

    /// Metric handles for this consumer; clones share counters.
    pub fn metrics(&self) -> EventMetrics {
        self.metrics.clone()
    }

    /// Subscribe and consume until shutdown.
    ///
    /// An invalid config or a subscribe failure is reported once on `errors`
    /// and the consumer returns without fetching. Otherwise returns after the work queue has
    /// drained and every worker has exited.
    pub async fn run(
        self,
        subscriber: &dyn Subscriber,
        shutdown: ShutdownToken,
        errors: mpsc::Sender<PipelineError>,
    ) -> FetchState {
        let EventConsumer {
            registration,
            config,
            metrics,
        } = self;
        let descriptor = &registration.descriptor;

        if let Err(e) = config.validate() {
            error!(event = %descriptor.name(), error = %e, "Invalid pipeline configuration");
            if errors.try_send(PipelineError::Config(e)).is_err() {
                error!(event = %descriptor.name(), "Process error channel unavailable");
            }
            return FetchState::Terminated;
        }

        let subscription = match subscriber.subscribe(descriptor).await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!(
                    event = %descriptor.name(),
                    queue = %descriptor.queue(),
                    subscription = %descriptor.subscription_name(),
                    error = %e,
                    "Failed to subscribe"
                );
                let report = PipelineError::Subscribe {
                    subscription: descriptor.subscription_name().to_string(),
                    source: e,
                };
                if errors.try_send(report).is_err() {
                    error!(event = %descriptor.name(), "Process error channel unavailable");
                }
                return FetchState::Terminated;
            }
        };

        info!(
            event = %descriptor.name(),
            queue = %descriptor.queue(),
            subscription = %descriptor.subscription_name(),
            handler = registration.handler.name(),
            workers = config.worker_count,
            queue_capacity = config.queue_capacity,
            "Consumer subscribed"
        );

        let ctx = PipelineContext::new(descriptor.name(), registration.handler.name(), metrics);
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let pool = WorkerPool::spawn(
            config.worker_count,
            receiver,
            registration.handler.clone(),
            ctx.clone(),
            shutdown.clone(),
        );

        let state = FetchLoop::new(subscription, sender, config, ctx).run(shutdown).await;
        debug_assert_eq!(state, FetchState::Draining);

        pool.join().await;
        info!(event = %descriptor.name(), "Consumer terminated");
        FetchState::Terminated
    }
}
