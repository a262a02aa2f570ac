//! Event Subscriber Service
//!
//! Consumes example events from NATS JetStream and records them.
//!
//! ## Architecture
//!
//! ```text
//! NATS JetStream (example stream)
//!   ↓ (durable pull consumers: example, example-record)
//! EventConsumer (fetch loop + worker pool per event)
//!   ↓
//! ExampleHandler / ExampleRecordHandler
//!   ↓
//! ExampleRecorder
//! ```
//!
//! A health server exposes liveness, readiness, per-event stats and
//! Prometheus metrics on `PORT` (default 8000).

pub mod config;
pub mod events;
pub mod example;
pub mod handlers;

use crate::config::SubscriberConfig;
use crate::example::MemoryRecorder;
use core_config::server::ServerConfig;
use core_config::{app_info, AppInfo, FromEnv};
use eyre::{eyre, Result, WrapErr};
use messaging::health::HealthServer;
use messaging::metrics::EventMetrics;
use messaging::nats::{ensure_streams, JetStreamSubscriber};
use messaging::{shutdown_channel, EventConsumer, EventRegistry, PipelineConfig, PipelineError, Subscriber};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Run the subscriber service
///
/// 1. Loads configuration and sets up tracing and metrics
/// 2. Connects to NATS and provisions the streams
/// 3. Serves every registered event until SIGINT/SIGTERM or a fatal error
///
/// # Errors
///
/// Returns an error if configuration is invalid, NATS is unreachable, the
/// health server cannot bind, or a consumer fails to subscribe.
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();

    let config = SubscriberConfig::from_env().wrap_err("Failed to load configuration")?;
    core_config::tracing::init_tracing(&config.environment);

    let metrics_handle =
        messaging::metrics::init_metrics().wrap_err("Failed to install Prometheus recorder")?;

    let app = app_info!();
    info!(
        name = %app.name,
        version = %app.version,
        service = %config.service_name,
        "Starting subscriber service"
    );

    let jetstream = messaging::nats::connect(&config.nats)
        .await
        .wrap_err_with(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    ensure_streams(&jetstream, &events::streams())
        .await
        .wrap_err("Failed to provision streams")?;

    let recorder = Arc::new(MemoryRecorder::new());
    let registry = events::registry(recorder);
    let subscriber: Arc<dyn Subscriber> = Arc::new(JetStreamSubscriber::new(jetstream));

    Service::new(config.server, config.pipeline, app)
        .with_metrics(metrics_handle.clone())
        .run(registry, subscriber, shutdown_signal())
        .await?;

    info!("Subscriber service stopped");
    Ok(())
}

/// Runs a registry against a subscriber, independent of the broker.
pub struct Service {
    server: ServerConfig,
    pipeline: PipelineConfig,
    app: AppInfo,
    metrics: Option<PrometheusHandle>,
}

impl Service {
    pub fn new(server: ServerConfig, pipeline: PipelineConfig, app: AppInfo) -> Self {
        Self {
            server,
            pipeline,
            app,
            metrics: None,
        }
    }

    /// Serve the Prometheus handle on /metrics.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Start the health server, every consumer and every app event, then wait.
    ///
    /// Returns once `signal` resolves or the first fatal error arrives, after
    /// every consumer has drained. A fatal error is returned as `Err`.
    pub async fn run(
        self,
        registry: EventRegistry,
        subscriber: Arc<dyn Subscriber>,
        signal: impl Future<Output = ()> + Send,
    ) -> Result<()> {
        let (shutdown, token) = shutdown_channel();
        let (errors_tx, mut errors_rx) =
            mpsc::channel::<PipelineError>(registry.events().len().max(1));

        let consumers: Vec<EventConsumer> = registry
            .events()
            .iter()
            .cloned()
            .map(|registration| EventConsumer::new(registration, self.pipeline.clone()))
            .collect();
        let app_events: Vec<_> = registry
            .app_events()
            .iter()
            .cloned()
            .map(|event| {
                let metrics = EventMetrics::new(event.name());
                (event, metrics)
            })
            .collect();

        let mut stats: Vec<EventMetrics> = consumers.iter().map(EventConsumer::metrics).collect();
        stats.extend(app_events.iter().map(|(_, metrics)| metrics.clone()));

        let mut health = HealthServer::new(self.server, self.app).with_event_stats(stats);
        if let Some(handle) = self.metrics {
            health = health.with_metrics(handle);
        }
        let health_state = health.state();
        let mut health_task = tokio::spawn(health.run(token.clone()));

        let mut tasks = JoinSet::new();
        for consumer in consumers {
            let subscriber = Arc::clone(&subscriber);
            let token = token.clone();
            let errors = errors_tx.clone();
            tasks.spawn(async move {
                consumer.run(subscriber.as_ref(), token, errors).await;
            });
        }
        for (event, metrics) in app_events {
            let token = token.clone();
            tasks.spawn(async move { event.run(metrics, token).await });
        }
        drop(errors_tx);

        health_state.set_subscribed(true).await;
        info!(
            events = registry.events().len(),
            app_events = registry.app_events().len(),
            "Subscriber ready"
        );

        tokio::pin!(signal);
        let mut health_finished = false;
        let fatal = tokio::select! {
            _ = &mut signal => None,
            Some(err) = errors_rx.recv() => {
                error!(error = %err, "Fatal consumer error, shutting down");
                Some(eyre::Report::new(err))
            }
            result = &mut health_task => {
                health_finished = true;
                let report = match result {
                    Ok(Ok(())) => eyre!("Health server exited unexpectedly"),
                    Ok(Err(e)) => eyre::Report::new(e).wrap_err("Health server failed"),
                    Err(e) => eyre::Report::new(e).wrap_err("Health server task failed"),
                };
                error!(error = %report, "Health server stopped, shutting down");
                Some(report)
            }
        };

        if let Some(report) = &fatal {
            health_state.set_fatal(report.to_string()).await;
        }

        info!("Draining consumers");
        shutdown.shutdown();
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Consumer task failed");
            }
        }

        if !health_finished {
            match health_task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Health server failed during shutdown"),
                Err(e) => warn!(error = %e, "Health server task failed during shutdown"),
            }
        }

        match fatal {
            Some(report) => Err(report.wrap_err("Subscriber stopped on a fatal error")),
            None => Ok(()),
        }
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
///
/// A signal handler that cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }
}
