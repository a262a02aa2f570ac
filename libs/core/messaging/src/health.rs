//! Health endpoints for K8s probes and Prometheus scraping.

use crate::metrics::{EventMetrics, EventStatsSnapshot};
use crate::shutdown::ShutdownToken;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use core_config::{server::ServerConfig, AppInfo};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Health status of the service.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    pub subscribed: bool,
    pub consumers_healthy: bool,
}

/// Shared health state.
#[derive(Clone)]
pub struct HealthState {
    inner: Arc<RwLock<HealthStateInner>>,
    app: Arc<AppInfo>,
}

struct HealthStateInner {
    subscribed: bool,
    consumers_healthy: bool,
    last_error: Option<String>,
}

impl HealthState {
    /// Create new health state. Not ready until marked subscribed.
    pub fn new(app: AppInfo) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HealthStateInner {
                subscribed: false,
                consumers_healthy: true,
                last_error: None,
            })),
            app: Arc::new(app),
        }
    }

    /// Mark every consumer as subscribed.
    pub async fn set_subscribed(&self, subscribed: bool) {
        let mut inner = self.inner.write().await;
        inner.subscribed = subscribed;
    }

    /// Record a fatal consumer error; liveness fails from now on.
    pub async fn set_fatal(&self, error: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.consumers_healthy = false;
        inner.last_error = Some(error.into());
    }

    /// Check if alive (for liveness).
    ///
    /// Only fatal consumer errors fail liveness, broker reconnects do not.
    pub async fn is_alive(&self) -> bool {
        let inner = self.inner.read().await;
        inner.consumers_healthy
    }

    /// Check if ready (for readiness).
    pub async fn is_ready(&self) -> bool {
        let inner = self.inner.read().await;
        inner.subscribed && inner.consumers_healthy
    }

    /// Get status.
    pub async fn status(&self) -> HealthStatus {
        let inner = self.inner.read().await;
        let status = if inner.subscribed && inner.consumers_healthy {
            "healthy".to_string()
        } else if !inner.consumers_healthy {
            format!(
                "unhealthy: {}",
                inner.last_error.as_deref().unwrap_or("unknown")
            )
        } else {
            "starting".to_string()
        };

        HealthStatus {
            status,
            service: self.app.name.clone(),
            version: self.app.version.clone(),
            subscribed: inner.subscribed,
            consumers_healthy: inner.consumers_healthy,
        }
    }
}

#[derive(Clone)]
struct RouterState {
    health: HealthState,
    stats: Arc<Vec<EventMetrics>>,
}

/// Health server for K8s probes.
pub struct HealthServer {
    config: ServerConfig,
    state: HealthState,
    metrics_handle: Option<PrometheusHandle>,
    stats: Vec<EventMetrics>,
}

impl HealthServer {
    /// Create a new health server.
    pub fn new(config: ServerConfig, app: AppInfo) -> Self {
        Self {
            config,
            state: HealthState::new(app),
            metrics_handle: None,
            stats: Vec::new(),
        }
    }

    /// Set the metrics handle for /metrics endpoint.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Expose per-event counters on /stats.
    pub fn with_event_stats(mut self, stats: Vec<EventMetrics>) -> Self {
        self.stats = stats;
        self
    }

    /// Get the health state for updates.
    pub fn state(&self) -> HealthState {
        self.state.clone()
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        let state = RouterState {
            health: self.state.clone(),
            stats: Arc::new(self.stats.clone()),
        };
        let metrics_handle = self.metrics_handle.clone();

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(health_handler))
            .route("/_healthz", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/readyz", get(ready_handler))
            .route("/stats", get(stats_handler))
            .with_state(state);

        if let Some(handle) = metrics_handle {
            router = router.route(
                "/metrics",
                get(move || {
                    let handle = handle.clone();
                    async move { handle.render() }
                }),
            );
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Run the health server until shutdown.
    pub async fn run(self, mut shutdown: ShutdownToken) -> Result<(), std::io::Error> {
        let router = self.router();
        let addr = self.config.address();

        info!(addr = %addr, "Starting health server");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        info!("Health server stopped");
        Ok(())
    }
}

/// Liveness probe handler.
async fn health_handler(State(state): State<RouterState>) -> impl IntoResponse {
    let status = state.health.status().await;
    if state.health.is_alive().await {
        (StatusCode::OK, Json(status))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(status))
    }
}

/// Readiness probe handler.
async fn ready_handler(State(state): State<RouterState>) -> impl IntoResponse {
    let status = state.health.status().await;
    if state.health.is_ready().await {
        (StatusCode::OK, Json(status))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(status))
    }
}

async fn stats_handler(State(state): State<RouterState>) -> Json<Vec<EventStatsSnapshot>> {
    Json(state.stats.iter().map(EventMetrics::snapshot).collect())
}
