//! HTTP routes for the Conference Controller.

use crate::handlers;
use crate::observability::{health_router, HealthState};
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the application routes.
///
/// - `POST /cocapi/` caller echo
/// - `GET /health`, `GET /ready` probes
/// - `GET /metrics` when a Prometheus handle is given
pub fn build_routes(
    health_state: Arc<HealthState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Router {
    let mut app = Router::new()
        .route("/cocapi/", post(handlers::echo_caller))
        .merge(health_router(health_state));

    if let Some(handle) = prometheus_handle {
        app = app.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }

    // TimeoutLayer innermost, TraceLayer logs the timed-out response too
    app.layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
}
