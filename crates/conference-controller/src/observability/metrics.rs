//! Metrics definitions for the Conference Controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `cc_` prefix for Conference Controller
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Label values are fixed strings chosen in code:
//! - `outcome`: bridged, bridge_unavailable, add_channel_failed, cancelled
//! - `operation`: one per driver operation (~7 values)
//! - `kind`: join, leave
//! - `status`: success, error
//! - `reason`: cancelled, destroyed, stream_closed
//! - error `kind`: one per `CcError` variant

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Session duration covers answer, dial and bridge round trips
        .set_buckets_for_metric(
            Matcher::Prefix("cc_session_duration".to_string()),
            &[
                0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000, 60.000,
            ],
        )
        .map_err(|e| format!("Failed to set session duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Call Metrics
// ============================================================================

/// Record a new call leg handed to the application.
///
/// Metric: `cc_calls_total`
pub fn record_call_received() {
    counter!("cc_calls_total").increment(1);
}

/// Record how a call session ended.
///
/// Metric: `cc_session_outcomes_total`
/// Labels: `outcome`
pub fn record_session_outcome(outcome: &str) {
    counter!("cc_session_outcomes_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record the wall time of one call session.
///
/// Metric: `cc_session_duration_seconds`
/// Labels: `outcome`
pub fn record_session_duration(outcome: &str, duration: Duration) {
    histogram!("cc_session_duration_seconds", "outcome" => outcome.to_string())
        .record(duration.as_secs_f64());
}

// ============================================================================
// Bridge Metrics
// ============================================================================

/// Record a successful bridge creation.
///
/// Metric: `cc_bridges_created_total`
pub fn record_bridge_created() {
    counter!("cc_bridges_created_total").increment(1);
}

/// Record a bridge manager leaving its event loop.
///
/// Metric: `cc_bridge_teardowns_total`
/// Labels: `reason`
pub fn record_bridge_teardown(reason: &str) {
    counter!("cc_bridge_teardowns_total", "reason" => reason.to_string()).increment(1);
}

/// Set whether the shared bridge is currently managed.
///
/// Metric: `cc_bridge_active`
pub fn set_bridge_active(active: bool) {
    gauge!("cc_bridge_active").set(if active { 1.0 } else { 0.0 });
}

/// Record a join/leave announcement attempt.
///
/// Metric: `cc_announcements_total`
/// Labels: `kind`, `status`
pub fn record_announcement(kind: &str, status: &str) {
    counter!(
        "cc_announcements_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Driver Metrics
// ============================================================================

/// Record a failed driver call.
///
/// Metric: `cc_driver_errors_total`
/// Labels: `operation`
pub fn record_driver_error(operation: &str) {
    counter!("cc_driver_errors_total", "operation" => operation.to_string()).increment(1);
}

/// Record an error that ended a session step or the dispatcher.
///
/// Metric: `cc_errors_total`
/// Labels: `kind`
pub fn record_error(kind: &str) {
    counter!("cc_errors_total", "kind" => kind.to_string()).increment(1);
}
