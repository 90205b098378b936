//! Observability for the Conference Controller.
//!
//! All instrumentation uses `#[instrument(skip_all)]` with explicit fields.
//! Log targets are `cc.actor.dispatcher`, `cc.actor.session`,
//! `cc.actor.bridge` and `cc.http.echo`.
//!
//! # Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `cc_calls_total` | Counter | none |
//! | `cc_session_outcomes_total` | Counter | `outcome` |
//! | `cc_session_duration_seconds` | Histogram | `outcome` |
//! | `cc_bridges_created_total` | Counter | none |
//! | `cc_bridge_teardowns_total` | Counter | `reason` |
//! | `cc_bridge_active` | Gauge | none |
//! | `cc_announcements_total` | Counter | `kind`, `status` |
//! | `cc_driver_errors_total` | Counter | `operation` |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState, Phase};
pub use metrics::init_metrics_recorder;
