//! Conference Controller
//!
//! Serves the HTTP API: the caller echo endpoint, health probes and
//! Prometheus metrics. The conference core is a library; a host owning a
//! telephony driver embeds it with `service::run_conference`.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Bind the HTTP listener
//! 4. Serve until Ctrl+C or SIGTERM, then drain

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use conference_controller::config::Config;
use conference_controller::observability::{init_metrics_recorder, HealthState};
use conference_controller::routes::build_routes;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conference_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Conference Controller");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        http_bind_address = %config.http_bind_address,
        shutdown_timeout_seconds = config.shutdown_timeout_seconds,
        "Configuration loaded successfully"
    );

    // No telephony driver is linked into this binary
    let call_settings = config.call_settings();
    let bridge_settings = config.bridge_settings();
    info!(
        dial = ?call_settings.dial,
        bridge_type = %bridge_settings.bridge_type,
        join_sound = %bridge_settings.join_sound,
        leave_sound = %bridge_settings.leave_sound,
        "Conference core not started; these settings apply to a host embedding run_conference"
    );

    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to initialize metrics");
        e
    })?;

    let health_state = Arc::new(HealthState::new());
    let app = build_routes(Arc::clone(&health_state), Some(prometheus_handle));

    let addr: SocketAddr = config.http_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.http_bind_address, "Invalid HTTP bind address");
        format!("Invalid HTTP bind address: {e}")
    })?;

    // Bind before flipping readiness so probes never see a dead port as ready
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind HTTP server");
        format!("Failed to bind HTTP server to {addr}: {e}")
    })?;
    health_state.set_ready();
    info!(addr = %addr, "HTTP server listening");

    let shutdown_token = CancellationToken::new();
    let server_token = shutdown_token.clone();
    let server = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            server_token.cancelled().await;
            info!("HTTP server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "HTTP server failed");
        }
    });

    shutdown_signal().await;
    info!("Shutdown signal received, draining");

    health_state.set_draining();
    shutdown_token.cancel();

    match tokio::time::timeout(config.shutdown_timeout(), server).await {
        Ok(Ok(())) => info!("HTTP server stopped"),
        Ok(Err(e)) => error!(error = ?e, "HTTP server task panicked"),
        Err(_) => error!(
            timeout_seconds = config.shutdown_timeout_seconds,
            "HTTP server drain timed out"
        ),
    }

    info!("Conference Controller shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
