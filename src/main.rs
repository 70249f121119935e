//! Recipe Engine - personalization and response cache server
//!
//! Standalone REST server in front of [`PersonalizationService`].
//!
//! [`PersonalizationService`]: recipe_engine::personalization::PersonalizationService

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tower::limit::ConcurrencyLimitLayer;
use tracing::{debug, info, warn};

use recipe_engine::clock::SystemClock;
use recipe_engine::config::{print_env_help, ServerConfig};
use recipe_engine::handlers::{build_api_routes, build_public_routes, AppContext, AppState};
use recipe_engine::{metrics, middleware, tracing_setup};

// Max time to drain in-flight requests after the shutdown signal
const GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().any(|a| a == "--help" || a == "-h") {
        print_env_help();
        return Ok(());
    }

    // Load configuration from environment
    let server_config = ServerConfig::from_env();

    tracing_setup::init_tracing(server_config.json_logs)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    metrics::register_metrics()?;
    info!("Metrics registered at /metrics");

    info!("Starting recipe engine...");
    server_config.log();

    let context: AppState = Arc::new(AppContext::new(
        server_config.clone(),
        SystemClock::shared(),
    ));
    if let Some(path) = &server_config.catalog_path {
        context.load_catalog(path)?;
    } else {
        warn!("RECIPE_CATALOG_PATH not set; starting with an empty catalog");
    }

    spawn_maintenance(context.clone(), server_config.maintenance_interval_secs);
    spawn_event_log(context.clone());

    let cors = server_config.cors.to_layer();
    let max_concurrent = server_config.max_concurrent_requests;
    info!("Concurrency limit: {} requests", max_concurrent);

    // Request limiting covers the API only; probes and scrapes stay reachable
    let api_routes = build_api_routes(context.clone()).layer(ConcurrencyLimitLayer::new(max_concurrent));

    let app = build_public_routes(context.clone())
        .merge(api_routes)
        .layer(axum::middleware::from_fn(middleware::track_metrics))
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", server_config.host, server_config.port).parse()?;
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    server.await?;

    // Final sweep so the last log line reflects the drained state
    let drained = tokio::time::timeout(
        std::time::Duration::from_secs(GRACEFUL_SHUTDOWN_TIMEOUT_SECS),
        tokio::task::spawn_blocking(move || context.service().run_maintenance()),
    )
    .await;
    match drained {
        Ok(Ok(report)) => info!(
            expired = report.expired_cache_entries,
            idle_profiles = report.idle_profiles,
            "Server shutdown complete"
        ),
        Ok(Err(e)) => tracing::error!("Final maintenance sweep panicked: {}", e),
        Err(_) => tracing::error!(
            "Final maintenance sweep timed out after {}s",
            GRACEFUL_SHUTDOWN_TIMEOUT_SECS
        ),
    }

    Ok(())
}

/// Periodic cache purge, idle-profile sweep and trending prune
fn spawn_maintenance(context: AppState, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let ctx = context.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || ctx.service().run_maintenance()).await {
                tracing::error!("Maintenance sweep panicked: {}", e);
            }
        }
    });
    info!("Maintenance sweep every {}s", interval_secs.max(1));
}

/// Debug-level log of every accepted behavior event
fn spawn_event_log(context: AppState) {
    let mut rx = context.subscribe_events();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(
                    user_id = %event.user_id,
                    recipe_id = %event.recipe.recipe_id,
                    event_type = event.event_type().as_str(),
                    "behavior event"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event log lagging behind behavior stream")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
