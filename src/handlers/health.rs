//! Health and Infrastructure Handlers
//!
//! Kubernetes probes and the Prometheus scrape endpoint.

use axum::{extract::State, http::StatusCode, response::Json};

use super::router::AppState;
use super::types::HealthResponse;
use crate::metrics;

/// Main health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let service = state.service();
    let cache = service.cache_stats();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        active_profiles: service.tracker().active_profiles(),
        trending_recipes: service.trending_aggregator().len(),
        catalog_size: state.catalog().len(),
        cache_size: cache.size,
        cache_capacity: cache.capacity,
    })
}

/// Liveness probe - process is up and the runtime is scheduling tasks
pub async fn health_live() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

/// Readiness probe - 503 until a catalog is available to score against
pub async fn health_ready(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let catalog_size = state.catalog().len();
    let status = if catalog_size > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if status.is_success() { "ready" } else { "no_catalog" },
            "version": env!("CARGO_PKG_VERSION"),
            "catalog_size": catalog_size,
            "timestamp": state.clock().now().to_rfc3339()
        })),
    )
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    // Refresh gauges that are cheaper to read on scrape than to maintain
    let service = state.service();
    metrics::CACHE_SIZE
        .with_label_values(&[service.cache().name()])
        .set(service.cache_stats().size as i64);
    metrics::ACTIVE_PROFILES.set(service.tracker().active_profiles() as i64);
    metrics::TRENDING_RECIPES.set(service.trending_aggregator().len() as i64);

    metrics::render().map_err(|e| {
        tracing::error!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
