//! Router Configuration - Centralized route definitions
//!
//! Public routes (probes, metrics) are split from the `/api` surface so the
//! caller can wrap the latter in request-limiting layers.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::state::AppContext;
use super::{behavior, catalog, health, insights, recommendations};

/// Application state type alias
pub type AppState = Arc<AppContext>;

/// Build the public routes
///
/// Health checks and Prometheus scraping must stay reachable regardless of
/// request limits applied to the API.
pub fn build_public_routes(state: AppState) -> Router {
    Router::new()
        // =================================================================
        // HEALTH & KUBERNETES PROBES
        // =================================================================
        .route("/health", get(health::health))
        .route("/health/live", get(health::health_live))
        .route("/health/ready", get(health::health_ready))
        // =================================================================
        // METRICS (PROMETHEUS)
        // =================================================================
        .route("/metrics", get(health::metrics_endpoint))
        .with_state(state)
}

/// Build the `/api` routes
pub fn build_api_routes(state: AppState) -> Router {
    Router::new()
        // =================================================================
        // RECOMMENDATIONS
        // =================================================================
        .route(
            "/api/recommendations",
            post(recommendations::get_recommendations),
        )
        .route(
            "/api/recommendations/invalidate",
            post(recommendations::invalidate_recommendations),
        )
        .route(
            "/api/recommendations/{user_id}",
            get(recommendations::get_recommendations_for_user),
        )
        // =================================================================
        // BEHAVIOR INGESTION
        // =================================================================
        .route("/api/behavior", post(behavior::record_behavior))
        .route("/api/behavior/batch", post(behavior::record_behavior_batch))
        .route("/api/events", get(behavior::behavior_events_sse))
        // =================================================================
        // INSIGHTS
        // =================================================================
        .route("/api/trending", get(insights::trending))
        .route("/api/profile/{user_id}", get(insights::get_profile))
        .route("/api/seasonal", get(insights::seasonal_current))
        .route("/api/seasonal/{month}", get(insights::seasonal_for_month))
        .route("/api/cache/stats", get(insights::cache_stats))
        .route("/api/cache/warm", post(insights::warm_cache))
        .route("/api/maintenance", post(insights::run_maintenance))
        // =================================================================
        // CATALOG
        // =================================================================
        .route("/api/catalog", post(catalog::upsert_recipes))
        .route(
            "/api/catalog/{recipe_id}",
            get(catalog::get_recipe).delete(catalog::delete_recipe),
        )
        .with_state(state)
}

/// Build the complete application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(build_public_routes(state.clone()))
        .merge(build_api_routes(state))
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::*;
    use super::super::types::HealthResponse;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_health_and_readiness() {
        let harness = TestHarness::new();
        let (status, body): (_, HealthResponse) = send_typed(harness.router(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "healthy");
        assert_eq!(body.catalog_size, 0);
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));

        let (status, _) = send(harness.router(), get("/health/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let harness = TestHarness::with_sample_catalog();
        let (status, body) = send(harness.router(), get("/health/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["catalog_size"], 3);
    }

    #[tokio::test]
    async fn test_mood_ranks_matching_recipe_first() {
        let harness = TestHarness::with_sample_catalog();
        let (status, body) = send(
            harness.router(),
            post_json(
                "/api/recommendations",
                &json!({"user_id": "u1", "mood": "adventurous"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(body["recommendations"][0]["recipe_id"], "pad-thai");
        assert_eq!(body["cached"], false);
    }

    #[tokio::test]
    async fn test_second_request_is_cached_until_behavior() {
        let harness = TestHarness::with_sample_catalog();
        let uri = "/api/recommendations/u1?limit=2";

        let (_, first) = send(harness.router(), get(uri)).await;
        assert_eq!(first["cached"], false);
        assert_eq!(first["total"], 2);
        let (_, second) = send(harness.router(), get(uri)).await;
        assert_eq!(second["cached"], true);
        assert_eq!(first["recommendations"], second["recommendations"]);

        let (status, outcome) = send(
            harness.router(),
            post_json(
                "/api/behavior",
                &json!({
                    "user_id": "u1",
                    "event_type": "recipe_favorited",
                    "recipe_id": "beef-wellington",
                    "cuisine": "british",
                    "ingredients": ["beef", "mushrooms", "pastry"],
                    "difficulty": "hard"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["accepted"], true);

        let (_, third) = send(harness.router(), get(uri)).await;
        assert_eq!(third["cached"], false);
        assert_eq!(third["recommendations"][0]["recipe_id"], "beef-wellington");
    }

    #[tokio::test]
    async fn test_invalid_recommendation_inputs() {
        let harness = TestHarness::with_sample_catalog();

        let (status, body) = send(
            harness.router(),
            post_json("/api/recommendations", &json!({"user_id": "u1", "mood": "grumpy"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_MOOD");

        for limit in [0, 101] {
            let (status, body) = send(
                harness.router(),
                post_json("/api/recommendations", &json!({"user_id": "u1", "limit": limit})),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "limit {limit}");
            assert_eq!(body["code"], "INVALID_INPUT");
        }

        let (status, _) = send(harness.router(), get("/api/recommendations/u1?month=13")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(harness.router(), get("/api/recommendations/a:b")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_USER_ID");
    }

    #[tokio::test]
    async fn test_empty_catalog_is_empty_page() {
        let harness = TestHarness::new();
        let (status, body) = send(harness.router(), get("/api/recommendations/u1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
        assert_eq!(body["recommendations"], json!([]));
    }

    #[tokio::test]
    async fn test_unknown_event_is_dropped_not_failed() {
        let harness = TestHarness::with_sample_catalog();
        let (status, body) = send(
            harness.router(),
            post_json(
                "/api/behavior",
                &json!({"user_id": "u1", "event_type": "teleported", "recipe_id": "pad-thai"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], false);
        assert!(body["reason"].is_string());
        assert!(harness.context.service().profile("u1").is_empty());
    }

    #[tokio::test]
    async fn test_batch_counts_outcomes() {
        let harness = TestHarness::with_sample_catalog();
        let (status, body) = send(
            harness.router(),
            post_json(
                "/api/behavior/batch",
                &json!({"events": [
                    {"user_id": "u1", "event_type": "viewed", "recipe_id": "pad-thai", "cuisine": "thai"},
                    {"user_id": "u1", "event_type": "rated", "recipe_id": "pad-thai", "rating": 9},
                ]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], 1);
        assert_eq!(body["rejected"], 1);
    }

    #[tokio::test]
    async fn test_trending_and_profile_views() {
        let harness = TestHarness::with_sample_catalog();
        for _ in 0..3 {
            send(
                harness.router(),
                post_json(
                    "/api/behavior",
                    &json!({"user_id": "u2", "event_type": "saved", "recipe_id": "pad-thai", "cuisine": "thai"}),
                ),
            )
            .await;
        }

        let (status, body) = send(harness.router(), get("/api/trending?period=day&limit=5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["period"], "day");
        assert_eq!(body["recipes"][0]["recipe_id"], "pad-thai");

        let (status, _) = send(harness.router(), get("/api/trending?period=decade")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(harness.router(), get("/api/profile/u2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["event_count"], 3);
    }

    #[tokio::test]
    async fn test_seasonal_endpoints() {
        let harness = TestHarness::new();
        // Test epoch is in January
        let (status, body) = send(harness.router(), get("/api/seasonal")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["month"], 1);

        let (status, body) = send(harness.router(), get("/api/seasonal/7")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["ingredients"]
            .as_array()
            .unwrap()
            .contains(&json!("tomatoes")));

        let (status, _) = send(harness.router(), get("/api/seasonal/0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        for name in ["july", "Jul", "JULY"] {
            let (status, body) = send(harness.router(), get(&format!("/api/seasonal/{name}"))).await;
            assert_eq!(status, StatusCode::OK, "{name}");
            assert_eq!(body["month"], 7);
        }

        let (status, body) = send(harness.router(), get("/api/seasonal/smarch")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_cache_warm_endpoint() {
        let harness = TestHarness::with_sample_catalog();
        send(
            harness.router(),
            post_json(
                "/api/behavior",
                &json!({"user_id": "u3", "event_type": "viewed", "recipe_id": "pad-thai", "cuisine": "thai"}),
            ),
        )
        .await;

        let (status, body) = send(harness.router(), post_json("/api/cache/warm?users=5", &json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"], 5);
        assert_eq!(body["warmed"], 1);

        let (_, page) = send(harness.router(), get("/api/recommendations/u3")).await;
        assert_eq!(page["cached"], true);

        let (status, _) = send(harness.router(), post_json("/api/cache/warm?users=0", &json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_catalog_upsert_invalidates_everyone() {
        let harness = TestHarness::with_sample_catalog();
        send(harness.router(), get("/api/recommendations/u1")).await;
        send(harness.router(), get("/api/recommendations/u2")).await;
        assert_eq!(harness.context.service().cache_stats().size, 2);

        let (status, body) = send(
            harness.router(),
            post_json(
                "/api/catalog",
                &json!({"recipes": [{"recipe_id": "miso-soup", "cuisine": "Japanese", "tags": ["light"]}]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["added"], 1);
        assert_eq!(body["catalog_size"], 4);
        assert_eq!(body["invalidated"], 2);

        let (status, body) = send(harness.router(), get("/api/catalog/miso-soup")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cuisine"], "japanese");

        let (status, _) = send(harness.router(), delete("/api/catalog/miso-soup")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(harness.router(), get("/api/catalog/miso-soup")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cache_stats_endpoint() {
        let harness = TestHarness::with_sample_catalog();
        send(harness.router(), get("/api/recommendations/u1")).await;
        send(harness.router(), get("/api/recommendations/u1")).await;

        let (status, stats) = send(harness.router(), get("/api/cache/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["hits"], 1);
        assert_eq!(stats["misses"], 1);
        assert_eq!(stats["size"], 1);
    }
}
