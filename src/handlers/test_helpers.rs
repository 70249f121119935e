//! Shared test utilities for handler unit tests.
//!
//! Provides a [`TestHarness`] around a fresh [`AppContext`] driven by a
//! [`ManualClock`], plus helpers for building requests and reading JSON
//! response bodies.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use tower::ServiceExt; // for oneshot()

use super::router::build_router;
use super::state::AppContext;
use crate::clock::ManualClock;
use crate::config::ServerConfig;
use crate::personalization::{Difficulty, RecipeAttributes};

/// A self-contained server state with its own clock.
pub struct TestHarness {
    pub context: Arc<AppContext>,
    pub clock: Arc<ManualClock>,
}

impl TestHarness {
    /// Empty catalog, default config, clock at the fixed test epoch.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let clock = Arc::new(ManualClock::at_epoch());
        let context = Arc::new(AppContext::new(config, clock.clone()));
        Self { context, clock }
    }

    /// Harness preloaded with [`sample_recipes`].
    pub fn with_sample_catalog() -> Self {
        let harness = Self::new();
        harness.context.catalog().upsert_many(sample_recipes());
        harness
    }

    /// Get a clone of the shared state (what handlers receive via `State(..)`).
    pub fn state(&self) -> Arc<AppContext> {
        self.context.clone()
    }

    /// Build the full application router.
    pub fn router(&self) -> Router {
        build_router(self.context.clone())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Three recipes spanning cuisines, difficulties and moods.
pub fn sample_recipes() -> Vec<RecipeAttributes> {
    vec![
        RecipeAttributes::new("pasta-pomodoro", "italian")
            .with_ingredients(["tomatoes", "basil", "pasta"])
            .with_tags(["vegetarian", "comfort", "quick"])
            .with_difficulty(Difficulty::Easy),
        RecipeAttributes::new("pad-thai", "thai")
            .with_ingredients(["noodles", "peanuts", "lime"])
            .with_tags(["spicy", "exotic"])
            .with_difficulty(Difficulty::Medium),
        RecipeAttributes::new("beef-wellington", "british")
            .with_ingredients(["beef", "mushrooms", "pastry"])
            .with_tags(["rich", "decadent"])
            .with_difficulty(Difficulty::Hard),
    ]
}

// ---------- Request builders ----------

/// Build a GET request to `uri`.
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Build a POST request to `uri` with a JSON body.
pub fn post_json<T: serde::Serialize>(uri: &str, body: &T) -> Request<Body> {
    let json = serde_json::to_string(body).unwrap();
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json))
        .unwrap()
}

/// Build a DELETE request to `uri`.
pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// ---------- Response helpers ----------

/// Send a request through the router and return (status, JSON body).
pub async fn send(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body_bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&body_bytes).to_string())
        })
    };
    (status, json)
}

/// Send a request and deserialize the body into `T`.
pub async fn send_typed<T: DeserializeOwned>(app: Router, req: Request<Body>) -> (StatusCode, T) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body_bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value: T = serde_json::from_slice(&body_bytes).unwrap_or_else(|e| {
        panic!(
            "failed to deserialize response: {e}\nbody: {}",
            String::from_utf8_lossy(&body_bytes)
        )
    });
    (status, value)
}
