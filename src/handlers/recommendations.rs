//! Recommendation handlers
//!
//! Validation happens on the async side; scoring runs on the blocking pool
//! under the per-request deadline from [`AppContext::scoring_deadline`].
//!
//! [`AppContext::scoring_deadline`]: super::state::AppContext::scoring_deadline

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;

use super::router::AppState;
use super::types::{
    RecommendationItem, RecommendationParams, RecommendationRequest, RecommendationResponse,
};
use crate::constants::DEFAULT_RECOMMENDATION_LIMIT;
use crate::errors::{AppError, Result};
use crate::personalization::RecommendationQuery;
use crate::validation;

async fn recommend(state: AppState, query: RecommendationQuery) -> Result<RecommendationResponse> {
    let cancel = state.scoring_deadline();
    let user_id = query.user_id.clone();

    let page = tokio::task::spawn_blocking(move || {
        state.service().get_recommendations(&query, &cancel)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Blocking task panicked: {e}")))??;

    let recommendations: Vec<RecommendationItem> =
        page.recommendations.iter().map(RecommendationItem::from).collect();

    Ok(RecommendationResponse {
        total: recommendations.len(),
        user_id,
        recommendations,
        cached: page.cached,
    })
}

/// POST /api/recommendations
pub async fn get_recommendations(
    State(state): State<AppState>,
    Json(req): Json<RecommendationRequest>,
) -> Result<Json<RecommendationResponse>> {
    let query = req.into_query(DEFAULT_RECOMMENDATION_LIMIT)?;
    Ok(Json(recommend(state, query).await?))
}

/// GET /api/recommendations/{user_id}
pub async fn get_recommendations_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<RecommendationParams>,
) -> Result<Json<RecommendationResponse>> {
    let query = params
        .into_request(user_id)
        .into_query(DEFAULT_RECOMMENDATION_LIMIT)?;
    Ok(Json(recommend(state, query).await?))
}

#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    /// Omit to drop every user's cached pages
    #[serde(default)]
    pub user_id: Option<String>,
}

/// POST /api/recommendations/invalidate
pub async fn invalidate_recommendations(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<serde_json::Value>> {
    let user_id = req.user_id.map(|u| u.trim().to_string());
    if let Some(user) = user_id.as_deref() {
        validation::validate_user_id(user).map_err(|e| AppError::InvalidUserId(e.to_string()))?;
    }

    let removed = state
        .service()
        .invalidate_recommendations(user_id.as_deref());

    Ok(Json(serde_json::json!({
        "invalidated": removed,
        "user_id": user_id,
    })))
}
