//! Read-only views: trending, profiles, seasonal produce, cache stats

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};

use super::router::AppState;
use super::types::{parse_limit, parse_month, TrendingParams, TrendingResponse};
use crate::cache::CacheStats;
use crate::constants::{DEFAULT_TRENDING_LIMIT, DEFAULT_WARM_USERS, MAX_WARM_USERS};
use crate::errors::{AppError, Result};
use crate::personalization::{
    seasonal::SeasonalSuggestions, MaintenanceReport, SeasonalContext, TrendingPeriod,
    UserProfile,
};
use crate::validation;

/// GET /api/trending?period=day|week|month&limit=N
pub async fn trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> Result<Json<TrendingResponse>> {
    let limit = parse_limit(params.limit, DEFAULT_TRENDING_LIMIT)?;
    let period = match params.period.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(p) => Some(p.parse::<TrendingPeriod>()?),
    };

    Ok(Json(TrendingResponse {
        period: period.map(|p| p.as_str()).unwrap_or("all"),
        recipes: state.service().trending(period, limit),
    }))
}

/// GET /api/profile/{user_id}
///
/// Unknown users get the zero-valued profile, not a 404.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>> {
    validation::validate_user_id(&user_id).map_err(|e| AppError::InvalidUserId(e.to_string()))?;
    Ok(Json(state.service().profile(&user_id)))
}

#[derive(Debug, Default, Deserialize)]
pub struct SeasonalParams {
    pub month: Option<i64>,
}

/// GET /api/seasonal (current month)
pub async fn seasonal_current(
    State(state): State<AppState>,
    Query(params): Query<SeasonalParams>,
) -> Result<Json<SeasonalSuggestions>> {
    let month = parse_month(params.month)?;
    Ok(Json(state.service().seasonal_suggestions(month)?))
}

/// GET /api/seasonal/{month}
///
/// `month` is a number (`3`) or a name (`march`, `Mar`).
pub async fn seasonal_for_month(
    State(state): State<AppState>,
    Path(month): Path<String>,
) -> Result<Json<SeasonalSuggestions>> {
    let month = match month.trim().parse::<i64>() {
        Ok(number) => parse_month(Some(number))?,
        Err(_) => Some(SeasonalContext::from_name(&month)?.bucket()),
    };
    Ok(Json(state.service().seasonal_suggestions(month)?))
}

/// GET /api/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.service().cache_stats())
}

#[derive(Debug, Default, Deserialize)]
pub struct WarmParams {
    pub users: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WarmResponse {
    pub users: usize,
    pub warmed: usize,
}

/// POST /api/cache/warm?users=N - precompute pages for the most active users
pub async fn warm_cache(
    State(state): State<AppState>,
    Query(params): Query<WarmParams>,
) -> Result<Json<WarmResponse>> {
    let users = match params.users {
        None => DEFAULT_WARM_USERS,
        Some(n) if (1..=MAX_WARM_USERS as i64).contains(&n) => n as usize,
        Some(n) => {
            return Err(AppError::InvalidInput {
                field: "users".to_string(),
                reason: format!("must be between 1 and {MAX_WARM_USERS}, got {n}"),
            })
        }
    };
    let warmed = tokio::task::spawn_blocking(move || state.service().warm_recommendations(users))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Blocking task panicked: {e}")))?;
    Ok(Json(WarmResponse { users, warmed }))
}

/// POST /api/maintenance - run the periodic sweep now
pub async fn run_maintenance(State(state): State<AppState>) -> Result<Json<MaintenanceReport>> {
    let report = tokio::task::spawn_blocking(move || state.service().run_maintenance())
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Blocking task panicked: {e}")))?;
    Ok(Json(report))
}
