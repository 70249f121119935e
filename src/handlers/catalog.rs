//! Catalog administration
//!
//! Any catalog write can change every user's ranking, so it drops all cached
//! recommendation pages.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::router::AppState;
use super::types::{CatalogUpsertRequest, CatalogUpsertResponse};
use crate::errors::{AppError, Result, ValidationErrorExt};
use crate::validation;

/// Largest upsert accepted in one request
pub const MAX_UPSERT_RECIPES: usize = 10_000;

/// POST /api/catalog
pub async fn upsert_recipes(
    State(state): State<AppState>,
    Json(req): Json<CatalogUpsertRequest>,
) -> Result<Json<CatalogUpsertResponse>> {
    if req.recipes.len() > MAX_UPSERT_RECIPES {
        return Err(AppError::InvalidInput {
            field: "recipes".to_string(),
            reason: format!("at most {MAX_UPSERT_RECIPES} recipes per request"),
        });
    }
    for recipe in &req.recipes {
        validation::validate_recipe_id(&recipe.recipe_id).map_validation_err("recipe_id")?;
    }

    let received = req.recipes.len();
    let added = state.catalog().upsert_many(req.recipes);
    let invalidated = state.service().invalidate_recommendations(None);

    tracing::info!(received, added, invalidated, "catalog upsert");

    Ok(Json(CatalogUpsertResponse {
        received,
        added,
        catalog_size: state.catalog().len(),
        invalidated,
    }))
}

/// GET /api/catalog/{recipe_id}
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(recipe_id): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    validation::validate_recipe_id(&recipe_id).map_validation_err("recipe_id")?;
    Ok(match state.catalog().get(&recipe_id) {
        Some(recipe) => {
            let body = serde_json::to_value(recipe).map_err(anyhow::Error::from)?;
            (StatusCode::OK, Json(body))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "code": "RECIPE_NOT_FOUND",
                "message": format!("Recipe not found: {recipe_id}"),
            })),
        ),
    })
}

/// DELETE /api/catalog/{recipe_id}
pub async fn delete_recipe(
    State(state): State<AppState>,
    Path(recipe_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    validation::validate_recipe_id(&recipe_id).map_validation_err("recipe_id")?;
    let removed = state.catalog().remove(&recipe_id);
    let invalidated = if removed {
        state.service().invalidate_recommendations(None)
    } else {
        0
    };

    Ok(Json(serde_json::json!({
        "removed": removed,
        "invalidated": invalidated,
    })))
}
