//! API Request/Response Types
//!
//! Wire shapes for the recommendation server. Requests carry loosely typed
//! fields (strings, signed integers) so that bad values reach
//! [`crate::validation`] and come back as structured 400s instead of serde
//! rejections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::{AppError, Result, ValidationErrorExt};
use crate::personalization::{
    BehaviorAction, BehaviorEvent, Difficulty, Mood, Recommendation, RecipeAttributes,
    RecommendationQuery, TrendingEntry,
};
use crate::validation;

// =============================================================================
// HEALTH
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_profiles: usize,
    pub trending_recipes: usize,
    pub catalog_size: usize,
    pub cache_size: usize,
    pub cache_capacity: usize,
}

// =============================================================================
// RECOMMENDATIONS
// =============================================================================

/// Body of `POST /api/recommendations`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub month: Option<i64>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
}

/// Query string of `GET /api/recommendations/{user_id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationParams {
    pub mood: Option<String>,
    pub limit: Option<i64>,
    pub month: Option<i64>,
    pub cuisine: Option<String>,
    /// Comma-separated
    pub dietary_tags: Option<String>,
}

impl RecommendationParams {
    pub fn into_request(self, user_id: String) -> RecommendationRequest {
        RecommendationRequest {
            user_id,
            mood: self.mood,
            limit: self.limit,
            month: self.month,
            cuisine: self.cuisine,
            dietary_tags: self
                .dietary_tags
                .map(|tags| tags.split(',').map(|t| t.trim().to_string()).collect())
                .unwrap_or_default(),
        }
    }
}

/// Parse an optional mood name. Blank means unset.
pub fn parse_mood(raw: Option<&str>) -> Result<Option<Mood>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) => name.parse::<Mood>().map(Some),
    }
}

pub fn parse_limit(raw: Option<i64>, default: usize) -> Result<usize> {
    match raw {
        None => Ok(default),
        Some(limit) => validation::validate_limit(limit).map_validation_err("limit"),
    }
}

pub fn parse_month(raw: Option<i64>) -> Result<Option<u32>> {
    match raw {
        None => Ok(None),
        Some(m) => {
            let month = u32::try_from(m).unwrap_or(0);
            validation::validate_month(month)
                .map(Some)
                .map_validation_err("month")
        }
    }
}

impl RecommendationRequest {
    /// Boundary validation: everything the core assumes is checked here
    pub fn into_query(self, default_limit: usize) -> Result<RecommendationQuery> {
        let user_id = self.user_id.trim().to_string();
        validation::validate_user_id(&user_id)
            .map_err(|e| AppError::InvalidUserId(e.to_string()))?;

        let mood = parse_mood(self.mood.as_deref())?;
        let limit = parse_limit(self.limit, default_limit)?;
        let month = parse_month(self.month)?;

        let mut dietary_tags = BTreeSet::new();
        for tag in self.dietary_tags.iter().filter(|t| !t.trim().is_empty()) {
            validation::validate_tag(tag).map_validation_err("dietary_tags")?;
            dietary_tags.insert(tag.trim().to_lowercase());
        }

        let cuisine = self
            .cuisine
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());

        Ok(RecommendationQuery {
            user_id,
            mood,
            limit,
            month,
            cuisine,
            dietary_tags,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: String,
    pub recommendations: Vec<RecommendationItem>,
    pub total: usize,
    pub cached: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub recipe_id: String,
    pub score: f64,
    pub explanation: Vec<ExplanationItem>,
    pub cuisine: String,
    pub difficulty: Difficulty,
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExplanationItem {
    pub factor: String,
    pub contribution: f64,
}

impl From<&Recommendation> for RecommendationItem {
    fn from(r: &Recommendation) -> Self {
        Self {
            recipe_id: r.recipe_id.clone(),
            score: r.score,
            explanation: r
                .explanation
                .iter()
                .map(|c| ExplanationItem {
                    factor: c.factor.as_str().to_string(),
                    contribution: c.contribution,
                })
                .collect(),
            cuisine: r.cuisine.clone(),
            difficulty: r.difficulty,
            tags: r.tags.clone(),
        }
    }
}

// =============================================================================
// BEHAVIOR
// =============================================================================

/// Body of `POST /api/behavior`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BehaviorRequest {
    pub user_id: String,
    pub event_type: String,
    pub recipe_id: String,
    #[serde(default)]
    pub cuisine: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl BehaviorRequest {
    /// Build the typed event. Any failure becomes `InvalidEvent` so the
    /// caller can answer `{accepted: false}`.
    pub fn into_event(self, now: DateTime<Utc>) -> Result<BehaviorEvent> {
        let invalid = |e: AppError| AppError::InvalidEvent(e.message());

        validation::validate_user_id(self.user_id.trim())
            .map_err(|e| AppError::InvalidEvent(e.to_string()))?;
        validation::validate_recipe_id(&self.recipe_id)
            .map_err(|e| AppError::InvalidEvent(e.to_string()))?;

        let action = BehaviorAction::from_parts(&self.event_type, self.rating)?;
        let difficulty = match self.difficulty.as_deref().map(str::trim) {
            None | Some("") => Difficulty::default(),
            Some(d) => d.parse::<Difficulty>().map_err(invalid)?,
        };
        let mood = parse_mood(self.mood.as_deref()).map_err(invalid)?;

        let recipe = RecipeAttributes::new(self.recipe_id, self.cuisine)
            .with_ingredients(self.ingredients)
            .with_tags(self.tags)
            .with_difficulty(difficulty);

        Ok(BehaviorEvent::new(self.user_id, action, recipe, self.timestamp.unwrap_or(now))
            .with_mood(mood))
    }
}

// =============================================================================
// TRENDING / PROFILE / CATALOG
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrendingParams {
    pub period: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TrendingResponse {
    /// `all` when no period was requested
    pub period: &'static str,
    pub recipes: Vec<TrendingEntry>,
}

/// Body of `POST /api/catalog`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogUpsertRequest {
    pub recipes: Vec<RecipeAttributes>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogUpsertResponse {
    pub received: usize,
    pub added: usize,
    pub catalog_size: usize,
    pub invalidated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(user: &str) -> RecommendationRequest {
        RecommendationRequest {
            user_id: user.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_into_query_defaults() {
        let q = request("u1").into_query(10).unwrap();
        assert_eq!(q.limit, 10);
        assert!(q.mood.is_none());
        assert!(q.month.is_none());
    }

    #[test]
    fn test_into_query_rejects_bad_input() {
        let bad_mood = RecommendationRequest {
            mood: Some("grumpy".to_string()),
            ..request("u1")
        };
        assert_eq!(bad_mood.into_query(10).unwrap_err().code(), "INVALID_MOOD");

        let negative = RecommendationRequest {
            limit: Some(-1),
            ..request("u1")
        };
        assert_eq!(negative.into_query(10).unwrap_err().code(), "INVALID_INPUT");

        let month = RecommendationRequest {
            month: Some(13),
            ..request("u1")
        };
        assert!(month.into_query(10).is_err());

        assert_eq!(request("bad:user").into_query(10).unwrap_err().code(), "INVALID_USER_ID");
    }

    #[test]
    fn test_blank_mood_is_unset() {
        assert_eq!(parse_mood(Some("  ")).unwrap(), None);
        assert_eq!(parse_mood(Some("quick")).unwrap(), Some(Mood::Quick));
    }

    #[test]
    fn test_into_event() {
        let req = BehaviorRequest {
            user_id: "u1".to_string(),
            event_type: "recipe_favorited".to_string(),
            recipe_id: "r1".to_string(),
            cuisine: "Italian".to_string(),
            ingredients: vec!["Basil".to_string()],
            difficulty: Some("easy".to_string()),
            mood: Some("comfort".to_string()),
            ..Default::default()
        };
        let event = req.into_event(Utc::now()).unwrap();
        assert_eq!(event.action, BehaviorAction::Favorited);
        assert_eq!(event.recipe.cuisine, "italian");
        assert_eq!(event.recipe.difficulty, Difficulty::Easy);
        assert_eq!(event.mood, Some(Mood::Comfort));
    }

    #[test]
    fn test_into_event_failures_are_invalid_event() {
        let unknown = BehaviorRequest {
            user_id: "u1".to_string(),
            event_type: "teleported".to_string(),
            recipe_id: "r1".to_string(),
            ..Default::default()
        };
        assert_eq!(unknown.into_event(Utc::now()).unwrap_err().code(), "INVALID_EVENT");

        let bad_difficulty = BehaviorRequest {
            user_id: "u1".to_string(),
            event_type: "viewed".to_string(),
            recipe_id: "r1".to_string(),
            difficulty: Some("tricky".to_string()),
            ..Default::default()
        };
        assert_eq!(bad_difficulty.into_event(Utc::now()).unwrap_err().code(), "INVALID_EVENT");
    }
}
