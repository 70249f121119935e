//! Behavior events
//!
//! `BehaviorAction` is closed: each event type carries exactly the fields it
//! needs (only `rated` carries a rating), and unknown types are rejected when
//! parsed instead of flowing through as free-form strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::mood::Mood;
use crate::errors::{AppError, Result};

/// Recipe difficulty
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(AppError::InvalidInput {
                field: "difficulty".to_string(),
                reason: format!("unknown difficulty '{other}' (expected easy, medium or hard)"),
            }),
        }
    }
}

/// Star rating in `1..=5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub fn new(stars: u8) -> Result<Self> {
        if (1..=5).contains(&stars) {
            Ok(Self(stars))
        } else {
            Err(AppError::InvalidEvent(format!(
                "rating must be between 1 and 5, got {stars}"
            )))
        }
    }

    pub fn stars(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self> {
        Rating::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// Event type names accepted at the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Viewed,
    Generated,
    Saved,
    Favorited,
    Shared,
    Rated,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Viewed => "viewed",
            EventType::Generated => "generated",
            EventType::Saved => "saved",
            EventType::Favorited => "favorited",
            EventType::Shared => "shared",
            EventType::Rated => "rated",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = AppError;

    /// Accepts the canonical names and the legacy `recipe_*` interaction names
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        let name = normalized.strip_prefix("recipe_").unwrap_or(&normalized);
        match name {
            "viewed" | "view" => Ok(EventType::Viewed),
            "generated" | "generate" => Ok(EventType::Generated),
            "saved" | "save" => Ok(EventType::Saved),
            "favorited" | "favourited" | "favorite" => Ok(EventType::Favorited),
            "shared" | "share" => Ok(EventType::Shared),
            "rated" | "rate" => Ok(EventType::Rated),
            "" => Err(AppError::InvalidEvent("event_type cannot be empty".to_string())),
            _ => Err(AppError::InvalidEvent(format!("unknown event type '{s}'"))),
        }
    }
}

/// What the user did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum BehaviorAction {
    Viewed,
    Generated,
    Saved,
    Favorited,
    Shared,
    Rated { rating: Rating },
}

impl BehaviorAction {
    /// Build an action from its wire parts. `rating` is required for `rated`
    /// and ignored otherwise.
    pub fn from_parts(event_type: &str, rating: Option<u8>) -> Result<Self> {
        let action = match event_type.parse::<EventType>()? {
            EventType::Viewed => BehaviorAction::Viewed,
            EventType::Generated => BehaviorAction::Generated,
            EventType::Saved => BehaviorAction::Saved,
            EventType::Favorited => BehaviorAction::Favorited,
            EventType::Shared => BehaviorAction::Shared,
            EventType::Rated => {
                let stars = rating.ok_or_else(|| {
                    AppError::InvalidEvent("rated events require a rating".to_string())
                })?;
                BehaviorAction::Rated {
                    rating: Rating::new(stars)?,
                }
            }
        };
        Ok(action)
    }

    pub fn event_type(&self) -> EventType {
        match self {
            BehaviorAction::Viewed => EventType::Viewed,
            BehaviorAction::Generated => EventType::Generated,
            BehaviorAction::Saved => EventType::Saved,
            BehaviorAction::Favorited => EventType::Favorited,
            BehaviorAction::Shared => EventType::Shared,
            BehaviorAction::Rated { .. } => EventType::Rated,
        }
    }

    /// Strong signals mark the affinities they touch as potentiated
    pub fn is_strong(&self) -> bool {
        match self {
            BehaviorAction::Saved | BehaviorAction::Favorited => true,
            BehaviorAction::Rated { rating } => {
                rating.stars() >= crate::constants::STRONG_RATING_THRESHOLD
            }
            _ => false,
        }
    }
}

/// The recipe attributes the profile and scorer care about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeAttributes {
    pub recipe_id: String,
    pub cuisine: String,
    #[serde(default)]
    pub ingredients: BTreeSet<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl RecipeAttributes {
    pub fn new(recipe_id: impl Into<String>, cuisine: impl Into<String>) -> Self {
        Self {
            recipe_id: recipe_id.into(),
            cuisine: cuisine.into(),
            ingredients: BTreeSet::new(),
            difficulty: Difficulty::default(),
            tags: BTreeSet::new(),
        }
        .normalized()
    }

    pub fn with_ingredients<I, S>(mut self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ingredients
            .extend(ingredients.into_iter().filter_map(|i| normalize_term(i.as_ref())));
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags
            .extend(tags.into_iter().filter_map(|t| normalize_term(t.as_ref())));
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Trim and lowercase every descriptive string; the recipe id keeps its
    /// case and only loses surrounding whitespace
    pub fn normalized(self) -> Self {
        Self {
            recipe_id: self.recipe_id.trim().to_string(),
            cuisine: self.cuisine.trim().to_lowercase(),
            ingredients: self
                .ingredients
                .iter()
                .filter_map(|i| normalize_term(i))
                .collect(),
            difficulty: self.difficulty,
            tags: self.tags.iter().filter_map(|t| normalize_term(t)).collect(),
        }
    }
}

fn normalize_term(raw: &str) -> Option<String> {
    let term = raw.trim().to_lowercase();
    if term.is_empty() {
        None
    } else {
        Some(term)
    }
}

/// One recorded user action. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub user_id: String,
    #[serde(flatten)]
    pub action: BehaviorAction,
    pub recipe: RecipeAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    pub timestamp: DateTime<Utc>,
}

impl BehaviorEvent {
    pub fn new(
        user_id: impl Into<String>,
        action: BehaviorAction,
        recipe: RecipeAttributes,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into().trim().to_string(),
            action,
            recipe: recipe.normalized(),
            mood: None,
            timestamp,
        }
    }

    pub fn with_mood(mut self, mood: Option<Mood>) -> Self {
        self.mood = mood;
        self
    }

    pub fn event_type(&self) -> EventType {
        self.action.event_type()
    }

    /// Structural checks shared by the tracker and the service
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(AppError::InvalidEvent("user_id cannot be empty".to_string()));
        }
        if self.recipe.recipe_id.trim().is_empty() {
            return Err(AppError::InvalidEvent("recipe_id cannot be empty".to_string()));
        }
        Ok(())
    }
}
