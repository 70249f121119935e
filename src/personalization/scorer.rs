//! Multi-factor recommendation scoring
//!
//! Each candidate gets six independent factors, each in `[0, 1]`:
//!
//! | factor     | value                                                       |
//! |------------|-------------------------------------------------------------|
//! | cuisine    | cuisine affinity / strongest cuisine affinity               |
//! | ingredient | mean normalised affinity over the candidate's ingredients    |
//! | difficulty | difficulty affinity / strongest difficulty affinity          |
//! | trending   | trending score / current trending leader                    |
//! | seasonal   | 1 if any ingredient is in season, else 0                     |
//! | mood       | 1 if no mood requested or tags intersect, else 0             |
//!
//! The final score is `Σ weight_f × factor_f`. Scoring reads only the
//! snapshots it is handed, so the same inputs always give the same ranking.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::events::RecipeAttributes;
use super::mood::Mood;
use super::profile::UserProfile;
use super::seasonal::SeasonalContext;
use super::trending::TrendingSnapshot;
use crate::constants::*;
use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Factor {
    Cuisine,
    Ingredient,
    Difficulty,
    Trending,
    Seasonal,
    Mood,
}

impl Factor {
    pub const ALL: [Factor; 6] = [
        Factor::Cuisine,
        Factor::Ingredient,
        Factor::Difficulty,
        Factor::Trending,
        Factor::Seasonal,
        Factor::Mood,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Factor::Cuisine => "cuisine",
            Factor::Ingredient => "ingredient",
            Factor::Difficulty => "difficulty",
            Factor::Trending => "trending",
            Factor::Seasonal => "seasonal",
            Factor::Mood => "mood",
        }
    }
}

/// Per-factor weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub cuisine: f64,
    pub ingredient: f64,
    pub difficulty: f64,
    pub trending: f64,
    pub seasonal: f64,
    pub mood: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            cuisine: WEIGHT_CUISINE,
            ingredient: WEIGHT_INGREDIENT,
            difficulty: WEIGHT_DIFFICULTY,
            trending: WEIGHT_TRENDING,
            seasonal: WEIGHT_SEASONAL,
            mood: WEIGHT_MOOD,
        }
    }
}

impl FactorWeights {
    pub fn weight(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Cuisine => self.cuisine,
            Factor::Ingredient => self.ingredient,
            Factor::Difficulty => self.difficulty,
            Factor::Trending => self.trending,
            Factor::Seasonal => self.seasonal,
            Factor::Mood => self.mood,
        }
    }

    fn weight_mut(&mut self, factor: Factor) -> &mut f64 {
        match factor {
            Factor::Cuisine => &mut self.cuisine,
            Factor::Ingredient => &mut self.ingredient,
            Factor::Difficulty => &mut self.difficulty,
            Factor::Trending => &mut self.trending,
            Factor::Seasonal => &mut self.seasonal,
            Factor::Mood => &mut self.mood,
        }
    }

    /// Apply `name=value` overrides separated by commas, e.g.
    /// `"cuisine=2.5,mood=1"`. Weights must be finite and non-negative.
    pub fn parse_overrides(raw: &str, base: Self) -> anyhow::Result<Self> {
        let mut weights = base;
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("expected name=value, got '{pair}'"))?;
            let name = name.trim().to_lowercase();
            let factor = Factor::ALL
                .iter()
                .copied()
                .find(|f| f.as_str() == name)
                .ok_or_else(|| anyhow::anyhow!("unknown factor '{name}'"))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid weight for {name}: {e}"))?;
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("weight for {name} must be a non-negative number, got {value}");
            }
            *weights.weight_mut(factor) = value;
        }
        Ok(weights)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub factor: Factor,
    pub contribution: f64,
}

/// One scored candidate. Built for a single request, never stored by the scorer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationCandidate {
    pub recipe_id: String,
    pub attributes: RecipeAttributes,
    pub score: f64,
    pub explanation: Vec<FactorContribution>,
}

/// Caller-side deadline and abort flag, checked between candidates
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    deadline: Option<Instant>,
    aborted: Option<Arc<AtomicBool>>,
}

impl CancelSignal {
    /// Never trips
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            aborted: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Trip when `flag` becomes true
    pub fn with_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.aborted = Some(flag);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        if let Some(flag) = &self.aborted {
            if flag.load(Ordering::Relaxed) {
                return true;
            }
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Everything one scoring pass reads
pub struct ScoringContext<'a> {
    pub profile: &'a UserProfile,
    pub trending: &'a TrendingSnapshot,
    pub seasonal: &'a SeasonalContext,
    pub mood: Option<Mood>,
}

#[derive(Debug, Clone, Default)]
pub struct RecommendationScorer {
    weights: FactorWeights,
}

impl RecommendationScorer {
    pub fn new(weights: FactorWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> FactorWeights {
        self.weights
    }

    /// Factor values for one candidate, in [`Factor::ALL`] order
    pub fn factors(&self, ctx: &ScoringContext<'_>, candidate: &RecipeAttributes) -> [f64; 6] {
        let profile = ctx.profile;

        let cuisine = profile.cuisine_affinity.normalized(candidate.cuisine.as_str());

        let ingredient = if candidate.ingredients.is_empty() {
            0.0
        } else {
            let total: f64 = candidate
                .ingredients
                .iter()
                .map(|i| profile.ingredient_affinity.normalized(i.as_str()))
                .sum();
            total / candidate.ingredients.len() as f64
        };

        let difficulty = profile.difficulty_affinity.normalized(&candidate.difficulty);

        let trending = ctx.trending.normalized(&candidate.recipe_id);

        let seasonal = if candidate
            .ingredients
            .iter()
            .any(|i| ctx.seasonal.is_in_season(i))
        {
            1.0
        } else {
            0.0
        };

        let mood = match ctx.mood {
            None => 1.0,
            Some(m) if m.matches(&candidate.tags) => 1.0,
            Some(_) => 0.0,
        };

        [cuisine, ingredient, difficulty, trending, seasonal, mood]
    }

    /// Rank `candidates`, highest score first, ties by recipe id ascending
    ///
    /// Returns `Cancelled` if `cancel` trips before every candidate is scored;
    /// a partial ranking is never returned.
    pub fn score(
        &self,
        ctx: &ScoringContext<'_>,
        candidates: &[RecipeAttributes],
        cancel: &CancelSignal,
    ) -> Result<Vec<RecommendationCandidate>> {
        let mut scored = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            cancel.check()?;

            let factors = self.factors(ctx, candidate);
            let mut score = 0.0;
            let mut explanation = Vec::new();
            for (factor, value) in Factor::ALL.iter().zip(factors) {
                let contribution = self.weights.weight(*factor) * value;
                score += contribution;
                // The uniform baseline for "no mood requested" explains nothing
                let baseline = *factor == Factor::Mood && ctx.mood.is_none();
                if contribution != 0.0 && !baseline {
                    explanation.push(FactorContribution {
                        factor: *factor,
                        contribution,
                    });
                }
            }

            scored.push(RecommendationCandidate {
                recipe_id: candidate.recipe_id.clone(),
                attributes: candidate.clone(),
                score,
                explanation,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.recipe_id.cmp(&b.recipe_id))
        });
        Ok(scored)
    }
}
