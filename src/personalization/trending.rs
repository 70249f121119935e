//! Time-decayed popularity counters
//!
//! Each recipe keeps fixed-width buckets aligned to the Unix epoch. A bucket
//! `age` buckets old contributes `count × 0.5^(age / half_life)`; buckets at
//! or beyond the horizon contribute nothing and are pruned when touched.
//! Buckets are stored sparsely in ascending order; an absent bucket counts 0.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use crate::clock::SharedClock;
use crate::constants::*;
use crate::errors::AppError;
use crate::metrics;

#[derive(Debug, Clone, Copy)]
pub struct TrendingConfig {
    pub bucket_secs: i64,
    pub horizon_buckets: usize,
    pub half_life_buckets: f64,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            bucket_secs: TRENDING_BUCKET_SECS,
            horizon_buckets: TRENDING_HORIZON_BUCKETS,
            half_life_buckets: TRENDING_HALF_LIFE_BUCKETS,
        }
    }
}

/// Reporting window for trending lists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendingPeriod {
    Day,
    #[default]
    Week,
    Month,
}

impl TrendingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendingPeriod::Day => "day",
            TrendingPeriod::Week => "week",
            TrendingPeriod::Month => "month",
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            TrendingPeriod::Day => 86_400,
            TrendingPeriod::Week => 7 * 86_400,
            TrendingPeriod::Month => 30 * 86_400,
        }
    }
}

impl fmt::Display for TrendingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendingPeriod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(TrendingPeriod::Day),
            "week" => Ok(TrendingPeriod::Week),
            "month" => Ok(TrendingPeriod::Month),
            other => Err(AppError::InvalidInput {
                field: "period".to_string(),
                reason: format!("unknown period '{other}' (expected day, week or month)"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingEntry {
    pub recipe_id: String,
    pub score: f64,
}

/// Materialised trending state for one scoring pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendingSnapshot {
    pub scores: HashMap<String, f64>,
    /// Highest score across all recipes at snapshot time
    pub max: f64,
}

impl TrendingSnapshot {
    pub fn score(&self, recipe_id: &str) -> f64 {
        self.scores.get(recipe_id).copied().unwrap_or(0.0)
    }

    /// Score relative to the current leader, in `[0, 1]`
    pub fn normalized(&self, recipe_id: &str) -> f64 {
        if self.max <= 0.0 {
            return 0.0;
        }
        (self.score(recipe_id) / self.max).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Default)]
struct TrendingCounter {
    /// (bucket index, count), ascending by index
    buckets: VecDeque<(i64, f64)>,
}

impl TrendingCounter {
    fn bump(&mut self, bucket: i64, amount: f64) {
        let newest = self.buckets.back().map(|&(idx, _)| idx);
        match newest {
            Some(idx) if idx >= bucket => {
                // Same bucket, or the clock moved backwards: fold into the
                // oldest bucket that covers it
                if let Some(slot) = self.buckets.iter_mut().find(|(i, _)| *i >= bucket) {
                    slot.1 += amount;
                }
            }
            _ => self.buckets.push_back((bucket, amount)),
        }
    }

    /// Drop buckets whose age reached the horizon
    fn prune(&mut self, current: i64, horizon: usize) {
        while let Some(&(idx, _)) = self.buckets.front() {
            if current - idx >= horizon as i64 {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    fn score(&self, current: i64, max_age: i64, half_life: f64) -> f64 {
        self.buckets
            .iter()
            .filter_map(|&(idx, count)| {
                let age = (current - idx).max(0);
                (age < max_age).then(|| count * bucket_weight(age, half_life))
            })
            .sum()
    }
}

#[inline]
fn bucket_weight(age: i64, half_life: f64) -> f64 {
    0.5f64.powf(age as f64 / half_life)
}

/// Popularity counters shared across all users
pub struct TrendingAggregator {
    config: TrendingConfig,
    clock: SharedClock,
    counters: Mutex<HashMap<String, TrendingCounter>>,
}

impl TrendingAggregator {
    pub fn new(config: TrendingConfig, clock: SharedClock) -> Self {
        let config = TrendingConfig {
            bucket_secs: config.bucket_secs.max(1),
            horizon_buckets: config.horizon_buckets.max(1),
            half_life_buckets: if config.half_life_buckets > 0.0 {
                config.half_life_buckets
            } else {
                TRENDING_HALF_LIFE_BUCKETS
            },
        };
        Self {
            config,
            clock,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> TrendingConfig {
        self.config
    }

    fn bucket_of(&self, at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(self.config.bucket_secs)
    }

    fn horizon(&self) -> i64 {
        self.config.horizon_buckets as i64
    }

    /// Count one interaction with `recipe_id` in the current bucket
    pub fn bump(&self, recipe_id: &str) {
        self.bump_weighted(recipe_id, 1.0);
    }

    /// Add `amount` to the current bucket. Non-positive amounts are ignored.
    pub fn bump_weighted(&self, recipe_id: &str, amount: f64) {
        if amount <= 0.0 || !amount.is_finite() {
            return;
        }
        let current = self.bucket_of(self.clock.now());
        let horizon = self.config.horizon_buckets;

        let mut counters = self.counters.lock();
        let counter = counters.entry(recipe_id.to_string()).or_default();
        counter.prune(current, horizon);
        counter.bump(current, amount);
        metrics::TRENDING_RECIPES.set(counters.len() as i64);
    }

    pub fn score(&self, recipe_id: &str) -> f64 {
        let current = self.bucket_of(self.clock.now());
        let mut counters = self.counters.lock();
        let Some(counter) = counters.get_mut(recipe_id) else {
            return 0.0;
        };
        counter.prune(current, self.config.horizon_buckets);
        if counter.buckets.is_empty() {
            counters.remove(recipe_id);
            metrics::TRENDING_RECIPES.set(counters.len() as i64);
            return 0.0;
        }
        counter.score(current, self.horizon(), self.config.half_life_buckets)
    }

    /// Highest-scoring recipes over the whole horizon
    pub fn top_n(&self, n: usize) -> Vec<TrendingEntry> {
        self.ranked(n, self.horizon())
    }

    /// Highest-scoring recipes counting only buckets inside `period`
    pub fn top_n_within(&self, n: usize, period: TrendingPeriod) -> Vec<TrendingEntry> {
        let buckets = (period.seconds() + self.config.bucket_secs - 1) / self.config.bucket_secs;
        self.ranked(n, buckets.clamp(1, self.horizon()))
    }

    fn ranked(&self, n: usize, max_age: i64) -> Vec<TrendingEntry> {
        if n == 0 {
            return Vec::new();
        }
        let current = self.bucket_of(self.clock.now());
        let mut counters = self.counters.lock();
        prune_all(&mut counters, current, self.config.horizon_buckets);

        let mut ranked: Vec<TrendingEntry> = counters
            .iter()
            .map(|(id, c)| TrendingEntry {
                recipe_id: id.clone(),
                score: c.score(current, max_age, self.config.half_life_buckets),
            })
            .filter(|e| e.score > 0.0)
            .collect();
        drop(counters);

        sort_entries(&mut ranked);
        ranked.truncate(n);
        ranked
    }

    /// Scores for `recipe_ids` plus the global maximum, taken under one lock
    pub fn snapshot<S: AsRef<str>>(&self, recipe_ids: &[S]) -> TrendingSnapshot {
        let current = self.bucket_of(self.clock.now());
        let horizon = self.horizon();
        let half_life = self.config.half_life_buckets;

        let mut counters = self.counters.lock();
        prune_all(&mut counters, current, self.config.horizon_buckets);

        let max = counters
            .values()
            .map(|c| c.score(current, horizon, half_life))
            .fold(0.0, f64::max);

        let scores = recipe_ids
            .iter()
            .filter_map(|id| {
                let id = id.as_ref();
                counters
                    .get(id)
                    .map(|c| (id.to_string(), c.score(current, horizon, half_life)))
            })
            .collect();

        TrendingSnapshot { scores, max }
    }

    /// Drop counters with no live bucket. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let current = self.bucket_of(self.clock.now());
        let mut counters = self.counters.lock();
        prune_all(&mut counters, current, self.config.horizon_buckets)
    }

    /// Recipes with at least one live bucket
    pub fn len(&self) -> usize {
        self.counters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn prune_all(counters: &mut HashMap<String, TrendingCounter>, current: i64, horizon: usize) -> usize {
    let before = counters.len();
    counters.retain(|_, c| {
        c.prune(current, horizon);
        !c.buckets.is_empty()
    });
    let removed = before - counters.len();
    if removed > 0 {
        metrics::TRENDING_RECIPES.set(counters.len() as i64);
    }
    removed
}

/// Descending score, ties by recipe id ascending
fn sort_entries(entries: &mut [TrendingEntry]) {
    entries.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.recipe_id.cmp(&b.recipe_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;
    use std::sync::Arc;

    fn aggregator() -> (TrendingAggregator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let trending = TrendingAggregator::new(
            TrendingConfig {
                bucket_secs: 3600,
                horizon_buckets: 48,
                half_life_buckets: 12.0,
            },
            clock.clone(),
        );
        (trending, clock)
    }

    #[test]
    fn test_bump_and_score() {
        let (trending, _clock) = aggregator();
        trending.bump("pasta");
        trending.bump("pasta");
        assert_eq!(trending.score("pasta"), 2.0);
        assert_eq!(trending.score("unknown"), 0.0);
    }

    #[test]
    fn test_bucket_weight_strictly_decreases() {
        let mut last = f64::INFINITY;
        for age in 0..48 {
            let w = bucket_weight(age, 12.0);
            assert!(w < last && w > 0.0);
            last = w;
        }
    }

    #[test]
    fn test_score_drops_to_zero_beyond_horizon() {
        let (trending, clock) = aggregator();
        trending.bump("pasta");
        clock.advance(Duration::hours(47));
        assert!(trending.score("pasta") > 0.0);
        clock.advance(Duration::hours(1));
        assert_eq!(trending.score("pasta"), 0.0);
        assert!(trending.is_empty(), "aged-out counter pruned on access");
    }

    #[test]
    fn test_score_never_rises_without_bumps() {
        let (trending, clock) = aggregator();
        trending.bump_weighted("pasta", 5.0);
        clock.advance(Duration::minutes(30));
        trending.bump("pasta");
        clock.advance(Duration::hours(2));
        trending.bump_weighted("pasta", 2.5);

        let mut last = trending.score("pasta");
        for hour in 1..=60 {
            clock.advance(Duration::hours(1));
            let score = trending.score("pasta");
            assert!(score >= 0.0, "negative score {score} at hour {hour}");
            assert!(score <= last, "score rose from {last} to {score} at hour {hour}");
            last = score;
        }
        assert_eq!(last, 0.0, "every bucket is past the horizon");
    }

    #[test]
    fn test_windowed_ranking_never_rises_without_bumps() {
        let (trending, clock) = aggregator();
        trending.bump_weighted("a", 3.0);
        trending.bump("b");

        let total = |entries: Vec<TrendingEntry>| -> f64 { entries.iter().map(|e| e.score).sum() };
        let mut last = total(trending.top_n_within(10, TrendingPeriod::Day));
        for _ in 0..30 {
            clock.advance(Duration::hours(1));
            let now = total(trending.top_n_within(10, TrendingPeriod::Day));
            assert!(now >= 0.0 && now <= last);
            last = now;
        }
    }

    #[test]
    fn test_top_n_tie_breaks_by_recipe_id() {
        let (trending, _clock) = aggregator();
        trending.bump("b");
        trending.bump("a");
        trending.bump_weighted("c", 3.0);
        let top = trending.top_n(3);
        let ids: Vec<&str> = top.iter().map(|e| e.recipe_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_top_n_within_period_ignores_older_buckets() {
        let (trending, clock) = aggregator();
        trending.bump_weighted("old", 10.0);
        clock.advance(Duration::hours(30));
        trending.bump("fresh");

        let day = trending.top_n_within(10, TrendingPeriod::Day);
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].recipe_id, "fresh");

        let all = trending.top_n(10);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_snapshot_carries_global_max() {
        let (trending, _clock) = aggregator();
        trending.bump_weighted("leader", 4.0);
        trending.bump("other");
        let snap = trending.snapshot(&["other", "missing"][..]);
        assert_eq!(snap.max, 4.0);
        assert_eq!(snap.normalized("other"), 0.25);
        assert_eq!(snap.normalized("missing"), 0.0);
    }

    #[test]
    fn test_non_positive_bump_ignored() {
        let (trending, _clock) = aggregator();
        trending.bump_weighted("x", 0.0);
        trending.bump_weighted("x", -1.0);
        assert!(trending.is_empty());
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("DAY".parse::<TrendingPeriod>().unwrap(), TrendingPeriod::Day);
        assert!("year".parse::<TrendingPeriod>().is_err());
    }
}
