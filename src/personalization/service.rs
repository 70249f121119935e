//! Personalization façade
//!
//! Composes the response cache, behavior tracker, trending aggregator and
//! scorer behind the two operations the request boundary needs:
//! [`PersonalizationService::get_recommendations`] and
//! [`PersonalizationService::record_behavior`]. Every collaborator is owned by
//! the service instance; two services in one process share nothing.

use chrono::Duration;
use serde::Serialize;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::catalog::{CandidateFilter, CandidateSupplier};
use super::events::{BehaviorAction, BehaviorEvent, Difficulty};
use super::mood::Mood;
use super::profile::{BehaviorTracker, TrackerConfig, UserProfile};
use super::scorer::{CancelSignal, FactorContribution, FactorWeights, RecommendationScorer, ScoringContext};
use super::seasonal::{SeasonalContext, SeasonalSuggestions};
use super::sink::BehaviorSink;
use super::trending::{TrendingAggregator, TrendingConfig, TrendingEntry, TrendingPeriod};
use crate::cache::{CacheKeyBuilder, CacheStats, CacheStore};
use crate::clock::SharedClock;
use crate::config::ServerConfig;
use crate::constants::*;
use crate::errors::{AppError, Result};
use crate::metrics;

const RECOMMENDATIONS_OP: &str = "recommendations";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub cache_capacity: usize,
    pub default_ttl: Duration,
    pub recommendation_ttl: Duration,
    pub tracker: TrackerConfig,
    pub trending: TrendingConfig,
    pub weights: FactorWeights,
    /// Users warmed per maintenance sweep, 0 disables warming
    pub warm_users: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            default_ttl: Duration::seconds(DEFAULT_CACHE_TTL_SECS),
            recommendation_ttl: Duration::seconds(RECOMMENDATION_CACHE_TTL_SECS),
            tracker: TrackerConfig::default(),
            trending: TrendingConfig::default(),
            weights: FactorWeights::default(),
            warm_users: DEFAULT_WARM_USERS,
        }
    }
}

impl From<&ServerConfig> for ServiceConfig {
    fn from(config: &ServerConfig) -> Self {
        let p = &config.personalization;
        Self {
            cache_capacity: config.cache.capacity,
            default_ttl: Duration::seconds(config.cache.default_ttl_secs),
            recommendation_ttl: Duration::seconds(config.cache.recommendation_ttl_secs),
            tracker: TrackerConfig {
                half_life_hours: p.profile_half_life_hours,
                idle_horizon: Duration::hours(p.idle_horizon_hours),
                max_profiles: p.max_profiles,
                recent_event_window: p.recent_event_window,
                ..TrackerConfig::default()
            },
            trending: TrendingConfig {
                bucket_secs: p.trending_bucket_secs,
                horizon_buckets: p.trending_horizon_buckets,
                half_life_buckets: p.trending_half_life_buckets,
            },
            weights: p.weights,
            warm_users: DEFAULT_WARM_USERS,
        }
    }
}

/// Parameters of one recommendation request, already validated
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationQuery {
    pub user_id: String,
    pub mood: Option<Mood>,
    pub limit: usize,
    /// 1-based month; `None` means the clock's current month
    pub month: Option<u32>,
    pub cuisine: Option<String>,
    pub dietary_tags: BTreeSet<String>,
}

impl RecommendationQuery {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            mood: None,
            limit: DEFAULT_RECOMMENDATION_LIMIT,
            month: None,
            cuisine: None,
            dietary_tags: BTreeSet::new(),
        }
    }

    pub fn with_mood(mut self, mood: Option<Mood>) -> Self {
        self.mood = mood;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_month(mut self, month: Option<u32>) -> Self {
        self.month = month;
        self
    }

    fn filter(&self) -> CandidateFilter {
        CandidateFilter::new(self.cuisine.as_deref(), self.dietary_tags.iter().cloned())
    }

    fn cache_key(&self, filter: &CandidateFilter, seasonal: &SeasonalContext) -> String {
        let diet = filter
            .dietary_tags
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(",");
        CacheKeyBuilder::new(RECOMMENDATIONS_OP)
            .scope(&self.user_id)
            .param("limit", self.limit)
            .param("month", seasonal.bucket())
            .param_opt("mood", self.mood)
            .param_opt("cuisine", filter.cuisine.as_deref())
            .param_opt("diet", (!diet.is_empty()).then_some(diet))
            .build()
    }
}

/// One ranked recipe as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub recipe_id: String,
    pub score: f64,
    pub explanation: Vec<FactorContribution>,
    pub cuisine: String,
    pub difficulty: Difficulty,
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationPage {
    pub recommendations: Arc<Vec<Recommendation>>,
    /// Served from the response cache
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RecordOutcome {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub expired_cache_entries: usize,
    pub idle_profiles: usize,
    pub pruned_trending: usize,
    pub warmed_pages: usize,
}

/// Invalidation generations of cached pages
///
/// A computed page is written back only if neither its user's generation nor
/// the global one moved while it was being scored. Both checks and bumps run
/// under this lock, with the cache operation nested inside it.
#[derive(Debug, Default)]
struct PageGenerations {
    global: u64,
    users: HashMap<String, u64>,
}

impl PageGenerations {
    fn token(&self, user_id: &str) -> (u64, u64) {
        (self.global, self.users.get(user_id).copied().unwrap_or(0))
    }

    fn bump_user(&mut self, user_id: &str) {
        *self.users.entry(user_id.to_string()).or_insert(0) += 1;
    }

    /// Move the global generation. Per-user counters can then be dropped
    /// because every older token already mismatches on `global`.
    fn bump_all(&mut self) {
        self.global += 1;
        self.users.clear();
    }
}

/// Trending weight of each action
fn trending_weight(action: &BehaviorAction) -> f64 {
    match action {
        BehaviorAction::Viewed => TRENDING_WEIGHT_VIEWED,
        BehaviorAction::Generated => TRENDING_WEIGHT_GENERATED,
        BehaviorAction::Shared => TRENDING_WEIGHT_SHARED,
        BehaviorAction::Rated { .. } => TRENDING_WEIGHT_RATED,
        BehaviorAction::Saved => TRENDING_WEIGHT_SAVED,
        BehaviorAction::Favorited => TRENDING_WEIGHT_FAVORITED,
    }
}

pub struct PersonalizationService {
    clock: SharedClock,
    cache: CacheStore<Arc<Vec<Recommendation>>>,
    tracker: BehaviorTracker,
    trending: TrendingAggregator,
    scorer: RecommendationScorer,
    catalog: Arc<dyn CandidateSupplier>,
    sink: Arc<dyn BehaviorSink>,
    recommendation_ttl: Duration,
    warm_users: usize,
    generations: Mutex<PageGenerations>,
}

impl PersonalizationService {
    pub fn new(
        config: ServiceConfig,
        catalog: Arc<dyn CandidateSupplier>,
        sink: Arc<dyn BehaviorSink>,
        clock: SharedClock,
    ) -> Self {
        Self {
            cache: CacheStore::new(
                RECOMMENDATIONS_OP,
                config.cache_capacity,
                config.default_ttl,
                clock.clone(),
            ),
            tracker: BehaviorTracker::new(config.tracker, clock.clone()),
            trending: TrendingAggregator::new(config.trending, clock.clone()),
            scorer: RecommendationScorer::new(config.weights),
            catalog,
            sink,
            recommendation_ttl: config.recommendation_ttl,
            warm_users: config.warm_users,
            generations: Mutex::new(PageGenerations::default()),
            clock,
        }
    }

    pub fn tracker(&self) -> &BehaviorTracker {
        &self.tracker
    }

    pub fn trending_aggregator(&self) -> &TrendingAggregator {
        &self.trending
    }

    pub fn cache(&self) -> &CacheStore<Arc<Vec<Recommendation>>> {
        &self.cache
    }

    /// Ranked recommendations for one user
    ///
    /// Checks the response cache first; on a miss, scores the supplier's
    /// candidates and caches the truncated page. No candidates is an empty,
    /// successful page.
    pub fn get_recommendations(
        &self,
        query: &RecommendationQuery,
        cancel: &CancelSignal,
    ) -> Result<RecommendationPage> {
        let seasonal = match query.month {
            Some(month) => SeasonalContext::new(month)?,
            None => SeasonalContext::current(self.clock.as_ref()),
        };
        let filter = query.filter();
        let key = query.cache_key(&filter, &seasonal);

        if let Some(hit) = self.cache.get(&key) {
            metrics::RECOMMENDATIONS_TOTAL
                .with_label_values(&["cached"])
                .inc();
            return Ok(RecommendationPage {
                recommendations: hit,
                cached: true,
            });
        }

        let _timer = metrics::Timer::new(metrics::RECOMMENDATION_DURATION.clone());
        // Taken before the profile is read
        let token = self.generations.lock().token(&query.user_id);

        let candidates = self.catalog.candidates(&filter).map_err(|e| {
            metrics::RECOMMENDATIONS_TOTAL
                .with_label_values(&["error"])
                .inc();
            AppError::CatalogUnavailable(e.to_string())
        })?;
        metrics::RECOMMENDATION_CANDIDATES.observe(candidates.len() as f64);

        let profile = self.tracker.get_profile(&query.user_id);
        let ids: Vec<&str> = candidates.iter().map(|c| c.recipe_id.as_str()).collect();
        let trending = self.trending.snapshot(&ids[..]);

        let ctx = ScoringContext {
            profile: &profile,
            trending: &trending,
            seasonal: &seasonal,
            mood: query.mood,
        };
        let mut ranked = match self.scorer.score(&ctx, &candidates, cancel) {
            Ok(ranked) => ranked,
            Err(e) => {
                let label = if matches!(e, AppError::Cancelled) {
                    "cancelled"
                } else {
                    "error"
                };
                metrics::RECOMMENDATIONS_TOTAL
                    .with_label_values(&[label])
                    .inc();
                warn!(user_id = %query.user_id, candidates = candidates.len(), "scoring aborted: {}", e);
                return Err(e);
            }
        };
        ranked.truncate(query.limit);

        let page: Arc<Vec<Recommendation>> = Arc::new(
            ranked
                .into_iter()
                .map(|c| Recommendation {
                    recipe_id: c.recipe_id,
                    score: c.score,
                    explanation: c.explanation,
                    cuisine: c.attributes.cuisine,
                    difficulty: c.attributes.difficulty,
                    tags: c.attributes.tags,
                })
                .collect(),
        );
        let stored = {
            let generations = self.generations.lock();
            let current = generations.token(&query.user_id) == token;
            if current {
                self.cache.put(key, page.clone(), self.recommendation_ttl);
            }
            current
        };
        if !stored {
            debug!(user_id = %query.user_id, "page invalidated while scoring, not cached");
        }

        metrics::RECOMMENDATIONS_TOTAL
            .with_label_values(&["computed"])
            .inc();
        debug!(
            user_id = %query.user_id,
            candidates = candidates.len(),
            returned = page.len(),
            "recommendations computed"
        );

        Ok(RecommendationPage {
            recommendations: page,
            cached: false,
        })
    }

    /// Fold one event into profile and trending state
    ///
    /// Invalid events are dropped with `accepted = false`. On success the
    /// user's cached recommendations are invalidated.
    pub fn record_behavior(&self, event: BehaviorEvent) -> RecordOutcome {
        let event_type = event.event_type().as_str();

        if let Err(e) = self.tracker.record(&event) {
            return self.reject(event_type, &e);
        }

        self.trending
            .bump_weighted(&event.recipe.recipe_id, trending_weight(&event.action));

        if let Err(e) = self.sink.mirror(&event) {
            metrics::BEHAVIOR_SINK_FAILURES_TOTAL.inc();
            warn!(user_id = %event.user_id, "behavior sink mirror failed: {}", e);
        }

        let invalidated = self.invalidate_recommendations(Some(&event.user_id));
        metrics::BEHAVIOR_EVENTS_TOTAL
            .with_label_values(&[event_type, "accepted"])
            .inc();
        debug!(
            user_id = %event.user_id,
            event_type,
            invalidated,
            "behavior accepted"
        );
        RecordOutcome::accepted()
    }

    /// Record an event that failed before it could be constructed (unknown
    /// event type, bad rating). Logged and counted like any rejected event.
    pub fn reject(&self, event_type: &str, error: &AppError) -> RecordOutcome {
        let label = match event_type.parse::<super::events::EventType>() {
            Ok(t) => t.as_str(),
            Err(_) => "unknown",
        };
        metrics::BEHAVIOR_EVENTS_TOTAL
            .with_label_values(&[label, "rejected"])
            .inc();
        warn!(event_type = %event_type, "behavior event dropped: {}", error);
        RecordOutcome::rejected(error.message())
    }

    /// Drop cached recommendation pages for one user, or for everyone
    pub fn invalidate_recommendations(&self, user_id: Option<&str>) -> usize {
        let mut generations = self.generations.lock();
        match user_id {
            Some(user) => {
                generations.bump_user(user);
                self.cache
                    .invalidate_prefix(&CacheKeyBuilder::prefix(RECOMMENDATIONS_OP, user))
            }
            None => {
                generations.bump_all();
                let removed = self
                    .cache
                    .invalidate_prefix(&format!("{RECOMMENDATIONS_OP}:"));
                drop(generations);
                info!(removed, "all cached recommendations invalidated");
                removed
            }
        }
    }

    /// Precompute the default recommendation page of the `users` most
    /// recently active profiles. Pages already cached are left alone.
    /// Returns how many pages were computed.
    pub fn warm_recommendations(&self, users: usize) -> usize {
        let mut warmed = 0;
        for user_id in self.tracker.recently_active(users) {
            let query = RecommendationQuery::new(user_id);
            match self.get_recommendations(&query, &CancelSignal::none()) {
                Ok(page) if !page.cached => warmed += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(user_id = %query.user_id, "cache warming stopped: {}", e);
                    break;
                }
            }
        }
        if warmed > 0 {
            metrics::CACHE_WARMED_TOTAL.inc_by(warmed as u64);
            debug!(warmed, "recommendation pages warmed");
        }
        warmed
    }

    pub fn trending(&self, period: Option<TrendingPeriod>, limit: usize) -> Vec<TrendingEntry> {
        match period {
            Some(period) => self.trending.top_n_within(limit, period),
            None => self.trending.top_n(limit),
        }
    }

    pub fn profile(&self, user_id: &str) -> UserProfile {
        self.tracker.get_profile(user_id)
    }

    pub fn seasonal_suggestions(&self, month: Option<u32>) -> Result<SeasonalSuggestions> {
        let seasonal = match month {
            Some(month) => SeasonalContext::new(month)?,
            None => SeasonalContext::current(self.clock.as_ref()),
        };
        Ok(seasonal.suggestions())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Periodic sweep: expired cache entries, idle profiles, aged-out
    /// trending, then warming of the most active users' pages
    pub fn run_maintenance(&self) -> MaintenanceReport {
        let expired_cache_entries = self.cache.purge_expired();
        let idle_profiles = self.tracker.sweep_idle();
        let pruned_trending = self.trending.prune();
        let report = MaintenanceReport {
            expired_cache_entries,
            idle_profiles,
            pruned_trending,
            warmed_pages: self.warm_recommendations(self.warm_users),
        };
        if report != MaintenanceReport::default() {
            info!(
                expired = report.expired_cache_entries,
                idle_profiles = report.idle_profiles,
                trending = report.pruned_trending,
                warmed = report.warmed_pages,
                "maintenance sweep"
            );
        }
        report
    }
}
