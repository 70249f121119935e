//! Per-user behavior profiles
//!
//! Every recorded event first decays the user's existing affinities for the
//! time elapsed since their last update, then adds the event's increment to
//! the touched cuisine, ingredients and difficulty. Weights follow a half-life
//! curve:
//!
//! ```text
//! w(t) = w₀ × 0.5^(t × rate / half_life)      rate = 1.0, or 0.5 once potentiated
//! ```
//!
//! An affinity touched by a strong signal (saved, favorited, rating ≥ 4) is
//! potentiated and keeps decaying at the slower rate from then on.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::{debug, info};

use super::events::{BehaviorAction, BehaviorEvent, Difficulty};
use super::mood::Mood;
use crate::clock::SharedClock;
use crate::constants::*;
use crate::errors::Result;
use crate::metrics;

/// Retention factor after `elapsed_hours`
#[inline]
pub fn decay_factor(elapsed_hours: f64, half_life_hours: f64, potentiated: bool) -> f64 {
    if elapsed_hours <= 0.0 || half_life_hours <= 0.0 {
        return 1.0;
    }
    let rate = if potentiated {
        POTENTIATED_DECAY_RATE_FACTOR
    } else {
        1.0
    };
    0.5f64.powf(elapsed_hours * rate / half_life_hours)
}

/// Affinity increment per action
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventIncrements {
    pub viewed: f64,
    pub generated: f64,
    pub shared: f64,
    pub saved: f64,
    pub favorited: f64,
    pub per_rating_star: f64,
}

impl Default for EventIncrements {
    fn default() -> Self {
        Self {
            viewed: INCREMENT_VIEWED,
            generated: INCREMENT_GENERATED,
            shared: INCREMENT_SHARED,
            saved: INCREMENT_SAVED,
            favorited: INCREMENT_FAVORITED,
            per_rating_star: INCREMENT_PER_RATING_STAR,
        }
    }
}

impl EventIncrements {
    pub fn for_action(&self, action: &BehaviorAction) -> f64 {
        match action {
            BehaviorAction::Viewed => self.viewed,
            BehaviorAction::Generated => self.generated,
            BehaviorAction::Shared => self.shared,
            BehaviorAction::Saved => self.saved,
            BehaviorAction::Favorited => self.favorited,
            BehaviorAction::Rated { rating } => f64::from(rating.stars()) * self.per_rating_star,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub half_life_hours: f64,
    pub idle_horizon: Duration,
    pub max_profiles: usize,
    pub recent_event_window: usize,
    pub increments: EventIncrements,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            half_life_hours: PROFILE_HALF_LIFE_HOURS,
            idle_horizon: Duration::hours(PROFILE_IDLE_HORIZON_HOURS),
            max_profiles: DEFAULT_MAX_PROFILES,
            recent_event_window: RECENT_EVENT_WINDOW,
            increments: EventIncrements::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AffinityWeight {
    pub weight: f64,
    pub potentiated: bool,
}

/// Decayed weights keyed by cuisine, ingredient or difficulty
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AffinityMap<K: Ord> {
    weights: BTreeMap<K, AffinityWeight>,
}

impl<K: Ord> Default for AffinityMap<K> {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> AffinityMap<K> {
    pub fn get<Q>(&self, key: &Q) -> f64
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.weights.get(key).map_or(0.0, |w| w.weight)
    }

    pub fn is_potentiated<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.weights.get(key).is_some_and(|w| w.potentiated)
    }

    /// Largest weight, 0 when empty
    pub fn max(&self) -> f64 {
        self.weights.values().map(|w| w.weight).fold(0.0, f64::max)
    }

    /// `key`'s weight relative to the strongest affinity, in `[0, 1]`
    pub fn normalized<Q>(&self, key: &Q) -> f64
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let max = self.max();
        if max <= 0.0 {
            return 0.0;
        }
        (self.get(key) / max).clamp(0.0, 1.0)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, f64)> {
        self.weights.iter().map(|(k, w)| (k, w.weight))
    }

    /// Strongest affinities first, ties by key
    pub fn top(&self, n: usize) -> Vec<(K, f64)> {
        let mut entries: Vec<(K, f64)> = self.iter().map(|(k, w)| (k.clone(), w)).collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }

    fn add(&mut self, key: K, amount: f64, potentiate: bool) {
        let entry = self.weights.entry(key).or_insert(AffinityWeight {
            weight: 0.0,
            potentiated: false,
        });
        entry.weight += amount;
        entry.potentiated |= potentiate;
    }

    fn decay(&mut self, elapsed_hours: f64, half_life_hours: f64) {
        if elapsed_hours <= 0.0 {
            return;
        }
        for w in self.weights.values_mut() {
            w.weight *= decay_factor(elapsed_hours, half_life_hours, w.potentiated);
        }
        self.weights
            .retain(|_, w| w.weight >= AFFINITY_PRUNE_THRESHOLD);
    }

    fn decayed(&self, elapsed_hours: f64, half_life_hours: f64) -> Self {
        let mut copy = self.clone();
        copy.decay(elapsed_hours, half_life_hours);
        copy
    }
}

/// One entry of a profile's rolling event window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentEvent {
    pub recipe_id: String,
    pub event_type: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of a user's aggregate preferences, decayed to the read instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub cuisine_affinity: AffinityMap<String>,
    pub ingredient_affinity: AffinityMap<String>,
    pub difficulty_affinity: AffinityMap<Difficulty>,
    pub mood_counts: BTreeMap<Mood, u32>,
    /// Most recent first
    pub recent_moods: Vec<Mood>,
    /// Most recent first
    pub recent_events: Vec<RecentEvent>,
    pub event_count: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Zero-valued profile for a user with no (live) history
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            cuisine_affinity: AffinityMap::default(),
            ingredient_affinity: AffinityMap::default(),
            difficulty_affinity: AffinityMap::default(),
            mood_counts: BTreeMap::new(),
            recent_moods: Vec::new(),
            recent_events: Vec::new(),
            event_count: 0,
            last_updated: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.event_count == 0
    }

    /// Most frequent mood, ties by declaration order
    pub fn dominant_mood(&self) -> Option<Mood> {
        self.mood_counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(m, _)| *m)
    }
}

struct ProfileState {
    cuisine: AffinityMap<String>,
    ingredients: AffinityMap<String>,
    difficulty: AffinityMap<Difficulty>,
    mood_counts: BTreeMap<Mood, u32>,
    recent_moods: VecDeque<Mood>,
    recent_events: VecDeque<RecentEvent>,
    event_count: u64,
    last_updated: DateTime<Utc>,
}

impl ProfileState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            cuisine: AffinityMap::default(),
            ingredients: AffinityMap::default(),
            difficulty: AffinityMap::default(),
            mood_counts: BTreeMap::new(),
            recent_moods: VecDeque::new(),
            recent_events: VecDeque::new(),
            event_count: 0,
            last_updated: now,
        }
    }

    fn is_idle(&self, now: DateTime<Utc>, horizon: Duration) -> bool {
        now - self.last_updated > horizon
    }

    fn elapsed_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_updated).num_milliseconds() as f64 / 3_600_000.0
    }

    fn decay_to(&mut self, now: DateTime<Utc>, half_life_hours: f64) {
        let elapsed = self.elapsed_hours(now);
        self.cuisine.decay(elapsed, half_life_hours);
        self.ingredients.decay(elapsed, half_life_hours);
        self.difficulty.decay(elapsed, half_life_hours);
        if now > self.last_updated {
            self.last_updated = now;
        }
    }

    fn apply(&mut self, event: &BehaviorEvent, amount: f64, strong: bool, window: usize) {
        let recipe = &event.recipe;
        if !recipe.cuisine.is_empty() {
            self.cuisine.add(recipe.cuisine.clone(), amount, strong);
        }
        for ingredient in &recipe.ingredients {
            self.ingredients.add(ingredient.clone(), amount, strong);
        }
        self.difficulty.add(recipe.difficulty, amount, strong);

        if let Some(mood) = event.mood {
            *self.mood_counts.entry(mood).or_insert(0) += 1;
            self.recent_moods.push_front(mood);
            self.recent_moods.truncate(MOOD_HISTORY_LEN);
        }

        self.recent_events.push_front(RecentEvent {
            recipe_id: recipe.recipe_id.clone(),
            event_type: event.event_type().as_str(),
            timestamp: event.timestamp,
        });
        self.recent_events.truncate(window.max(1));
        self.event_count += 1;
    }

    fn snapshot(&self, user_id: &str, now: DateTime<Utc>, half_life_hours: f64) -> UserProfile {
        let elapsed = self.elapsed_hours(now);
        UserProfile {
            user_id: user_id.to_string(),
            cuisine_affinity: self.cuisine.decayed(elapsed, half_life_hours),
            ingredient_affinity: self.ingredients.decayed(elapsed, half_life_hours),
            difficulty_affinity: self.difficulty.decayed(elapsed, half_life_hours),
            mood_counts: self.mood_counts.clone(),
            recent_moods: self.recent_moods.iter().copied().collect(),
            recent_events: self.recent_events.iter().cloned().collect(),
            event_count: self.event_count,
            last_updated: Some(self.last_updated),
        }
    }
}

/// Profiles plus an index ordered by `(last_updated, user_id)`
#[derive(Default)]
struct ProfileTable {
    profiles: HashMap<String, ProfileState>,
    recency: BTreeSet<(DateTime<Utc>, String)>,
}

impl ProfileTable {
    fn len(&self) -> usize {
        self.profiles.len()
    }

    fn get(&self, user_id: &str) -> Option<&ProfileState> {
        self.profiles.get(user_id)
    }

    fn remove(&mut self, user_id: &str) -> Option<ProfileState> {
        let state = self.profiles.remove(user_id)?;
        self.recency.remove(&(state.last_updated, user_id.to_string()));
        Some(state)
    }

    /// Apply `update` to the user's profile, creating it first if needed,
    /// and re-index it under its new `last_updated`
    fn upsert<F>(&mut self, user_id: &str, now: DateTime<Utc>, update: F)
    where
        F: FnOnce(&mut ProfileState),
    {
        if let Some(state) = self.profiles.get(user_id) {
            self.recency.remove(&(state.last_updated, user_id.to_string()));
        }
        let state = self
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| ProfileState::new(now));
        update(state);
        self.recency.insert((state.last_updated, user_id.to_string()));
    }

    /// Remove the least recently updated profile
    fn evict_least_recent(&mut self) -> Option<String> {
        let (_, user_id) = self.recency.pop_first()?;
        self.profiles.remove(&user_id);
        Some(user_id)
    }

    /// Remove every profile last updated before `cutoff`
    fn remove_updated_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while let Some((last_updated, _)) = self.recency.first() {
            if *last_updated >= cutoff {
                break;
            }
            if let Some((_, user_id)) = self.recency.pop_first() {
                self.profiles.remove(&user_id);
                removed += 1;
            }
        }
        removed
    }

    /// Most recently updated users first
    fn most_recent(&self, n: usize) -> Vec<String> {
        self.recency
            .iter()
            .rev()
            .take(n)
            .map(|(_, user_id)| user_id.clone())
            .collect()
    }
}

/// Maintains one rolling profile per active user
pub struct BehaviorTracker {
    config: TrackerConfig,
    clock: SharedClock,
    profiles: Mutex<ProfileTable>,
}

impl BehaviorTracker {
    pub fn new(config: TrackerConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            profiles: Mutex::new(ProfileTable::default()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Fold one event into its user's profile
    ///
    /// Fails with `InvalidEvent` on a blank user or recipe id; the profile is
    /// left untouched in that case.
    pub fn record(&self, event: &BehaviorEvent) -> Result<()> {
        event.validate()?;

        let now = self.clock.now();
        let amount = self.config.increments.for_action(&event.action);
        let strong = event.action.is_strong();

        let mut profiles = self.profiles.lock();

        let idle = profiles
            .get(&event.user_id)
            .is_some_and(|p| p.is_idle(now, self.config.idle_horizon));
        if idle {
            profiles.remove(&event.user_id);
            debug!(user_id = %event.user_id, "idle profile reset on new event");
        }

        if profiles.get(&event.user_id).is_none() && profiles.len() >= self.config.max_profiles {
            if let Some(victim) = profiles.evict_least_recent() {
                debug!(user_id = %victim, "profile evicted at capacity");
            }
        }

        let half_life = self.config.half_life_hours;
        let window = self.config.recent_event_window;
        profiles.upsert(&event.user_id, now, |state| {
            state.decay_to(now, half_life);
            state.apply(event, amount, strong, window);
        });

        metrics::ACTIVE_PROFILES.set(profiles.len() as i64);
        drop(profiles);

        debug!(
            user_id = %event.user_id,
            recipe_id = %event.recipe.recipe_id,
            event_type = %event.event_type(),
            increment = amount,
            "behavior recorded"
        );
        Ok(())
    }

    /// Profile snapshot decayed to now. Users without a live profile get an
    /// empty one; an idle profile is evicted on the way.
    pub fn get_profile(&self, user_id: &str) -> UserProfile {
        let now = self.clock.now();
        let mut profiles = self.profiles.lock();

        match profiles.get(user_id) {
            None => UserProfile::empty(user_id),
            Some(state) if state.is_idle(now, self.config.idle_horizon) => {
                profiles.remove(user_id);
                metrics::ACTIVE_PROFILES.set(profiles.len() as i64);
                debug!(user_id = %user_id, "idle profile evicted on read");
                UserProfile::empty(user_id)
            }
            Some(state) => state.snapshot(user_id, now, self.config.half_life_hours),
        }
    }

    /// Evict every idle profile. Returns how many were removed.
    pub fn sweep_idle(&self) -> usize {
        let now = self.clock.now();
        let mut profiles = self.profiles.lock();
        // Idle means strictly older than the horizon
        let removed = match now.checked_sub_signed(self.config.idle_horizon) {
            Some(cutoff) => profiles.remove_updated_before(cutoff),
            None => 0,
        };
        metrics::ACTIVE_PROFILES.set(profiles.len() as i64);
        drop(profiles);

        if removed > 0 {
            info!(removed, "swept idle profiles");
        }
        removed
    }

    pub fn active_profiles(&self) -> usize {
        self.profiles.lock().len()
    }

    /// Up to `n` user ids with a live profile, most recently updated first
    pub fn recently_active(&self, n: usize) -> Vec<String> {
        let now = self.clock.now();
        let horizon = self.config.idle_horizon;
        let profiles = self.profiles.lock();
        profiles
            .most_recent(n)
            .into_iter()
            .filter(|user| {
                profiles
                    .get(user)
                    .is_some_and(|p| !p.is_idle(now, horizon))
            })
            .collect()
    }
}
