//! Documented constants for the cache and personalization engine
//!
//! Every tunable number lives here with a note on where it comes from.
//! These are product-tuning defaults, overridable through [`crate::config`];
//! none of them is a structural invariant.

// =============================================================================
// CACHE
// =============================================================================

/// Default number of live entries the response cache may hold
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Default entry TTL in seconds (5 minutes)
pub const DEFAULT_CACHE_TTL_SECS: i64 = 300;

/// TTL for cached recommendation lists in seconds (10 minutes)
///
/// Recording a behavior event invalidates the user's entries, so the TTL only
/// bounds staleness of the trending factor.
pub const RECOMMENDATION_CACHE_TTL_SECS: i64 = 600;

/// Keys longer than this are digested
///
/// Long parameter sets (dietary filters, ingredient lists) are reduced to
/// `"<operation>:<sha256>"` so keys stay bounded.
pub const MAX_KEY_LENGTH: usize = 200;

/// Most recently active users whose default recommendation page is
/// precomputed by each maintenance sweep
pub const DEFAULT_WARM_USERS: usize = 50;

/// Upper bound accepted by the warm endpoint
pub const MAX_WARM_USERS: usize = 1000;

// =============================================================================
// BEHAVIOR INCREMENTS
// Stronger intent carries more weight than passive browsing.
// =============================================================================

/// Passive signal: the recipe was opened
pub const INCREMENT_VIEWED: f64 = 1.0;

/// The user generated this recipe from their own ingredients
pub const INCREMENT_GENERATED: f64 = 2.0;

/// The recipe was shared with someone else
pub const INCREMENT_SHARED: f64 = 2.5;

/// The recipe was saved to the user's collection
pub const INCREMENT_SAVED: f64 = 3.0;

/// The recipe was marked as a favorite
pub const INCREMENT_FAVORITED: f64 = 4.0;

/// Per-star increment for explicit ratings (5 stars → 5.0)
pub const INCREMENT_PER_RATING_STAR: f64 = 1.0;

/// Ratings at or above this value count as a strong signal
pub const STRONG_RATING_THRESHOLD: u8 = 4;

// =============================================================================
// AFFINITY DECAY
// =============================================================================

/// Half-life of an affinity weight, in hours (14 days)
///
/// A preference that is not reinforced for two weeks counts half as much.
pub const PROFILE_HALF_LIFE_HOURS: f64 = 14.0 * 24.0;

/// Potentiated weights (touched by a strong signal) decay at this fraction of
/// the base rate
pub const POTENTIATED_DECAY_RATE_FACTOR: f64 = 0.5;

/// Weights below this magnitude are dropped from a profile
pub const AFFINITY_PRUNE_THRESHOLD: f64 = 1e-4;

/// Profiles untouched for longer than this are evicted (30 days)
pub const PROFILE_IDLE_HORIZON_HOURS: i64 = 30 * 24;

/// Maximum number of profiles kept in memory
pub const DEFAULT_MAX_PROFILES: usize = 10_000;

/// Recent events kept per profile
pub const RECENT_EVENT_WINDOW: usize = 50;

/// Recent moods kept per profile
pub const MOOD_HISTORY_LEN: usize = 20;

// =============================================================================
// TRENDING
// =============================================================================

/// Width of a trending bucket in seconds (1 hour)
pub const TRENDING_BUCKET_SECS: i64 = 3600;

/// Buckets retained per recipe (30 days of hourly buckets)
pub const TRENDING_HORIZON_BUCKETS: usize = 30 * 24;

/// A bucket's weight halves every this many buckets (1 day)
pub const TRENDING_HALF_LIFE_BUCKETS: f64 = 24.0;

/// Trending weight of each action (favorite 3, generate 2, view 1)
pub const TRENDING_WEIGHT_VIEWED: f64 = 1.0;
pub const TRENDING_WEIGHT_GENERATED: f64 = 2.0;
pub const TRENDING_WEIGHT_SHARED: f64 = 2.0;
pub const TRENDING_WEIGHT_RATED: f64 = 2.0;
pub const TRENDING_WEIGHT_SAVED: f64 = 3.0;
pub const TRENDING_WEIGHT_FAVORITED: f64 = 3.0;

// =============================================================================
// SCORING WEIGHTS
// =============================================================================

pub const WEIGHT_CUISINE: f64 = 2.0;
pub const WEIGHT_INGREDIENT: f64 = 1.5;
pub const WEIGHT_DIFFICULTY: f64 = 1.0;
pub const WEIGHT_TRENDING: f64 = 1.5;
pub const WEIGHT_SEASONAL: f64 = 1.2;
pub const WEIGHT_MOOD: f64 = 2.0;

// =============================================================================
// REQUEST LIMITS
// =============================================================================

/// Default page size for recommendation and trending requests
pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 10;

/// Largest page a caller may request
pub const MAX_RECOMMENDATION_LIMIT: usize = 100;

/// Default trending page size
pub const DEFAULT_TRENDING_LIMIT: usize = 20;

// =============================================================================
// SERVER
// =============================================================================

/// Buffered behavior events per `/api/events` subscriber before it lags
pub const EVENT_BROADCAST_CAPACITY: usize = 256;
