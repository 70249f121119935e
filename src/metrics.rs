//! Prometheus metrics
//!
//! Exposes operational metrics for monitoring and alerting:
//! - Request rates and latencies
//! - Cache hit ratio, evictions and size
//! - Behavior ingestion and recommendation latency
//!
//! NOTE: user_id and recipe_id never appear in labels to keep cardinality bounded.

use lazy_static::lazy_static;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};

lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Request Metrics
    // ============================================================================

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "recipe_http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["method", "endpoint", "status"]
    ).unwrap();

    /// Total HTTP requests
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("recipe_http_requests_total", "Total HTTP requests"),
        &["method", "endpoint", "status"]
    ).unwrap();

    // ============================================================================
    // Cache Metrics
    // ============================================================================

    /// Cache operations by outcome (get: hit/miss/expired, put: ok)
    pub static ref CACHE_OPERATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("recipe_cache_operations_total", "Cache operations by outcome"),
        &["cache", "operation", "result"]
    ).unwrap();

    /// Live entries evicted under capacity pressure
    pub static ref CACHE_EVICTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("recipe_cache_evictions_total", "Live cache entries evicted (LRU)"),
        &["cache"]
    ).unwrap();

    /// Expired entries reclaimed
    pub static ref CACHE_EXPIRATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("recipe_cache_expirations_total", "Expired cache entries reclaimed"),
        &["cache"]
    ).unwrap();

    /// Stored entries per cache
    pub static ref CACHE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("recipe_cache_size", "Entries currently stored"),
        &["cache"]
    ).unwrap();

    /// Recommendation pages precomputed by warming
    pub static ref CACHE_WARMED_TOTAL: prometheus::IntCounter = prometheus::IntCounter::new(
        "recipe_cache_warmed_total",
        "Recommendation pages precomputed by cache warming"
    ).unwrap();

    // ============================================================================
    // Personalization Metrics
    // ============================================================================

    /// Behavior events by type and outcome
    pub static ref BEHAVIOR_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("recipe_behavior_events_total", "Behavior events received"),
        &["event_type", "result"]  // result: "accepted", "rejected"
    ).unwrap();

    /// Behavior sink mirror failures
    pub static ref BEHAVIOR_SINK_FAILURES_TOTAL: prometheus::IntCounter = prometheus::IntCounter::new(
        "recipe_behavior_sink_failures_total",
        "Behavior events that failed to mirror to the sink"
    ).unwrap();

    /// Profiles currently held in memory
    pub static ref ACTIVE_PROFILES: IntGauge = IntGauge::new(
        "recipe_active_profiles",
        "User profiles held in memory"
    ).unwrap();

    /// Recipes with live trending counters
    pub static ref TRENDING_RECIPES: IntGauge = IntGauge::new(
        "recipe_trending_recipes",
        "Recipes with live trending counters"
    ).unwrap();

    /// Recommendation requests by outcome
    pub static ref RECOMMENDATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("recipe_recommendations_total", "Recommendation requests"),
        &["result"]  // result: "cached", "computed", "cancelled", "error"
    ).unwrap();

    /// Scoring pass duration
    pub static ref RECOMMENDATION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "recipe_recommendation_duration_seconds",
            "Time spent computing one recommendation list"
        )
        .buckets(vec![0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5])
    ).unwrap();

    /// Candidates scored per request
    pub static ref RECOMMENDATION_CANDIDATES: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "recipe_recommendation_candidates",
            "Candidates scored per recommendation request"
        )
        .buckets(vec![0.0, 1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0])
    ).unwrap();
}

/// Register all metrics with the global registry
pub fn register_metrics() -> Result<(), prometheus::Error> {
    METRICS_REGISTRY.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;

    METRICS_REGISTRY.register(Box::new(CACHE_OPERATIONS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(CACHE_EVICTIONS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(CACHE_EXPIRATIONS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(CACHE_SIZE.clone()))?;
    METRICS_REGISTRY.register(Box::new(CACHE_WARMED_TOTAL.clone()))?;

    METRICS_REGISTRY.register(Box::new(BEHAVIOR_EVENTS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(BEHAVIOR_SINK_FAILURES_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(ACTIVE_PROFILES.clone()))?;
    METRICS_REGISTRY.register(Box::new(TRENDING_RECIPES.clone()))?;
    METRICS_REGISTRY.register(Box::new(RECOMMENDATIONS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(RECOMMENDATION_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(RECOMMENDATION_CANDIDATES.clone()))?;

    Ok(())
}

/// Render the registry in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&METRICS_REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Helper to time operations with histogram (RAII pattern)
/// Usage: let _timer = Timer::new(SOME_HISTOGRAM.clone());
pub struct Timer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl Timer {
    /// Create timer that records duration to histogram on drop
    pub fn new(histogram: Histogram) -> Self {
        Self {
            histogram,
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
