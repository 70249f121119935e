//! Configuration management for the recipe engine
//!
//! All configurable parameters in one place with environment variable overrides.
//! Sensible defaults, configurable in production.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::constants::*;
use crate::personalization::scorer::FactorWeights;

/// Read and parse an environment variable, ignoring absent or malformed values
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v.to_lowercase() == "true" || v == "1")
}

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins (empty = allow all)
    pub allowed_origins: Vec<String>,
    /// Allowed HTTP methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers
    pub allowed_headers: Vec<String>,
    /// Whether to allow credentials
    pub allow_credentials: bool,
    /// Max age for preflight cache (seconds)
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "DELETE".to_string(),
                "OPTIONS".to_string(),
            ],
            allowed_headers: vec![
                "Content-Type".to_string(),
                "Authorization".to_string(),
                "X-Request-ID".to_string(),
            ],
            allow_credentials: false,
            max_age_seconds: 86400,
        }
    }
}

impl CorsConfig {
    /// Load from environment variables
    ///
    /// In production mode (RECIPE_ENV=production), warns if CORS origins are not configured.
    pub fn from_env(is_production: bool) -> Self {
        let mut config = Self::default();

        if let Ok(origins) = env::var("RECIPE_CORS_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(methods) = env::var("RECIPE_CORS_METHODS") {
            config.allowed_methods = methods
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(val) = env_flag("RECIPE_CORS_CREDENTIALS") {
            config.allow_credentials = val;
        }

        if let Some(n) = env_parse("RECIPE_CORS_MAX_AGE") {
            config.max_age_seconds = n;
        }

        if is_production && config.allowed_origins.is_empty() {
            tracing::warn!(
                "PRODUCTION WARNING: CORS allows all origins. Set RECIPE_CORS_ORIGINS."
            );
        }

        config
    }

    /// Check if any origin restrictions are configured
    pub fn is_restricted(&self) -> bool {
        !self.allowed_origins.is_empty()
    }

    /// Convert to tower-http CorsLayer
    pub fn to_layer(&self) -> tower_http::cors::CorsLayer {
        use tower_http::cors::{AllowOrigin, Any, CorsLayer};

        let mut layer = CorsLayer::new();

        if self.allowed_origins.is_empty() {
            layer = layer.allow_origin(Any);
        } else {
            let valid_origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse::<axum::http::HeaderValue>() {
                    Ok(v) => Some(v),
                    Err(_) => {
                        tracing::warn!("CORS: Invalid origin '{}' - skipping", origin);
                        None
                    }
                })
                .collect();

            if valid_origins.is_empty() {
                // Every configured origin failed to parse: deny rather than allow all
                tracing::error!(
                    "CORS: All {} configured origin(s) failed to parse. Rejecting cross-origin requests.",
                    self.allowed_origins.len()
                );
            }
            layer = layer.allow_origin(AllowOrigin::list(valid_origins));
        }

        let methods: Vec<axum::http::Method> = self
            .allowed_methods
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect();
        layer = if methods.is_empty() {
            layer.allow_methods(Any)
        } else {
            layer.allow_methods(methods)
        };

        let headers: Vec<axum::http::HeaderName> = self
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        layer = if headers.is_empty() {
            layer.allow_headers(Any)
        } else {
            layer.allow_headers(headers)
        };

        if self.allow_credentials {
            layer = layer.allow_credentials(true);
        }

        layer.max_age(std::time::Duration::from_secs(self.max_age_seconds))
    }
}

/// Response cache sizing
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum live entries (default: 1000)
    pub capacity: usize,
    /// TTL used by `put_default` (default: 300s)
    pub default_ttl_secs: i64,
    /// TTL of cached recommendation lists (default: 600s)
    pub recommendation_ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            default_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            recommendation_ttl_secs: RECOMMENDATION_CACHE_TTL_SECS,
        }
    }
}

/// Behavior tracking, trending and scoring parameters
#[derive(Debug, Clone)]
pub struct PersonalizationConfig {
    /// Affinity half-life in hours (default: 336 = 14 days)
    pub profile_half_life_hours: f64,
    /// Idle horizon after which a profile is dropped (default: 720h = 30 days)
    pub idle_horizon_hours: i64,
    /// Maximum profiles kept in memory (default: 10000)
    pub max_profiles: usize,
    /// Recent events retained per profile (default: 50)
    pub recent_event_window: usize,
    /// Trending bucket width in seconds (default: 3600)
    pub trending_bucket_secs: i64,
    /// Trending buckets retained (default: 720)
    pub trending_horizon_buckets: usize,
    /// Trending half-life in buckets (default: 24)
    pub trending_half_life_buckets: f64,
    /// Scoring factor weights
    pub weights: FactorWeights,
}

impl Default for PersonalizationConfig {
    fn default() -> Self {
        Self {
            profile_half_life_hours: PROFILE_HALF_LIFE_HOURS,
            idle_horizon_hours: PROFILE_IDLE_HORIZON_HOURS,
            max_profiles: DEFAULT_MAX_PROFILES,
            recent_event_window: RECENT_EVENT_WINDOW,
            trending_bucket_secs: TRENDING_BUCKET_SECS,
            trending_horizon_buckets: TRENDING_HORIZON_BUCKETS,
            trending_half_life_buckets: TRENDING_HALF_LIFE_BUCKETS,
            weights: FactorWeights::default(),
        }
    }
}

/// Server configuration loaded from environment with defaults
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: 127.0.0.1)
    pub host: String,

    /// Server port (default: 8000)
    pub port: u16,

    /// Whether running in production mode
    pub is_production: bool,

    /// Maximum concurrent requests (default: 200)
    pub max_concurrent_requests: usize,

    /// Deadline for one recommendation request in milliseconds (default: 2000).
    /// Scoring that runs past it fails with `Cancelled`.
    pub scoring_deadline_ms: u64,

    /// Maintenance sweep interval in seconds (default: 300 = 5 minutes)
    pub maintenance_interval_secs: u64,

    /// JSON file with the initial recipe catalog
    pub catalog_path: Option<PathBuf>,

    /// Emit JSON log lines instead of the human format
    pub json_logs: bool,

    /// CORS configuration
    pub cors: CorsConfig,

    /// Response cache configuration
    pub cache: CacheConfig,

    /// Personalization configuration
    pub personalization: PersonalizationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            is_production: false,
            max_concurrent_requests: 200,
            scoring_deadline_ms: 2000,
            maintenance_interval_secs: 300,
            catalog_path: None,
            json_logs: false,
            cors: CorsConfig::default(),
            cache: CacheConfig::default(),
            personalization: PersonalizationConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    #[allow(clippy::field_reassign_with_default)]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.is_production = env::var("RECIPE_ENV")
            .map(|v| {
                let v = v.to_lowercase();
                v == "production" || v == "prod"
            })
            .unwrap_or(false);

        if let Ok(val) = env::var("RECIPE_HOST") {
            config.host = val;
        }
        if let Some(port) = env_parse("RECIPE_PORT") {
            config.port = port;
        }
        if let Some(n) = env_parse("RECIPE_MAX_CONCURRENT") {
            config.max_concurrent_requests = n;
        }
        if let Some(n) = env_parse::<u64>("RECIPE_SCORING_DEADLINE_MS") {
            config.scoring_deadline_ms = n.max(1);
        }
        if let Some(n) = env_parse::<u64>("RECIPE_MAINTENANCE_INTERVAL") {
            config.maintenance_interval_secs = n.max(1);
        }
        if let Ok(val) = env::var("RECIPE_CATALOG_PATH") {
            config.catalog_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("RECIPE_LOG_FORMAT") {
            config.json_logs = val.eq_ignore_ascii_case("json");
        }

        config.cors = CorsConfig::from_env(config.is_production);

        // Cache
        if let Some(n) = env_parse::<usize>("RECIPE_CACHE_CAPACITY") {
            config.cache.capacity = n.max(1);
        }
        if let Some(n) = env_parse("RECIPE_CACHE_TTL") {
            config.cache.default_ttl_secs = n;
        }
        if let Some(n) = env_parse("RECIPE_RECOMMENDATION_TTL") {
            config.cache.recommendation_ttl_secs = n;
        }

        // Personalization
        let p = &mut config.personalization;
        if let Some(n) = env_parse::<f64>("RECIPE_PROFILE_HALF_LIFE_HOURS") {
            p.profile_half_life_hours = n.clamp(1.0, 24.0 * 365.0);
        }
        if let Some(n) = env_parse::<i64>("RECIPE_PROFILE_IDLE_HOURS") {
            p.idle_horizon_hours = n.max(1);
        }
        if let Some(n) = env_parse::<usize>("RECIPE_MAX_PROFILES") {
            p.max_profiles = n.max(1);
        }
        if let Some(n) = env_parse::<i64>("RECIPE_TRENDING_BUCKET_SECS") {
            p.trending_bucket_secs = n.clamp(60, 86_400);
        }
        if let Some(n) = env_parse::<usize>("RECIPE_TRENDING_HORIZON_BUCKETS") {
            p.trending_horizon_buckets = n.clamp(1, 10_000);
        }
        if let Some(n) = env_parse::<f64>("RECIPE_TRENDING_HALF_LIFE_BUCKETS") {
            p.trending_half_life_buckets = n.clamp(0.5, 10_000.0);
        }
        if let Ok(val) = env::var("RECIPE_FACTOR_WEIGHTS") {
            match FactorWeights::parse_overrides(&val, p.weights) {
                Ok(weights) => p.weights = weights,
                Err(e) => tracing::warn!("Ignoring RECIPE_FACTOR_WEIGHTS: {}", e),
            }
        }

        config
    }

    /// Log the current configuration
    pub fn log(&self) {
        info!("Configuration:");
        info!(
            "   Mode: {}",
            if self.is_production {
                "PRODUCTION"
            } else {
                "Development"
            }
        );
        info!("   Bind: {}:{}", self.host, self.port);
        info!("   Max concurrent: {}", self.max_concurrent_requests);
        info!("   Scoring deadline: {}ms", self.scoring_deadline_ms);
        info!(
            "   Cache: capacity {} (default TTL {}s, recommendations {}s)",
            self.cache.capacity, self.cache.default_ttl_secs, self.cache.recommendation_ttl_secs
        );
        info!(
            "   Profiles: max {}, half-life {:.0}h, idle horizon {}h",
            self.personalization.max_profiles,
            self.personalization.profile_half_life_hours,
            self.personalization.idle_horizon_hours
        );
        info!(
            "   Trending: {} buckets of {}s (half-life {} buckets)",
            self.personalization.trending_horizon_buckets,
            self.personalization.trending_bucket_secs,
            self.personalization.trending_half_life_buckets
        );
        info!("   Weights: {:?}", self.personalization.weights);
        match &self.catalog_path {
            Some(path) => info!("   Catalog: {:?}", path),
            None => info!("   Catalog: empty (POST /api/catalog to load)"),
        }
        if self.cors.is_restricted() {
            info!("   CORS origins: {:?}", self.cors.allowed_origins);
        } else {
            info!("   CORS: Permissive (all origins allowed)");
        }
        info!("   Maintenance interval: {}s", self.maintenance_interval_secs);
    }
}

/// Environment variable documentation
pub fn print_env_help() {
    println!("Recipe engine configuration environment variables:");
    println!();
    println!("  RECIPE_ENV                  - 'production' or 'prod' for production mode");
    println!("  RECIPE_HOST                 - Bind address (default: 127.0.0.1)");
    println!("  RECIPE_PORT                 - Server port (default: 8000)");
    println!("  RECIPE_MAX_CONCURRENT       - Max concurrent requests (default: 200)");
    println!("  RECIPE_SCORING_DEADLINE_MS  - Per-request scoring deadline (default: 2000)");
    println!("  RECIPE_MAINTENANCE_INTERVAL - Maintenance sweep interval seconds (default: 300)");
    println!("  RECIPE_CATALOG_PATH         - JSON file with the initial recipe catalog");
    println!("  RECIPE_LOG_FORMAT           - 'json' for JSON log lines");
    println!();
    println!("Cache:");
    println!("  RECIPE_CACHE_CAPACITY       - Max cached entries (default: 1000)");
    println!("  RECIPE_CACHE_TTL            - Default TTL seconds (default: 300)");
    println!("  RECIPE_RECOMMENDATION_TTL   - Recommendation TTL seconds (default: 600)");
    println!();
    println!("Personalization:");
    println!("  RECIPE_PROFILE_HALF_LIFE_HOURS    - Affinity half-life (default: 336)");
    println!("  RECIPE_PROFILE_IDLE_HOURS         - Idle profile horizon (default: 720)");
    println!("  RECIPE_MAX_PROFILES               - Profiles kept in memory (default: 10000)");
    println!("  RECIPE_TRENDING_BUCKET_SECS       - Trending bucket width (default: 3600)");
    println!("  RECIPE_TRENDING_HORIZON_BUCKETS   - Buckets retained (default: 720)");
    println!("  RECIPE_TRENDING_HALF_LIFE_BUCKETS - Bucket half-life (default: 24)");
    println!("  RECIPE_FACTOR_WEIGHTS             - e.g. 'cuisine=2.5,mood=1.0'");
    println!();
    println!("CORS:");
    println!("  RECIPE_CORS_ORIGINS         - Comma-separated allowed origins (default: all)");
    println!("  RECIPE_CORS_METHODS         - Comma-separated allowed methods");
    println!("  RECIPE_CORS_CREDENTIALS     - Allow credentials true/false (default: false)");
    println!("  RECIPE_CORS_MAX_AGE         - Preflight cache seconds (default: 86400)");
    println!();
    println!("  RUST_LOG                    - Log level (e.g., info, debug, trace)");
    println!();
}
