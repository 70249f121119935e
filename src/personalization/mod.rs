//! Recipe personalization
//!
//! - [`profile::BehaviorTracker`]: per-user decayed affinities
//! - [`trending::TrendingAggregator`]: global time-bucketed popularity
//! - [`scorer::RecommendationScorer`]: pure multi-factor ranking
//! - [`service::PersonalizationService`]: the façade composing them with the response cache

pub mod catalog;
pub mod events;
pub mod mood;
pub mod profile;
pub mod scorer;
pub mod seasonal;
pub mod service;
pub mod sink;
pub mod trending;

pub use catalog::{CandidateFilter, CandidateSupplier, InMemoryCatalog};
pub use events::{BehaviorAction, BehaviorEvent, Difficulty, EventType, Rating, RecipeAttributes};
pub use mood::Mood;
pub use profile::{BehaviorTracker, TrackerConfig, UserProfile};
pub use scorer::{
    CancelSignal, Factor, FactorContribution, FactorWeights, RecommendationCandidate,
    RecommendationScorer, ScoringContext,
};
pub use seasonal::SeasonalContext;
pub use service::{
    MaintenanceReport, PersonalizationService, Recommendation, RecommendationPage,
    RecommendationQuery, RecordOutcome, ServiceConfig,
};
pub use sink::{BehaviorSink, BroadcastSink, MemorySink, NoopSink};
pub use trending::{TrendingAggregator, TrendingConfig, TrendingEntry, TrendingPeriod, TrendingSnapshot};
