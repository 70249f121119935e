//! Recipe Engine Library
//!
//! In-process cache and personalization core for the recipe generation
//! backend.
//!
//! # Key Features
//! - TTL + LRU response cache with deterministic keys
//! - Per-user behavior profiles with time-decayed affinities
//! - Global trending counters over sliding time buckets
//! - Explainable multi-factor recommendation scoring
//!
//! Everything is in memory and scoped to one [`PersonalizationService`]
//! instance; nothing survives a restart.
//!
//! [`PersonalizationService`]: personalization::PersonalizationService

pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod personalization;
pub mod tracing_setup;
pub mod validation;

// Re-export dependencies to ensure tests/benchmarks use the same version
pub use chrono;
pub use parking_lot;
