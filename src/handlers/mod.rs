//! HTTP API Handlers
//!
//! Each submodule handles one area of the REST API; [`router`] wires them up.

// Core modules
pub mod router;
pub mod state;
pub mod types;

// Health and metrics
pub mod health;

// Personalization
pub mod behavior;
pub mod insights;
pub mod recommendations;

// Catalog administration
pub mod catalog;

// Test utilities (compiled only in test builds)
#[cfg(test)]
pub mod test_helpers;

// Re-export commonly used items
pub use router::{build_api_routes, build_public_routes, build_router, AppState};
pub use state::AppContext;
pub use types::*;
