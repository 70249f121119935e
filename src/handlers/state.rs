//! Shared server state
//!
//! One [`AppContext`] per process, handed to every handler as
//! `State<Arc<AppContext>>`. It owns the personalization service together
//! with the concrete catalog and event fan-out the service talks to through
//! its traits.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::clock::SharedClock;
use crate::config::ServerConfig;
use crate::constants::EVENT_BROADCAST_CAPACITY;
use crate::personalization::{
    BehaviorEvent, BroadcastSink, CancelSignal, InMemoryCatalog, PersonalizationService,
    ServiceConfig,
};

pub struct AppContext {
    service: PersonalizationService,
    catalog: Arc<InMemoryCatalog>,
    events: Arc<BroadcastSink>,
    config: ServerConfig,
    clock: SharedClock,
    started_at: DateTime<Utc>,
}

impl AppContext {
    /// Fresh state with an empty catalog
    pub fn new(config: ServerConfig, clock: SharedClock) -> Self {
        Self::with_catalog(config, Arc::new(InMemoryCatalog::new()), clock)
    }

    pub fn with_catalog(
        config: ServerConfig,
        catalog: Arc<InMemoryCatalog>,
        clock: SharedClock,
    ) -> Self {
        let events = Arc::new(BroadcastSink::new(EVENT_BROADCAST_CAPACITY));
        let service = PersonalizationService::new(
            ServiceConfig::from(&config),
            catalog.clone(),
            events.clone(),
            clock.clone(),
        );
        let started_at = clock.now();

        Self {
            service,
            catalog,
            events,
            config,
            clock,
            started_at,
        }
    }

    /// Load a catalog file into the live catalog. Returns the recipes read.
    pub fn load_catalog(&self, path: &Path) -> Result<usize> {
        let loaded = self
            .catalog
            .load_json_file(path)
            .context("initial catalog load")?;
        let invalidated = self.service.invalidate_recommendations(None);
        info!(loaded, catalog_size = self.catalog.len(), invalidated, "Recipe catalog ready");
        Ok(loaded)
    }

    pub fn service(&self) -> &PersonalizationService {
        &self.service
    }

    pub fn catalog(&self) -> &InMemoryCatalog {
        &self.catalog
    }

    pub fn server_config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BehaviorEvent> {
        self.events.subscribe()
    }

    pub fn event_subscribers(&self) -> usize {
        self.events.subscriber_count()
    }

    pub fn uptime_seconds(&self) -> u64 {
        (self.clock.now() - self.started_at).num_seconds().max(0) as u64
    }

    /// Per-request scoring deadline, starting now
    pub fn scoring_deadline(&self) -> CancelSignal {
        CancelSignal::with_timeout(std::time::Duration::from_millis(
            self.config.scoring_deadline_ms,
        ))
    }
}
