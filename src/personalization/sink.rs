//! Behavior event mirroring
//!
//! Recorded events may be mirrored elsewhere (analytics storage, live
//! subscribers). Profile and trending state never depend on the mirror
//! succeeding: the service logs a failed mirror and moves on.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

use super::events::BehaviorEvent;

pub trait BehaviorSink: Send + Sync {
    fn mirror(&self, event: &BehaviorEvent) -> anyhow::Result<()>;
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl BehaviorSink for NoopSink {
    fn mirror(&self, _event: &BehaviorEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Fans events out to live subscribers (the `/api/events` stream)
pub struct BroadcastSink {
    tx: broadcast::Sender<BehaviorEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BehaviorEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl BehaviorSink for BroadcastSink {
    fn mirror(&self, event: &BehaviorEvent) -> anyhow::Result<()> {
        // No subscribers is not a failure
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

/// Collects events in memory; can be told to fail
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<BehaviorEvent>>,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn events(&self) -> Vec<BehaviorEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BehaviorSink for MemorySink {
    fn mirror(&self, event: &BehaviorEvent) -> anyhow::Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            anyhow::bail!("sink unavailable");
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}
