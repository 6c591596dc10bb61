//! Snapshot fan-out to display clients.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::{
    engine::{aggregate::AggregateSnapshot, scoring::ScoreBreakdown},
    types::ConnectionHealth,
};

/// Upstream status as presented next to the numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: ConnectionHealth,
    /// No successful pull within the stale window.
    pub stale: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl Default for HealthReport {
    fn default() -> Self {
        Self {
            status: ConnectionHealth::Reconnecting,
            stale: true,
            last_success: None,
            last_error: None,
            consecutive_failures: 0,
        }
    }
}

/// One immutable scoreboard view. Never mutated once published.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedSnapshot {
    /// Strictly increasing across the process lifetime, resets included.
    pub version: u64,
    /// Bumped by each administrative reset.
    pub reset_generation: u64,
    pub generated_at: DateTime<Utc>,
    pub health: HealthReport,
    pub aggregate: AggregateSnapshot,
    pub score: ScoreBreakdown,
}

/// Publishing side. Owned by the driver loop.
#[derive(Debug)]
pub struct SnapshotPublisher {
    tx: watch::Sender<Arc<PublishedSnapshot>>,
}

impl SnapshotPublisher {
    /// Starts with `initial` as version 0 so early subscribers have something to show.
    pub fn new(mut initial: PublishedSnapshot) -> Self {
        initial.version = 0;
        let (tx, _) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    /// Assigns the next version and replaces the current snapshot.
    ///
    /// Never waits on subscribers; a slow reader just skips to the newest
    /// value on its next look.
    pub fn publish(&self, mut snapshot: PublishedSnapshot) -> Arc<PublishedSnapshot> {
        snapshot.version = self.tx.borrow().version + 1;
        let snapshot = Arc::new(snapshot);
        self.tx.send_replace(Arc::clone(&snapshot));
        snapshot
    }

    pub fn latest(&self) -> Arc<PublishedSnapshot> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn feed(&self) -> SnapshotFeed {
        SnapshotFeed {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side handed to display clients.
#[derive(Debug, Clone)]
pub struct SnapshotFeed {
    rx: watch::Receiver<Arc<PublishedSnapshot>>,
}

impl SnapshotFeed {
    /// Current snapshot, available immediately.
    pub fn latest(&self) -> Arc<PublishedSnapshot> {
        Arc::clone(&self.rx.borrow())
    }

    /// Waits for a snapshot this feed has not yet seen. `None` once the
    /// publisher is gone.
    pub async fn next(&mut self) -> Option<Arc<PublishedSnapshot>> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update()))
    }

    /// First snapshot with a version above `version`, waiting if needed.
    pub async fn newer_than(&mut self, version: u64) -> Option<Arc<PublishedSnapshot>> {
        let snapshot = self.rx.wait_for(|s| s.version > version).await.ok()?;
        Some(Arc::clone(&snapshot))
    }
}
