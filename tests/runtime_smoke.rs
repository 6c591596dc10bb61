mod common;

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use fdscore::{
    contact::ContactRecord,
    engine::{aggregate::AggregateSettings, milestone::Milestone, scoring::ScoringRules},
    protocol::{ContactSource, Diagnostics, ProtocolError, Pull, PullKind},
    runtime::{
        events::RuntimeEvent,
        handle::{RuntimeError, RuntimeSettings, ScoreboardHandle, spawn_scoreboard},
        publisher::{PublishedSnapshot, SnapshotFeed},
    },
    types::ConnectionHealth,
};

use common::batch;

enum Step {
    Records(Vec<ContactRecord>),
    Drop,
    Timeout,
}

#[derive(Clone, Default)]
struct Script {
    steps: Arc<Mutex<VecDeque<Step>>>,
    /// Full log answered to the pull after a seed request.
    full_log: Arc<Mutex<Vec<ContactRecord>>>,
    seed_pending: Arc<Mutex<bool>>,
    seeds_requested: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl Script {
    fn push(&self, step: Step) {
        self.steps.lock().expect("lock").push_back(step);
    }
}

impl ContactSource for Script {
    async fn pull(&mut self, _now: DateTime<Utc>) -> Result<Pull, ProtocolError> {
        if std::mem::take(&mut *self.seed_pending.lock().expect("lock")) {
            return Ok(Pull {
                kind: PullKind::Seed,
                records: self.full_log.lock().expect("lock").clone(),
                malformed: 0,
            });
        }
        let step = self.steps.lock().expect("lock").pop_front();
        match step {
            Some(Step::Records(records)) => Ok(Pull {
                kind: PullKind::Poll,
                records,
                malformed: 1,
            }),
            Some(Step::Drop) => Err(ProtocolError::Disconnected),
            Some(Step::Timeout) => Err(ProtocolError::Timeout(Duration::from_secs(8))),
            None => Ok(Pull {
                kind: PullKind::Poll,
                records: Vec::new(),
                malformed: 0,
            }),
        }
    }

    fn request_seed(&mut self) {
        *self.seed_pending.lock().expect("lock") = true;
        self.seeds_requested.fetch_add(1, Ordering::SeqCst);
    }

    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            host: "script".to_string(),
            port: 1100,
            ..Diagnostics::default()
        }
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn settings() -> RuntimeSettings {
    RuntimeSettings {
        refresh: Duration::from_millis(20),
        stale_after: Duration::from_secs(60),
        scoring: ScoringRules::default(),
        aggregate: AggregateSettings::default(),
    }
}

async fn wait_until(
    feed: &mut SnapshotFeed,
    pred: impl Fn(&PublishedSnapshot) -> bool,
) -> Arc<PublishedSnapshot> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let current = feed.latest();
            if pred(&current) {
                return current;
            }
            feed.next().await.expect("publisher alive");
        }
    })
    .await
    .expect("condition reached in time")
}

fn drain(rx: &mut broadcast::Receiver<RuntimeEvent>) -> Vec<RuntimeEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

fn start(script: &Script) -> (ScoreboardHandle, CancellationToken) {
    let cancel = CancellationToken::new();
    let handle = spawn_scoreboard(settings(), script.clone(), cancel.clone());
    (handle, cancel)
}

#[tokio::test]
async fn cycle_ingests_survives_failures_and_reports_milestones() {
    let script = Script::default();
    let seed = batch(0, 60, common::at(18, 0));
    script.push(Step::Records(seed.clone()));
    script.push(Step::Records(seed));
    script.push(Step::Drop);
    script.push(Step::Timeout);
    script.push(Step::Timeout);
    script.push(Step::Timeout);
    script.push(Step::Records(batch(500, 45, common::at(19, 0))));

    let (handle, _cancel) = start(&script);
    let mut events = handle.subscribe();
    let mut feed = handle.feed();

    assert_eq!(handle.latest().aggregate.total_contacts, 0);

    let connected = wait_until(&mut feed, |s| s.aggregate.total_contacts == 60).await;
    assert_eq!(connected.health.status, ConnectionHealth::Connected);
    assert!(!connected.health.stale);
    assert_eq!(connected.score.qso_points, 60);

    let degraded = wait_until(&mut feed, |s| s.health.status == ConnectionHealth::Degraded).await;
    assert_eq!(degraded.aggregate.total_contacts, 60);
    assert!(degraded.health.consecutive_failures >= 2);
    assert!(degraded.health.last_error.is_some());

    let grown = wait_until(&mut feed, |s| s.aggregate.total_contacts == 105).await;
    assert_eq!(grown.health.status, ConnectionHealth::Connected);
    assert_eq!(grown.health.consecutive_failures, 0);

    let seen = drain(&mut events);
    let milestones: Vec<&Milestone> = seen
        .iter()
        .filter_map(|e| match e {
            RuntimeEvent::Milestone { milestone, .. } => Some(milestone),
            _ => None,
        })
        .collect();
    assert_eq!(milestones, [&Milestone::TotalContacts { threshold: 100 }]);
    assert!(seen.contains(&RuntimeEvent::HealthChanged {
        from: ConnectionHealth::Connected,
        to: ConnectionHealth::Reconnecting,
    }));
    assert!(seen.contains(&RuntimeEvent::HealthChanged {
        from: ConnectionHealth::Reconnecting,
        to: ConnectionHealth::Degraded,
    }));

    let versions: Vec<u64> = seen
        .iter()
        .filter_map(|e| match e {
            RuntimeEvent::Published { version, .. } => Some(*version),
            _ => None,
        })
        .collect();
    assert!(versions.windows(2).all(|w| w[0] < w[1]));

    handle.shutdown(Duration::from_secs(1)).await.unwrap();
    assert_eq!(script.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn totals_never_decrease_without_reset() {
    let script = Script::default();
    for i in 0..10 {
        script.push(Step::Records(batch(i * 5, 5, common::at(18, 0))));
        if i % 3 == 0 {
            script.push(Step::Drop);
        }
    }
    let (handle, _cancel) = start(&script);
    let mut feed = handle.feed();

    let mut last = 0;
    let done = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(snap) = feed.next().await {
            assert!(snap.aggregate.total_contacts >= last);
            last = snap.aggregate.total_contacts;
            if last == 50 {
                break;
            }
        }
    })
    .await;
    assert!(done.is_ok());
    handle.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn reset_clears_store_and_requests_seed() {
    let script = Script::default();
    script.push(Step::Records(batch(0, 120, common::at(20, 0))));
    let (handle, _cancel) = start(&script);
    let mut feed = handle.feed();

    wait_until(&mut feed, |s| s.aggregate.total_contacts == 120).await;
    let mut events = handle.subscribe();
    *script.full_log.lock().unwrap() = batch(0, 130, common::at(20, 0));

    let generation = handle.reset().await.unwrap();
    assert_eq!(generation, 1);
    assert_eq!(script.seeds_requested.load(Ordering::SeqCst), 1);

    assert_eq!(handle.latest().reset_generation, 1);

    // The re-pulled log forms a new baseline and fires no milestones.
    wait_until(&mut feed, |s| s.reset_generation == 1 && s.aggregate.total_contacts == 130).await;
    let seen = drain(&mut events);
    let reset_at = seen
        .iter()
        .position(|e| *e == RuntimeEvent::Reset { generation: 1 })
        .expect("reset event");
    assert!(matches!(
        seen[reset_at + 1],
        RuntimeEvent::Published { total_contacts: 0, .. }
    ));
    assert!(!seen.iter().any(|e| matches!(e, RuntimeEvent::Milestone { .. })));

    let diag = handle.diagnostics().await.unwrap();
    assert_eq!(diag.host, "script");
    handle.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn handle_reports_closed_after_shutdown() {
    let script = Script::default();
    let (handle, cancel) = start(&script);
    cancel.cancel();
    handle.shutdown(Duration::from_secs(1)).await.unwrap();
    assert!(!handle.is_running());
    assert!(matches!(handle.reset().await, Err(RuntimeError::Closed)));
    // Second shutdown is a no-op.
    handle.shutdown(Duration::from_secs(1)).await.unwrap();
}

/// Never answers within a test's patience.
struct Stalled {
    pulls: Arc<AtomicUsize>,
}

impl ContactSource for Stalled {
    async fn pull(&mut self, _now: DateTime<Utc>) -> Result<Pull, ProtocolError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(ProtocolError::Timeout(Duration::from_secs(30)))
    }

    fn request_seed(&mut self) {}

    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            host: "stalled".to_string(),
            ..Diagnostics::default()
        }
    }

    async fn close(&mut self) {}
}

#[tokio::test]
async fn commands_are_answered_during_a_slow_pull() {
    let pulls = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();
    let handle = spawn_scoreboard(
        settings(),
        Stalled {
            pulls: Arc::clone(&pulls),
        },
        cancel.clone(),
    );
    while pulls.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let patience = Duration::from_secs(1);
    let diag = tokio::time::timeout(patience, handle.diagnostics())
        .await
        .expect("diagnostics answered mid-pull")
        .unwrap();
    assert_eq!(diag.host, "stalled");

    let generation = tokio::time::timeout(patience, handle.reset())
        .await
        .expect("reset answered mid-pull")
        .unwrap();
    assert_eq!(generation, 1);
    assert_eq!(handle.latest().reset_generation, 1);

    handle.shutdown(Duration::from_secs(1)).await.unwrap();
}
