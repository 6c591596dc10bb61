use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    task::{JoinError, JoinHandle},
    time::{Duration, MissedTickBehavior, interval, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    core::store::{ContactStore, UpsertOutcome},
    engine::{
        aggregate::{AggregateSettings, recompute},
        scoring::{self, ScoringRules},
    },
    protocol::{ContactSource, Diagnostics, ProtocolError, Pull, client::ProtocolClient},
    types::ConnectionHealth,
};

use super::{
    events::RuntimeEvent,
    publisher::{HealthReport, PublishedSnapshot, SnapshotFeed, SnapshotPublisher},
};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("scoreboard runtime has stopped")]
    Closed,
    #[error("driver did not stop within {0:?}")]
    ShutdownTimedOut(Duration),
    #[error("driver task failed: {0}")]
    Join(#[from] JoinError),
}

/// What the driver loop needs from the configuration.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub refresh: Duration,
    pub stale_after: Duration,
    pub scoring: ScoringRules,
    pub aggregate: AggregateSettings,
}

impl From<&Config> for RuntimeSettings {
    fn from(config: &Config) -> Self {
        Self {
            refresh: config.refresh,
            stale_after: config.stale_after,
            scoring: config.scoring.clone(),
            aggregate: config.aggregate.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ScoreboardHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<RuntimeEvent>,
    feed: SnapshotFeed,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

enum Command {
    Reset {
        resp: oneshot::Sender<u64>,
    },
    Diagnostics {
        resp: oneshot::Sender<Diagnostics>,
    },
}

/// Starts the N3FJP client and driver loop described by `config`.
pub fn spawn_from_config(config: &Config, cancel: CancellationToken) -> ScoreboardHandle {
    let source = ProtocolClient::n3fjp(config.source.clone());
    spawn_scoreboard(RuntimeSettings::from(config), source, cancel)
}

/// Spawns the single-writer driver loop over `source`.
///
/// The loop owns the contact store and the previous snapshot. Each tick it
/// pulls, upserts, recomputes, scores and publishes, whether or not the
/// pull succeeded. It stops when `cancel` fires or every handle is dropped.
pub fn spawn_scoreboard<S: ContactSource>(
    settings: RuntimeSettings,
    source: S,
    cancel: CancellationToken,
) -> ScoreboardHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(32);
    let (events_tx, _) = broadcast::channel::<RuntimeEvent>(256);

    let store = ContactStore::new();
    let now = Utc::now();
    let aggregate = recompute(&store, &settings.aggregate, None, now);
    let score = scoring::compute(aggregate.total_points, &settings.scoring);
    let publisher = SnapshotPublisher::new(PublishedSnapshot {
        version: 0,
        reset_generation: 0,
        generated_at: now,
        health: HealthReport::default(),
        aggregate,
        score,
    });
    let feed = publisher.feed();

    let driver = Driver {
        source,
        settings,
        store,
        previous: None,
        awaiting_baseline: true,
        publisher,
        events: events_tx.clone(),
        health: ConnectionHealth::Reconnecting,
        last_success: None,
        last_error: None,
        consecutive_failures: 0,
        reset_generation: 0,
    };
    let task = tokio::spawn(driver.run(cmd_rx, cancel.clone()));

    ScoreboardHandle {
        cmd_tx,
        events_tx,
        feed,
        cancel,
        task: Arc::new(Mutex::new(Some(task))),
    }
}

impl ScoreboardHandle {
    /// Most recent snapshot; never blocks.
    pub fn latest(&self) -> Arc<PublishedSnapshot> {
        self.feed.latest()
    }

    pub fn feed(&self) -> SnapshotFeed {
        self.feed.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.events_tx.subscribe()
    }

    /// Clears the store and forces a full re-pull. Returns the new reset generation.
    pub async fn reset(&self) -> Result<u64, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Reset { resp: tx })
            .await
            .map_err(|_| RuntimeError::Closed)?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    pub async fn diagnostics(&self) -> Result<Diagnostics, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Diagnostics { resp: tx })
            .await
            .map_err(|_| RuntimeError::Closed)?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.cmd_tx.is_closed()
    }

    /// Cancels the driver and waits up to `grace` for it to close the
    /// upstream connection. The task is aborted if it overruns.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), RuntimeError> {
        self.cancel.cancel();
        let Some(mut task) = self.task.lock().await.take() else {
            return Ok(());
        };
        match timeout(grace, &mut task).await {
            Ok(joined) => Ok(joined?),
            Err(_) => {
                task.abort();
                Err(RuntimeError::ShutdownTimedOut(grace))
            }
        }
    }
}

enum Cycle {
    Pulled(Result<Pull, ProtocolError>),
    /// A reset arrived mid-pull and has been applied.
    Interrupted,
    Stopped,
}

struct Driver<S> {
    source: S,
    settings: RuntimeSettings,
    store: ContactStore,
    previous: Option<Arc<PublishedSnapshot>>,
    /// Set until a pull succeeds after start or reset; milestones stay quiet meanwhile.
    awaiting_baseline: bool,
    publisher: SnapshotPublisher,
    events: broadcast::Sender<RuntimeEvent>,
    health: ConnectionHealth,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
    consecutive_failures: u32,
    reset_generation: u64,
}

impl<S: ContactSource> Driver<S> {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>, cancel: CancellationToken) {
        let mut tick = interval(self.settings.refresh);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(refresh_secs = self.settings.refresh.as_secs(), "scoreboard driver started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle_command(cmd);
                }
                _ = tick.tick() => match self.pull_cycle(&mut cmd_rx, &cancel).await {
                    Cycle::Stopped => break,
                    Cycle::Interrupted => {}
                    Cycle::Pulled(result) => {
                        let ok = self.ingest(result, Utc::now());
                        self.publish(Utc::now());
                        if ok {
                            self.awaiting_baseline = false;
                        }
                    }
                },
            }
        }

        self.source.close().await;
        info!("scoreboard driver stopped");
    }

    /// Runs one pull while still answering commands. Diagnostics are served
    /// as they stood when the pull began; a reset abandons the pull.
    async fn pull_cycle(
        &mut self,
        cmd_rx: &mut mpsc::Receiver<Command>,
        cancel: &CancellationToken,
    ) -> Cycle {
        let diagnostics = self.source.diagnostics();
        let reset = {
            let pull = self.source.pull(Utc::now());
            tokio::pin!(pull);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Cycle::Stopped,
                    cmd = cmd_rx.recv() => match cmd {
                        None => return Cycle::Stopped,
                        Some(Command::Diagnostics { resp }) => {
                            let _ = resp.send(diagnostics.clone());
                        }
                        Some(Command::Reset { resp }) => break resp,
                    },
                    result = &mut pull => return Cycle::Pulled(result),
                }
            }
        };

        debug!("pull abandoned for reset");
        let generation = self.reset(Utc::now());
        let _ = reset.send(generation);
        Cycle::Interrupted
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Reset { resp } => {
                let generation = self.reset(Utc::now());
                let _ = resp.send(generation);
            }
            Command::Diagnostics { resp } => {
                let _ = resp.send(self.source.diagnostics());
            }
        }
    }

    fn ingest(&mut self, result: Result<Pull, ProtocolError>, now: DateTime<Utc>) -> bool {
        let pull = match result {
            Ok(pull) => pull,
            Err(err) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.last_error = Some(err.to_string());
                match &err {
                    ProtocolError::BackingOff { .. } => debug!(error = %err, "pull skipped"),
                    _ => warn!(
                        error = %err,
                        failures = self.consecutive_failures,
                        "pull failed"
                    ),
                }
                self.set_health(err.health());
                return false;
            }
        };

        let (mut inserted, mut updated, mut rejected) = (0usize, 0usize, 0usize);
        for record in pull.records {
            match self.store.upsert(record) {
                Ok(UpsertOutcome::Inserted) => inserted += 1,
                Ok(UpsertOutcome::Updated) => updated += 1,
                Ok(UpsertOutcome::Unchanged) => {}
                Err(err) => {
                    rejected += 1;
                    warn!(error = %err, "rejected conflicting contact update");
                }
            }
        }
        if pull.malformed > 0 {
            warn!(kind = ?pull.kind, malformed = pull.malformed, "discarded malformed records");
        }
        debug!(
            kind = ?pull.kind,
            inserted,
            updated,
            rejected,
            total = self.store.len(),
            "ingested pull"
        );

        self.last_success = Some(now);
        self.consecutive_failures = 0;
        self.set_health(ConnectionHealth::Connected);
        true
    }

    fn publish(&mut self, now: DateTime<Utc>) {
        let previous = if self.awaiting_baseline {
            None
        } else {
            self.previous.as_deref().map(|p| &p.aggregate)
        };
        let aggregate = recompute(&self.store, &self.settings.aggregate, previous, now);
        let score = scoring::compute(aggregate.total_points, &self.settings.scoring);
        let published = self.publisher.publish(PublishedSnapshot {
            version: 0,
            reset_generation: self.reset_generation,
            generated_at: now,
            health: self.health_report(now),
            aggregate,
            score,
        });

        for milestone in &published.aggregate.milestones {
            info!(version = published.version, ?milestone, "milestone reached");
            let _ = self.events.send(RuntimeEvent::Milestone {
                version: published.version,
                milestone: milestone.clone(),
            });
        }
        let _ = self.events.send(RuntimeEvent::Published {
            version: published.version,
            total_contacts: published.aggregate.total_contacts,
        });
        self.previous = Some(published);
    }

    fn reset(&mut self, now: DateTime<Utc>) -> u64 {
        self.store.clear();
        self.previous = None;
        self.awaiting_baseline = true;
        self.reset_generation += 1;
        self.source.request_seed();
        info!(generation = self.reset_generation, "contact store reset");
        let _ = self.events.send(RuntimeEvent::Reset {
            generation: self.reset_generation,
        });
        self.publish(now);
        self.reset_generation
    }

    fn health_report(&self, now: DateTime<Utc>) -> HealthReport {
        let stale = match self.last_success {
            None => true,
            Some(at) => (now - at)
                .to_std()
                .is_ok_and(|age| age > self.settings.stale_after),
        };
        HealthReport {
            status: self.health,
            stale,
            last_success: self.last_success,
            last_error: self.last_error.clone(),
            consecutive_failures: self.consecutive_failures,
        }
    }

    fn set_health(&mut self, to: ConnectionHealth) {
        if to == self.health {
            return;
        }
        let from = std::mem::replace(&mut self.health, to);
        match to {
            ConnectionHealth::Connected => info!(?from, ?to, "upstream health changed"),
            _ => warn!(?from, ?to, "upstream health changed"),
        }
        let _ = self.events.send(RuntimeEvent::HealthChanged { from, to });
    }
}
