//! The periodic cycle producer.
//!
//! One task owns the [`Reconciler`] and the [`RescanCoordinator`]. On every
//! refresh tick it polls the [`ObservationSource`], feeds the outcome
//! through the coordinator and publishes the resulting snapshot on a
//! `watch` channel. At most one poll is in flight; ticks missed while a
//! poll runs are skipped, never queued.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::ScanConfig;
use crate::coordinator::RescanCoordinator;
use crate::domain::registry::{RegistrySnapshot, ScanCycle};
use crate::error::BatchFailure;
use crate::port::ObservationSource;
use crate::reconciler::Reconciler;

/// Outcome of the latest cycle, published alongside its snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScanStatus {
    /// Nothing published yet.
    Starting,
    /// The latest cycle ingested a batch.
    Ok { cycle: ScanCycle },
    /// The latest cycle failed; the snapshot is the last good registry.
    Failed {
        cycle: ScanCycle,
        failure: BatchFailure,
    },
}

impl ScanStatus {
    fn from_reconciler(reconciler: &Reconciler) -> Self {
        match reconciler.last_failure() {
            Some(failure) => Self::Failed {
                cycle: reconciler.cycle(),
                failure: failure.clone(),
            },
            None => Self::Ok {
                cycle: reconciler.cycle(),
            },
        }
    }
}

/// What subscribers receive after every published cycle.
#[derive(Debug, Clone)]
pub struct PublishedState {
    pub snapshot: RegistrySnapshot,
    pub status: ScanStatus,
    pub published_at: DateTime<Utc>,
}

impl Default for PublishedState {
    fn default() -> Self {
        Self {
            snapshot: RegistrySnapshot::default(),
            status: ScanStatus::Starting,
            published_at: Utc::now(),
        }
    }
}

/// Periodic scanner over an [`ObservationSource`].
pub struct ScanLoop {
    config: ScanConfig,
    source: Arc<dyn ObservationSource>,
}

impl ScanLoop {
    pub fn new(config: ScanConfig, source: Arc<dyn ObservationSource>) -> Self {
        Self { config, source }
    }

    /// Start the loop on the current tokio runtime.
    pub fn spawn(self) -> ScanHandle {
        let (state_tx, state_rx) = watch::channel(PublishedState::default());
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(self.run(state_tx, shutdown_rx));
        ScanHandle {
            state: state_rx,
            shutdown_tx,
            task,
        }
    }

    /// Run cycles until the first snapshot is published and return it.
    ///
    /// With the startup double scan enabled this takes two polls.
    pub async fn run_once(&self) -> PublishedState {
        let mut reconciler = Reconciler::from_config(&self.config);
        let mut coordinator = RescanCoordinator::new(self.config.startup_double_scan);
        loop {
            let outcome = self.source.poll().await;
            let now = Instant::now().into_std();
            if let Some(snapshot) = coordinator.on_cycle(&mut reconciler, outcome, now) {
                return PublishedState {
                    snapshot,
                    status: ScanStatus::from_reconciler(&reconciler),
                    published_at: Utc::now(),
                };
            }
        }
    }

    async fn run(self, state_tx: watch::Sender<PublishedState>, mut shutdown_rx: mpsc::Receiver<()>) {
        let period = self.config.refresh_interval();
        let mut reconciler = Reconciler::from_config(&self.config);
        let mut coordinator = RescanCoordinator::new(self.config.startup_double_scan);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            source = self.source.name(),
            interval_s = period.as_secs(),
            double_scan = self.config.startup_double_scan,
            "scan loop started"
        );

        loop {
            if !coordinator.wants_immediate_cycle() {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("scan loop shutdown requested");
                        break;
                    }
                    _ = interval.tick() => {}
                }
            }

            let start = Instant::now();
            let outcome = self.source.poll().await;
            let elapsed = start.elapsed();
            if elapsed > period {
                tracing::debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    skipped = missed_ticks(elapsed, period),
                    "scan cycle overran refresh interval; skipping ticks"
                );
            }

            let now = Instant::now().into_std();
            let Some(snapshot) = coordinator.on_cycle(&mut reconciler, outcome, now) else {
                continue;
            };
            let status = ScanStatus::from_reconciler(&reconciler);
            tracing::debug!(
                cycle = reconciler.cycle().0,
                bssid_count = snapshot.len(),
                ghosts = snapshot.ghost_count(),
                elapsed_ms = elapsed.as_millis() as u64,
                "snapshot published"
            );
            state_tx.send_replace(PublishedState {
                snapshot,
                status,
                published_at: Utc::now(),
            });
        }

        tracing::debug!(cycle = reconciler.cycle().0, "scan loop ended");
    }
}

fn missed_ticks(elapsed: Duration, period: Duration) -> u64 {
    if period.is_zero() {
        return 0;
    }
    (elapsed.as_nanos() / period.as_nanos()) as u64
}

/// Handle to a running [`ScanLoop`].
pub struct ScanHandle {
    state: watch::Receiver<PublishedState>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ScanHandle {
    /// A receiver that is notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<PublishedState> {
        self.state.clone()
    }

    /// The most recently published state.
    pub fn latest(&self) -> PublishedState {
        self.state.borrow().clone()
    }

    /// Stop the loop after any in-flight poll completes.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "scan loop task ended abnormally");
        }
    }
}
