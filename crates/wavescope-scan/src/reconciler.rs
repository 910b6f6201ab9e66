//! Merge of per-cycle observation batches into the AP registry.
//!
//! The reconciler owns the registry map and the cycle clock. Each
//! [`Reconciler::ingest`] produces a new immutable [`RegistrySnapshot`]:
//! the map sits behind an `Arc` and is copied on write only when a reader
//! still holds the previous snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::domain::bssid::BssidId;
use crate::domain::observation::Observation;
use crate::domain::record::ApRecord;
use crate::domain::registry::{RecordMap, RegistryDelta, RegistrySnapshot, ScanCycle};
use crate::error::BatchFailure;

/// Stateful merge engine behind the registry.
#[derive(Debug, Clone)]
pub struct Reconciler {
    records: Arc<RecordMap>,
    cycle: ScanCycle,
    linger_window: Duration,
    sticky_miss_threshold: u32,
    last_failure: Option<BatchFailure>,
}

impl Reconciler {
    /// Default number of unreported cycles a sticky field survives.
    pub const DEFAULT_STICKY_MISS_THRESHOLD: u32 = 5;

    /// Default linger window.
    pub const DEFAULT_LINGER_WINDOW: Duration = Duration::from_secs(60);

    /// Create an empty registry.
    pub fn new(linger_window: Duration, sticky_miss_threshold: u32) -> Self {
        Self {
            records: Arc::new(BTreeMap::new()),
            cycle: ScanCycle::default(),
            linger_window,
            sticky_miss_threshold,
            last_failure: None,
        }
    }

    /// Create an empty registry with the tunables from `config`.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.linger_window(), config.sticky_miss_threshold)
    }

    /// The current cycle.
    pub fn cycle(&self) -> ScanCycle {
        self.cycle
    }

    /// The failure of the latest cycle, if it failed.
    pub fn last_failure(&self) -> Option<&BatchFailure> {
        self.last_failure.as_ref()
    }

    /// Number of records, ghosts included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// An immutable view of the current registry.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::new(self.cycle, Arc::clone(&self.records))
    }

    /// Merge one successful batch observed at `now`.
    ///
    /// Advances the cycle, merges every observation into its record,
    /// then ghosts or purges every record the batch did not mention.
    /// Several observations of one BSSID in a batch are folded first,
    /// so each record is merged at most once per cycle.
    pub fn ingest(&mut self, batch: &[Observation], now: Instant) -> RegistryDelta {
        self.cycle = self.cycle.next();
        self.last_failure = None;
        let cycle = self.cycle;
        let threshold = self.sticky_miss_threshold;
        let mut delta = RegistryDelta {
            cycle,
            ..RegistryDelta::default()
        };

        let mut folded: BTreeMap<BssidId, Observation> = BTreeMap::new();
        for obs in batch {
            let obs = obs.clone().normalized();
            match folded.get_mut(&obs.bssid) {
                Some(existing) => existing.absorb(obs),
                None => {
                    folded.insert(obs.bssid, obs);
                }
            }
        }

        let records = Arc::make_mut(&mut self.records);
        let seen: BTreeSet<BssidId> = folded.keys().copied().collect();

        for (bssid, obs) in folded {
            match records.get_mut(&bssid) {
                Some(record) => {
                    for field in record.merge(obs, cycle, now, threshold) {
                        debug!(%bssid, field, cycle = cycle.0, "sticky field decayed");
                        delta.decayed.push((bssid, field));
                    }
                    delta.refreshed.push(bssid);
                }
                None => {
                    records.insert(bssid, ApRecord::new(obs, cycle, now));
                    delta.added.push(bssid);
                }
            }
        }

        let linger = self.linger_window;
        records.retain(|bssid, record| {
            if seen.contains(bssid) {
                return true;
            }
            if now.saturating_duration_since(record.last_seen_at) <= linger {
                if !record.ghost {
                    record.ghost = true;
                    record.in_use = false;
                    delta.ghosted.push(*bssid);
                }
                true
            } else {
                delta.purged.push(*bssid);
                false
            }
        });

        debug!(
            cycle = cycle.0,
            bssid_count = records.len(),
            added = delta.added.len(),
            refreshed = delta.refreshed.len(),
            ghosted = delta.ghosted.len(),
            purged = delta.purged.len(),
            "ingest complete"
        );
        delta
    }

    /// Account for a cycle whose batch failed.
    ///
    /// The registry is left exactly as it was; only the cycle advances.
    pub fn record_failure(&mut self, failure: &BatchFailure) -> ScanCycle {
        self.cycle = self.cycle.next();
        warn!(cycle = self.cycle.0, error = %failure, "scan batch failed; keeping last registry");
        self.last_failure = Some(failure.clone());
        self.cycle
    }

    /// Union an earlier snapshot into the registry.
    ///
    /// Every BSSID in `earlier` ends up present and not ghosted. Records
    /// the current registry already holds keep their newer merged state;
    /// records it has since purged are restored from `earlier`. Returns the
    /// BSSIDs that were restored or un-ghosted.
    pub fn union_with(&mut self, earlier: &RegistrySnapshot) -> Vec<BssidId> {
        let records = Arc::make_mut(&mut self.records);
        let mut carried = Vec::new();
        for prior in earlier.records() {
            match records.get_mut(&prior.bssid) {
                Some(current) if current.ghost => {
                    current.ghost = false;
                    carried.push(prior.bssid);
                }
                Some(_) => {}
                None => {
                    let mut restored = prior.clone();
                    restored.ghost = false;
                    records.insert(prior.bssid, restored);
                    carried.push(prior.bssid);
                }
            }
        }
        info!(
            cycle = self.cycle.0,
            carried = carried.len(),
            bssid_count = records.len(),
            "startup scans unioned"
        );
        carried
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LINGER_WINDOW, Self::DEFAULT_STICKY_MISS_THRESHOLD)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
