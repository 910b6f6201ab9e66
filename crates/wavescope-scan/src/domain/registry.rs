//! Registry snapshot, cycle clock and per-cycle deltas.
//!
//! The registry is published as an immutable [`RegistrySnapshot`]. Readers
//! hold an `Arc` to the map for as long as they render; the reconciler
//! copies on write, so a snapshot never changes under a reader.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::bssid::{Band, BssidId};
use crate::domain::record::ApRecord;

// ---------------------------------------------------------------------------
// ScanCycle
// ---------------------------------------------------------------------------

/// Monotonic poll-cycle counter. Advances once per ingest and once per
/// batch failure; cycle 0 means nothing has been polled yet.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ScanCycle(pub u64);

impl ScanCycle {
    /// The following cycle.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for ScanCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RegistrySnapshot
// ---------------------------------------------------------------------------

/// The map type behind a snapshot, ordered by BSSID.
pub type RecordMap = BTreeMap<BssidId, ApRecord>;

/// An immutable view of the registry after a cycle.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    cycle: ScanCycle,
    records: Arc<RecordMap>,
}

impl RegistrySnapshot {
    pub(crate) fn new(cycle: ScanCycle, records: Arc<RecordMap>) -> Self {
        Self { cycle, records }
    }

    /// Cycle at which this snapshot was taken.
    pub fn cycle(&self) -> ScanCycle {
        self.cycle
    }

    /// Number of records, ghosts included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up one record.
    pub fn get(&self, bssid: &BssidId) -> Option<&ApRecord> {
        self.records.get(bssid)
    }

    /// Whether `bssid` has a record.
    pub fn contains(&self, bssid: &BssidId) -> bool {
        self.records.contains_key(bssid)
    }

    /// All records in BSSID order.
    pub fn records(&self) -> impl Iterator<Item = &ApRecord> {
        self.records.values()
    }

    /// All keys in order.
    pub fn bssids(&self) -> impl Iterator<Item = &BssidId> {
        self.records.keys()
    }

    /// Number of records currently lingering.
    pub fn ghost_count(&self) -> usize {
        self.records.values().filter(|r| r.ghost).count()
    }

    /// Bands with at least one record, in display order.
    pub fn bands_present(&self) -> Vec<Band> {
        Band::ALL
            .into_iter()
            .filter(|b| self.records.values().any(|r| r.band.get() == Some(*b)))
            .collect()
    }

    /// Whether two snapshots share the same underlying map allocation.
    pub fn shares_storage_with(&self, other: &RegistrySnapshot) -> bool {
        Arc::ptr_eq(&self.records, &other.records)
    }
}

// ---------------------------------------------------------------------------
// RegistryDelta
// ---------------------------------------------------------------------------

/// What one ingest changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryDelta {
    /// Cycle the ingest ran in.
    pub cycle: ScanCycle,
    /// BSSIDs seen for the first time.
    pub added: Vec<BssidId>,
    /// Existing BSSIDs merged with a new observation.
    pub refreshed: Vec<BssidId>,
    /// BSSIDs that became ghosts this cycle.
    pub ghosted: Vec<BssidId>,
    /// BSSIDs removed after their linger window elapsed.
    pub purged: Vec<BssidId>,
    /// Sticky fields cleared by decay, per BSSID.
    pub decayed: Vec<(BssidId, &'static str)>,
}

impl RegistryDelta {
    /// Whether the ingest changed record membership or ghost state.
    pub fn is_quiet(&self) -> bool {
        self.added.is_empty() && self.ghosted.is_empty() && self.purged.is_empty()
    }
}
