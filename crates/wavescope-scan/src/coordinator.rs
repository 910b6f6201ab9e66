//! Startup sequencing above the reconciler.
//!
//! With the double scan enabled, the first cycle's result is held back, a
//! second cycle runs immediately, and both are unioned before anything is
//! published. Access points that only answer active scans tend to show
//! up in the second scan alone. After that first publish the coordinator
//! is inert and every cycle publishes directly.

use std::time::Instant;

use tracing::{debug, info};

use crate::domain::observation::Observation;
use crate::domain::registry::RegistrySnapshot;
use crate::error::BatchFailure;
use crate::reconciler::Reconciler;

#[derive(Debug, Clone)]
enum Phase {
    AwaitingFirst,
    AwaitingSecond { held: Option<RegistrySnapshot> },
    Inert,
}

/// Startup double-scan state machine.
#[derive(Debug, Clone)]
pub struct RescanCoordinator {
    phase: Phase,
}

impl RescanCoordinator {
    /// A coordinator that holds back the first cycle when `double_scan`.
    pub fn new(double_scan: bool) -> Self {
        let phase = if double_scan {
            Phase::AwaitingFirst
        } else {
            Phase::Inert
        };
        Self { phase }
    }

    /// Whether startup is over.
    pub fn is_inert(&self) -> bool {
        matches!(self.phase, Phase::Inert)
    }

    /// Whether the next cycle should run now rather than on the next tick.
    pub fn wants_immediate_cycle(&self) -> bool {
        matches!(self.phase, Phase::AwaitingSecond { .. })
    }

    /// Feed one cycle's outcome through the reconciler.
    ///
    /// Returns the snapshot to publish, or `None` while the first startup
    /// cycle is being held back.
    pub fn on_cycle(
        &mut self,
        reconciler: &mut Reconciler,
        outcome: Result<Vec<Observation>, BatchFailure>,
        at: Instant,
    ) -> Option<RegistrySnapshot> {
        let ok = match &outcome {
            Ok(batch) => {
                reconciler.ingest(batch, at);
                true
            }
            Err(failure) => {
                reconciler.record_failure(failure);
                false
            }
        };

        match std::mem::replace(&mut self.phase, Phase::Inert) {
            Phase::AwaitingFirst => {
                debug!(
                    cycle = reconciler.cycle().0,
                    bssid_count = reconciler.len(),
                    "holding first startup scan"
                );
                let held = ok.then(|| reconciler.snapshot());
                self.phase = Phase::AwaitingSecond { held };
                None
            }
            Phase::AwaitingSecond { held } => {
                match held {
                    Some(first) => {
                        reconciler.union_with(&first);
                    }
                    None => info!("first startup scan failed; publishing second alone"),
                }
                Some(reconciler.snapshot())
            }
            Phase::Inert => Some(reconciler.snapshot()),
        }
    }
}
