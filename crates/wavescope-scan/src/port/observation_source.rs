//! The driving port through which the scan loop obtains observations.

use async_trait::async_trait;

use crate::domain::observation::Observation;
use crate::error::BatchFailure;

/// Produces one batch of observations per poll cycle.
///
/// Implementations include:
/// - [`crate::adapter::NmcliIwSource`] -- Linux, `nmcli` plus `iw scan dump`.
/// - [`crate::adapter::ReplaySource`] -- scripted batches from JSON.
///
/// A poll either yields a complete batch, in which individual fields may
/// be absent, or a single [`BatchFailure`]. It never yields a partially
/// corrupted batch.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Run one poll cycle.
    async fn poll(&self) -> Result<Vec<Observation>, BatchFailure>;
}
