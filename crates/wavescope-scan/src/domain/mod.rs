//! Domain types: identities, observations, records and the registry.

pub mod bssid;
pub mod observation;
pub mod record;
pub mod registry;

pub use bssid::{Band, BssidId, HeCapability, Pmf, RoamingFlags, SecondaryOffset, WifiGen};
pub use observation::Observation;
pub use record::{phy_mode, security_summary, ApRecord, Sticky};
pub use registry::{RecordMap, RegistryDelta, RegistrySnapshot, ScanCycle};
