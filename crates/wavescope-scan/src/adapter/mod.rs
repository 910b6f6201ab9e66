//! Adapter implementations for the [`ObservationSource`] port.
//!
//! - [`NmcliIwSource`]: `nmcli dev wifi list` enriched by `iw scan dump` (Linux).
//! - [`ReplaySource`]: scripted cycles loaded from JSON.
//!
//! [`ObservationSource`]: crate::port::ObservationSource

pub mod decode;
pub mod nmcli_iw;
pub mod replay;

pub use decode::{parse_iw_scan_dump, parse_nmcli_terse, IwBss};
pub use nmcli_iw::{NmcliIwConfig, NmcliIwSource};
pub use replay::{ReplayCycle, ReplaySource};
