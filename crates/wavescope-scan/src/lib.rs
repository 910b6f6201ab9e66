//! # wavescope-scan
//!
//! Access-point reconciliation and spectrum geometry for periodic WiFi scans.
//!
//! Each scan cycle yields a batch of partial [`Observation`]s. This crate
//! provides:
//!
//! - **Reconciliation**: [`Reconciler`] merges batches into a registry of
//!   [`ApRecord`]s with sticky fields, volatile signal, ghosting and purge;
//!   [`RescanCoordinator`] unions the two startup scans.
//! - **Geometry**: [`GeometryEngine`] places an AP on the frequency axis
//!   (bonded span, covered channels, DFS/PSC flags).
//! - **Port**: [`ObservationSource`] -- trait abstracting the scan backend
//! - **Adapters**: [`NmcliIwSource`] (Linux tools) and [`ReplaySource`] (JSON)
//! - **Service**: [`ScanLoop`] publishes a [`RegistrySnapshot`] per cycle
//!   over a `watch` channel.
//! - **Capture**: [`CaptureSession`] manages a `tcpdump` child.

pub mod adapter;
pub mod capture;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod port;
pub mod query;
pub mod reconciler;
pub mod service;

// Re-export key types at the crate root for convenience.
pub use adapter::{NmcliIwConfig, NmcliIwSource, ReplayCycle, ReplaySource};
pub use capture::{CaptureConfig, CaptureSession, CaptureSummary};
pub use config::ScanConfig;
pub use coordinator::RescanCoordinator;
pub use domain::bssid::{Band, BssidId, HeCapability, Pmf, RoamingFlags, SecondaryOffset, WifiGen};
pub use domain::observation::Observation;
pub use domain::record::{ApRecord, Sticky};
pub use domain::registry::{RegistryDelta, RegistrySnapshot, ScanCycle};
pub use error::{BatchFailure, CaptureError, ConfigError, ScanError, ScanResult};
pub use geometry::{ChannelGeometry, ChannelParams, ChannelWidth, GeometryEngine, SubBand};
pub use port::ObservationSource;
pub use query::{QueryView, SortKey};
pub use reconciler::Reconciler;
pub use service::{PublishedState, ScanHandle, ScanLoop, ScanStatus};
