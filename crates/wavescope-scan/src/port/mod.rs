//! Port definitions for observation acquisition.
//!
//! Hexagonal-architecture ports that abstract the scanning backend, so the
//! Linux tool adapter and the replay adapter can be swapped transparently.

mod observation_source;

pub use observation_source::ObservationSource;
