//! Per-band spectrum panel axes.
//!
//! Axis extents are fixed per band and never depend on which access points
//! are currently visible, so an empty 6 GHz panel still spans its real
//! frequency range.

use serde::Serialize;

use crate::domain::bssid::Band;
use crate::geometry::{channel_to_freq, tables};

/// 6 GHz tick channels: the PSC set plus the band-edge anchors 1 and 233.
pub const SIX_GHZ_TICK_CHANNELS: [u16; 17] = [
    1, 5, 21, 37, 53, 69, 85, 101, 117, 133, 149, 165, 181, 197, 213, 229, 233,
];

/// Frequency extent of a band panel in MHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisRange {
    /// Left edge.
    pub low_mhz: u32,
    /// Right edge.
    pub high_mhz: u32,
}

impl AxisRange {
    /// Width of the panel in MHz.
    pub fn span_mhz(&self) -> u32 {
        self.high_mhz - self.low_mhz
    }

    /// Whether `freq_mhz` lies on the panel.
    pub fn contains(&self, freq_mhz: u32) -> bool {
        (self.low_mhz..=self.high_mhz).contains(&freq_mhz)
    }
}

/// A labelled tick on a band axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisTick {
    /// Channel number shown as the label.
    pub channel: u16,
    /// Position on the axis.
    pub freq_mhz: u32,
}

/// Panel extent for `band`.
pub fn axis_range(band: Band) -> AxisRange {
    let (low_mhz, high_mhz) = match band {
        Band::Band2_4GHz => (2385, 2500),
        Band::Band5GHz => (5080, 5920),
        Band::Band6GHz => (5930, 7130),
    };
    AxisRange { low_mhz, high_mhz }
}

/// Tick marks for `band`: every primary on 2.4 and 5 GHz, the fixed
/// tick set on 6 GHz.
pub fn axis_ticks(band: Band) -> Vec<AxisTick> {
    let channels: &[u16] = match band {
        Band::Band6GHz => &SIX_GHZ_TICK_CHANNELS,
        _ => tables::primary_channels(band),
    };
    channels
        .iter()
        .map(|&channel| AxisTick {
            channel,
            freq_mhz: channel_to_freq(band, channel),
        })
        .collect()
}
