//! Theoretical HE/EHT PHY rate, used when a scan tool reports no rate.
//!
//! 6 GHz beacons carry no legacy Supported Rates element, so `nmcli`
//! reports 0 Mbit/s for them. The rate is then derived from the declared
//! HE capability and the operating width. Without capability data the rate
//! stays absent; no number is guessed.

use crate::domain::bssid::HeCapability;
use crate::geometry::ChannelWidth;

/// Per-stream rate in Mbit/s at 0.8 us GI, indexed by width then MCS
/// bracket (7, 9, 11). IEEE 802.11ax Table 27-52 and its EHT extension.
const HE_RATE_1SS: [[f64; 3]; 5] = [
    [86.0, 114.7, 143.4],
    [172.0, 229.4, 286.8],
    [360.3, 480.4, 600.4],
    [720.6, 960.8, 1201.0],
    [1441.2, 1921.6, 2402.0],
];

fn width_row(width: ChannelWidth) -> usize {
    match width {
        ChannelWidth::W20 => 0,
        ChannelWidth::W40 => 1,
        ChannelWidth::W80 => 2,
        ChannelWidth::W160 => 3,
        ChannelWidth::W320 => 4,
    }
}

fn mcs_column(max_mcs: u8) -> usize {
    match max_mcs {
        10.. => 2,
        8..=9 => 1,
        _ => 0,
    }
}

/// Maximum HE/EHT rate for `cap` at `width`, rounded to whole Mbit/s.
///
/// `None` when the capability declares no spatial streams.
pub fn he_max_rate_mbps(width: ChannelWidth, cap: HeCapability) -> Option<f64> {
    if cap.max_nss == 0 {
        return None;
    }
    let per_stream = HE_RATE_1SS[width_row(width)][mcs_column(cap.max_mcs)];
    Some((per_stream * f64::from(cap.max_nss)).round())
}

/// The rate to display: the reported one when non-zero, else the HE
/// fallback when capability data exists, else absent.
pub fn effective_rate_mbps(
    reported: Option<f64>,
    width: ChannelWidth,
    cap: Option<HeCapability>,
) -> Option<f64> {
    match reported {
        Some(rate) if rate > 0.0 => Some(rate),
        _ => cap.and_then(|c| he_max_rate_mbps(width, c)),
    }
}
