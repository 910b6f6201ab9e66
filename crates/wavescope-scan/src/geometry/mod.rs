//! Spectrum geometry: where an access point sits on the frequency axis.
//!
//! [`GeometryEngine::compute`] is a pure function of [`ChannelParams`]. It
//! has no error path; every combination of missing offsets, missing center
//! frequencies and unknown widths resolves to a defined fallback.

pub mod axis;
pub mod rate;
pub mod tables;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::bssid::{Band, SecondaryOffset};

pub use axis::{axis_range, axis_ticks, AxisRange, AxisTick};
pub use rate::{effective_rate_mbps, he_max_rate_mbps};
pub use tables::{bonded_block, BondedBlock};

// ---------------------------------------------------------------------------
// Frequency helpers
// ---------------------------------------------------------------------------

/// Center frequency in MHz of channel `channel` in `band`.
///
/// Uses the band formula, so non-table channels still get a position.
pub fn channel_to_freq(band: Band, channel: u16) -> u32 {
    let ch = u32::from(channel);
    match band {
        Band::Band2_4GHz if channel == 14 => 2484,
        Band::Band2_4GHz => 2407 + ch * 5,
        Band::Band5GHz => 5000 + ch * 5,
        Band::Band6GHz => 5950 + ch * 5,
    }
}

/// Convert a frequency in MHz to its band and 802.11 channel number.
pub fn freq_to_channel(freq_mhz: u32) -> Option<(Band, u16)> {
    let band = Band::from_freq(freq_mhz)?;
    let channel = match freq_mhz {
        2484 => 14,
        2412..=2472 => (freq_mhz - 2407) / 5,
        5000..=5899 => (freq_mhz - 5000) / 5,
        5955..=7115 => (freq_mhz - 5950) / 5,
        _ => return None,
    };
    u16::try_from(channel).ok().map(|c| (band, c))
}

// ---------------------------------------------------------------------------
// ChannelWidth
// ---------------------------------------------------------------------------

/// Operating channel width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChannelWidth {
    /// 20 MHz
    W20,
    /// 40 MHz
    W40,
    /// 80 MHz
    W80,
    /// 160 MHz
    W160,
    /// 320 MHz
    W320,
}

impl ChannelWidth {
    /// Normalise a reported width. Unknown or zero widths are 20 MHz;
    /// non-standard values round down to the nearest standard width.
    pub fn from_mhz(mhz: Option<u16>) -> Self {
        match mhz.unwrap_or(0) {
            320.. => Self::W320,
            160..=319 => Self::W160,
            80..=159 => Self::W80,
            40..=79 => Self::W40,
            _ => Self::W20,
        }
    }

    /// Width in MHz.
    pub fn mhz(self) -> u32 {
        match self {
            Self::W20 => 20,
            Self::W40 => 40,
            Self::W80 => 80,
            Self::W160 => 160,
            Self::W320 => 320,
        }
    }

    /// Number of 20 MHz primaries bonded at this width.
    pub fn primaries(self) -> u16 {
        (self.mhz() / 20) as u16
    }
}

impl fmt::Display for ChannelWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} MHz", self.mhz())
    }
}

/// Infer a width from the distance between the primary center and the
/// bonded-block center, for tools that report the latter but not the former.
pub fn infer_width(primary_freq_mhz: u32, center_freq1_mhz: u32) -> ChannelWidth {
    match primary_freq_mhz.abs_diff(center_freq1_mhz) {
        0..=5 => ChannelWidth::W20,
        6..=20 => ChannelWidth::W40,
        21..=40 => ChannelWidth::W80,
        41..=80 => ChannelWidth::W160,
        _ => ChannelWidth::W320,
    }
}

// ---------------------------------------------------------------------------
// SubBand
// ---------------------------------------------------------------------------

/// Regulatory sub-band of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubBand {
    /// 2.4 GHz ISM band.
    Ism,
    /// 5150-5250 MHz
    Unii1,
    /// 5250-5350 MHz
    Unii2A,
    /// 5470-5725 MHz
    Unii2C,
    /// 5725-5850 MHz
    Unii3,
    /// 5850-5925 MHz
    Unii4,
    /// 5925-6425 MHz
    Unii5,
    /// 6425-6525 MHz
    Unii6,
    /// 6525-6875 MHz
    Unii7,
    /// 6875-7125 MHz
    Unii8,
}

impl SubBand {
    /// Classify a 20 MHz channel center frequency.
    pub fn classify(band: Band, freq_mhz: u32) -> Option<Self> {
        match band {
            Band::Band2_4GHz => Some(Self::Ism),
            Band::Band5GHz => match freq_mhz {
                5150..=5249 => Some(Self::Unii1),
                5250..=5349 => Some(Self::Unii2A),
                5470..=5724 => Some(Self::Unii2C),
                5725..=5849 => Some(Self::Unii3),
                5850..=5925 => Some(Self::Unii4),
                _ => None,
            },
            Band::Band6GHz => match freq_mhz {
                5925..=6424 => Some(Self::Unii5),
                6425..=6524 => Some(Self::Unii6),
                6525..=6874 => Some(Self::Unii7),
                6875..=7125 => Some(Self::Unii8),
                _ => None,
            },
        }
    }
}

impl fmt::Display for SubBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ism => "ISM",
            Self::Unii1 => "U-NII-1",
            Self::Unii2A => "U-NII-2A",
            Self::Unii2C => "U-NII-2C",
            Self::Unii3 => "U-NII-3",
            Self::Unii4 => "U-NII-4",
            Self::Unii5 => "U-NII-5",
            Self::Unii6 => "U-NII-6",
            Self::Unii7 => "U-NII-7",
            Self::Unii8 => "U-NII-8",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// The channel attributes geometry is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelParams {
    /// Band of the primary channel.
    pub band: Band,
    /// Primary 20 MHz channel.
    pub primary_channel: u16,
    /// Reported width in MHz, if any.
    pub width_mhz: Option<u16>,
    /// HT40 secondary offset, if any.
    pub secondary_offset: Option<SecondaryOffset>,
    /// Bonded-block center frequency, if any.
    pub center_freq1: Option<u32>,
}

impl ChannelParams {
    /// Parameters for a plain 20 MHz channel.
    pub fn primary(band: Band, primary_channel: u16) -> Self {
        Self {
            band,
            primary_channel,
            width_mhz: None,
            secondary_offset: None,
            center_freq1: None,
        }
    }
}

/// A closed frequency interval in MHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FreqSpan {
    /// Lower edge.
    pub low_mhz: u32,
    /// Upper edge.
    pub high_mhz: u32,
}

impl FreqSpan {
    /// The span of `width` centered on `center_mhz`.
    pub fn centered(center_mhz: u32, width: ChannelWidth) -> Self {
        let half = width.mhz() / 2;
        Self {
            low_mhz: center_mhz.saturating_sub(half),
            high_mhz: center_mhz.saturating_add(half),
        }
    }

    /// Width of the span in MHz.
    pub fn width_mhz(&self) -> u32 {
        self.high_mhz - self.low_mhz
    }

    /// Whether `freq_mhz` lies within the span.
    pub fn contains(&self, freq_mhz: u32) -> bool {
        (self.low_mhz..=self.high_mhz).contains(&freq_mhz)
    }
}

/// Physical placement of one access point, derived and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelGeometry {
    /// Band of the primary channel.
    pub band: Band,
    /// Primary 20 MHz channel.
    pub primary_channel: u16,
    /// Effective width after normalisation.
    pub width: ChannelWidth,
    /// Center of the occupied block in MHz.
    pub center_mhz: u32,
    /// Occupied spectrum.
    pub span: FreqSpan,
    /// Lowest 20 MHz primary inside the span.
    pub first_channel: u16,
    /// Highest 20 MHz primary inside the span.
    pub last_channel: u16,
    /// Regulatory sub-band of the primary channel.
    pub sub_band: Option<SubBand>,
    /// The block touches at least one DFS channel.
    pub dfs: bool,
    /// The primary is a 6 GHz Preferred Scanning Channel.
    pub psc: bool,
}

impl ChannelGeometry {
    /// Human-readable channel span, e.g. `116–128`, or the primary alone.
    pub fn channel_label(&self) -> String {
        if self.first_channel == self.last_channel {
            self.primary_channel.to_string()
        } else {
            format!("{}\u{2013}{}", self.first_channel, self.last_channel)
        }
    }
}

// ---------------------------------------------------------------------------
// GeometryEngine
// ---------------------------------------------------------------------------

/// Stateless engine mapping channel attributes to spectrum placement.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryEngine;

impl GeometryEngine {
    /// Compute the placement for `params`.
    pub fn compute(params: &ChannelParams) -> ChannelGeometry {
        let band = params.band;
        let primary = params.primary_channel;
        let primary_mhz = channel_to_freq(band, primary);
        let mut width = ChannelWidth::from_mhz(params.width_mhz);
        // A center outside the band's axis is garbage from the tool.
        let center_freq1 = params
            .center_freq1
            .filter(|&cf1| axis_range(band).contains(cf1));

        let center_mhz = match band {
            Band::Band2_4GHz => {
                // HT40 is the widest 2.4 GHz mode.
                width = width.min(ChannelWidth::W40);
                match (width, params.secondary_offset) {
                    (ChannelWidth::W40, Some(offset)) => {
                        primary_mhz.saturating_add_signed(offset.shift_mhz())
                    }
                    _ => primary_mhz,
                }
            }
            Band::Band5GHz => center_freq1.unwrap_or(primary_mhz),
            Band::Band6GHz => six_ghz_center(primary, primary_mhz, width, center_freq1),
        };

        let span = FreqSpan::centered(center_mhz, width);
        let (first_channel, last_channel) = covered_channels(band, &span).unwrap_or((primary, primary));

        let dfs = band == Band::Band5GHz
            && tables::DFS_CHANNELS_5GHZ
                .iter()
                .any(|&ch| (first_channel..=last_channel).contains(&ch) || ch == primary);
        let psc = band == Band::Band6GHz && tables::PSC_CHANNELS_6GHZ.contains(&primary);

        ChannelGeometry {
            band,
            primary_channel: primary,
            width,
            center_mhz,
            span,
            first_channel,
            last_channel,
            sub_band: SubBand::classify(band, primary_mhz),
            dfs,
            psc,
        }
    }
}

/// 6 GHz bonded placement: the table block centered at `center_freq1`,
/// else the table block containing the primary, else arithmetic.
fn six_ghz_center(primary: u16, primary_mhz: u32, width: ChannelWidth, cf1: Option<u32>) -> u32 {
    if width == ChannelWidth::W20 {
        return primary_mhz;
    }
    if let Some(cf1) = cf1 {
        return tables::block_by_center(Band::Band6GHz, width, cf1)
            .map(|b| b.center_mhz)
            .unwrap_or(cf1);
    }
    tables::bonded_block(Band::Band6GHz, width, primary)
        .map(|b| b.center_mhz)
        .unwrap_or(primary_mhz)
}

/// First and last table primaries whose 20 MHz channel fits inside `span`.
fn covered_channels(band: Band, span: &FreqSpan) -> Option<(u16, u16)> {
    let lo = span.low_mhz.saturating_add(10);
    let hi = span.high_mhz.saturating_sub(10);
    let mut inside = tables::primary_channels(band)
        .iter()
        .copied()
        .filter(|&ch| (lo..=hi).contains(&channel_to_freq(band, ch)));
    let first = inside.next()?;
    let last = inside.last().unwrap_or(first);
    Some((first, last))
}
