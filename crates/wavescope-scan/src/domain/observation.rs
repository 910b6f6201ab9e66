//! One tool-derived reading of one access point in one poll cycle.

use serde::{Deserialize, Serialize};

use crate::domain::bssid::{Band, BssidId, HeCapability, Pmf, RoamingFlags, SecondaryOffset, WifiGen};
use crate::geometry::ChannelParams;

/// A single, possibly partial, observation of a BSSID.
///
/// Only the identity is mandatory. Every other field may be absent for a
/// given cycle and absence is not an error: the reconciler decides whether
/// the last known value persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// The MAC address of the observed access point.
    pub bssid: BssidId,
    /// Network name. `Some("")` is a hidden network, `None` means unreported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    /// Frequency band.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band: Option<Band>,
    /// Primary 20 MHz channel number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_channel: Option<u16>,
    /// Operating channel width in MHz. 0 is treated as unreported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_width_mhz: Option<u16>,
    /// HT40 secondary channel offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_offset: Option<SecondaryOffset>,
    /// Center frequency of the bonded block (segment 0), MHz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_freq1: Option<u32>,
    /// Center frequency of the second 80 MHz segment (80+80), MHz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_freq2: Option<u32>,
    /// Received signal strength in dBm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_dbm: Option<f64>,
    /// Security description as reported by the tool (e.g. `WPA2 WPA3`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
    /// Wi-Fi generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_gen: Option<WifiGen>,
    /// BSS Load channel utilisation, 0-100 %.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_util_pct: Option<u8>,
    /// BSS Load associated station count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_count: Option<u16>,
    /// 802.11k/v/r support.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub krv_flags: Option<RoamingFlags>,
    /// Authentication and key management suites (e.g. `PSK SAE`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub akm: Option<String>,
    /// Manufacturer string from the WPS IE, untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wps_vendor_raw: Option<String>,
    /// Maximum PHY rate reported by the tool, Mbit/s. 0 means unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rate_mbps: Option<f64>,
    /// Declared HE/EHT spatial-stream and MCS support.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub he_capability: Option<HeCapability>,
    /// Whether this host is associated to the BSSID (nmcli `IN-USE`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_use: Option<bool>,
    /// Protected Management Frames support.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmf: Option<Pmf>,
    /// Country code from the Country IE, e.g. `DE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Beacon interval in time units (1 TU = 1024 us).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beacon_interval_tu: Option<u16>,
    /// DTIM period from the TIM element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtim_period: Option<u8>,
}

impl Observation {
    /// An observation carrying nothing but its identity.
    pub fn new(bssid: BssidId) -> Self {
        Self {
            bssid,
            ssid: None,
            band: None,
            primary_channel: None,
            channel_width_mhz: None,
            secondary_offset: None,
            center_freq1: None,
            center_freq2: None,
            signal_dbm: None,
            security: None,
            wifi_gen: None,
            channel_util_pct: None,
            client_count: None,
            krv_flags: None,
            akm: None,
            wps_vendor_raw: None,
            max_rate_mbps: None,
            he_capability: None,
            in_use: None,
            pmf: None,
            country: None,
            beacon_interval_tu: None,
            dtim_period: None,
        }
    }

    /// Fold a second reading of the same BSSID from the same batch into
    /// this one. Fields the later reading reports take precedence.
    pub fn absorb(&mut self, later: Observation) {
        macro_rules! take {
            ($($field:ident),+ $(,)?) => {
                $(
                    if later.$field.is_some() {
                        self.$field = later.$field;
                    }
                )+
            };
        }
        take!(
            ssid,
            band,
            primary_channel,
            channel_width_mhz,
            secondary_offset,
            center_freq1,
            center_freq2,
            signal_dbm,
            security,
            wifi_gen,
            channel_util_pct,
            client_count,
            krv_flags,
            akm,
            wps_vendor_raw,
            max_rate_mbps,
            he_capability,
            in_use,
            pmf,
            country,
            beacon_interval_tu,
            dtim_period,
        );
    }

    /// Turn placeholder readings into absence. A zero width is what nmcli
    /// reports on 6 GHz when it does not know, never a real width.
    pub fn normalized(mut self) -> Self {
        self.channel_width_mhz = self.channel_width_mhz.filter(|&w| w != 0);
        self
    }

    /// Channel attributes for geometry, if band and primary are present.
    pub fn channel_params(&self) -> Option<ChannelParams> {
        Some(ChannelParams {
            band: self.band?,
            primary_channel: self.primary_channel?,
            width_mhz: self.channel_width_mhz,
            secondary_offset: self.secondary_offset,
            center_freq1: self.center_freq1,
        })
    }

    /// Convert nmcli's 0-100 signal quality to an approximate dBm value.
    pub fn pct_to_dbm(pct: u8) -> f64 {
        (f64::from(pct.min(100)) / 2.0) - 100.0
    }

    /// Convert a BSS Load utilisation byte (0-255) to a percentage.
    pub fn util_byte_to_pct(raw: u8) -> u8 {
        ((f64::from(raw) / 255.0) * 100.0).round() as u8
    }
}
