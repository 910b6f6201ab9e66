//! Core value objects for access-point identification and PHY attributes.
//!
//! These types are shared by the observation decoder, the reconciler and
//! the geometry engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ScanError;

// ---------------------------------------------------------------------------
// BssidId -- Value Object
// ---------------------------------------------------------------------------

/// A unique BSSID identifier wrapping a 6-byte IEEE 802.11 MAC address.
///
/// This is the registry key. Two `BssidId` values are equal when their MAC
/// bytes match, so `AA:BB:..` and `aa:bb:..` name the same access point.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BssidId(pub [u8; 6]);

impl BssidId {
    /// Parse a `BssidId` from a colon-separated hex string such as
    /// `"aa:bb:cc:dd:ee:ff"`. Case-insensitive.
    pub fn parse(s: &str) -> Result<Self, ScanError> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 6 {
            return Err(ScanError::MacParseFailed {
                input: s.to_owned(),
            });
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(ScanError::MacParseFailed {
                    input: s.to_owned(),
                });
            }
            bytes[i] = u8::from_str_radix(part, 16).map_err(|_| ScanError::MacParseFailed {
                input: s.to_owned(),
            })?;
        }
        Ok(Self(bytes))
    }

    /// Return the raw 6-byte MAC address.
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Whether the locally-administered bit is set in the first octet.
    ///
    /// Multi-radio APs commonly derive their 6 GHz BSSID this way, so OUI
    /// lookups on such addresses are meaningless.
    pub fn is_locally_administered(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

impl fmt::Debug for BssidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BssidId({self})")
    }
}

impl fmt::Display for BssidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for BssidId {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for BssidId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BssidId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Band -- Value Object
// ---------------------------------------------------------------------------

/// The WiFi frequency band on which a BSSID operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    /// 2.4 GHz (channels 1-14)
    #[serde(rename = "2.4GHz")]
    Band2_4GHz,
    /// 5 GHz (channels 36-177)
    #[serde(rename = "5GHz")]
    Band5GHz,
    /// 6 GHz (Wi-Fi 6E / 7, channels 1-233)
    #[serde(rename = "6GHz")]
    Band6GHz,
}

impl Band {
    /// All bands in display order.
    pub const ALL: [Band; 3] = [Band::Band2_4GHz, Band::Band5GHz, Band::Band6GHz];

    /// Infer the band from a frequency in MHz.
    ///
    /// Channel numbers alone are ambiguous (6 GHz reuses 1-233), so the
    /// frequency is the only reliable source.
    pub fn from_freq(freq_mhz: u32) -> Option<Self> {
        match freq_mhz {
            2400..=2499 => Some(Self::Band2_4GHz),
            5000..=5899 => Some(Self::Band5GHz),
            5925..=7125 => Some(Self::Band6GHz),
            _ => None,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Band2_4GHz => write!(f, "2.4 GHz"),
            Self::Band5GHz => write!(f, "5 GHz"),
            Self::Band6GHz => write!(f, "6 GHz"),
        }
    }
}

// ---------------------------------------------------------------------------
// SecondaryOffset
// ---------------------------------------------------------------------------

/// HT40 secondary channel position relative to the primary channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryOffset {
    /// Secondary 20 MHz channel sits above the primary.
    Above,
    /// Secondary 20 MHz channel sits below the primary.
    Below,
    /// The AP explicitly advertises no secondary channel.
    NoSecondary,
}

impl SecondaryOffset {
    /// Shift in MHz applied to the primary center to reach the HT40 center.
    pub fn shift_mhz(self) -> i32 {
        match self {
            Self::Above => 10,
            Self::Below => -10,
            Self::NoSecondary => 0,
        }
    }

    /// Parse the `iw` wording (`above`, `below`, `no secondary`).
    pub fn from_iw_str(s: &str) -> Option<Self> {
        let lower = s.trim().to_ascii_lowercase();
        if lower.starts_with("above") {
            Some(Self::Above)
        } else if lower.starts_with("below") {
            Some(Self::Below)
        } else if lower.starts_with("no secondary") {
            Some(Self::NoSecondary)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// WifiGen
// ---------------------------------------------------------------------------

/// Wi-Fi generation inferred from the capability IEs an AP advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WifiGen {
    /// 802.11n (HT)
    #[serde(rename = "WiFi 4")]
    Wifi4,
    /// 802.11ac (VHT)
    #[serde(rename = "WiFi 5")]
    Wifi5,
    /// 802.11ax (HE) on 2.4/5 GHz
    #[serde(rename = "WiFi 6")]
    Wifi6,
    /// 802.11ax (HE) on 6 GHz
    #[serde(rename = "WiFi 6E")]
    Wifi6E,
    /// 802.11be (EHT)
    #[serde(rename = "WiFi 7")]
    Wifi7,
}

impl WifiGen {
    /// Short IEEE amendment letters for table display.
    pub fn amendment(self) -> &'static str {
        match self {
            Self::Wifi7 => "BE",
            Self::Wifi6 | Self::Wifi6E => "AX",
            Self::Wifi5 => "AC",
            Self::Wifi4 => "N",
        }
    }
}

impl fmt::Display for WifiGen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Wifi4 => "WiFi 4",
            Self::Wifi5 => "WiFi 5",
            Self::Wifi6 => "WiFi 6",
            Self::Wifi6E => "WiFi 6E",
            Self::Wifi7 => "WiFi 7",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// RoamingFlags
// ---------------------------------------------------------------------------

/// 802.11k/v/r roaming support advertised in the beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RoamingFlags {
    /// 802.11k Radio Resource Measurement (neighbor reports).
    pub rrm: bool,
    /// 802.11v BSS Transition Management.
    pub btm: bool,
    /// 802.11r Fast Transition.
    pub ft: bool,
}

impl RoamingFlags {
    /// Whether no roaming feature is advertised.
    pub fn is_empty(&self) -> bool {
        !(self.rrm || self.btm || self.ft)
    }
}

impl fmt::Display for RoamingFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: Vec<&str> = [(self.rrm, "k"), (self.btm, "v"), (self.ft, "r")]
            .into_iter()
            .filter_map(|(on, s)| on.then_some(s))
            .collect();
        f.write_str(&flags.join(" "))
    }
}

// ---------------------------------------------------------------------------
// Pmf
// ---------------------------------------------------------------------------

/// 802.11w Protected Management Frames, from the RSN capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pmf {
    /// RSN present without an MFP bit.
    Disabled,
    /// MFP-capable: clients may use PMF.
    Optional,
    /// MFP-required.
    Required,
}

impl Pmf {
    /// Read the `iw` RSN `Capabilities:` line.
    pub fn from_rsn_capabilities(line: &str) -> Self {
        let lower = line.to_ascii_lowercase();
        if lower.contains("mfp-required") {
            Self::Required
        } else if lower.contains("mfp-capable") {
            Self::Optional
        } else {
            Self::Disabled
        }
    }
}

impl fmt::Display for Pmf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "No",
            Self::Optional => "Optional",
            Self::Required => "Required",
        })
    }
}

// ---------------------------------------------------------------------------
// HeCapability
// ---------------------------------------------------------------------------

/// Declared HE/EHT MCS/NSS support, used to derive a theoretical PHY rate
/// when the scan tool reports none (typical for 6 GHz beacons).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeCapability {
    /// Highest supported spatial-stream count.
    pub max_nss: u8,
    /// Highest supported MCS index.
    pub max_mcs: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bssid_id_roundtrip() {
        let mac = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
        let id = BssidId(mac);
        assert_eq!(id.to_string(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(BssidId::parse("AA:BB:CC:DD:EE:FF").unwrap(), id);
    }

    #[test]
    fn bssid_id_parse_errors() {
        assert!(BssidId::parse("aa:bb:cc").is_err());
        assert!(BssidId::parse("zz:bb:cc:dd:ee:ff").is_err());
        assert!(BssidId::parse("aaa:bb:cc:dd:ee:f").is_err());
        assert!(BssidId::parse("").is_err());
    }

    #[test]
    fn bssid_id_serde_as_string() {
        let id = BssidId([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"02:11:22:33:44:55\"");
        let back: BssidId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(back.is_locally_administered());
    }

    #[test]
    fn band_from_freq() {
        assert_eq!(Band::from_freq(2437), Some(Band::Band2_4GHz));
        assert_eq!(Band::from_freq(2484), Some(Band::Band2_4GHz));
        assert_eq!(Band::from_freq(5180), Some(Band::Band5GHz));
        assert_eq!(Band::from_freq(5955), Some(Band::Band6GHz));
        assert_eq!(Band::from_freq(5910), None);
        assert_eq!(Band::from_freq(900), None);
    }

    #[test]
    fn secondary_offset_from_iw() {
        assert_eq!(SecondaryOffset::from_iw_str("above"), Some(SecondaryOffset::Above));
        assert_eq!(SecondaryOffset::from_iw_str(" below"), Some(SecondaryOffset::Below));
        assert_eq!(
            SecondaryOffset::from_iw_str("no secondary"),
            Some(SecondaryOffset::NoSecondary)
        );
        assert_eq!(SecondaryOffset::from_iw_str("sideways"), None);
    }

    #[test]
    fn roaming_flags_display() {
        let all = RoamingFlags { rrm: true, btm: true, ft: true };
        assert_eq!(all.to_string(), "k v r");
        let kr = RoamingFlags { rrm: true, btm: false, ft: true };
        assert_eq!(kr.to_string(), "k r");
        assert_eq!(RoamingFlags::default().to_string(), "");
        assert!(RoamingFlags::default().is_empty());
    }

    #[test]
    fn pmf_from_rsn_capabilities() {
        assert_eq!(
            Pmf::from_rsn_capabilities("1-PTKSA-RC 1-GTKSA-RC MFP-required MFP-capable (0x00cc)"),
            Pmf::Required
        );
        assert_eq!(Pmf::from_rsn_capabilities("16-PTKSA-RC MFP-capable (0x008c)"), Pmf::Optional);
        assert_eq!(Pmf::from_rsn_capabilities("1-PTKSA-RC 1-GTKSA-RC (0x0000)"), Pmf::Disabled);
        assert_eq!(Pmf::Optional.to_string(), "Optional");
    }
}
