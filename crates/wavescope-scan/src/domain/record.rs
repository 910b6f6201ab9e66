//! Registry-owned access-point records.
//!
//! An [`ApRecord`] is the merged, stable view of one BSSID. Sticky fields
//! carry a per-field miss counter and survive short runs of cycles in which
//! the tool did not report them; the volatile signal and association
//! readings are replaced on every observation.

use std::time::Instant;

use serde::Serialize;

use crate::domain::bssid::{Band, BssidId, HeCapability, Pmf, RoamingFlags, SecondaryOffset, WifiGen};
use crate::domain::observation::Observation;
use crate::domain::registry::ScanCycle;
use crate::geometry::{self, ChannelGeometry, ChannelParams, ChannelWidth, GeometryEngine};

// ---------------------------------------------------------------------------
// Sticky<T>
// ---------------------------------------------------------------------------

/// A field value that persists across cycles in which it is not reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sticky<T> {
    value: Option<T>,
    miss_count: u32,
}

impl<T> Sticky<T> {
    /// A fresh field holding whatever the first observation supplied.
    pub fn new(value: Option<T>) -> Self {
        Self {
            value,
            miss_count: 0,
        }
    }

    /// Current value, if any.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Consecutive cycles without a reported value.
    pub fn miss_count(&self) -> u32 {
        self.miss_count
    }

    /// Apply one cycle's reading.
    ///
    /// A reported value is adopted and resets the counter. An absent one
    /// increments it, and once the counter exceeds `threshold` the held
    /// value is cleared. Returns `true` only on the cycle the value decays.
    pub fn observe(&mut self, incoming: Option<T>, threshold: u32) -> bool {
        match incoming {
            Some(v) => {
                self.value = Some(v);
                self.miss_count = 0;
                false
            }
            None => {
                self.miss_count = self.miss_count.saturating_add(1);
                self.miss_count > threshold && self.value.take().is_some()
            }
        }
    }
}

impl<T: Copy> Sticky<T> {
    /// Current value by copy.
    pub fn get(&self) -> Option<T> {
        self.value
    }
}

impl<T> Default for Sticky<T> {
    fn default() -> Self {
        Self::new(None)
    }
}

// ---------------------------------------------------------------------------
// ApRecord -- Entity
// ---------------------------------------------------------------------------

/// The stable, merged state of one access point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApRecord {
    /// Registry key.
    pub bssid: BssidId,
    pub ssid: Sticky<String>,
    pub band: Sticky<Band>,
    pub primary_channel: Sticky<u16>,
    pub channel_width_mhz: Sticky<u16>,
    pub secondary_offset: Sticky<SecondaryOffset>,
    pub center_freq1: Sticky<u32>,
    pub center_freq2: Sticky<u32>,
    pub security: Sticky<String>,
    pub wifi_gen: Sticky<WifiGen>,
    pub channel_util_pct: Sticky<u8>,
    pub client_count: Sticky<u16>,
    pub krv_flags: Sticky<RoamingFlags>,
    pub akm: Sticky<String>,
    pub wps_vendor_raw: Sticky<String>,
    pub max_rate_mbps: Sticky<f64>,
    pub he_capability: Sticky<HeCapability>,
    pub pmf: Sticky<Pmf>,
    pub country: Sticky<String>,
    pub beacon_interval_tu: Sticky<u16>,
    pub dtim_period: Sticky<u8>,
    /// Volatile: the latest cycle's reading, absent if that cycle had none.
    pub signal_dbm: Option<f64>,
    /// Volatile: this host was associated to the BSSID in the latest cycle.
    pub in_use: bool,
    /// Cycle in which the record was created.
    pub first_seen_cycle: ScanCycle,
    /// Last cycle the BSSID was in a batch.
    pub last_seen_cycle: ScanCycle,
    /// Wall-clock time of `last_seen_cycle`; the linger window runs from here.
    #[serde(skip)]
    pub last_seen_at: Instant,
    /// Absent from the latest batch but still inside the linger window.
    pub ghost: bool,
}

impl ApRecord {
    /// Create a record from its first observation.
    pub(crate) fn new(obs: Observation, cycle: ScanCycle, at: Instant) -> Self {
        Self {
            bssid: obs.bssid,
            ssid: Sticky::new(obs.ssid),
            band: Sticky::new(obs.band),
            primary_channel: Sticky::new(obs.primary_channel),
            channel_width_mhz: Sticky::new(obs.channel_width_mhz),
            secondary_offset: Sticky::new(obs.secondary_offset),
            center_freq1: Sticky::new(obs.center_freq1),
            center_freq2: Sticky::new(obs.center_freq2),
            security: Sticky::new(obs.security),
            wifi_gen: Sticky::new(obs.wifi_gen),
            channel_util_pct: Sticky::new(obs.channel_util_pct),
            client_count: Sticky::new(obs.client_count),
            krv_flags: Sticky::new(obs.krv_flags),
            akm: Sticky::new(obs.akm),
            wps_vendor_raw: Sticky::new(obs.wps_vendor_raw),
            max_rate_mbps: Sticky::new(obs.max_rate_mbps),
            he_capability: Sticky::new(obs.he_capability),
            pmf: Sticky::new(obs.pmf),
            country: Sticky::new(obs.country),
            beacon_interval_tu: Sticky::new(obs.beacon_interval_tu),
            dtim_period: Sticky::new(obs.dtim_period),
            signal_dbm: obs.signal_dbm,
            in_use: obs.in_use == Some(true),
            first_seen_cycle: cycle,
            last_seen_cycle: cycle,
            last_seen_at: at,
            ghost: false,
        }
    }

    /// Merge a later observation of the same BSSID.
    ///
    /// Returns the names of sticky fields that decayed to absent.
    pub(crate) fn merge(
        &mut self,
        obs: Observation,
        cycle: ScanCycle,
        at: Instant,
        threshold: u32,
    ) -> Vec<&'static str> {
        let mut decayed = Vec::new();
        macro_rules! sticky {
            ($($field:ident),+ $(,)?) => {
                $(
                    if self.$field.observe(obs.$field, threshold) {
                        decayed.push(stringify!($field));
                    }
                )+
            };
        }
        sticky!(
            ssid,
            band,
            primary_channel,
            channel_width_mhz,
            secondary_offset,
            center_freq1,
            center_freq2,
            security,
            wifi_gen,
            channel_util_pct,
            client_count,
            krv_flags,
            akm,
            wps_vendor_raw,
            max_rate_mbps,
            he_capability,
            pmf,
            country,
            beacon_interval_tu,
            dtim_period,
        );

        self.signal_dbm = obs.signal_dbm;
        self.in_use = obs.in_use == Some(true);
        self.last_seen_cycle = cycle;
        self.last_seen_at = at;
        self.ghost = false;
        decayed
    }

    /// Channel attributes for geometry, if band and primary are known.
    pub fn channel_params(&self) -> Option<ChannelParams> {
        Some(ChannelParams {
            band: self.band.get()?,
            primary_channel: self.primary_channel.get()?,
            width_mhz: self.channel_width_mhz.get(),
            secondary_offset: self.secondary_offset.get(),
            center_freq1: self.center_freq1.get(),
        })
    }

    /// Spectrum placement, recomputed on every call.
    pub fn geometry(&self) -> Option<ChannelGeometry> {
        self.channel_params().map(|p| GeometryEngine::compute(&p))
    }

    /// Primary-channel center frequency in MHz.
    pub fn frequency_mhz(&self) -> Option<u32> {
        Some(geometry::channel_to_freq(self.band.get()?, self.primary_channel.get()?))
    }

    /// Table label for the occupied channels, e.g. `116–128` or `36`.
    pub fn channel_span_label(&self) -> String {
        match (self.geometry(), self.primary_channel.get()) {
            (Some(g), _) => g.channel_label(),
            (None, Some(ch)) => ch.to_string(),
            (None, None) => "?".to_owned(),
        }
    }

    /// SSID for display; hidden networks show as `<hidden>`.
    pub fn display_ssid(&self) -> &str {
        match self.ssid.value() {
            Some(s) if !s.is_empty() => s,
            _ => "<hidden>",
        }
    }

    /// Compact security label.
    pub fn security_summary(&self) -> &'static str {
        security_summary(
            self.security.value().map(String::as_str),
            self.akm.value().map(String::as_str),
        )
    }

    /// Compact 802.11 PHY mode label.
    pub fn phy_mode(&self) -> &'static str {
        phy_mode(self.wifi_gen.get(), self.band.get())
    }

    /// Reported rate, else the HE-capability fallback, else absent.
    pub fn effective_rate_mbps(&self) -> Option<f64> {
        let width = ChannelWidth::from_mhz(self.channel_width_mhz.get());
        geometry::effective_rate_mbps(self.max_rate_mbps.get(), width, self.he_capability.get())
    }
}

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

/// Derive a compact security label from the tool's security description
/// (e.g. `WPA2 WPA3`) and the AKM suite list (e.g. `PSK SAE`).
pub fn security_summary(security: Option<&str>, akm: Option<&str>) -> &'static str {
    let sec = security.unwrap_or("").trim().to_ascii_uppercase();
    let sec = if sec == "--" { String::new() } else { sec };
    let akm = akm.unwrap_or("").trim().to_ascii_uppercase();

    if sec.is_empty() && akm.is_empty() {
        return "Open";
    }
    if sec.contains("WEP") {
        return "WEP";
    }
    if sec.contains("OWE") || akm.contains("OWE") {
        return "OWE";
    }

    let tokens: Vec<&str> = sec.split_whitespace().collect();
    let wpa1 = tokens.iter().any(|t| *t == "WPA" || *t == "WPA1");
    let wpa2 = tokens.contains(&"WPA2");
    let wpa3 = tokens.contains(&"WPA3");
    let has_sae = akm.contains("SAE");
    let has_psk = akm.contains("PSK") || sec.contains("PSK");
    let has_eap = ["EAP", "802.1X", "8021X", "ENTERPRISE"]
        .iter()
        .any(|k| akm.contains(k) || sec.contains(k));

    if has_sae && has_psk {
        return "WPA2/WPA3 (PSK/SAE)";
    }
    if has_sae {
        return "WPA3 (SAE)";
    }
    if has_eap {
        return match (wpa1, wpa2) {
            (true, true) => "WPA/WPA2 (802.1X)",
            (_, true) => "WPA2 (802.1X)",
            _ => "Enterprise (802.1X)",
        };
    }
    if has_psk {
        match (wpa1, wpa2) {
            (true, true) => return "WPA/WPA2 (PSK)",
            (_, true) => return "WPA2 (PSK)",
            (true, false) => return "WPA (PSK)",
            _ => {}
        }
    }
    match (wpa1, wpa2, wpa3) {
        (_, true, true) => "WPA2/WPA3 (PSK/SAE)",
        (_, _, true) => "WPA3",
        (true, true, _) => "WPA/WPA2",
        (_, true, _) => "WPA2",
        (true, _, _) => "WPA",
        _ => "Open",
    }
}

/// Compact PHY mode for table display (`BE`, `AX`, `AC`, `A/N`, `B/G/N`,
/// `A`, `B/G`). Legacy APs are told apart by band.
pub fn phy_mode(generation: Option<WifiGen>, band: Option<Band>) -> &'static str {
    let five_or_six = matches!(band, Some(Band::Band5GHz | Band::Band6GHz));
    match generation {
        Some(WifiGen::Wifi7) => "BE",
        Some(WifiGen::Wifi6 | WifiGen::Wifi6E) => "AX",
        Some(WifiGen::Wifi5) => "AC",
        Some(WifiGen::Wifi4) if five_or_six => "A/N",
        Some(WifiGen::Wifi4) => "B/G/N",
        None if five_or_six => "A",
        None => "B/G",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs() -> Observation {
        Observation {
            ssid: Some("lab".into()),
            band: Some(Band::Band5GHz),
            primary_channel: Some(116),
            channel_width_mhz: Some(80),
            center_freq1: Some(5610),
            signal_dbm: Some(-60.0),
            ..Observation::new(BssidId([0, 1, 2, 3, 4, 5]))
        }
    }

    #[test]
    fn sticky_survives_threshold_then_clears() {
        let mut f = Sticky::new(Some(7u8));
        for _ in 0..5 {
            assert!(!f.observe(None, 5));
            assert_eq!(f.get(), Some(7));
        }
        assert!(f.observe(None, 5));
        assert_eq!(f.get(), None);
        assert_eq!(f.miss_count(), 6);
        // Already cleared: no second decay event.
        assert!(!f.observe(None, 5));
    }

    #[test]
    fn sticky_reset_on_value() {
        let mut f = Sticky::new(Some(1u16));
        f.observe(None, 5);
        f.observe(None, 5);
        assert_eq!(f.miss_count(), 2);
        f.observe(Some(2), 5);
        assert_eq!((f.get(), f.miss_count()), (Some(2), 0));
    }

    #[test]
    fn merge_overwrites_signal_even_when_absent() {
        let start = Instant::now();
        let mut rec = ApRecord::new(obs(), ScanCycle(1), start);
        let bare = Observation::new(rec.bssid);
        let decayed = rec.merge(bare, ScanCycle(2), start, 5);
        assert!(decayed.is_empty());
        assert_eq!(rec.signal_dbm, None);
        assert_eq!(rec.ssid.value().map(String::as_str), Some("lab"));
        assert_eq!(rec.ssid.miss_count(), 1);
        assert_eq!(rec.last_seen_cycle, ScanCycle(2));
        assert_eq!(rec.first_seen_cycle, ScanCycle(1));
    }

    #[test]
    fn association_is_volatile_and_pmf_sticky() {
        let start = Instant::now();
        let first = Observation {
            in_use: Some(true),
            pmf: Some(Pmf::Required),
            country: Some("DE".into()),
            dtim_period: Some(3),
            ..obs()
        };
        let mut rec = ApRecord::new(first, ScanCycle(1), start);
        assert!(rec.in_use);

        rec.merge(Observation::new(rec.bssid), ScanCycle(2), start, 5);
        assert!(!rec.in_use);
        assert_eq!(rec.pmf.get(), Some(Pmf::Required));
        assert_eq!(rec.country.value().map(String::as_str), Some("DE"));
        assert_eq!(rec.dtim_period.miss_count(), 1);
    }

    #[test]
    fn record_geometry_and_label() {
        let rec = ApRecord::new(obs(), ScanCycle(1), Instant::now());
        let g = rec.geometry().unwrap();
        assert_eq!(g.center_mhz, 5610);
        assert_eq!(rec.channel_span_label(), "116\u{2013}128");
        assert_eq!(rec.frequency_mhz(), Some(5580));
    }

    #[test]
    fn record_without_band_has_no_geometry() {
        let rec = ApRecord::new(Observation::new(BssidId([9; 6])), ScanCycle(1), Instant::now());
        assert!(rec.geometry().is_none());
        assert_eq!(rec.channel_span_label(), "?");
        assert_eq!(rec.display_ssid(), "<hidden>");
    }

    #[test]
    fn security_labels() {
        assert_eq!(security_summary(None, None), "Open");
        assert_eq!(security_summary(Some("--"), None), "Open");
        assert_eq!(security_summary(Some("WEP"), None), "WEP");
        assert_eq!(security_summary(Some("OWE"), None), "OWE");
        assert_eq!(security_summary(Some("WPA2 WPA3"), Some("PSK SAE")), "WPA2/WPA3 (PSK/SAE)");
        assert_eq!(security_summary(Some("WPA3"), Some("SAE")), "WPA3 (SAE)");
        assert_eq!(security_summary(Some("WPA2 802.1X"), Some("IEEE 802.1X")), "WPA2 (802.1X)");
        assert_eq!(security_summary(Some("WPA1 WPA2"), Some("PSK")), "WPA/WPA2 (PSK)");
        assert_eq!(security_summary(Some("WPA2"), Some("PSK")), "WPA2 (PSK)");
        assert_eq!(security_summary(Some("WPA2"), None), "WPA2");
        assert_eq!(security_summary(Some("WPA2 WPA3"), None), "WPA2/WPA3 (PSK/SAE)");
    }

    #[test]
    fn phy_mode_labels() {
        assert_eq!(phy_mode(Some(WifiGen::Wifi7), Some(Band::Band6GHz)), "BE");
        assert_eq!(phy_mode(Some(WifiGen::Wifi6E), Some(Band::Band6GHz)), "AX");
        assert_eq!(phy_mode(Some(WifiGen::Wifi4), Some(Band::Band2_4GHz)), "B/G/N");
        assert_eq!(phy_mode(Some(WifiGen::Wifi4), Some(Band::Band5GHz)), "A/N");
        assert_eq!(phy_mode(None, Some(Band::Band5GHz)), "A");
        assert_eq!(phy_mode(None, None), "B/G");
    }

    #[test]
    fn effective_rate_uses_he_fallback() {
        let rec = ApRecord::new(
            Observation {
                max_rate_mbps: Some(0.0),
                channel_width_mhz: Some(160),
                he_capability: Some(HeCapability { max_nss: 2, max_mcs: 11 }),
                ..Observation::new(BssidId([3; 6]))
            },
            ScanCycle(1),
            Instant::now(),
        );
        assert_eq!(rec.effective_rate_mbps(), Some(2402.0));
    }
}
