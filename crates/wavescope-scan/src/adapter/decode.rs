//! Decoders for `nmcli` terse listings and `iw dev <iface> scan dump`.
//!
//! `nmcli` supplies the base observation for every BSSID; `iw` enriches it
//! with BSS Load, capability and bonding details. A BSSID that only `iw`
//! reports is ignored. Lines that cannot be decoded are skipped: a field
//! missing from one cycle is left absent for the reconciler to resolve.

use std::collections::BTreeMap;

use crate::domain::bssid::{Band, BssidId, HeCapability, Pmf, RoamingFlags, SecondaryOffset, WifiGen};
use crate::domain::observation::Observation;
use crate::geometry::{channel_to_freq, freq_to_channel, infer_width};

/// Field list requested from `nmcli -t -f ... dev wifi list`.
pub const NMCLI_FIELDS: &str =
    "IN-USE,SSID,BSSID,MODE,CHAN,FREQ,RATE,SIGNAL,SECURITY,WPA-FLAGS,RSN-FLAGS,BANDWIDTH";

const NMCLI_FIELD_COUNT: usize = 12;

// ---------------------------------------------------------------------------
// nmcli
// ---------------------------------------------------------------------------

/// Split an `nmcli -t` line on unescaped `:`, unescaping `\:` and `\\`.
pub fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next @ (':' | '\\')) => cur.push(next),
                Some(other) => {
                    cur.push('\\');
                    cur.push(other);
                }
                None => cur.push('\\'),
            },
            ':' => fields.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    fields.push(cur);
    fields
}

/// Leading unsigned number of `s`, e.g. `5180` from `5180 MHz`.
fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

/// Decode the output of `nmcli -t -f NMCLI_FIELDS dev wifi list`.
pub fn parse_nmcli_terse(output: &str) -> Vec<Observation> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(parse_nmcli_line)
        .collect()
}

fn parse_nmcli_line(line: &str) -> Option<Observation> {
    let parts = split_terse(line);
    if parts.len() < NMCLI_FIELD_COUNT {
        return None;
    }
    let bssid = BssidId::parse(&parts[2]).ok()?;

    let channel: Option<u16> = parts[4].trim().parse().ok().filter(|&c| c > 0);
    let freq = leading_number(&parts[5]).map(|f| f as u32).filter(|&f| f > 0);
    let band_channel = match (freq.and_then(freq_to_channel), channel) {
        (Some((band, ch)), _) => Some((band, ch)),
        (None, Some(ch)) if ch <= 14 => Some((Band::Band2_4GHz, ch)),
        (None, Some(ch)) => Some((Band::Band5GHz, ch)),
        (None, None) => None,
    };

    let mut obs = Observation::new(bssid);
    obs.in_use = Some(parts[0].trim() == "*");
    obs.ssid = Some(parts[1].trim().to_owned());
    if let Some((band, ch)) = band_channel {
        obs.band = Some(band);
        obs.primary_channel = Some(channel.unwrap_or(ch));
    }
    obs.max_rate_mbps = leading_number(&parts[6]);
    obs.signal_dbm = parts[7]
        .trim()
        .parse::<u8>()
        .ok()
        .map(Observation::pct_to_dbm);
    let security = parts[8].trim();
    obs.security = Some(if security == "--" { "" } else { security }.to_owned());
    obs.channel_width_mhz = leading_number(&parts[11])
        .map(|w| w as u16)
        .filter(|&w| w > 0);
    Some(obs)
}

// ---------------------------------------------------------------------------
// iw scan dump
// ---------------------------------------------------------------------------

/// Enrichment fields decoded from one `iw` BSS stanza.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IwBss {
    pub freq_mhz: Option<u32>,
    pub signal_dbm: Option<f64>,
    pub wifi_gen: Option<WifiGen>,
    pub station_count: Option<u16>,
    /// Raw BSS Load utilisation byte, 0-255.
    pub channel_util_raw: Option<u8>,
    pub akm: Option<String>,
    pub wps_manufacturer: Option<String>,
    pub roaming: RoamingFlags,
    pub center_freq1: Option<u32>,
    pub center_freq2: Option<u32>,
    pub secondary_offset: Option<SecondaryOffset>,
    /// Width from the HE/VHT operation element.
    pub oper_width_mhz: Option<u16>,
    /// Widest width mentioned anywhere in the capabilities.
    pub cap_max_width_mhz: Option<u16>,
    pub he_capability: Option<HeCapability>,
    pub pmf: Option<Pmf>,
    pub country: Option<String>,
    pub beacon_interval_tu: Option<u16>,
    pub dtim_period: Option<u8>,
}

#[derive(Default)]
struct IwStanza {
    bss: IwBss,
    has_ht: bool,
    has_vht: bool,
    has_he: bool,
    has_eht: bool,
    in_vht_operation: bool,
    in_rsn: bool,
    has_rsn: bool,
    cf1_raw: Option<u32>,
    cf2_raw: Option<u32>,
}

impl IwStanza {
    fn feed(&mut self, line: &str) {
        let t = line.trim().trim_start_matches("* ").trim();

        if t.starts_with("EHT capabilities") {
            self.has_eht = true;
        } else if t.starts_with("HE capabilities") {
            self.has_he = true;
        } else if t.starts_with("VHT capabilities") {
            self.has_vht = true;
        } else if t.starts_with("HT capabilities") {
            self.has_ht = true;
        }
        if line.ends_with(':') && !line.starts_with("\t\t") {
            self.in_vht_operation = t.starts_with("VHT operation");
        }
        if line.starts_with('\t') && !line.starts_with("\t\t") {
            self.in_rsn = t.starts_with("RSN:");
            self.has_rsn |= self.in_rsn;
        }

        note_widths(t, &mut self.bss.cap_max_width_mhz);

        if let Some(rest) = t.strip_prefix("freq:") {
            self.bss.freq_mhz = leading_number(rest).map(|f| f as u32);
        } else if let Some(rest) = t.strip_prefix("signal:") {
            self.bss.signal_dbm = rest.split_whitespace().next().and_then(|n| n.parse().ok());
        } else if let Some(rest) = t.strip_prefix("station count:") {
            self.bss.station_count = rest.trim().parse().ok();
        } else if let Some(rest) = t
            .strip_prefix("channel utilisation:")
            .or_else(|| t.strip_prefix("channel utilization:"))
        {
            self.bss.channel_util_raw = rest.trim().split('/').next().and_then(|n| n.trim().parse().ok());
        } else if let Some(rest) = t.strip_prefix("Authentication suites:") {
            let raw = rest.trim();
            self.bss.roaming.ft |= raw.contains("FT/");
            self.bss.akm = Some(raw.to_owned());
        } else if let Some(rest) = t.strip_prefix("Manufacturer:") {
            let name = rest.trim().trim_matches('"');
            let junk = ["unknown", "private", "n/a"];
            if !name.is_empty() && !junk.contains(&name.to_ascii_lowercase().as_str()) {
                self.bss.wps_manufacturer = Some(name.to_owned());
            }
        } else if let Some(rest) = t.strip_prefix("Capabilities:") {
            if self.in_rsn {
                self.bss.pmf = Some(Pmf::from_rsn_capabilities(rest));
            }
        } else if let Some(rest) = t.strip_prefix("Country:") {
            self.bss.country = rest
                .split_whitespace()
                .next()
                .filter(|cc| cc.len() == 2 && cc.bytes().all(|b| b.is_ascii_uppercase()))
                .map(str::to_owned);
        } else if let Some(rest) = t.strip_prefix("beacon interval:") {
            self.bss.beacon_interval_tu = leading_number(rest).map(|v| v as u16).filter(|&v| v > 0);
        } else if t.starts_with("TIM:") {
            self.bss.dtim_period = dtim_period(t);
        } else if let Some(rest) = t.strip_prefix("secondary channel offset:") {
            self.bss.secondary_offset = SecondaryOffset::from_iw_str(rest);
        } else if let Some(rest) = t.strip_prefix("channel width:") {
            self.bss.oper_width_mhz = parse_oper_width(rest, self.in_vht_operation);
        } else if let Some((seg, rest)) = center_freq_segment(t) {
            let value = leading_number(rest).map(|v| v as u32).filter(|&v| v > 0);
            match seg {
                1 => self.cf1_raw = value,
                2 => self.cf2_raw = value,
                _ => {}
            }
        }

        if t.contains("Neighbor Report") {
            self.bss.roaming.rrm = true;
        }
        if t.contains("BSS Transition") {
            self.bss.roaming.btm = true;
        }
        if let Some(cap) = parse_stream_line(t) {
            let he = self.bss.he_capability.get_or_insert(cap);
            he.max_nss = he.max_nss.max(cap.max_nss);
            he.max_mcs = he.max_mcs.max(cap.max_mcs);
        }
    }

    fn finish(mut self) -> IwBss {
        let freq = self.bss.freq_mhz.unwrap_or(0);
        self.bss.wifi_gen = if self.has_eht {
            Some(WifiGen::Wifi7)
        } else if self.has_he {
            Some(if freq >= 5925 { WifiGen::Wifi6E } else { WifiGen::Wifi6 })
        } else if self.has_vht {
            Some(WifiGen::Wifi5)
        } else if self.has_ht {
            Some(WifiGen::Wifi4)
        } else {
            None
        };

        if self.has_rsn && self.bss.pmf.is_none() {
            self.bss.pmf = Some(Pmf::Disabled);
        }

        let band = Band::from_freq(freq);
        self.bss.center_freq1 = self.cf1_raw.and_then(|v| segment_to_mhz(band, v));
        self.bss.center_freq2 = self.cf2_raw.and_then(|v| segment_to_mhz(band, v));
        if self.bss.center_freq1.is_none() && freq > 0 {
            self.bss.center_freq1 = match self.bss.secondary_offset {
                Some(off @ (SecondaryOffset::Above | SecondaryOffset::Below)) => {
                    Some(freq.saturating_add_signed(off.shift_mhz()))
                }
                _ => None,
            };
        }
        self.bss
    }
}

/// `center freq segment 1: 5610` / `center freq 1: 5610`.
fn center_freq_segment(t: &str) -> Option<(u8, &str)> {
    let rest = t.strip_prefix("center freq")?;
    let rest = rest.trim_start().strip_prefix("segment").unwrap_or(rest).trim_start();
    let (seg, value) = rest.split_once(':')?;
    Some((seg.trim().parse().ok()?, value))
}

/// `TIM: DTIM Count 0 DTIM Period 3 Bitmap Control 0x0 ...`.
fn dtim_period(t: &str) -> Option<u8> {
    let lower = t.to_ascii_lowercase();
    let (_, rest) = lower.split_once("dtim period")?;
    rest.trim_start_matches(|c: char| c == ':' || c.is_whitespace())
        .split_whitespace()
        .next()?
        .parse()
        .ok()
        .filter(|&p| p > 0)
}

/// iw reports VHT segments as channel indices and HE/EHT ones in MHz.
fn segment_to_mhz(band: Option<Band>, value: u32) -> Option<u32> {
    if value >= 2400 {
        return Some(value);
    }
    let band = band?;
    let channel = u16::try_from(value).ok()?;
    Some(channel_to_freq(band, channel))
}

/// `channel width: 160 MHz`, `channel width: 1 (80 MHz)` or the bare VHT
/// code (`0` = 20/40, `1` = 80, `2`/`3` = 160).
fn parse_oper_width(rest: &str, vht: bool) -> Option<u16> {
    let mut found = None;
    note_widths(rest, &mut found);
    if found.is_some() {
        return found;
    }
    if vht {
        return match rest.trim().parse::<u8>().ok()? {
            0 => Some(40),
            1 => Some(80),
            2 | 3 => Some(160),
            _ => None,
        };
    }
    None
}

/// Raise `max` to any standard width mentioned as `<n> MHz` in `t`.
fn note_widths(t: &str, max: &mut Option<u16>) {
    let tokens: Vec<&str> = t.split_whitespace().collect();
    for pair in tokens.windows(2) {
        if !pair[1].trim_start_matches('(').starts_with("MHz") {
            continue;
        }
        let digits = pair[0].trim_matches(|c: char| !c.is_ascii_digit());
        if let Ok(w @ (20 | 40 | 80 | 160 | 320)) = digits.parse::<u16>() {
            *max = Some(max.map_or(w, |m| m.max(w)));
        }
    }
}

/// `2 streams: MCS 0-11` as advertised in the HE/EHT MCS sets.
fn parse_stream_line(t: &str) -> Option<HeCapability> {
    let (nss, rest) = t.split_once("stream")?;
    let nss: u8 = nss.trim().parse().ok()?;
    let rest = rest.trim_start_matches('s').trim_start().strip_prefix(':')?;
    let mcs = rest.trim().strip_prefix("MCS 0-")?;
    let mcs: u8 = mcs.trim().parse().ok()?;
    Some(HeCapability {
        max_nss: nss,
        max_mcs: mcs,
    })
}

/// Decode `iw dev <iface> scan dump` into enrichment records by BSSID.
pub fn parse_iw_scan_dump(output: &str) -> BTreeMap<BssidId, IwBss> {
    let mut results = BTreeMap::new();
    let mut current: Option<(BssidId, IwStanza)> = None;

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("BSS ") {
            if let Some((bssid, stanza)) = current.take() {
                results.insert(bssid, stanza.finish());
            }
            // "BSS aa:bb:cc:dd:ee:ff(on wlan0)" or "... -- associated".
            let mac_end = rest
                .find(|c: char| !c.is_ascii_hexdigit() && c != ':')
                .unwrap_or(rest.len());
            if let Ok(bssid) = BssidId::parse(&rest[..mac_end]) {
                current = Some((bssid, IwStanza::default()));
            }
            continue;
        }
        if let Some((_, stanza)) = current.as_mut() {
            stanza.feed(line);
        }
    }
    if let Some((bssid, stanza)) = current.take() {
        results.insert(bssid, stanza.finish());
    }
    results
}

/// The first managed interface listed by `iw dev`.
pub fn parse_iw_dev(output: &str) -> Option<String> {
    let mut iface: Option<&str> = None;
    for line in output.lines() {
        let t = line.trim();
        if let Some(name) = t.strip_prefix("Interface ") {
            iface = name.split_whitespace().next();
        } else if t.starts_with("type managed") {
            if let Some(name) = iface {
                return Some(name.to_owned());
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// Merge `iw` details into an `nmcli` observation.
pub fn enrich(obs: &mut Observation, iw: &IwBss) {
    if iw.signal_dbm.is_some() {
        obs.signal_dbm = iw.signal_dbm;
    }
    obs.wifi_gen = iw.wifi_gen.or(obs.wifi_gen);
    obs.client_count = iw.station_count.or(obs.client_count);
    if let Some(raw) = iw.channel_util_raw {
        obs.channel_util_pct = Some(Observation::util_byte_to_pct(raw));
    }
    if iw.akm.is_some() {
        obs.akm = iw.akm.clone();
    }
    if iw.wps_manufacturer.is_some() {
        obs.wps_vendor_raw = iw.wps_manufacturer.clone();
    }
    obs.krv_flags = Some(iw.roaming);
    obs.secondary_offset = iw.secondary_offset.or(obs.secondary_offset);
    obs.center_freq1 = iw.center_freq1.or(obs.center_freq1);
    obs.center_freq2 = iw.center_freq2.or(obs.center_freq2);
    obs.he_capability = iw.he_capability.filter(|c| c.max_nss > 0).or(obs.he_capability);
    obs.pmf = iw.pmf.or(obs.pmf);
    if iw.country.is_some() {
        obs.country = iw.country.clone();
    }
    obs.beacon_interval_tu = iw.beacon_interval_tu.or(obs.beacon_interval_tu);
    obs.dtim_period = iw.dtim_period.or(obs.dtim_period);

    // nmcli leaves BANDWIDTH empty for 6 GHz.
    if obs.channel_width_mhz.is_none() {
        let primary = obs
            .band
            .zip(obs.primary_channel)
            .map(|(b, ch)| channel_to_freq(b, ch));
        obs.channel_width_mhz = iw
            .oper_width_mhz
            .or_else(|| {
                let (p, c) = primary.zip(obs.center_freq1)?;
                u16::try_from(infer_width(p, c).mhz()).ok()
            })
            .or(iw.cap_max_width_mhz);
    }
}

/// Final per-batch fixups that need no `iw` data.
pub fn finalize(obs: &mut Observation) {
    if obs.wifi_gen.is_none() && obs.band == Some(Band::Band6GHz) {
        obs.wifi_gen = Some(WifiGen::Wifi6E);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
