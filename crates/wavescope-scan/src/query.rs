//! Read-only filtering and ordering of a registry snapshot.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::bssid::{Band, BssidId};
use crate::domain::record::ApRecord;
use crate::domain::registry::RegistrySnapshot;
use crate::geometry::ChannelGeometry;

/// Sort order for query results. Ties always fall back to BSSID order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// BSSID, ascending.
    #[default]
    Bssid,
    /// SSID, case-insensitive; hidden networks last.
    Ssid,
    /// Signal, strongest first; unknown signal last.
    Signal,
    /// Band, then primary channel.
    Channel,
    /// Cycle of first appearance, oldest first.
    FirstSeen,
}

impl SortKey {
    /// All keys, for help text.
    pub const ALL: [SortKey; 5] = [
        SortKey::Bssid,
        SortKey::Ssid,
        SortKey::Signal,
        SortKey::Channel,
        SortKey::FirstSeen,
    ];

    fn compare(self, a: &ApRecord, b: &ApRecord) -> Ordering {
        match self {
            SortKey::Bssid => Ordering::Equal,
            SortKey::Ssid => {
                let key = |r: &ApRecord| {
                    let s = r.ssid.value().map(|s| s.to_lowercase()).unwrap_or_default();
                    (s.is_empty(), s)
                };
                key(a).cmp(&key(b))
            }
            SortKey::Signal => match (a.signal_dbm, b.signal_dbm) {
                (Some(x), Some(y)) => y.total_cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortKey::Channel => (a.band.get(), a.primary_channel.get())
                .cmp(&(b.band.get(), b.primary_channel.get())),
            SortKey::FirstSeen => a.first_seen_cycle.cmp(&b.first_seen_cycle),
        }
        .then_with(|| a.bssid.cmp(&b.bssid))
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortKey::Bssid => "bssid",
            SortKey::Ssid => "ssid",
            SortKey::Signal => "signal",
            SortKey::Channel => "channel",
            SortKey::FirstSeen => "first-seen",
        };
        f.write_str(s)
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        SortKey::ALL
            .into_iter()
            .find(|k| k.to_string() == wanted)
            .ok_or_else(|| format!("unknown sort key '{s}'"))
    }
}

/// A filter-and-sort projection over a [`RegistrySnapshot`].
#[derive(Debug, Clone, Default)]
pub struct QueryView {
    band: Option<Band>,
    text: Option<String>,
    hide_ghosts: bool,
    sort: SortKey,
}

impl QueryView {
    /// A view that shows everything in BSSID order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only records on `band`.
    pub fn band(mut self, band: Option<Band>) -> Self {
        self.band = band;
        self
    }

    /// Keep only records whose SSID, BSSID or WPS vendor contains `text`,
    /// case-insensitively. Blank text matches everything.
    pub fn text(mut self, text: Option<&str>) -> Self {
        self.text = text
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        self
    }

    /// Drop lingering records.
    pub fn hide_ghosts(mut self, hide: bool) -> Self {
        self.hide_ghosts = hide;
        self
    }

    /// Order results by `key`.
    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort = key;
        self
    }

    /// Whether `record` passes every filter.
    pub fn matches(&self, record: &ApRecord) -> bool {
        if self.hide_ghosts && record.ghost {
            return false;
        }
        if let Some(band) = self.band {
            if record.band.get() != Some(band) {
                return false;
            }
        }
        if let Some(needle) = &self.text {
            let bssid = record.bssid.to_string();
            let hay = [
                record.ssid.value().map(String::as_str),
                Some(bssid.as_str()),
                record.wps_vendor_raw.value().map(String::as_str),
            ];
            if !hay
                .iter()
                .flatten()
                .any(|h| h.to_lowercase().contains(needle.as_str()))
            {
                return false;
            }
        }
        true
    }

    /// The matching records in sort order.
    pub fn apply<'a>(&self, snapshot: &'a RegistrySnapshot) -> Vec<&'a ApRecord> {
        let mut rows: Vec<&ApRecord> = snapshot.records().filter(|r| self.matches(r)).collect();
        let key = self.sort;
        rows.sort_by(|a, b| key.compare(a, b));
        rows
    }

    /// Geometry of every matching record on `band`, for spectrum placement.
    pub fn geometries(
        &self,
        snapshot: &RegistrySnapshot,
        band: Band,
    ) -> Vec<(BssidId, ChannelGeometry)> {
        snapshot
            .records()
            .filter(|r| self.matches(r))
            .filter_map(|r| r.geometry().map(|g| (r.bssid, g)))
            .filter(|(_, g)| g.band == band)
            .collect()
    }

    /// Bands to draw a panel for: the filtered band, or every band with a
    /// matching record.
    pub fn bands_to_display(&self, snapshot: &RegistrySnapshot) -> Vec<Band> {
        if let Some(band) = self.band {
            return vec![band];
        }
        Band::ALL
            .into_iter()
            .filter(|b| {
                snapshot
                    .records()
                    .any(|r| r.band.get() == Some(*b) && self.matches(r))
            })
            .collect()
    }
}
