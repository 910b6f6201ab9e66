//! Table and spectrum rendering for registry snapshots.

use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use wavescope_scan::geometry::{axis_range, axis_ticks};
use wavescope_scan::{
    ApRecord, Band, ChannelGeometry, PublishedState, QueryView, RegistrySnapshot, ScanStatus,
};

// ============================================================================
// Display Structs for Tables
// ============================================================================

/// Access-point display row for tables
#[derive(Tabled, Serialize, Debug, Clone, PartialEq)]
pub struct ApRow {
    /// `*` on the BSSID this host is associated to.
    #[tabled(rename = "Use")]
    pub in_use: String,
    #[tabled(rename = "BSSID")]
    pub bssid: String,
    #[tabled(rename = "SSID")]
    pub ssid: String,
    #[tabled(rename = "Band")]
    pub band: String,
    #[tabled(rename = "Channels")]
    pub channels: String,
    #[tabled(rename = "Width")]
    pub width: String,
    #[tabled(rename = "Signal")]
    pub signal: String,
    #[tabled(rename = "Security")]
    pub security: String,
    #[tabled(rename = "PMF")]
    pub pmf: String,
    #[tabled(rename = "PHY")]
    pub phy: String,
    #[tabled(rename = "Util")]
    pub util: String,
    #[tabled(rename = "Clients")]
    pub clients: String,
    #[tabled(rename = "k/v/r")]
    pub roaming: String,
    #[tabled(rename = "Rate")]
    pub rate: String,
    #[tabled(rename = "Seen")]
    pub seen: String,
}

fn or_dash<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

impl ApRow {
    /// Plain-text row for `record`.
    pub fn from_record(record: &ApRecord) -> Self {
        let geometry = record.geometry();
        Self {
            in_use: if record.in_use { "*" } else { "" }.to_owned(),
            bssid: record.bssid.to_string(),
            ssid: record.display_ssid().to_owned(),
            band: or_dash(record.band.get()),
            channels: record.channel_span_label(),
            width: or_dash(geometry.map(|g| g.width)),
            signal: or_dash(record.signal_dbm.map(|d| format!("{d:.0} dBm"))),
            security: record.security_summary().to_owned(),
            pmf: or_dash(record.pmf.get()),
            phy: record.phy_mode().to_owned(),
            util: or_dash(record.channel_util_pct.get().map(|p| format!("{p}%"))),
            clients: or_dash(record.client_count.get()),
            roaming: record
                .krv_flags
                .get()
                .filter(|f| !f.is_empty())
                .map(|f| f.to_string())
                .unwrap_or_else(|| "-".into()),
            rate: or_dash(record.effective_rate_mbps().map(|r| format!("{r:.0} Mb/s"))),
            seen: if record.ghost {
                format!("ghost since {}", record.last_seen_cycle)
            } else {
                record.last_seen_cycle.to_string()
            },
        }
    }

    /// Row with terminal colours: signal graded, the associated AP
    /// highlighted, ghosts dimmed.
    pub fn colored(record: &ApRecord) -> Self {
        let mut row = Self::from_record(record);
        if record.ghost {
            for cell in row.cells_mut() {
                *cell = cell.dimmed().to_string();
            }
            return row;
        }
        row.signal = match record.signal_dbm {
            Some(d) if d >= -60.0 => row.signal.green().to_string(),
            Some(d) if d >= -75.0 => row.signal.yellow().to_string(),
            Some(_) => row.signal.red().to_string(),
            None => row.signal,
        };
        if record.in_use {
            row.in_use = row.in_use.green().bold().to_string();
            row.ssid = row.ssid.green().bold().to_string();
        }
        row
    }

    fn cells_mut(&mut self) -> [&mut String; 15] {
        [
            &mut self.in_use,
            &mut self.bssid,
            &mut self.ssid,
            &mut self.band,
            &mut self.channels,
            &mut self.width,
            &mut self.signal,
            &mut self.security,
            &mut self.pmf,
            &mut self.phy,
            &mut self.util,
            &mut self.clients,
            &mut self.roaming,
            &mut self.rate,
            &mut self.seen,
        ]
    }
}

/// Channel geometry display row
#[derive(Tabled, Serialize, Debug, Clone, PartialEq)]
pub struct GeometryRow {
    #[tabled(rename = "Field")]
    pub field: &'static str,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Key/value rows describing `g`.
pub fn geometry_rows(g: &ChannelGeometry) -> Vec<GeometryRow> {
    let yes_no = |b: bool| if b { "yes" } else { "no" }.to_string();
    vec![
        GeometryRow { field: "Band", value: g.band.to_string() },
        GeometryRow { field: "Primary", value: g.primary_channel.to_string() },
        GeometryRow { field: "Width", value: g.width.to_string() },
        GeometryRow { field: "Center", value: format!("{} MHz", g.center_mhz) },
        GeometryRow {
            field: "Span",
            value: format!("{}\u{2013}{} MHz", g.span.low_mhz, g.span.high_mhz),
        },
        GeometryRow { field: "Channels", value: g.channel_label() },
        GeometryRow { field: "Sub-band", value: or_dash(g.sub_band) },
        GeometryRow { field: "DFS", value: yes_no(g.dfs) },
        GeometryRow { field: "PSC", value: yes_no(g.psc) },
    ]
}

// ============================================================================
// Snapshot rendering
// ============================================================================

/// One-line status header for a published state.
pub fn status_line(state: &PublishedState) -> String {
    let snap = &state.snapshot;
    let time = state.published_at.format("%H:%M:%S");
    match &state.status {
        ScanStatus::Starting => format!("{} waiting for first scan", "[SCAN]".bright_cyan().bold()),
        ScanStatus::Ok { cycle } => format!(
            "{} cycle {} at {} | {} APs | {} ghosts",
            "[SCAN]".bright_cyan().bold(),
            cycle,
            time,
            snap.len().to_string().bold(),
            snap.ghost_count()
        ),
        ScanStatus::Failed { cycle, failure } => format!(
            "{} cycle {} at {} failed: {} | showing {} APs from {}",
            "[WARN]".yellow().bold(),
            cycle,
            time,
            failure,
            snap.len(),
            snap.cycle()
        ),
    }
}

/// Rounded table of the records `view` selects.
pub fn ap_table(view: &QueryView, snapshot: &RegistrySnapshot, colored: bool) -> String {
    let rows: Vec<ApRow> = view
        .apply(snapshot)
        .into_iter()
        .map(|r| if colored { ApRow::colored(r) } else { ApRow::from_record(r) })
        .collect();
    if rows.is_empty() {
        return "No access points match.".to_owned();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Tab-separated rows, one per record.
pub fn compact_lines(view: &QueryView, snapshot: &RegistrySnapshot) -> Vec<String> {
    view.apply(snapshot)
        .into_iter()
        .map(|r| {
            let row = ApRow::from_record(r);
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                row.bssid, row.ssid, row.band, row.channels, row.signal, row.seen
            )
        })
        .collect()
}

// ============================================================================
// Spectrum panels
// ============================================================================

fn column(freq_mhz: u32, band: Band, cols: usize) -> usize {
    let axis = axis_range(band);
    let span = u64::from(axis.span_mhz().max(1));
    let offset = u64::from(freq_mhz.clamp(axis.low_mhz, axis.high_mhz) - axis.low_mhz);
    let last = cols.saturating_sub(1) as u64;
    (offset * last / span) as usize
}

/// A text spectrum panel for `band`: a tick ruler, then one bar per AP
/// covering its occupied span.
pub fn spectrum_panel(
    view: &QueryView,
    snapshot: &RegistrySnapshot,
    band: Band,
    cols: usize,
) -> Vec<String> {
    let cols = cols.max(16);
    let axis = axis_range(band);
    let mut lines = vec![format!(
        "{} ({}\u{2013}{} MHz)",
        band, axis.low_mhz, axis.high_mhz
    )];

    let mut ruler = vec![' '; cols];
    let mut labels = vec![' '; cols];
    for tick in axis_ticks(band) {
        let c = column(tick.freq_mhz, band, cols);
        ruler[c] = '|';
        let text = tick.channel.to_string();
        if text.len() + c <= cols && labels[c..c + text.len()].iter().all(|&ch| ch == ' ') {
            for (i, ch) in text.chars().enumerate() {
                labels[c + i] = ch;
            }
        }
    }
    lines.push(ruler.into_iter().collect());
    lines.push(labels.into_iter().collect());

    let mut placed = view.geometries(snapshot, band);
    placed.sort_by_key(|(bssid, g)| (g.span.low_mhz, g.span.high_mhz, *bssid));
    for (bssid, g) in placed {
        let lo = column(g.span.low_mhz, band, cols);
        let hi = column(g.span.high_mhz, band, cols).max(lo);
        let mut bar = vec![' '; cols];
        for cell in &mut bar[lo..=hi] {
            *cell = '=';
        }
        bar[column(g.center_mhz, band, cols)] = '^';
        let name = snapshot
            .get(&bssid)
            .map(|r| r.display_ssid().to_owned())
            .unwrap_or_default();
        let flags = match (g.dfs, g.psc) {
            (true, _) => " DFS",
            (_, true) => " PSC",
            _ => "",
        };
        lines.push(format!(
            "{} {} {}{}",
            bar.into_iter().collect::<String>(),
            g.channel_label(),
            name,
            flags
        ));
    }
    lines
}
