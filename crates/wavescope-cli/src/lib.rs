//! Wavescope CLI
//!
//! Command-line front end for the wavescope access-point engine.
//!
//! # Features
//!
//! - **monitor**: Continuously refreshed access-point table and spectrum
//! - **once**: Startup double scan, print, exit
//! - **geometry**: Spectrum placement for given channel attributes
//! - **config**: Show or write the scan configuration
//! - **capture**: Packet capture for a fixed duration
//!
//! # Usage
//!
//! ```bash
//! # Live table, 6 GHz only, strongest first
//! wavescope monitor --band 6 --sort signal
//!
//! # Offline run from a recorded script
//! wavescope once --replay cycles.json --format json
//!
//! # Where does an 80 MHz AP on channel 116 sit?
//! wavescope geometry --band 5 --channel 116 --width 80
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use wavescope_scan::{Band, SecondaryOffset, SortKey};

pub mod commands;
pub mod render;

/// Wavescope Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "wavescope")]
#[command(author, version, about = "WiFi access-point monitor with spectrum geometry")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Continuously scan and redraw the access-point table
    Monitor(MonitorArgs),

    /// Run the startup scan, print the result and exit
    Once(OnceArgs),

    /// Compute spectrum placement for a channel
    Geometry(GeometryArgs),

    /// Show or initialise the scan configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Capture packets on an interface for a fixed duration
    Capture(CaptureArgs),
}

/// Options shared by every scanning command
#[derive(Args, Debug, Clone, Default)]
pub struct ScanOptions {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Refresh interval in seconds (1-30)
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Seconds an unseen access point lingers before removal
    #[arg(long)]
    pub linger: Option<u64>,

    /// Wireless interface for `iw` enrichment
    #[arg(long)]
    pub interface: Option<String>,

    /// Skip the startup double scan
    #[arg(long)]
    pub no_double_scan: bool,

    /// Replay cycles from a JSON script instead of scanning
    #[arg(long)]
    pub replay: Option<PathBuf>,
}

/// Filter and ordering options for access-point listings
#[derive(Args, Debug, Clone, Default)]
pub struct ViewOptions {
    /// Only show one band
    #[arg(short, long, value_enum)]
    pub band: Option<BandArg>,

    /// Case-insensitive match on SSID, BSSID or WPS vendor
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Hide access points that have dropped out of recent scans
    #[arg(long)]
    pub hide_ghosts: bool,

    /// Sort order: bssid, ssid, signal, channel, first-seen
    #[arg(short, long, default_value = "bssid")]
    pub sort: SortKey,
}

/// Arguments for the monitor command
#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub scan: ScanOptions,

    #[command(flatten)]
    pub view: ViewOptions,

    /// Draw the spectrum panels under the table
    #[arg(long)]
    pub spectrum: bool,

    /// Exit after this many published snapshots
    #[arg(short = 'n', long)]
    pub cycles: Option<u64>,
}

/// Arguments for the once command
#[derive(Args, Debug)]
pub struct OnceArgs {
    #[command(flatten)]
    pub scan: ScanOptions,

    #[command(flatten)]
    pub view: ViewOptions,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the geometry command
#[derive(Args, Debug)]
pub struct GeometryArgs {
    /// Band of the primary channel
    #[arg(short, long, value_enum)]
    pub band: BandArg,

    /// Primary channel number
    #[arg(short, long)]
    pub channel: u16,

    /// Channel width in MHz
    #[arg(short, long)]
    pub width: Option<u16>,

    /// HT40 secondary channel position
    #[arg(long, value_enum)]
    pub offset: Option<OffsetArg>,

    /// Center frequency of the bonded block in MHz
    #[arg(long)]
    pub center_freq1: Option<u32>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as JSON
    Show {
        /// JSON configuration file to load
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the default configuration to a file
    Init {
        /// Destination path
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Arguments for the capture command
#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Interface to capture on
    #[arg(short, long)]
    pub interface: String,

    /// Output file (defaults to a timestamped name in the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Capture duration in seconds
    #[arg(short, long, default_value = "30")]
    pub duration: u64,

    /// Launch through pkexec
    #[arg(long)]
    pub privileged: bool,
}

/// Band argument enum for CLI
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BandArg {
    #[value(name = "2.4")]
    TwoFour,
    #[value(name = "5")]
    Five,
    #[value(name = "6")]
    Six,
}

impl From<BandArg> for Band {
    fn from(val: BandArg) -> Self {
        match val {
            BandArg::TwoFour => Band::Band2_4GHz,
            BandArg::Five => Band::Band5GHz,
            BandArg::Six => Band::Band6GHz,
        }
    }
}

/// Secondary channel offset argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OffsetArg {
    Above,
    Below,
}

impl From<OffsetArg> for SecondaryOffset {
    fn from(val: OffsetArg) -> Self {
        match val {
            OffsetArg::Above => SecondaryOffset::Above,
            OffsetArg::Below => SecondaryOffset::Below,
        }
    }
}

/// Output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty table output
    #[default]
    Table,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_monitor_flags() {
        let cli = Cli::parse_from([
            "wavescope", "monitor", "--band", "6", "--sort", "first-seen", "--hide-ghosts",
            "--interval", "3", "-n", "2",
        ]);
        let Commands::Monitor(args) = cli.command else {
            panic!("expected monitor");
        };
        assert_eq!(args.view.band, Some(BandArg::Six));
        assert_eq!(args.view.sort, SortKey::FirstSeen);
        assert!(args.view.hide_ghosts);
        assert_eq!(args.scan.interval, Some(3));
        assert_eq!(args.cycles, Some(2));
    }

    #[test]
    fn parses_geometry_flags() {
        let cli = Cli::parse_from([
            "wavescope", "geometry", "--band", "2.4", "--channel", "6", "--width", "40",
            "--offset", "below",
        ]);
        let Commands::Geometry(args) = cli.command else {
            panic!("expected geometry");
        };
        assert_eq!(Band::from(args.band), Band::Band2_4GHz);
        assert_eq!(args.offset.map(SecondaryOffset::from), Some(SecondaryOffset::Below));
    }
}
