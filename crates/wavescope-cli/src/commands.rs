//! Command execution.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use colored::Colorize;
use tabled::{settings::Style, Table};

use wavescope_scan::capture::DEFAULT_STOP_GRACE;
use wavescope_scan::{
    CaptureConfig, CaptureSession, ChannelParams, GeometryEngine, NmcliIwConfig, NmcliIwSource,
    ObservationSource, PublishedState, QueryView, ReplaySource, ScanConfig, ScanLoop,
};

use crate::render;
use crate::{
    CaptureArgs, Commands, ConfigCommand, GeometryArgs, MonitorArgs, OnceArgs, OutputFormat,
    ScanOptions, ViewOptions,
};

/// Width of the spectrum panels in columns.
const SPECTRUM_COLS: usize = 96;

/// Execute a top-level command
pub async fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Monitor(args) => execute_monitor(args).await,
        Commands::Once(args) => execute_once(args).await,
        Commands::Geometry(args) => execute_geometry(args),
        Commands::Config(cmd) => execute_config(cmd),
        Commands::Capture(args) => execute_capture(args).await,
    }
}

/// Load the config file (if any), apply flag overrides and validate.
pub fn resolve_config(opts: &ScanOptions) -> Result<ScanConfig> {
    let mut config = match &opts.config {
        Some(path) => ScanConfig::from_json(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ScanConfig::default(),
    };
    if let Some(interval) = opts.interval {
        config.refresh_interval_seconds = interval;
    }
    if let Some(linger) = opts.linger {
        config.linger_window_seconds = linger;
    }
    if let Some(iface) = &opts.interface {
        config.interface = Some(iface.clone());
    }
    if opts.no_double_scan {
        config.startup_double_scan = false;
    }
    config.validate().context("Invalid scan configuration")?;
    Ok(config)
}

fn build_source(opts: &ScanOptions, config: &ScanConfig) -> Result<Arc<dyn ObservationSource>> {
    Ok(match &opts.replay {
        Some(path) => Arc::new(
            ReplaySource::from_json(path)
                .with_context(|| format!("Failed to load replay script {}", path.display()))?,
        ),
        None => Arc::new(NmcliIwSource::new(NmcliIwConfig::from(config))),
    })
}

/// The query view selected by the listing flags.
pub fn build_view(opts: &ViewOptions) -> QueryView {
    QueryView::new()
        .band(opts.band.map(Into::into))
        .text(opts.filter.as_deref())
        .hide_ghosts(opts.hide_ghosts)
        .sort_by(opts.sort)
}

fn draw(state: &PublishedState, view: &QueryView, spectrum: bool) {
    // Clear screen and home the cursor.
    print!("\x1B[2J\x1B[H");
    println!("{}", render::status_line(state));
    println!();
    println!("{}", render::ap_table(view, &state.snapshot, true));
    if spectrum {
        for band in view.bands_to_display(&state.snapshot) {
            println!();
            for line in render::spectrum_panel(view, &state.snapshot, band, SPECTRUM_COLS) {
                println!("{line}");
            }
        }
    }
}

/// Execute the monitor command
async fn execute_monitor(args: MonitorArgs) -> Result<()> {
    let config = resolve_config(&args.scan)?;
    let source = build_source(&args.scan, &config)?;
    let view = build_view(&args.view);

    let handle = ScanLoop::new(config, source).spawn();
    let mut rx = handle.subscribe();
    let mut published = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                draw(&state, &view, args.spectrum);
                published += 1;
                if args.cycles.is_some_and(|n| published >= n) {
                    break;
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

/// Execute the once command
async fn execute_once(args: OnceArgs) -> Result<()> {
    let config = resolve_config(&args.scan)?;
    let source = build_source(&args.scan, &config)?;
    let view = build_view(&args.view);

    let state = ScanLoop::new(config, source).run_once().await;
    match args.format {
        OutputFormat::Json => {
            let records = view.apply(&state.snapshot);
            let json = serde_json::to_string_pretty(&records)
                .context("Failed to serialize records")?;
            println!("{json}");
        }
        OutputFormat::Compact => {
            for line in render::compact_lines(&view, &state.snapshot) {
                println!("{line}");
            }
        }
        OutputFormat::Table => {
            println!("{}", render::status_line(&state));
            println!();
            println!("{}", render::ap_table(&view, &state.snapshot, true));
        }
    }
    Ok(())
}

/// Execute the geometry command
fn execute_geometry(args: GeometryArgs) -> Result<()> {
    let params = ChannelParams {
        band: args.band.into(),
        primary_channel: args.channel,
        width_mhz: args.width,
        secondary_offset: args.offset.map(Into::into),
        center_freq1: args.center_freq1,
    };
    let geometry = GeometryEngine::compute(&params);
    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&geometry)
                .context("Failed to serialize geometry")?;
            println!("{json}");
        }
        OutputFormat::Compact => {
            println!(
                "{}\t{}\t{}\t{}-{}\t{}",
                geometry.band,
                geometry.channel_label(),
                geometry.width,
                geometry.span.low_mhz,
                geometry.span.high_mhz,
                geometry.center_mhz
            );
        }
        OutputFormat::Table => {
            let table = Table::new(render::geometry_rows(&geometry))
                .with(Style::rounded())
                .to_string();
            println!("{table}");
        }
    }
    Ok(())
}

/// Execute the config command
fn execute_config(cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { config } => {
            let opts = ScanOptions {
                config,
                ..ScanOptions::default()
            };
            let config = resolve_config(&opts)?;
            let json = serde_json::to_string_pretty(&config)
                .context("Failed to serialize config")?;
            println!("{json}");
        }
        ConfigCommand::Init { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            ScanConfig::default()
                .to_json(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} wrote {}", "[OK]".green().bold(), path.display());
        }
    }
    Ok(())
}

/// Execute the capture command
async fn execute_capture(args: CaptureArgs) -> Result<()> {
    let output = args.output.unwrap_or_else(|| {
        CaptureConfig::default_file_name(&args.interface, Utc::now()).into()
    });
    let mut session =
        CaptureSession::new(CaptureConfig::tcpdump(&args.interface, output, args.privileged));
    session.start().context("Failed to start capture")?;
    println!(
        "{} capturing on {} for {}s into {}",
        "[CAPTURE]".bright_cyan().bold(),
        args.interface,
        args.duration,
        session.output().display()
    );

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.duration)) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
    }

    if !session.is_running() {
        eprintln!("{} capture exited early", "[WARN]".yellow().bold());
        if session.cleanup().await? {
            bail!("capture produced no data");
        }
        return Ok(());
    }

    let summary = session
        .stop(DEFAULT_STOP_GRACE)
        .await
        .context("Failed to stop capture")?;
    if session.cleanup().await? {
        println!("{} no packets captured; removed empty file", "[WARN]".yellow().bold());
    } else {
        println!(
            "{} {} bytes written to {}",
            "[OK]".green().bold(),
            summary.bytes,
            summary.output.display()
        );
    }
    Ok(())
}
