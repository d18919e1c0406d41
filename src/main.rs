//! KnM Tracker CLI
//!
//! Counts keyboard and mouse activity across every attached input device.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use knm_tracker::{
    config::{Config, SourceConfig},
    monitor::{DistancePolicy, Monitor, StartOutcome, StopOutcome},
    report::{render_dashboard, render_final},
    source::{check_permission, SystemBackend},
    PERMISSION_HINT, VERSION,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "knm-tracker")]
#[command(version = VERSION)]
#[command(about = "Count keyboard and mouse activity across all input devices", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a monitoring session and print a live dashboard
    Start(StartArgs),

    /// List input devices and how they would be monitored
    Devices {
        /// Directory holding the event device nodes
        #[arg(long)]
        device_dir: Option<PathBuf>,

        /// Print the device list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration
    Config,

    /// Check whether input devices are readable
    Permission {
        /// Directory holding the event device nodes
        #[arg(long)]
        device_dir: Option<PathBuf>,
    },
}

#[derive(Args)]
struct StartArgs {
    /// Input roles to capture (keyboard, mouse, or all)
    #[arg(long)]
    sources: Option<String>,

    /// Seconds between dashboard updates
    #[arg(long)]
    interval: Option<u64>,

    /// Directory holding the event device nodes
    #[arg(long)]
    device_dir: Option<PathBuf>,

    /// Movement distance policy (euclidean or axis-sum)
    #[arg(long)]
    distance: Option<DistancePolicy>,

    /// Print the final counts as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Start(args) => cmd_start(args),
        Commands::Devices { device_dir, json } => cmd_devices(device_dir, json),
        Commands::Config => cmd_config(),
        Commands::Permission { device_dir } => {
            cmd_permission(device_dir);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "knm_tracker=debug"
    } else {
        "knm_tracker=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        warn!("Could not load {:?}, using defaults: {}", Config::config_path(), e);
        Config::default()
    })
}

fn cmd_start(args: StartArgs) -> anyhow::Result<()> {
    let mut config = load_config();
    if let Some(sources) = &args.sources {
        config.sources = SourceConfig::from_csv(sources);
    }
    if let Some(secs) = args.interval {
        config.report_interval = Duration::from_secs(secs);
    }
    if let Some(dir) = args.device_dir {
        config.device_dir = dir;
    }
    if let Some(distance) = args.distance {
        config.distance = distance;
    }
    let config = config.clamped();

    if !config.sources.any_enabled() {
        bail!("At least one source must be enabled (keyboard or mouse)");
    }

    println!("KnM Tracker v{VERSION}");
    println!();
    println!("  Device directory: {}", config.device_dir.display());
    println!(
        "  Keyboard: {}",
        if config.sources.keyboard {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  Mouse: {}",
        if config.sources.mouse {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Distance policy: {}", config.distance);
    println!("  Report interval: {}s", config.report_interval.as_secs());
    println!();

    let shutdown = shutdown_channel()?;

    let backend = SystemBackend::new(&config.device_dir);
    let mut monitor = Monitor::new(backend, config.monitor_settings());

    match monitor
        .start()
        .with_context(|| format!("Could not start monitoring {:?}", config.device_dir))?
    {
        StartOutcome::Started { workers } => {
            println!("Monitoring {workers} device(s). Press Ctrl+C to stop.");
            println!();
        }
        StartOutcome::NoDevices => {
            eprintln!("{PERMISSION_HINT}");
            std::process::exit(1);
        }
        StartOutcome::AlreadyActive => {}
    }

    loop {
        match shutdown.recv_timeout(config.report_interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let active = monitor.active_workers();
                println!("{}", render_dashboard(&monitor.snapshot(), active));
                println!();

                if active == 0 {
                    warn!("Every monitored device has gone away");
                    break;
                }
            }
        }
    }

    println!("Stopping monitoring...");
    if let StopOutcome::Stopped(snapshot) = monitor.stop() {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        } else {
            println!();
            println!("{}", render_final(&snapshot));
        }
    }

    Ok(())
}

/// Ctrl+C and SIGTERM both arrive as one message on the returned channel.
fn shutdown_channel() -> anyhow::Result<Receiver<()>> {
    let (tx, rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .context("Error setting Ctrl+C handler")?;
    Ok(rx)
}

fn cmd_devices(device_dir: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let config = load_config();
    let dir = device_dir.unwrap_or(config.device_dir.clone());

    let monitor = Monitor::new(SystemBackend::new(&dir), config.monitor_settings());
    let devices = monitor
        .probe_devices()
        .with_context(|| format!("Could not list {dir:?}"))?;
    info!("Probed {} candidate device(s)", devices.len());

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No event devices found in {dir:?}");
        return Ok(());
    }

    println!("{:<24} {:<16} NAME", "PATH", "ROLE");
    for device in &devices {
        println!(
            "{:<24} {:<16} {}",
            device.path.display(),
            device.roles.label(),
            device.name.as_deref().unwrap_or("(unreadable)")
        );
    }

    let monitored = devices.iter().filter(|d| d.roles.any()).count();
    println!();
    println!("{monitored} of {} device(s) would be monitored", devices.len());
    if devices.iter().all(|d| d.name.is_none()) {
        println!("{PERMISSION_HINT}");
    }

    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

fn cmd_permission(device_dir: Option<PathBuf>) {
    let dir = device_dir.unwrap_or_else(|| load_config().device_dir);

    if check_permission(&dir) {
        println!("Input devices in {dir:?}: readable ✓");
    } else {
        println!("Input devices in {dir:?}: not readable ✗");
        println!("{PERMISSION_HINT}");
    }
}
