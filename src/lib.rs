//! KnM Tracker - machine-wide keyboard and mouse activity counter.
//!
//! This library watches every attached input device and keeps live totals of
//! key presses, mouse clicks, scroll distance and pointer travel for the
//! current monitoring session.
//!
//! # What Is Counted
//!
//! - **Key presses**: key-down transitions on keyboards (autorepeat excluded)
//! - **Mouse clicks**: left, right and middle button presses
//! - **Scroll magnitude**: sum of absolute wheel deltas, vertical and horizontal
//! - **Mouse distance**: sum of pointer movement magnitudes
//!
//! Only totals are kept. No key identities, coordinates or per-application
//! attribution are recorded.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         KnM Tracker                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Discovery  │──▶│ Classifier  │──▶│  Workers    │       │
//! │  │ (/dev/input)│   │ (cap bits)  │   │(1 per dev.) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                              │              │
//! │                                              ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │  Dashboard  │◀────── snapshot ────│  Aggregate  │       │
//! │  │  (report)   │                     │  counters   │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use knm_tracker::{config::Config, monitor::Monitor, source::SystemBackend};
//!
//! let config = Config::default();
//! let backend = SystemBackend::new(&config.device_dir);
//! let mut monitor = Monitor::new(backend, config.monitor_settings());
//!
//! // Requires read access to the device nodes
//! monitor.start().expect("Failed to list input devices");
//!
//! // ... later
//! println!("{:?}", monitor.snapshot());
//! monitor.stop();
//! ```

pub mod config;
pub mod monitor;
pub mod report;
pub mod source;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, SourceConfig};
pub use monitor::{
    DistancePolicy, MetricsSnapshot, Monitor, MonitorError, MonitorSettings, SessionState,
    StartOutcome, StopOutcome,
};
pub use source::{DeviceBackend, EventSource, SystemBackend};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shown when a session finds nothing it can monitor.
pub const PERMISSION_HINT: &str = r#"
No input devices found.

Input device nodes (/dev/input/event*) are normally readable only by root
and members of the `input` group. Try one of:

  sudo knm-tracker start
  sudo usermod -aG input $USER   (then log out and back in)
"#;
