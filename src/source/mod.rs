//! Event sources: the OS-facing side of device monitoring.
//!
//! A [`DeviceBackend`] lists candidate device nodes and opens them as
//! [`EventSource`]s. Sources answer capability queries and hand out normalized
//! events one at a time without blocking.

pub mod scripted;
pub mod types;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(not(target_os = "linux"))]
pub mod noop;

use std::io;
use std::path::{Path, PathBuf};

// Re-export commonly used types
pub use scripted::{ScriptedBackend, ScriptedDevice, ScriptedRead};
pub use types::{EventKind, NormalizedEvent, ReadError};

#[cfg(target_os = "linux")]
pub use linux::{check_permission, EvdevBackend, EvdevSource};

/// Platform-agnostic backend type alias
#[cfg(target_os = "linux")]
pub type SystemBackend = EvdevBackend;

#[cfg(not(target_os = "linux"))]
pub use noop::{check_permission, NoopBackend, NoopSource};

/// Platform-agnostic backend type alias
#[cfg(not(target_os = "linux"))]
pub type SystemBackend = NoopBackend;

/// One opened input device.
pub trait EventSource: Send + 'static {
    /// Human-readable device name, for logs.
    fn name(&self) -> &str;

    /// Whether the device can produce events of this type at all.
    fn has_event_type(&self, kind: EventKind) -> bool;

    /// Whether the device can produce this specific code.
    fn has_event_code(&self, kind: EventKind, code: u16) -> bool;

    /// Read the next queued event without blocking.
    fn next_event(&mut self) -> Result<NormalizedEvent, ReadError>;
}

/// Enumerates and opens input devices.
pub trait DeviceBackend: Send + Sync + 'static {
    type Source: EventSource;

    /// Candidate device identifiers currently present.
    fn discover(&self) -> io::Result<Vec<PathBuf>>;

    /// Open one device for capability queries and reading.
    fn open(&self, path: &Path) -> io::Result<Self::Source>;
}
