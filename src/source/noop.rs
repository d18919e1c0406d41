//! Non-Linux (noop) implementation of event sources.
//!
//! This exists so the crate (and binary) can compile on targets without the
//! evdev interface. Discovery always comes back empty, so starting a session
//! reports that there is nothing to monitor.

use crate::source::types::{EventKind, NormalizedEvent, ReadError};
use crate::source::{DeviceBackend, EventSource};
use std::io;
use std::path::{Path, PathBuf};

/// A backend that never finds any device.
#[derive(Debug, Clone, Default)]
pub struct NoopBackend {
    device_dir: PathBuf,
}

impl NoopBackend {
    pub fn new(device_dir: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: device_dir.into(),
        }
    }

    pub fn device_dir(&self) -> &Path {
        &self.device_dir
    }
}

impl DeviceBackend for NoopBackend {
    type Source = NoopSource;

    fn discover(&self) -> io::Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }

    fn open(&self, path: &Path) -> io::Result<NoopSource> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("input devices are not supported on this platform: {path:?}"),
        ))
    }
}

/// Never constructed; exists to satisfy the backend's associated type.
pub struct NoopSource;

impl EventSource for NoopSource {
    fn name(&self) -> &str {
        "(unsupported)"
    }

    fn has_event_type(&self, _kind: EventKind) -> bool {
        false
    }

    fn has_event_code(&self, _kind: EventKind, _code: u16) -> bool {
        false
    }

    fn next_event(&mut self) -> Result<NormalizedEvent, ReadError> {
        Err(ReadError::Failed(io::Error::from(io::ErrorKind::Unsupported)))
    }
}

/// On platforms without evdev there is nothing to grant access to.
pub fn check_permission(_device_dir: &Path) -> bool {
    false
}
