//! In-memory event sources that replay a fixed script.
//!
//! Every `open` of a scripted device yields a fresh source that starts the
//! script from the beginning, the same way reopening a real device node does.
//! Once the script is exhausted the source reports "no event available"
//! forever, unless the script ended with [`ScriptedRead::Remove`].

use crate::source::types::{
    EventKind, NormalizedEvent, ReadError, BTN_LEFT, BTN_MIDDLE, BTN_RIGHT, KEYBOARD_PROBE,
    REL_HWHEEL, REL_WHEEL, REL_X, REL_Y,
};
use crate::source::{DeviceBackend, EventSource};
use std::collections::{HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One step of a device script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedRead {
    /// Deliver this event.
    Event(NormalizedEvent),
    /// Report dropped events.
    Resync,
    /// Report that nothing is queued, once.
    Idle,
    /// Report the device as gone; every later read fails too.
    Remove,
}

impl From<NormalizedEvent> for ScriptedRead {
    fn from(event: NormalizedEvent) -> Self {
        ScriptedRead::Event(event)
    }
}

/// A device description plus its read script.
#[derive(Debug, Clone)]
pub struct ScriptedDevice {
    path: PathBuf,
    name: String,
    types: HashSet<EventKind>,
    codes: HashSet<(EventKind, u16)>,
    script: Vec<ScriptedRead>,
    successful_opens: Option<usize>,
    opens: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl ScriptedDevice {
    /// A device with no capabilities and an empty script.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scripted".to_string());

        Self {
            path,
            name,
            types: HashSet::new(),
            codes: HashSet::new(),
            script: Vec::new(),
            successful_opens: None,
            opens: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A device advertising the keyboard probe keys.
    pub fn keyboard(path: impl Into<PathBuf>) -> Self {
        Self::new(path)
            .named("Scripted Keyboard")
            .with_keys(&KEYBOARD_PROBE)
    }

    /// A device advertising buttons, motion and both wheels.
    pub fn mouse(path: impl Into<PathBuf>) -> Self {
        Self::new(path)
            .named("Scripted Mouse")
            .with_keys(&[BTN_LEFT, BTN_RIGHT, BTN_MIDDLE])
            .with_relative_axes(&[REL_X, REL_Y, REL_WHEEL, REL_HWHEEL])
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Advertise the key event type and these key codes.
    pub fn with_keys(mut self, codes: &[u16]) -> Self {
        self.types.insert(EventKind::Key);
        self.codes
            .extend(codes.iter().map(|&code| (EventKind::Key, code)));
        self
    }

    /// Advertise the relative event type and these axes.
    pub fn with_relative_axes(mut self, codes: &[u16]) -> Self {
        self.types.insert(EventKind::Relative);
        self.codes
            .extend(codes.iter().map(|&code| (EventKind::Relative, code)));
        self
    }

    /// Advertise an event type without any codes.
    pub fn with_event_type(mut self, kind: EventKind) -> Self {
        self.types.insert(kind);
        self
    }

    /// Append reads to the script.
    pub fn with_reads(mut self, reads: impl IntoIterator<Item = ScriptedRead>) -> Self {
        self.script.extend(reads);
        self
    }

    /// Append events to the script.
    pub fn with_events(self, events: impl IntoIterator<Item = NormalizedEvent>) -> Self {
        self.with_reads(events.into_iter().map(ScriptedRead::Event))
    }

    /// Every open fails, as with a permission error.
    pub fn unreadable(self) -> Self {
        self.opens_before_failing(0)
    }

    /// Allow `n` successful opens, then fail.
    pub fn opens_before_failing(mut self, n: usize) -> Self {
        self.successful_opens = Some(n);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How many times the device has been opened successfully.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// How many opened sources for this device are still alive.
    pub fn live_sources(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn open(&self) -> io::Result<ScriptedSource> {
        let opened = self.opens.load(Ordering::SeqCst);
        if self.successful_opens.is_some_and(|limit| opened >= limit) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {:?}", self.path),
            ));
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);

        Ok(ScriptedSource {
            name: self.name.clone(),
            types: self.types.clone(),
            codes: self.codes.clone(),
            reads: self.script.iter().copied().collect(),
            removed: false,
            live: self.live.clone(),
        })
    }
}

/// A backend serving a fixed set of scripted devices.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    devices: Vec<ScriptedDevice>,
    discovery_error: Option<io::ErrorKind>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, device: ScriptedDevice) -> Self {
        self.devices.push(device);
        self
    }

    /// Discovery itself fails, as if the input directory were missing.
    pub fn failing_discovery() -> Self {
        Self {
            devices: Vec::new(),
            discovery_error: Some(io::ErrorKind::NotFound),
        }
    }

    pub fn device(&self, path: impl AsRef<Path>) -> Option<&ScriptedDevice> {
        let path = path.as_ref();
        self.devices.iter().find(|d| d.path == path)
    }

    /// Opened sources still alive across all devices.
    pub fn live_sources(&self) -> usize {
        self.devices.iter().map(ScriptedDevice::live_sources).sum()
    }
}

impl DeviceBackend for ScriptedBackend {
    type Source = ScriptedSource;

    fn discover(&self) -> io::Result<Vec<PathBuf>> {
        if let Some(kind) = self.discovery_error {
            return Err(io::Error::new(kind, "scripted discovery failure"));
        }
        Ok(self.devices.iter().map(|d| d.path.clone()).collect())
    }

    fn open(&self, path: &Path) -> io::Result<ScriptedSource> {
        self.device(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{path:?}")))?
            .open()
    }
}

/// An opened scripted device.
pub struct ScriptedSource {
    name: String,
    types: HashSet<EventKind>,
    codes: HashSet<(EventKind, u16)>,
    reads: VecDeque<ScriptedRead>,
    removed: bool,
    live: Arc<AtomicUsize>,
}

impl EventSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_event_type(&self, kind: EventKind) -> bool {
        self.types.contains(&kind)
    }

    fn has_event_code(&self, kind: EventKind, code: u16) -> bool {
        self.types.contains(&kind) && self.codes.contains(&(kind, code))
    }

    fn next_event(&mut self) -> Result<NormalizedEvent, ReadError> {
        if self.removed {
            return Err(ReadError::Failed(io::Error::from(io::ErrorKind::NotFound)));
        }

        match self.reads.pop_front() {
            Some(ScriptedRead::Event(event)) => Ok(event),
            Some(ScriptedRead::Resync) => Err(ReadError::Resync),
            Some(ScriptedRead::Idle) | None => Err(ReadError::WouldBlock),
            Some(ScriptedRead::Remove) => {
                self.removed = true;
                Err(ReadError::Failed(io::Error::new(
                    io::ErrorKind::NotFound,
                    "device removed",
                )))
            }
        }
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::types::KEY_A;

    #[test]
    fn test_each_open_replays_from_the_start() {
        let backend = ScriptedBackend::new().with_device(
            ScriptedDevice::keyboard("/dev/input/event0")
                .with_events([NormalizedEvent::key_down(KEY_A)]),
        );
        let path = Path::new("/dev/input/event0");

        for _ in 0..2 {
            let mut source = backend.open(path).unwrap();
            assert_eq!(source.next_event().unwrap(), NormalizedEvent::key_down(KEY_A));
            assert!(matches!(source.next_event(), Err(ReadError::WouldBlock)));
        }
        assert_eq!(backend.device(path).unwrap().open_count(), 2);
        assert_eq!(backend.live_sources(), 0);
    }

    #[test]
    fn test_removal_is_sticky() {
        let backend = ScriptedBackend::new().with_device(
            ScriptedDevice::mouse("/dev/input/event1").with_reads([ScriptedRead::Remove]),
        );
        let mut source = backend.open(Path::new("/dev/input/event1")).unwrap();
        assert!(matches!(source.next_event(), Err(ReadError::Failed(_))));
        assert!(matches!(source.next_event(), Err(ReadError::Failed(_))));
    }

    #[test]
    fn test_open_limit() {
        let device = ScriptedDevice::keyboard("/dev/input/event2").opens_before_failing(1);
        let backend = ScriptedBackend::new().with_device(device);
        let path = Path::new("/dev/input/event2");

        assert!(backend.open(path).is_ok());
        let err = backend.open(path).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_failing_discovery() {
        assert!(ScriptedBackend::failing_discovery().discover().is_err());
    }
}
