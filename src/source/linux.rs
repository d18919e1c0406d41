//! Linux implementation of event sources using the kernel evdev interface.
//!
//! Devices are the `event*` character nodes under the input directory
//! (normally `/dev/input`). Reading them usually requires root or membership
//! of the `input` group.

use crate::source::types::{EventKind, NormalizedEvent, ReadError, SYN_DROPPED};
use crate::source::{DeviceBackend, EventSource};
use evdev::raw_stream::RawDevice;
use evdev::{EventType, InputEvent, Key, RelativeAxisType};
use std::collections::VecDeque;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Backend over the `event*` nodes of one input directory.
#[derive(Debug, Clone)]
pub struct EvdevBackend {
    device_dir: PathBuf,
}

impl EvdevBackend {
    pub fn new(device_dir: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: device_dir.into(),
        }
    }

    pub fn device_dir(&self) -> &Path {
        &self.device_dir
    }
}

impl Default for EvdevBackend {
    fn default() -> Self {
        Self::new("/dev/input")
    }
}

impl DeviceBackend for EvdevBackend {
    type Source = EvdevSource;

    fn discover(&self) -> io::Result<Vec<PathBuf>> {
        list_event_nodes(&self.device_dir)
    }

    fn open(&self, path: &Path) -> io::Result<EvdevSource> {
        EvdevSource::open(path)
    }
}

/// An opened evdev node in non-blocking mode.
pub struct EvdevSource {
    device: RawDevice,
    name: String,
    pending: VecDeque<InputEvent>,
}

impl EvdevSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        let device = RawDevice::open(path)?;
        set_nonblocking(&device)?;
        let name = device.name().unwrap_or("(unknown)").to_string();

        Ok(Self {
            device,
            name,
            pending: VecDeque::new(),
        })
    }
}

impl EventSource for EvdevSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_event_type(&self, kind: EventKind) -> bool {
        self.device
            .supported_events()
            .contains(EventType(kind.raw()))
    }

    fn has_event_code(&self, kind: EventKind, code: u16) -> bool {
        match kind {
            EventKind::Key => self
                .device
                .supported_keys()
                .is_some_and(|keys| keys.contains(Key::new(code))),
            EventKind::Relative => self
                .device
                .supported_relative_axes()
                .is_some_and(|axes| axes.contains(RelativeAxisType(code))),
            _ => false,
        }
    }

    fn next_event(&mut self) -> Result<NormalizedEvent, ReadError> {
        if self.pending.is_empty() {
            let events = self.device.fetch_events()?;
            self.pending.extend(events);
        }

        next_from(&mut self.pending)
    }
}

/// Take the next event from a fetched batch.
fn next_from(pending: &mut VecDeque<InputEvent>) -> Result<NormalizedEvent, ReadError> {
    let Some(event) = pending.pop_front() else {
        return Err(ReadError::WouldBlock);
    };

    if event.event_type() == EventType::SYNCHRONIZATION && event.code() == SYN_DROPPED {
        // Whatever is still buffered belongs to the broken frame.
        pending.clear();
        return Err(ReadError::Resync);
    }

    Ok(NormalizedEvent::new(
        EventKind::from_raw(event.event_type().0),
        event.code(),
        event.value(),
    ))
}

/// List `event*` nodes in `dir`, ordered by their numeric suffix.
pub fn list_event_nodes(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut nodes: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("event"))
        })
        .collect();

    nodes.sort_by_key(|path| (event_index(path), path.clone()));
    Ok(nodes)
}

fn event_index(path: &Path) -> u32 {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix("event"))
        .and_then(|suffix| suffix.parse().ok())
        .unwrap_or(u32::MAX)
}

fn set_nonblocking(device: &RawDevice) -> io::Result<()> {
    let raw_fd = device.as_raw_fd();

    // Preserve existing flags; just OR in O_NONBLOCK.
    let current = unsafe { libc::fcntl(raw_fd, libc::F_GETFL) };
    if current < 0 {
        return Err(io::Error::last_os_error());
    }

    let rc = unsafe { libc::fcntl(raw_fd, libc::F_SETFL, current | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Check whether at least one input device node can be opened.
///
/// Device nodes are normally readable only by root and the `input` group, so
/// a `false` here almost always means the process lacks privileges.
pub fn check_permission(device_dir: &Path) -> bool {
    list_event_nodes(device_dir)
        .map(|nodes| nodes.iter().any(|node| std::fs::File::open(node).is_ok()))
        .unwrap_or(false)
}
