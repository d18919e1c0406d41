//! Normalized input-event types shared by every event source.
//!
//! These mirror the kernel's generic input-event interface: an event is a
//! `(type, code, value)` triple, and a device advertises which types and codes
//! it can produce through capability bits.

use std::fmt;
use std::io;

/// Synchronization event codes.
pub const SYN_REPORT: u16 = 0;
pub const SYN_DROPPED: u16 = 3;

/// Keyboard keys used to recognise a keyboard.
pub const KEY_ENTER: u16 = 28;
pub const KEY_A: u16 = 30;
pub const KEY_SPACE: u16 = 57;

/// Mouse buttons.
pub const BTN_LEFT: u16 = 0x110;
pub const BTN_RIGHT: u16 = 0x111;
pub const BTN_MIDDLE: u16 = 0x112;

/// Relative axes.
pub const REL_X: u16 = 0x00;
pub const REL_Y: u16 = 0x01;
pub const REL_HWHEEL: u16 = 0x06;
pub const REL_WHEEL: u16 = 0x08;

/// Key codes probed when deciding whether a device is a keyboard.
pub const KEYBOARD_PROBE: [u16; 3] = [KEY_A, KEY_SPACE, KEY_ENTER];

/// Button codes counted as mouse clicks.
pub const MOUSE_BUTTONS: [u16; 3] = [BTN_LEFT, BTN_RIGHT, BTN_MIDDLE];

/// Event type category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Frame markers (`EV_SYN`)
    Sync,
    /// Key and button transitions (`EV_KEY`)
    Key,
    /// Relative axis motion (`EV_REL`)
    Relative,
    /// Anything this crate does not interpret
    Other(u16),
}

impl EventKind {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0x00 => EventKind::Sync,
            0x01 => EventKind::Key,
            0x02 => EventKind::Relative,
            other => EventKind::Other(other),
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            EventKind::Sync => 0x00,
            EventKind::Key => 0x01,
            EventKind::Relative => 0x02,
            EventKind::Other(raw) => raw,
        }
    }
}

/// One hardware occurrence as reported by an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub kind: EventKind,
    pub code: u16,
    pub value: i32,
}

impl NormalizedEvent {
    pub fn new(kind: EventKind, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }

    /// A key or button transition. `value` is 1 for down, 0 for up, 2 for autorepeat.
    pub fn key(code: u16, value: i32) -> Self {
        Self::new(EventKind::Key, code, value)
    }

    /// A key-down transition.
    pub fn key_down(code: u16) -> Self {
        Self::key(code, 1)
    }

    /// A signed relative-axis delta.
    pub fn relative(code: u16, delta: i32) -> Self {
        Self::new(EventKind::Relative, code, delta)
    }

    /// The end-of-frame marker.
    pub fn sync_report() -> Self {
        Self::new(EventKind::Sync, SYN_REPORT, 0)
    }

    pub fn is_key_down(&self) -> bool {
        self.kind == EventKind::Key && self.value == 1
    }

    pub fn is_frame_end(&self) -> bool {
        self.kind == EventKind::Sync && self.code == SYN_REPORT
    }
}

/// Outcome of a non-blocking read that produced no event.
#[derive(Debug)]
pub enum ReadError {
    /// Nothing is queued right now.
    WouldBlock,
    /// The kernel dropped events; the current frame is incomplete.
    Resync,
    /// The device is gone or unreadable.
    Failed(io::Error),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::WouldBlock => write!(f, "no event available"),
            ReadError::Resync => write!(f, "events dropped, resynchronizing"),
            ReadError::Failed(e) => write!(f, "read failed: {e}"),
        }
    }
}

impl std::error::Error for ReadError {}

impl From<io::Error> for ReadError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::WouldBlock {
            ReadError::WouldBlock
        } else {
            ReadError::Failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_raw_mapping() {
        assert_eq!(EventKind::from_raw(1), EventKind::Key);
        assert_eq!(EventKind::from_raw(2), EventKind::Relative);
        assert_eq!(EventKind::from_raw(4), EventKind::Other(4));
        assert_eq!(EventKind::Other(0x11).raw(), 0x11);
    }

    #[test]
    fn test_key_down_detection() {
        assert!(NormalizedEvent::key_down(KEY_A).is_key_down());
        assert!(!NormalizedEvent::key(KEY_A, 0).is_key_down());
        assert!(!NormalizedEvent::key(KEY_A, 2).is_key_down());
        assert!(!NormalizedEvent::relative(REL_X, 1).is_key_down());
    }

    #[test]
    fn test_would_block_io_error_maps_to_would_block() {
        let err: ReadError = io::Error::from(io::ErrorKind::WouldBlock).into();
        assert!(matches!(err, ReadError::WouldBlock));

        let err: ReadError = io::Error::from(io::ErrorKind::NotFound).into();
        assert!(matches!(err, ReadError::Failed(_)));
    }
}
