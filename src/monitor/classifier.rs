//! Device role classification from capability bits.
//!
//! The input-event interface has no "device type" field, so roles are
//! guessed from what a device says it can emit. A miss only means the device
//! is not monitored.

use crate::source::types::{
    EventKind, KEYBOARD_PROBE, MOUSE_BUTTONS, REL_WHEEL, REL_X, REL_Y,
};
use crate::source::{DeviceBackend, EventSource};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Roles a device is monitored in. Both may be set on composite devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceRoles {
    pub is_keyboard: bool,
    pub is_mouse: bool,
}

impl DeviceRoles {
    pub const NONE: DeviceRoles = DeviceRoles {
        is_keyboard: false,
        is_mouse: false,
    };

    pub fn any(&self) -> bool {
        self.is_keyboard || self.is_mouse
    }

    /// Drop the roles that are not being captured.
    pub fn restrict(self, keyboard: bool, mouse: bool) -> Self {
        Self {
            is_keyboard: self.is_keyboard && keyboard,
            is_mouse: self.is_mouse && mouse,
        }
    }

    pub fn label(&self) -> &'static str {
        match (self.is_keyboard, self.is_mouse) {
            (true, true) => "keyboard+mouse",
            (true, false) => "keyboard",
            (false, true) => "mouse",
            (false, false) => "ignored",
        }
    }
}

/// Decide the roles of an opened source.
pub fn classify<S: EventSource + ?Sized>(source: &S) -> DeviceRoles {
    let is_keyboard = has_any(source, EventKind::Key, &KEYBOARD_PROBE);
    let is_mouse = has_any(source, EventKind::Key, &MOUSE_BUTTONS)
        || has_any(source, EventKind::Relative, &[REL_WHEEL])
        || has_any(source, EventKind::Relative, &[REL_X, REL_Y]);

    DeviceRoles {
        is_keyboard,
        is_mouse,
    }
}

fn has_any<S: EventSource + ?Sized>(source: &S, kind: EventKind, codes: &[u16]) -> bool {
    source.has_event_type(kind) && codes.iter().any(|&code| source.has_event_code(kind, code))
}

/// A candidate device after classification.
#[derive(Debug, Clone, Serialize)]
pub struct ProbedDevice {
    pub path: PathBuf,
    pub name: Option<String>,
    pub roles: DeviceRoles,
}

/// Open `path` just long enough to classify it.
///
/// A device that cannot be opened classifies as neither role.
pub fn probe<B: DeviceBackend>(backend: &B, path: &Path) -> ProbedDevice {
    match backend.open(path) {
        Ok(source) => {
            let roles = classify(&source);
            debug!(
                "Classified {:?} ({}) as {}",
                path,
                source.name(),
                roles.label()
            );
            ProbedDevice {
                path: path.to_path_buf(),
                name: Some(source.name().to_string()),
                roles,
            }
        }
        Err(e) => {
            debug!("Skipping {:?}: {}", path, e);
            ProbedDevice {
                path: path.to_path_buf(),
                name: None,
                roles: DeviceRoles::NONE,
            }
        }
    }
}

/// Discover and classify every candidate without monitoring any of them.
pub fn probe_all<B: DeviceBackend>(backend: &B) -> io::Result<Vec<ProbedDevice>> {
    Ok(backend
        .discover()?
        .iter()
        .map(|path| probe(backend, path))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::types::{BTN_LEFT, BTN_MIDDLE, BTN_RIGHT, KEY_ENTER, REL_HWHEEL};
    use crate::source::{ScriptedBackend, ScriptedDevice};

    fn roles_of(device: ScriptedDevice) -> DeviceRoles {
        let path = device.path().to_path_buf();
        let backend = ScriptedBackend::new().with_device(device);
        probe(&backend, &path).roles
    }

    #[test]
    fn test_enter_only_is_keyboard() {
        let roles = roles_of(ScriptedDevice::new("/dev/input/event0").with_keys(&[KEY_ENTER]));
        assert_eq!(
            roles,
            DeviceRoles {
                is_keyboard: true,
                is_mouse: false
            }
        );
    }

    #[test]
    fn test_buttons_and_wheel_is_mouse() {
        let roles = roles_of(
            ScriptedDevice::new("/dev/input/event1")
                .with_keys(&[BTN_LEFT, BTN_RIGHT, BTN_MIDDLE])
                .with_relative_axes(&[REL_WHEEL]),
        );
        assert_eq!(
            roles,
            DeviceRoles {
                is_keyboard: false,
                is_mouse: true
            }
        );
    }

    #[test]
    fn test_motion_only_is_mouse() {
        let roles = roles_of(ScriptedDevice::new("/dev/input/event2").with_relative_axes(&[REL_Y]));
        assert!(roles.is_mouse);
        assert!(!roles.is_keyboard);
    }

    #[test]
    fn test_horizontal_wheel_alone_is_not_a_mouse() {
        let roles = roles_of(
            ScriptedDevice::new("/dev/input/event3").with_relative_axes(&[REL_HWHEEL]),
        );
        assert_eq!(roles, DeviceRoles::NONE);
    }

    #[test]
    fn test_composite_device_has_both_roles() {
        let roles = roles_of(
            ScriptedDevice::keyboard("/dev/input/event4")
                .with_keys(&[BTN_LEFT])
                .with_relative_axes(&[REL_X, REL_Y]),
        );
        assert!(roles.is_keyboard && roles.is_mouse);
        assert_eq!(roles.label(), "keyboard+mouse");
    }

    #[test]
    fn test_no_capabilities_is_excluded() {
        let roles = roles_of(ScriptedDevice::new("/dev/input/event5"));
        assert!(!roles.any());
    }

    #[test]
    fn test_event_type_without_codes_is_excluded() {
        let roles = roles_of(
            ScriptedDevice::new("/dev/input/event6")
                .with_event_type(EventKind::Key)
                .with_event_type(EventKind::Relative),
        );
        assert_eq!(roles, DeviceRoles::NONE);
    }

    #[test]
    fn test_unopenable_device_is_excluded() {
        let roles = roles_of(ScriptedDevice::keyboard("/dev/input/event7").unreadable());
        assert_eq!(roles, DeviceRoles::NONE);
    }

    #[test]
    fn test_restrict_roles() {
        let both = DeviceRoles {
            is_keyboard: true,
            is_mouse: true,
        };
        assert_eq!(both.restrict(true, false).label(), "keyboard");
        assert_eq!(both.restrict(false, true).label(), "mouse");
        assert!(!both.restrict(false, false).any());
    }
}
