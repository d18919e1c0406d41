//! Per-device polling worker.
//!
//! One worker owns one device for the length of a session. It drains the
//! device without blocking, sleeps briefly when nothing is queued, and turns
//! qualifying events into counter updates. It exits when the stop signal is
//! raised or the device stops being readable.

use crate::monitor::aggregate::AggregateState;
use crate::monitor::classifier::DeviceRoles;
use crate::source::types::{
    EventKind, NormalizedEvent, ReadError, MOUSE_BUTTONS, REL_HWHEEL, REL_WHEEL, REL_X, REL_Y,
};
use crate::source::{DeviceBackend, EventSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// A device selected for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub path: PathBuf,
    pub roles: DeviceRoles,
}

impl DeviceDescriptor {
    pub fn new(path: impl Into<PathBuf>, roles: DeviceRoles) -> Self {
        Self {
            path: path.into(),
            roles,
        }
    }
}

/// Cooperative stop flag shared by the controller and its workers.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How pointer motion is turned into distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistancePolicy {
    /// `sqrt(dx² + dy²)` over the X/Y deltas of one input frame
    #[default]
    Euclidean,
    /// `|dx| + |dy|`, each axis event counted on its own
    AxisSum,
}

impl fmt::Display for DistancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistancePolicy::Euclidean => write!(f, "euclidean"),
            DistancePolicy::AxisSum => write!(f, "axis-sum"),
        }
    }
}

impl FromStr for DistancePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "euclidean" => Ok(DistancePolicy::Euclidean),
            "axis-sum" | "axis_sum" | "sum" => Ok(DistancePolicy::AxisSum),
            other => Err(format!(
                "unknown distance policy '{other}' (expected euclidean or axis-sum)"
            )),
        }
    }
}

/// Tunables for a worker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Sleep between polls when the device has nothing queued
    pub idle_sleep: Duration,
    pub distance: DistancePolicy,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            idle_sleep: Duration::from_millis(10),
            distance: DistancePolicy::default(),
        }
    }
}

/// Translates one device's event stream into counter updates.
#[derive(Debug)]
pub struct EventTally {
    roles: DeviceRoles,
    distance: DistancePolicy,
    pending_dx: i64,
    pending_dy: i64,
}

impl EventTally {
    pub fn new(roles: DeviceRoles, distance: DistancePolicy) -> Self {
        Self {
            roles,
            distance,
            pending_dx: 0,
            pending_dy: 0,
        }
    }

    /// Apply one event. Events that do not qualify are ignored.
    pub fn apply(&mut self, event: &NormalizedEvent, aggregate: &AggregateState) {
        match event.kind {
            EventKind::Key if event.is_key_down() => {
                if self.roles.is_keyboard {
                    aggregate.add_keyboard_press();
                    trace!("key down code={}", event.code);
                }
                if self.roles.is_mouse && MOUSE_BUTTONS.contains(&event.code) {
                    aggregate.add_mouse_click();
                    trace!("button down code={:#x}", event.code);
                }
            }
            EventKind::Relative if self.roles.is_mouse => match event.code {
                REL_WHEEL | REL_HWHEEL => {
                    aggregate.add_scroll(event.value);
                    trace!("scroll delta={}", event.value);
                }
                REL_X | REL_Y => self.add_motion(event.code, event.value, aggregate),
                _ => {}
            },
            EventKind::Sync if event.is_frame_end() => self.flush_motion(aggregate),
            _ => {}
        }
    }

    fn add_motion(&mut self, axis: u16, delta: i32, aggregate: &AggregateState) {
        match self.distance {
            DistancePolicy::AxisSum => aggregate.add_distance(f64::from(delta.unsigned_abs())),
            DistancePolicy::Euclidean if axis == REL_X => self.pending_dx += i64::from(delta),
            DistancePolicy::Euclidean => self.pending_dy += i64::from(delta),
        }
    }

    /// Commit motion accumulated for the current frame.
    pub fn flush_motion(&mut self, aggregate: &AggregateState) {
        if self.pending_dx == 0 && self.pending_dy == 0 {
            return;
        }
        let dx = self.pending_dx as f64;
        let dy = self.pending_dy as f64;
        aggregate.add_distance(dx.hypot(dy));
        self.discard_motion();
    }

    /// Forget motion from a frame that will never complete.
    pub fn discard_motion(&mut self) {
        self.pending_dx = 0;
        self.pending_dy = 0;
    }
}

/// Poll one device until stopped or until it fails.
///
/// Failures are logged and end only this worker; nothing is returned.
pub fn run<B: DeviceBackend>(
    backend: &B,
    descriptor: &DeviceDescriptor,
    stop: &StopSignal,
    aggregate: &AggregateState,
    settings: &WorkerSettings,
) {
    let path = &descriptor.path;
    let mut source = match backend.open(path) {
        Ok(source) => source,
        Err(e) => {
            warn!("Failed to open {:?}: {}", path, e);
            return;
        }
    };

    info!(
        "Monitoring {:?} -> {} ({})",
        path,
        source.name(),
        descriptor.roles.label()
    );

    let mut tally = EventTally::new(descriptor.roles, settings.distance);

    while !stop.is_triggered() {
        match source.next_event() {
            Ok(event) => tally.apply(&event, aggregate),
            Err(ReadError::WouldBlock) => {
                tally.flush_motion(aggregate);
                thread::sleep(settings.idle_sleep);
            }
            Err(ReadError::Resync) => {
                debug!("Dropped events on {:?}, resynchronizing", path);
                tally.discard_motion();
            }
            Err(ReadError::Failed(e)) => {
                warn!("Read error on {:?}: {}", path, e);
                break;
            }
        }
    }

    tally.flush_motion(aggregate);
    debug!("Exiting monitor for {:?} ({})", path, source.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::types::{BTN_LEFT, BTN_RIGHT, KEY_A, KEY_SPACE};
    use crate::source::{ScriptedBackend, ScriptedDevice, ScriptedRead};
    use std::time::Instant;

    const KEYBOARD: DeviceRoles = DeviceRoles {
        is_keyboard: true,
        is_mouse: false,
    };
    const MOUSE: DeviceRoles = DeviceRoles {
        is_keyboard: false,
        is_mouse: true,
    };

    fn feed(
        roles: DeviceRoles,
        policy: DistancePolicy,
        events: &[NormalizedEvent],
    ) -> AggregateState {
        let aggregate = AggregateState::new();
        let mut tally = EventTally::new(roles, policy);
        for event in events {
            tally.apply(event, &aggregate);
        }
        tally.flush_motion(&aggregate);
        aggregate
    }

    #[test]
    fn test_keyboard_counts_key_down_only() {
        let aggregate = feed(
            KEYBOARD,
            DistancePolicy::Euclidean,
            &[
                NormalizedEvent::key_down(KEY_A),
                NormalizedEvent::key(KEY_A, 2),
                NormalizedEvent::key(KEY_A, 0),
                NormalizedEvent::key_down(KEY_SPACE),
                NormalizedEvent::relative(REL_WHEEL, 3),
            ],
        );
        let snapshot = aggregate.snapshot();
        assert_eq!(snapshot.keyboard_presses, 2);
        assert_eq!(snapshot.mouse_clicks, 0);
        assert_eq!(snapshot.scroll_magnitude, 0);
    }

    #[test]
    fn test_mouse_counts_buttons_and_scroll() {
        let aggregate = feed(
            MOUSE,
            DistancePolicy::Euclidean,
            &[
                NormalizedEvent::key_down(BTN_LEFT),
                NormalizedEvent::key(BTN_LEFT, 0),
                NormalizedEvent::key_down(BTN_RIGHT),
                NormalizedEvent::key_down(0x113),
                NormalizedEvent::relative(REL_WHEEL, 2),
                NormalizedEvent::relative(REL_WHEEL, -5),
                NormalizedEvent::relative(REL_HWHEEL, 1),
            ],
        );
        let snapshot = aggregate.snapshot();
        assert_eq!(snapshot.mouse_clicks, 2);
        assert_eq!(snapshot.scroll_magnitude, 8);
        assert_eq!(snapshot.keyboard_presses, 0);
    }

    #[test]
    fn test_euclidean_combines_axes_within_a_frame() {
        let aggregate = feed(
            MOUSE,
            DistancePolicy::Euclidean,
            &[
                NormalizedEvent::relative(REL_X, 3),
                NormalizedEvent::relative(REL_Y, -4),
                NormalizedEvent::sync_report(),
                NormalizedEvent::relative(REL_X, -6),
                NormalizedEvent::sync_report(),
            ],
        );
        assert_eq!(aggregate.snapshot().mouse_distance, 11.0);
    }

    #[test]
    fn test_axis_sum_adds_each_axis() {
        let aggregate = feed(
            MOUSE,
            DistancePolicy::AxisSum,
            &[
                NormalizedEvent::relative(REL_X, 3),
                NormalizedEvent::relative(REL_Y, -4),
                NormalizedEvent::sync_report(),
            ],
        );
        assert_eq!(aggregate.snapshot().mouse_distance, 7.0);
    }

    #[test]
    fn test_motion_ignored_on_keyboard() {
        let aggregate = feed(
            KEYBOARD,
            DistancePolicy::AxisSum,
            &[NormalizedEvent::relative(REL_X, 10), NormalizedEvent::sync_report()],
        );
        assert_eq!(aggregate.snapshot().mouse_distance, 0.0);
    }

    #[test]
    fn test_distance_policy_parsing() {
        assert_eq!("euclidean".parse::<DistancePolicy>(), Ok(DistancePolicy::Euclidean));
        assert_eq!("Axis-Sum".parse::<DistancePolicy>(), Ok(DistancePolicy::AxisSum));
        assert!("manhattan".parse::<DistancePolicy>().is_err());
    }

    fn run_until_removed(device: ScriptedDevice, roles: DeviceRoles) -> AggregateState {
        let descriptor = DeviceDescriptor::new(device.path(), roles);
        let backend = ScriptedBackend::new().with_device(device);
        let aggregate = AggregateState::new();
        let settings = WorkerSettings {
            idle_sleep: Duration::from_millis(1),
            ..WorkerSettings::default()
        };
        run(&backend, &descriptor, &StopSignal::new(), &aggregate, &settings);
        assert_eq!(backend.live_sources(), 0);
        aggregate
    }

    #[test]
    fn test_worker_exits_on_removal() {
        let device = ScriptedDevice::keyboard("/dev/input/event0").with_reads([
            NormalizedEvent::key_down(KEY_A).into(),
            ScriptedRead::Idle,
            NormalizedEvent::key_down(KEY_A).into(),
            ScriptedRead::Remove,
            NormalizedEvent::key_down(KEY_A).into(),
        ]);
        let aggregate = run_until_removed(device, KEYBOARD);
        assert_eq!(aggregate.snapshot().keyboard_presses, 2);
    }

    #[test]
    fn test_resync_discards_partial_frame() {
        let device = ScriptedDevice::mouse("/dev/input/event1").with_reads([
            NormalizedEvent::relative(REL_X, 100).into(),
            ScriptedRead::Resync,
            NormalizedEvent::relative(REL_X, 3).into(),
            NormalizedEvent::relative(REL_Y, 4).into(),
            NormalizedEvent::sync_report().into(),
            ScriptedRead::Remove,
        ]);
        let aggregate = run_until_removed(device, MOUSE);
        assert_eq!(aggregate.snapshot().mouse_distance, 5.0);
    }

    #[test]
    fn test_worker_returns_when_open_fails() {
        let device = ScriptedDevice::keyboard("/dev/input/event2").unreadable();
        let aggregate = run_until_removed(device, KEYBOARD);
        assert_eq!(aggregate.snapshot().keyboard_presses, 0);
    }

    #[test]
    fn test_worker_observes_stop_signal() {
        let device = ScriptedDevice::keyboard("/dev/input/event3")
            .with_events([NormalizedEvent::key_down(KEY_A)]);
        let descriptor = DeviceDescriptor::new(device.path(), KEYBOARD);
        let backend = ScriptedBackend::new().with_device(device);
        let aggregate = AggregateState::new();
        let stop = StopSignal::new();
        let settings = WorkerSettings::default();

        thread::scope(|scope| {
            let handle = scope.spawn(|| run(&backend, &descriptor, &stop, &aggregate, &settings));

            let deadline = Instant::now() + Duration::from_secs(5);
            while aggregate.snapshot().keyboard_presses == 0 && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            stop.trigger();
            handle.join().unwrap();
        });

        assert_eq!(aggregate.snapshot().keyboard_presses, 1);
        assert_eq!(backend.live_sources(), 0);
    }
}
