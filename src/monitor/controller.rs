//! Session lifecycle: discovery, worker fan-out, and join-based teardown.

use crate::monitor::aggregate::{AggregateState, MetricsSnapshot, SharedAggregate};
use crate::monitor::classifier::{probe, probe_all, ProbedDevice};
use crate::monitor::worker::{self, DeviceDescriptor, StopSignal, WorkerSettings};
use crate::source::DeviceBackend;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Where a monitor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
}

/// Engine settings for a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub worker: WorkerSettings,
    /// Upper bound on workers per session; zero is treated as one
    pub max_devices: usize,
    pub capture_keyboard: bool,
    pub capture_mouse: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            worker: WorkerSettings::default(),
            max_devices: 64,
            capture_keyboard: true,
            capture_mouse: true,
        }
    }
}

/// Errors that prevent a session from starting.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("failed to list input devices: {0}")]
    Discovery(#[source] io::Error),
}

/// Result of [`Monitor::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A session is running with this many workers.
    Started { workers: usize },
    /// A session was already running; nothing changed.
    AlreadyActive,
    /// No device qualified for monitoring; still idle.
    NoDevices,
}

/// Result of [`Monitor::stop`].
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// Every worker has exited; carries the final counters.
    Stopped(MetricsSnapshot),
    /// There was no running session.
    NotRunning,
}

/// A spawned worker and the device it owns.
#[derive(Debug)]
pub struct WorkerHandle {
    descriptor: DeviceDescriptor,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Supervises one monitoring session at a time.
pub struct Monitor<B: DeviceBackend> {
    backend: Arc<B>,
    settings: MonitorSettings,
    aggregate: SharedAggregate,
    state: SessionState,
    workers: Vec<WorkerHandle>,
    stop: StopSignal,
}

impl<B: DeviceBackend> Monitor<B> {
    pub fn new(backend: B, settings: MonitorSettings) -> Self {
        Self {
            backend: Arc::new(backend),
            settings,
            aggregate: Arc::new(AggregateState::new()),
            state: SessionState::Idle,
            workers: Vec::new(),
            stop: StopSignal::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Shared handle to the counters, for a reporter on another thread.
    pub fn aggregate(&self) -> SharedAggregate {
        Arc::clone(&self.aggregate)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.aggregate.snapshot()
    }

    /// Whole seconds since the session started; frozen while idle.
    pub fn elapsed_secs(&self) -> u64 {
        self.aggregate.elapsed().as_secs()
    }

    /// Workers spawned for the current session.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Workers that have not exited yet.
    pub fn active_workers(&self) -> usize {
        self.workers.iter().filter(|w| !w.is_finished()).count()
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.workers.iter().map(WorkerHandle::descriptor)
    }

    /// Classify every candidate device without starting a session.
    pub fn probe_devices(&self) -> Result<Vec<ProbedDevice>, MonitorError> {
        probe_all(&*self.backend).map_err(MonitorError::Discovery)
    }

    /// Start a session: reset counters, discover and classify devices, and
    /// spawn one worker per match.
    ///
    /// Calling this while a session is active changes nothing.
    pub fn start(&mut self) -> Result<StartOutcome, MonitorError> {
        if self.state != SessionState::Idle {
            debug!("Start requested while {:?}; ignoring", self.state);
            return Ok(StartOutcome::AlreadyActive);
        }

        self.aggregate.reset();

        let candidates = match self.backend.discover() {
            Ok(candidates) => candidates,
            Err(e) => {
                self.aggregate.freeze_clock();
                return Err(MonitorError::Discovery(e));
            }
        };
        debug!("Discovered {} candidate device(s)", candidates.len());

        let stop = StopSignal::new();
        let mut workers = Vec::new();
        let limit = self.settings.max_devices.max(1);

        for path in candidates {
            if workers.len() >= limit {
                warn!("Device limit of {} reached; ignoring remaining devices", limit);
                break;
            }

            let roles = probe(&*self.backend, &path)
                .roles
                .restrict(self.settings.capture_keyboard, self.settings.capture_mouse);
            if !roles.any() {
                continue;
            }

            let descriptor = DeviceDescriptor::new(path, roles);
            match self.spawn_worker(descriptor.clone(), &stop) {
                Ok(worker) => workers.push(worker),
                Err(e) => warn!("Failed to spawn worker for {:?}: {}", descriptor.path, e),
            }
        }

        if workers.is_empty() {
            self.aggregate.freeze_clock();
            info!("No input devices found");
            return Ok(StartOutcome::NoDevices);
        }

        let count = workers.len();
        self.workers = workers;
        self.stop = stop;
        self.aggregate.restart_clock();
        self.state = SessionState::Running;
        info!("Monitoring {} device(s)", count);

        Ok(StartOutcome::Started { workers: count })
    }

    fn spawn_worker(
        &self,
        descriptor: DeviceDescriptor,
        stop: &StopSignal,
    ) -> io::Result<WorkerHandle> {
        let backend = Arc::clone(&self.backend);
        let aggregate = Arc::clone(&self.aggregate);
        let stop = stop.clone();
        let settings = self.settings.worker;
        let owned = descriptor.clone();

        let name = descriptor
            .path
            .file_name()
            .map(|n| format!("knm-{}", n.to_string_lossy()))
            .unwrap_or_else(|| "knm-worker".to_string());

        let handle = thread::Builder::new().name(name).spawn(move || {
            worker::run(&*backend, &owned, &stop, &aggregate, &settings);
        })?;

        Ok(WorkerHandle { descriptor, handle })
    }

    /// Stop the session and wait for every worker to exit.
    ///
    /// Blocks for at most about one idle-sleep interval per worker loop.
    /// Calling this while idle changes nothing.
    pub fn stop(&mut self) -> StopOutcome {
        if self.state != SessionState::Running {
            debug!("Stop requested while {:?}; ignoring", self.state);
            return StopOutcome::NotRunning;
        }

        self.state = SessionState::Stopping;
        self.stop.trigger();

        for worker in self.workers.drain(..) {
            if worker.handle.join().is_err() {
                warn!("Worker for {:?} panicked", worker.descriptor.path);
            }
        }

        self.aggregate.freeze_clock();
        let snapshot = self.aggregate.snapshot();
        self.state = SessionState::Idle;
        info!("All monitoring workers stopped");

        StopOutcome::Stopped(snapshot)
    }
}

impl<B: DeviceBackend> Drop for Monitor<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::types::KEY_A;
    use crate::source::{NormalizedEvent, ScriptedBackend, ScriptedDevice};
    use std::time::Duration;

    fn fast_settings() -> MonitorSettings {
        MonitorSettings {
            worker: WorkerSettings {
                idle_sleep: Duration::from_millis(1),
                ..WorkerSettings::default()
            },
            ..MonitorSettings::default()
        }
    }

    fn two_device_backend() -> ScriptedBackend {
        ScriptedBackend::new()
            .with_device(ScriptedDevice::keyboard("/dev/input/event0"))
            .with_device(ScriptedDevice::mouse("/dev/input/event1"))
            .with_device(ScriptedDevice::new("/dev/input/event2"))
    }

    #[test]
    fn test_start_spawns_one_worker_per_match() {
        let mut monitor = Monitor::new(two_device_backend(), fast_settings());
        assert_eq!(monitor.state(), SessionState::Idle);

        assert_eq!(monitor.start().unwrap(), StartOutcome::Started { workers: 2 });
        assert_eq!(monitor.state(), SessionState::Running);
        assert_eq!(monitor.worker_count(), 2);

        let paths: Vec<_> = monitor.devices().map(|d| d.path.clone()).collect();
        assert_eq!(paths.len(), 2);
        assert!(!paths.iter().any(|p| p.ends_with("event2")));
    }

    #[test]
    fn test_second_start_is_a_no_op() {
        let mut monitor = Monitor::new(two_device_backend(), fast_settings());
        monitor.start().unwrap();
        let workers = monitor.worker_count();

        assert_eq!(monitor.start().unwrap(), StartOutcome::AlreadyActive);
        assert_eq!(monitor.worker_count(), workers);
    }

    #[test]
    fn test_stop_while_idle_is_a_no_op() {
        let mut monitor = Monitor::new(two_device_backend(), fast_settings());
        assert_eq!(monitor.stop(), StopOutcome::NotRunning);
        assert_eq!(monitor.state(), SessionState::Idle);
    }

    #[test]
    fn test_stop_joins_workers_and_releases_devices() {
        let mut monitor = Monitor::new(two_device_backend(), fast_settings());
        monitor.start().unwrap();

        assert!(matches!(monitor.stop(), StopOutcome::Stopped(_)));
        assert_eq!(monitor.state(), SessionState::Idle);
        assert_eq!(monitor.worker_count(), 0);
        assert_eq!(monitor.backend().live_sources(), 0);
        assert_eq!(monitor.stop(), StopOutcome::NotRunning);
    }

    #[test]
    fn test_discovery_failure_leaves_monitor_idle() {
        let mut monitor = Monitor::new(ScriptedBackend::failing_discovery(), fast_settings());
        let err = monitor.start().unwrap_err();
        assert!(matches!(err, MonitorError::Discovery(_)));
        assert_eq!(monitor.state(), SessionState::Idle);
        assert!(monitor.probe_devices().is_err());
    }

    #[test]
    fn test_max_devices_caps_workers() {
        let mut backend = ScriptedBackend::new();
        for i in 0..5 {
            backend = backend.with_device(ScriptedDevice::keyboard(format!("/dev/input/event{i}")));
        }
        let settings = MonitorSettings {
            max_devices: 3,
            ..fast_settings()
        };

        let mut monitor = Monitor::new(backend, settings);
        assert_eq!(monitor.start().unwrap(), StartOutcome::Started { workers: 3 });
    }

    #[test]
    fn test_max_devices_counts_monitored_devices_only() {
        // Unclassifiable devices ahead of the keyboard do not use up the limit.
        let backend = ScriptedBackend::new()
            .with_device(ScriptedDevice::new("/dev/input/event0"))
            .with_device(ScriptedDevice::new("/dev/input/event1"))
            .with_device(ScriptedDevice::keyboard("/dev/input/event2"));
        let settings = MonitorSettings {
            max_devices: 1,
            ..fast_settings()
        };

        let mut monitor = Monitor::new(backend, settings);
        assert_eq!(monitor.start().unwrap(), StartOutcome::Started { workers: 1 });
    }

    #[test]
    fn test_zero_max_devices_still_monitors_one() {
        let backend =
            ScriptedBackend::new().with_device(ScriptedDevice::keyboard("/dev/input/event0"));
        let settings = MonitorSettings {
            max_devices: 0,
            ..fast_settings()
        };

        let mut monitor = Monitor::new(backend, settings);
        assert_eq!(monitor.start().unwrap(), StartOutcome::Started { workers: 1 });
    }

    #[test]
    fn test_source_filter_excludes_roles() {
        let settings = MonitorSettings {
            capture_mouse: false,
            ..fast_settings()
        };
        let mut monitor = Monitor::new(two_device_backend(), settings);
        assert_eq!(monitor.start().unwrap(), StartOutcome::Started { workers: 1 });

        let descriptor = monitor.devices().next().unwrap();
        assert!(descriptor.roles.is_keyboard);
        assert!(!descriptor.roles.is_mouse);
    }

    #[test]
    fn test_elapsed_is_frozen_after_stop() {
        let mut monitor = Monitor::new(two_device_backend(), fast_settings());
        assert_eq!(monitor.elapsed_secs(), 0);

        monitor.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        monitor.stop();

        let frozen = monitor.aggregate().elapsed();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(monitor.aggregate().elapsed(), frozen);
    }

    #[test]
    fn test_drop_stops_workers() {
        let backend = ScriptedBackend::new().with_device(
            ScriptedDevice::keyboard("/dev/input/event0")
                .with_events([NormalizedEvent::key_down(KEY_A)]),
        );
        let probe_backend = backend.clone();

        {
            let mut monitor = Monitor::new(backend, fast_settings());
            monitor.start().unwrap();
        }

        assert_eq!(probe_backend.live_sources(), 0);
    }
}
