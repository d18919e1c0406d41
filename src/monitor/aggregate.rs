//! Shared session counters.
//!
//! Workers bump the integer counters with atomic adds; the distance
//! accumulator has no atomic float type available, so it lives behind its own
//! mutex that is held only for the read-modify-write of that one value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Live counters for one monitoring session.
#[derive(Debug)]
pub struct AggregateState {
    /// Key-down transitions on keyboard devices
    keyboard_presses: AtomicU64,
    /// Left/right/middle button presses on mouse devices
    mouse_clicks: AtomicU64,
    /// Sum of absolute wheel deltas, both wheels
    scroll_magnitude: AtomicU64,
    /// Sum of pointer movement magnitudes
    mouse_distance: Mutex<f64>,
    clock: Mutex<SessionClock>,
}

#[derive(Debug, Default)]
struct SessionClock {
    started: Option<Instant>,
    started_at: Option<DateTime<Utc>>,
    frozen: Option<Duration>,
}

impl SessionClock {
    fn elapsed(&self) -> Duration {
        match (self.frozen, self.started) {
            (Some(frozen), _) => frozen,
            (None, Some(started)) => started.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }
}

impl AggregateState {
    pub fn new() -> Self {
        Self {
            keyboard_presses: AtomicU64::new(0),
            mouse_clicks: AtomicU64::new(0),
            scroll_magnitude: AtomicU64::new(0),
            mouse_distance: Mutex::new(0.0),
            clock: Mutex::new(SessionClock::default()),
        }
    }

    /// Zero every counter and start a new session clock.
    ///
    /// Only call this while no worker is running.
    pub fn reset(&self) {
        self.keyboard_presses.store(0, Ordering::Relaxed);
        self.mouse_clicks.store(0, Ordering::Relaxed);
        self.scroll_magnitude.store(0, Ordering::Relaxed);
        *lock(&self.mouse_distance) = 0.0;

        let mut clock = lock(&self.clock);
        clock.started = Some(Instant::now());
        clock.started_at = Some(Utc::now());
        clock.frozen = None;
    }

    /// Restart the session clock without touching the counters.
    pub fn restart_clock(&self) {
        let mut clock = lock(&self.clock);
        clock.started = Some(Instant::now());
        clock.started_at = Some(Utc::now());
        clock.frozen = None;
    }

    /// Stop the clock at its current reading.
    pub fn freeze_clock(&self) {
        let mut clock = lock(&self.clock);
        if clock.frozen.is_none() {
            clock.frozen = Some(clock.elapsed());
        }
    }

    pub fn add_keyboard_press(&self) {
        self.keyboard_presses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_mouse_click(&self) {
        self.mouse_clicks.fetch_add(1, Ordering::Relaxed);
    }

    /// Add the absolute value of a signed wheel delta.
    pub fn add_scroll(&self, delta: i32) {
        self.scroll_magnitude
            .fetch_add(u64::from(delta.unsigned_abs()), Ordering::Relaxed);
    }

    /// Add a movement magnitude. Non-positive and non-finite values are ignored.
    pub fn add_distance(&self, distance: f64) {
        if !distance.is_finite() || distance <= 0.0 {
            return;
        }
        *lock(&self.mouse_distance) += distance;
    }

    pub fn elapsed(&self) -> Duration {
        lock(&self.clock).elapsed()
    }

    /// Read a point-in-time view of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mouse_distance = *lock(&self.mouse_distance);
        let (elapsed, started_at) = {
            let clock = lock(&self.clock);
            (clock.elapsed(), clock.started_at)
        };

        MetricsSnapshot {
            keyboard_presses: self.keyboard_presses.load(Ordering::Relaxed),
            mouse_clicks: self.mouse_clicks.load(Ordering::Relaxed),
            scroll_magnitude: self.scroll_magnitude.load(Ordering::Relaxed),
            mouse_distance,
            elapsed,
            started_at,
        }
    }
}

impl Default for AggregateState {
    fn default() -> Self {
        Self::new()
    }
}

/// Both mutexes guard plain values that are valid after any partial update.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Thread-safe shared aggregate.
pub type SharedAggregate = Arc<AggregateState>;

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub keyboard_presses: u64,
    pub mouse_clicks: u64,
    pub scroll_magnitude: u64,
    pub mouse_distance: f64,
    /// Time since the session started, frozen once it stops
    #[serde(rename = "elapsed_secs", with = "crate::config::duration_secs")]
    pub elapsed: Duration,
    /// Wall-clock start of the session, if one was ever started
    pub started_at: Option<DateTime<Utc>>,
}

impl MetricsSnapshot {
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed.as_secs()
    }
}
