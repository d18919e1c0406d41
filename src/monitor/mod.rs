//! The device monitoring engine.
//!
//! This module contains:
//! - Role classification from device capability bits
//! - The shared session counters
//! - The per-device polling worker
//! - The lifecycle controller that starts and stops sessions

pub mod aggregate;
pub mod classifier;
pub mod controller;
pub mod worker;

// Re-export commonly used types
pub use aggregate::{AggregateState, MetricsSnapshot, SharedAggregate};
pub use classifier::{classify, probe, probe_all, DeviceRoles, ProbedDevice};
pub use controller::{
    Monitor, MonitorError, MonitorSettings, SessionState, StartOutcome, StopOutcome, WorkerHandle,
};
pub use worker::{DeviceDescriptor, DistancePolicy, EventTally, StopSignal, WorkerSettings};
