//! A monitoring session driven by scripted devices.
//!
//! This example shows how to:
//! 1. Describe a keyboard and a mouse with fixed event scripts
//! 2. Start a monitor over them
//! 3. Print the dashboard while workers drain the scripts
//! 4. Stop the session and print the final counts
//!
//! Run with: cargo run --example simulated_session
//!
//! No device access is needed, so this runs on any platform.

use std::time::Duration;

use knm_tracker::{
    monitor::{Monitor, MonitorSettings, StartOutcome, StopOutcome},
    report::{render_dashboard, render_final},
    source::{
        types::{BTN_LEFT, BTN_RIGHT, KEY_A, KEY_ENTER, KEY_SPACE, REL_WHEEL, REL_X, REL_Y},
        NormalizedEvent, ScriptedBackend, ScriptedDevice, ScriptedRead,
    },
};

fn main() {
    println!("KnM Tracker - Simulated Session");
    println!("===============================");
    println!();

    // Typing with pauses in between
    let mut typing: Vec<ScriptedRead> = Vec::new();
    for round in 0..5 {
        for code in [KEY_A, KEY_SPACE, KEY_ENTER] {
            typing.push(NormalizedEvent::key_down(code).into());
            typing.push(NormalizedEvent::key(code, 0).into());
        }
        typing.extend((0..=round).map(|_| ScriptedRead::Idle));
    }

    // Pointer motion, two clicks and some scrolling
    let mut pointing: Vec<ScriptedRead> = Vec::new();
    for _ in 0..20 {
        pointing.push(NormalizedEvent::relative(REL_X, 3).into());
        pointing.push(NormalizedEvent::relative(REL_Y, 4).into());
        pointing.push(NormalizedEvent::sync_report().into());
        pointing.push(ScriptedRead::Idle);
    }
    pointing.push(NormalizedEvent::key_down(BTN_LEFT).into());
    pointing.push(NormalizedEvent::key_down(BTN_RIGHT).into());
    pointing.push(NormalizedEvent::relative(REL_WHEEL, -3).into());
    pointing.push(NormalizedEvent::relative(REL_WHEEL, 2).into());

    let backend = ScriptedBackend::new()
        .with_device(ScriptedDevice::keyboard("/dev/input/event3").with_reads(typing))
        .with_device(ScriptedDevice::mouse("/dev/input/event5").with_reads(pointing))
        .with_device(ScriptedDevice::new("/dev/input/event0").named("Power Button"));

    let mut monitor = Monitor::new(backend, MonitorSettings::default());

    match monitor.start() {
        Ok(StartOutcome::Started { workers }) => println!("Monitoring {workers} device(s)"),
        Ok(other) => {
            println!("Nothing to monitor: {other:?}");
            return;
        }
        Err(e) => {
            eprintln!("Failed to start: {e}");
            return;
        }
    }
    for device in monitor.devices() {
        println!("  {} ({})", device.path.display(), device.roles.label());
    }
    println!();

    for _ in 0..3 {
        std::thread::sleep(Duration::from_millis(200));
        println!("{}", render_dashboard(&monitor.snapshot(), monitor.active_workers()));
        println!();
    }

    if let StopOutcome::Stopped(snapshot) = monitor.stop() {
        println!("{}", render_final(&snapshot));
    }
}
