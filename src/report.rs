//! Text rendering of session metrics for the console.

use crate::monitor::MetricsSnapshot;
use std::time::Duration;

/// Render a duration as `HH : MM : SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!(
        "{:02} : {:02} : {:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// The periodic dashboard block.
pub fn render_dashboard(snapshot: &MetricsSnapshot, active_devices: usize) -> String {
    format!(
        "=== Dashboard ===\n\
         Keyboard presses: {}\n\
         Mouse clicks:     {}\n\
         Scroll magnitude: {}\n\
         Mouse distance:   {:.0}\n\
         Elapsed time:     {}\n\
         Active devices:   {}\n\
         =================",
        snapshot.keyboard_presses,
        snapshot.mouse_clicks,
        snapshot.scroll_magnitude,
        snapshot.mouse_distance,
        format_elapsed(snapshot.elapsed),
        active_devices
    )
}

/// The block printed once a session has stopped.
pub fn render_final(snapshot: &MetricsSnapshot) -> String {
    let started = snapshot
        .started_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string());

    format!(
        "=== Final counts ===\n\
         Keyboard presses: {}\n\
         Mouse clicks:     {}\n\
         Scroll magnitude: {}\n\
         Mouse distance:   {:.0}\n\
         Elapsed time:     {} seconds\n\
         Session started:  {}",
        snapshot.keyboard_presses,
        snapshot.mouse_clicks,
        snapshot.scroll_magnitude,
        snapshot.mouse_distance,
        snapshot.elapsed_secs(),
        started
    )
}
