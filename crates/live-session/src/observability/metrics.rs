//! Metrics definitions for the live session client.
//!
//! All metrics follow Prometheus naming conventions:
//! - `live_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! The embedding application installs the recorder; without one these calls
//! are no-ops.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record the outcome and duration of a session transition.
///
/// Metrics: `live_session_transitions_total`, `live_transition_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_transition(operation: &'static str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };
    counter!(
        "live_session_transitions_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    histogram!("live_transition_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

/// Record a dispatched transport event.
///
/// Metric: `live_transport_events_total`
/// Labels: `event`, `status`
pub fn record_transport_event(event: &'static str, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("live_transport_events_total", "event" => event, "status" => status).increment(1);
}

/// Record a device release.
///
/// Metric: `live_tracks_closed_total`
/// Labels: `source` (microphone, camera, screen)
pub fn record_track_closed(source: &'static str) {
    counter!("live_tracks_closed_total", "source" => source).increment(1);
}

/// Set the current remote participant count.
///
/// Metric: `live_remote_participants`
pub fn set_remote_participants(count: usize) {
    // usize to f64 conversion is safe for realistic room sizes
    #[allow(clippy::cast_precision_loss)]
    gauge!("live_remote_participants").set(count as f64);
}

/// Set the number of requests waiting in the session mailbox.
///
/// Metric: `live_mailbox_depth`
pub fn set_mailbox_depth(depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("live_mailbox_depth").set(depth as f64);
}
