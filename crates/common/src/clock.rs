//! Clock and timing utilities for recording sessions.
//!
//! Keyframe times are milliseconds relative to the moment recording
//! started. This module provides:
//! - Capturing that epoch (monotonic + wall clock)
//! - Elapsed-time queries in milliseconds
//! - `MM:SS` formatting for the recording HUD
//!
//! The monotonic side uses the tokio clock so that paused-time tests see
//! deterministic elapsed values.

use tokio::time::Instant;

/// A recording clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment recording started).
#[derive(Debug, Clone)]
pub struct RecordingClock {
    /// The instant recording started.
    epoch: Instant,

    /// Wall-clock time at epoch, Unix milliseconds.
    epoch_wall_ms: i64,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Milliseconds elapsed since recording start.
    pub fn elapsed_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Wall-clock time at recording start (Unix ms).
    pub fn epoch_wall_ms(&self) -> i64 {
        self.epoch_wall_ms
    }
}

/// Format whole elapsed seconds as `MM:SS` (minutes are not wrapped).
pub fn format_mm_ss(elapsed_ms: u64) -> String {
    let secs = elapsed_ms / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
