//! Error types shared across Zoomreel crates.

use std::path::PathBuf;

/// Top-level error type for Zoomreel operations.
///
/// Only the capture, encode and persistence boundaries produce errors.
/// The keyframe store, the interpolator and the viewport transform clamp or
/// default their inputs instead.
#[derive(Debug, thiserror::Error)]
pub enum ZoomreelError {
    /// Selection below the minimum size. Recoverable: re-enter selection.
    #[error("Invalid region {width}x{height}: both sides must exceed {min}")]
    InvalidRegion { width: f64, height: f64, min: f64 },

    /// The capture stream could not be opened.
    #[error("Capture unavailable: {message}")]
    CaptureUnavailable { message: String },

    /// A seek did not complete before the safety timeout.
    #[error("Seek to {time_ms:.2}ms did not complete within {timeout_ms}ms")]
    SeekTimeout { time_ms: f64, timeout_ms: u64 },

    /// The encoder rejected start, a frame, or stop.
    #[error("Encode failure: {message}")]
    EncodeFailure { message: String },

    /// Writing output failed; in-memory data is retained for retry.
    #[error("Persistence failure at {path}: {message}")]
    PersistenceFailure { path: PathBuf, message: String },

    /// An operation was requested in a state that does not allow it.
    #[error("Invalid state: cannot {action} while {state}")]
    InvalidState { state: String, action: String },

    /// The export was cancelled and its partial output discarded.
    #[error("Export aborted at {time_ms:.2}ms")]
    ExportAborted { time_ms: f64 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ZoomreelError.
pub type ZoomreelResult<T> = Result<T, ZoomreelError>;

impl ZoomreelError {
    pub fn capture_unavailable(msg: impl Into<String>) -> Self {
        Self::CaptureUnavailable {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::EncodeFailure {
            message: msg.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::PersistenceFailure {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn invalid_state(state: impl std::fmt::Debug, action: impl Into<String>) -> Self {
        Self::InvalidState {
            state: format!("{state:?}"),
            action: action.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
