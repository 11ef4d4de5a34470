//! Recording metadata file.
//!
//! Written next to the recorded video:
//!
//! ```json
//! { "startTime": 1700000000000, "duration": 4200,
//!   "events": [ {"time_ms": 0, "center": {"x": 400, "y": 300}, "scale": 1.0, "type": "zoom"} ],
//!   "crop": {"x": 100, "y": 50, "width": 800, "height": 600},
//!   "devicePixelRatio": 2.0 }
//! ```
//!
//! `crop` and `devicePixelRatio` are optional so that files carrying only
//! the first three keys still load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::region::CropRegion;
use crate::timeline::{DeletePolicy, Keyframe, Timeline};

/// Metadata persisted alongside a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMetadata {
    /// Wall-clock recording start, Unix milliseconds.
    pub start_time: i64,

    /// Recording duration in milliseconds.
    pub duration: u64,

    /// Keyframes, sorted by time.
    pub events: Vec<Keyframe>,

    /// Crop region the keyframe centers are relative to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropRegion>,

    /// Device pixel ratio of the captured display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_pixel_ratio: Option<f64>,
}

impl RecordingMetadata {
    /// Snapshot a timeline into metadata.
    pub fn from_timeline(
        timeline: &Timeline,
        start_time: i64,
        duration: u64,
        device_pixel_ratio: f64,
    ) -> Self {
        Self {
            start_time,
            duration,
            events: timeline.sorted(),
            crop: Some(*timeline.crop()),
            device_pixel_ratio: Some(device_pixel_ratio),
        }
    }

    /// Rebuild the timeline described by this file.
    ///
    /// Fails when the file has no crop region and none is supplied.
    pub fn to_timeline(
        &self,
        crop_override: Option<CropRegion>,
        policy: DeletePolicy,
    ) -> Result<Timeline, MetadataError> {
        let crop = crop_override.or(self.crop).ok_or(MetadataError::MissingCrop)?;
        if !(crop.width > 0.0 && crop.height > 0.0) {
            return Err(MetadataError::Invalid {
                message: format!("crop region {}x{} is empty", crop.width, crop.height),
            });
        }
        Ok(Timeline::from_keyframes(crop, self.events.iter().copied(), policy))
    }

    /// Device pixel ratio, defaulting to 1.0.
    pub fn dpr(&self) -> f64 {
        self.device_pixel_ratio
            .filter(|dpr| dpr.is_finite() && *dpr > 0.0)
            .unwrap_or(1.0)
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Load a metadata file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MetadataError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| MetadataError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content).map_err(|e| MetadataError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Errors that can occur when loading metadata.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Metadata has no crop region; supply one explicitly")]
    MissingCrop,

    #[error("Invalid metadata: {message}")]
    Invalid { message: String },
}
