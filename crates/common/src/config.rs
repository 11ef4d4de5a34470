//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where recordings and exports are written.
    pub output_dir: PathBuf,

    /// Live recording settings.
    pub recording: RecordingDefaults,

    /// Export settings.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Live capture parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Pointer/zoom sampler rate (Hz).
    pub sampler_hz: u32,

    /// Number of countdown steps before recording starts.
    pub countdown_steps: u32,

    /// Duration of each countdown step (ms).
    pub countdown_step_ms: u64,

    /// Both selection sides must exceed this many logical units.
    pub min_region_size: f64,

    /// Scale change per zoom-in / zoom-out signal.
    pub zoom_step: f64,

    /// Inserts closer than this to the previous keyframe replace it.
    pub coalesce_window_ms: u64,

    /// Whether the anchor keyframe at time 0 is protected from deletion.
    pub protect_anchor: bool,

    /// Capture source id; the first listed source is used when unset.
    pub source_id: Option<String>,

    /// Container/codec hint for the realtime encoder.
    pub mime_type: String,

    /// Realtime encoder frame rate.
    pub fps: u32,
}

/// Export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Output frame rate.
    pub fps: u32,

    /// Safety timeout for a single seek (ms).
    pub seek_timeout_ms: u64,

    /// Yield after each pushed frame (ms).
    pub step_yield_ms: u64,

    /// Video bitrate in bits per second.
    pub video_bitrate_bps: u64,

    /// Container/codec hint for the export encoder.
    pub mime_type: String,

    /// Output file name prefix; a Unix-ms timestamp and extension follow.
    pub file_prefix: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "zoomreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            recording: RecordingDefaults::default(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            sampler_hz: 30,
            countdown_steps: 3,
            countdown_step_ms: 1000,
            min_region_size: 20.0,
            zoom_step: 0.2,
            coalesce_window_ms: 33,
            protect_anchor: true,
            source_id: None,
            mime_type: "video/webm; codecs=vp9".to_string(),
            fps: 30,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            seek_timeout_ms: 800,
            step_yield_ms: 10,
            video_bitrate_bps: 10_000_000,
            mime_type: "video/webm; codecs=vp9".to_string(),
            file_prefix: "MMR_Export_".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match Self::from_json(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(content: &str) -> Result<Self, crate::ZoomreelError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the session and export driver cannot run with.
    pub fn validate(&self) -> Result<(), crate::ZoomreelError> {
        if self.recording.sampler_hz == 0 || self.recording.fps == 0 {
            return Err(crate::ZoomreelError::config(
                "recording rates must be non-zero",
            ));
        }
        if self.export.fps == 0 {
            return Err(crate::ZoomreelError::config("export fps must be non-zero"));
        }
        if self.recording.zoom_step.is_nan() || self.recording.zoom_step <= 0.0 {
            return Err(crate::ZoomreelError::config("zoom_step must be positive"));
        }
        Ok(())
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("zoomreel").join("config.json")
}

/// Default output directory.
fn default_output_dir() -> PathBuf {
    let base = std::env::var("XDG_VIDEOS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join("Videos")
        });
    base.join("zoomreel")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_capture_contract() {
        let config = AppConfig::default();
        assert_eq!(config.recording.sampler_hz, 30);
        assert_eq!(config.recording.coalesce_window_ms, 33);
        assert_eq!(config.export.seek_timeout_ms, 800);
        assert_eq!(config.export.fps, 30);
        assert!(config.recording.protect_anchor);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = AppConfig::from_json(r#"{"export":{"fps":60}}"#).unwrap();
        assert_eq!(config.export.fps, 60);
        assert_eq!(config.export.seek_timeout_ms, 800);
        assert_eq!(config.recording.countdown_steps, 3);
    }

    #[test]
    fn test_zero_fps_is_rejected() {
        let err = AppConfig::from_json(r#"{"export":{"fps":0}}"#).unwrap_err();
        assert!(err.to_string().contains("export fps"));
    }
}
