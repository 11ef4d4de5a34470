//! Input/trigger channel types.
//!
//! The transport (global shortcuts, IPC, a test harness) is the host's
//! business; the session only sees these values on channels.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A discrete action signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerAction {
    StartSelection,
    ToggleRecording,
    ZoomIn,
    ZoomOut,
}

impl TriggerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartSelection => "start-selection",
            Self::ToggleRecording => "toggle-recording",
            Self::ZoomIn => "zoom-in",
            Self::ZoomOut => "zoom-out",
        }
    }
}

impl FromStr for TriggerAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start-selection" => Ok(Self::StartSelection),
            "toggle-recording" => Ok(Self::ToggleRecording),
            "zoom-in" => Ok(Self::ZoomIn),
            "zoom-out" => Ok(Self::ZoomOut),
            other => Err(format!("unknown trigger action: {other}")),
        }
    }
}

/// Pointer position in screen space, logical units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

impl CursorPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
