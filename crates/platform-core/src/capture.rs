//! Screen source enumeration and raw frame streams.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zoomreel_common::error::ZoomreelResult;

use crate::Frame;

/// A capturable screen or window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Host-specific source identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Encoded thumbnail image (PNG bytes); may be empty.
    #[serde(default)]
    pub thumbnail: Vec<u8>,
}

/// Resolution bounds requested when opening a stream (physical pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConstraints {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            min_width: 1920,
            max_width: 3840,
            min_height: 1080,
            max_height: 2160,
        }
    }
}

/// Host capture subsystem.
#[async_trait]
pub trait CaptureSource: Send {
    /// List capturable sources.
    async fn list_sources(&mut self) -> ZoomreelResult<Vec<SourceInfo>>;

    /// Open a raw frame stream for `source_id`.
    async fn open_stream(
        &mut self,
        source_id: &str,
        constraints: StreamConstraints,
    ) -> ZoomreelResult<Box<dyn FrameStream>>;
}

/// A live stream of raw captured frames.
#[async_trait]
pub trait FrameStream: Send {
    /// Wait for the next frame. `None` once the stream has ended.
    ///
    /// Need not be cancel-safe; a dropped call may lose its frame.
    async fn next_frame(&mut self) -> Option<Frame>;

    /// Release the underlying capture.
    fn close(&mut self) {}
}
