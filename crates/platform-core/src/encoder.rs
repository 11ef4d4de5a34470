//! Opaque video encoder contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zoomreel_common::error::ZoomreelResult;

use crate::Frame;

/// Parameters declared to the encoder before the first frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Declared frame rate.
    pub fps: u32,
    /// Container/codec hint, e.g. `video/webm; codecs=vp9`.
    pub mime_type: String,
    /// Target video bitrate in bits per second.
    pub video_bitrate_bps: u64,
}

impl EncoderSettings {
    pub fn file_extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

/// Output file extension for a container/codec hint.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let mime = mime_type.trim().to_ascii_lowercase();
    if mime.starts_with("video/mp4") {
        "mp4"
    } else if mime.starts_with("image/gif") {
        "gif"
    } else {
        "webm"
    }
}

#[async_trait]
pub trait Encoder: Send {
    /// Prepare the encoder. Called once before any frame.
    async fn start(&mut self, settings: &EncoderSettings) -> ZoomreelResult<()>;

    /// Append one frame to the output.
    async fn push_frame(&mut self, frame: &Frame) -> ZoomreelResult<()>;

    /// Finish encoding and return the complete output.
    async fn stop(&mut self) -> ZoomreelResult<Vec<u8>>;

    /// Tear down without producing output. Must be safe to call in any state.
    async fn abort(&mut self);
}
