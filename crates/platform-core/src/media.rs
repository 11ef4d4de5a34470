//! Seekable recorded media used as export input.

use async_trait::async_trait;
use zoomreel_common::error::ZoomreelResult;

use crate::Frame;

/// A finished recording that can be positioned at an exact instant.
#[async_trait]
pub trait SeekableSource: Send {
    /// Total duration in milliseconds.
    fn duration_ms(&self) -> u64;

    /// Decoded frame size in physical pixels.
    fn frame_size(&self) -> (u32, u32);

    /// Seek to `time_secs` and resolve once the frame at that instant is
    /// available through [`SeekableSource::current_frame`].
    ///
    /// Callers may drop the returned future (e.g. on timeout); the source
    /// must then keep serving its previous frame.
    async fn seek(&mut self, time_secs: f64) -> ZoomreelResult<()>;

    /// The most recently decoded frame, if any.
    fn current_frame(&self) -> Option<&Frame>;
}
