//! Zoomreel Render Engine
//!
//! Offline export pipeline that replays a recording through its zoom
//! keyframes and re-encodes the result.
//!
//! # Pipeline Architecture
//!
//! ```text
//! recording.webm ──► seek(i / fps) ──┐
//!                                    ├── interpolate ──► project ──► blit
//! metadata.json ──► Timeline ────────┘                                │
//!                                                                     ▼
//!                                                        push frame (encoder)
//!                                                                     │
//!                                                                     ▼
//!                                                          MMR_Export_<ms>.webm
//! ```

pub mod compositor;
pub mod export;
pub mod ffmpeg;

pub use compositor::{blit, project, Compositor, PixelRect, Projection};
pub use export::*;
pub use ffmpeg::{command_exists, FfmpegEncoder, FfmpegSource};
