//! Zoomreel platform core contracts.
//!
//! The keyframe engine never talks to hardware, codecs or the filesystem
//! directly. This crate holds the traits for those host-provided services
//! plus the small data types that cross them, so capture and render crates
//! stay decoupled from any concrete backend.

pub mod capture;
pub mod encoder;
pub mod input;
pub mod media;
pub mod persistence;

pub use capture::*;
pub use encoder::*;
pub use input::*;
pub use media::*;
pub use persistence::*;

/// A decoded or composited video frame (8-bit RGBA, row-major).
pub type Frame = image::RgbaImage;
