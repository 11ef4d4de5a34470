//! Zoomreel Project Model
//!
//! Defines the core data contracts for a zoom recording:
//! - **Region:** the crop region and crop-relative points
//! - **Timeline:** the keyframe store (insert with coalescing, edit, delete)
//! - **Interpolate:** sparse keyframes to a continuous render state
//! - **Metadata:** the JSON file handed to persistence alongside the video
//!
//! Keyframe centers are logical (DPI-independent) units relative to the
//! crop region origin, so the render side needs no extra calibration.

pub mod interpolate;
pub mod metadata;
pub mod region;
pub mod timeline;

pub use interpolate::*;
pub use metadata::*;
pub use region::*;
pub use timeline::*;
