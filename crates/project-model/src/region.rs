//! Crop region and point types.
//!
//! All values are logical (DPI-independent) units. The crop region is in
//! screen space; keyframe centers are relative to the crop region origin.

use serde::{Deserialize, Serialize};

/// Selections must exceed this size on both sides unless configured otherwise.
pub const MIN_REGION_SIZE: f64 = 20.0;

/// The rectangle of the screen being recorded.
///
/// Fixed once at selection time and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    /// Left edge (logical units).
    pub x: f64,
    /// Top edge (logical units).
    pub y: f64,
    /// Width (logical units).
    pub width: f64,
    /// Height (logical units).
    pub height: f64,
}

impl CropRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalize a drag gesture into a positive-size rectangle.
    ///
    /// The drag may run in any direction; the origin is the min corner.
    pub fn from_drag(start: LogicalPoint, end: LogicalPoint) -> Self {
        Self {
            x: start.x.min(end.x),
            y: start.y.min(end.y),
            width: (end.x - start.x).abs(),
            height: (end.y - start.y).abs(),
        }
    }

    /// Whether both sides strictly exceed `min`.
    pub fn exceeds(&self, min: f64) -> bool {
        self.width > min && self.height > min
    }

    /// Midpoint in crop-relative coordinates.
    pub fn local_center(&self) -> LogicalPoint {
        LogicalPoint::new(self.width / 2.0, self.height / 2.0)
    }

    /// Width over height. Returns 1.0 for degenerate regions.
    pub fn aspect(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// Convert a screen-space point to crop-relative coordinates.
    pub fn to_local(&self, screen: LogicalPoint) -> LogicalPoint {
        LogicalPoint::new(screen.x - self.x, screen.y - self.y)
    }

    /// Convert a crop-relative point back to screen space.
    pub fn to_screen(&self, local: LogicalPoint) -> LogicalPoint {
        LogicalPoint::new(local.x + self.x, local.y + self.y)
    }

    /// Size in physical pixels at `dpr`, rounded down to even numbers.
    ///
    /// yuv420 encoders need even dimensions; never returns less than 2.
    pub fn even_pixel_size(&self, dpr: f64) -> (u32, u32) {
        let even = |v: f64| -> u32 {
            let px = (v * dpr / 2.0).floor().max(1.0) as u32;
            px * 2
        };
        (even(self.width), even(self.height))
    }
}

/// A 2D point in logical units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LogicalPoint {
    pub x: f64,
    pub y: f64,
}

impl LogicalPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation between two points.
    pub fn lerp(a: &LogicalPoint, b: &LogicalPoint, t: f64) -> LogicalPoint {
        LogicalPoint {
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
        }
    }
}
