//! Keyframe interpolation.
//!
//! Turns the sparse keyframes of a [`Timeline`] into the view for any
//! instant. Pure: called every preview tick and every export step without
//! carrying state between calls.

use serde::{Deserialize, Serialize};

use crate::region::{CropRegion, LogicalPoint};
use crate::timeline::{Keyframe, Timeline, MIN_SCALE};

/// The view at one instant: zoom scale plus crop-relative focus point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderState {
    pub scale: f64,
    pub center: LogicalPoint,
}

impl RenderState {
    /// Unzoomed view centered on the crop region.
    pub fn identity(crop: &CropRegion) -> Self {
        Self {
            scale: MIN_SCALE,
            center: crop.local_center(),
        }
    }
}

impl From<&Keyframe> for RenderState {
    fn from(kf: &Keyframe) -> Self {
        Self {
            scale: kf.scale,
            center: kf.center,
        }
    }
}

/// Compute the render state of `timeline` at `query_ms`.
///
/// - empty timeline: identity
/// - before the first keyframe: hold the first keyframe
/// - at or after the last keyframe: hold the last keyframe
/// - otherwise: linear blend of scale and each center axis between the
///   bracketing keyframes (exact value when both are identical)
pub fn interpolate(timeline: &Timeline, query_ms: f64) -> RenderState {
    interpolate_sorted(&timeline.sorted(), timeline.crop(), query_ms)
}

/// [`interpolate`] over keyframes already sorted by time.
pub fn interpolate_sorted(sorted: &[Keyframe], crop: &CropRegion, query_ms: f64) -> RenderState {
    let Some(first) = sorted.first() else {
        return RenderState::identity(crop);
    };

    let mut prev = first;
    let mut next = None;
    for kf in sorted {
        if kf.time_ms as f64 <= query_ms {
            prev = kf;
        } else {
            next = Some(kf);
            break;
        }
    }

    let Some(next) = next else {
        return RenderState::from(prev);
    };

    // Query before the first keyframe.
    if prev.time_ms as f64 > query_ms {
        return RenderState::from(prev);
    }

    if prev.same_view(next) {
        return RenderState::from(prev);
    }

    let span = (next.time_ms - prev.time_ms) as f64;
    let ratio = (query_ms - prev.time_ms as f64) / span;

    RenderState {
        scale: prev.scale + (next.scale - prev.scale) * ratio,
        center: LogicalPoint::lerp(&prev.center, &next.center, ratio),
    }
}
