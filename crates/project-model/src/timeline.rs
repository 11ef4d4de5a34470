//! Zoom keyframes and the keyframe store for one recording.
//!
//! The store keeps keyframes in insertion order. The time-sorted view is
//! recomputed on every read because edits may reorder keyframes.

use serde::{Deserialize, Serialize};

use crate::region::{CropRegion, LogicalPoint};

/// Lowest allowed zoom scale (no zoom).
pub const MIN_SCALE: f64 = 1.0;

/// Highest allowed zoom scale.
pub const MAX_SCALE: f64 = 5.0;

/// Inserts closer than this to the previous insert replace it.
pub const COALESCE_WINDOW_MS: u64 = 33;

/// Clamp a requested scale into `[MIN_SCALE, MAX_SCALE]`. NaN maps to 1.0.
pub fn clamp_scale(scale: f64) -> f64 {
    if scale.is_nan() {
        MIN_SCALE
    } else {
        scale.clamp(MIN_SCALE, MAX_SCALE)
    }
}

/// Keyframe type tag written to metadata files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyframeKind {
    #[default]
    Zoom,
}

/// A zoom-to-point keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Milliseconds since recording start.
    pub time_ms: u64,

    /// Focus point, crop-relative logical units.
    pub center: LogicalPoint,

    /// Zoom scale in `[1.0, 5.0]`.
    pub scale: f64,

    #[serde(rename = "type", default)]
    pub kind: KeyframeKind,
}

impl Keyframe {
    /// Create a keyframe, clamping the scale.
    pub fn new(time_ms: u64, center: LogicalPoint, scale: f64) -> Self {
        Self {
            time_ms,
            center,
            scale: clamp_scale(scale),
            kind: KeyframeKind::Zoom,
        }
    }

    /// Whether two keyframes describe the same view (time ignored).
    pub fn same_view(&self, other: &Keyframe) -> bool {
        self.scale == other.scale && self.center == other.center
    }
}

/// Partial update applied by [`Timeline::edit`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KeyframePatch {
    pub time_ms: Option<u64>,
    pub center: Option<LogicalPoint>,
    pub scale: Option<f64>,
}

/// Whether the anchor keyframe at time 0 may be deleted.
///
/// Chosen when the timeline is created and held for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// The keyframe at time 0 defines the initial state and cannot be
    /// deleted; its time stays pinned to 0.
    #[default]
    ProtectAnchor,
    /// Any keyframe may be deleted, including the one at time 0.
    AllowAny,
}

/// The keyframe store of a single recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    crop: CropRegion,
    keyframes: Vec<Keyframe>,
    policy: DeletePolicy,
    coalesce_window_ms: u64,
}

impl Timeline {
    /// Create a timeline seeded with the unzoomed anchor at time 0.
    pub fn new(crop: CropRegion) -> Self {
        Self::with_policy(crop, DeletePolicy::default())
    }

    /// Create a timeline with an explicit delete policy.
    pub fn with_policy(crop: CropRegion, policy: DeletePolicy) -> Self {
        Self {
            crop,
            keyframes: vec![Keyframe::new(0, crop.local_center(), MIN_SCALE)],
            policy,
            coalesce_window_ms: COALESCE_WINDOW_MS,
        }
    }

    /// Rebuild a timeline from stored keyframes (e.g. a metadata file).
    ///
    /// Scales are clamped. Under [`DeletePolicy::ProtectAnchor`] an anchor at
    /// time 0 is prepended when the input has none.
    pub fn from_keyframes(
        crop: CropRegion,
        keyframes: impl IntoIterator<Item = Keyframe>,
        policy: DeletePolicy,
    ) -> Self {
        let mut keyframes: Vec<Keyframe> = keyframes
            .into_iter()
            .map(|kf| Keyframe::new(kf.time_ms, kf.center, kf.scale))
            .collect();

        if policy == DeletePolicy::ProtectAnchor && !keyframes.iter().any(|kf| kf.time_ms == 0) {
            keyframes.insert(0, Keyframe::new(0, crop.local_center(), MIN_SCALE));
        }

        Self {
            crop,
            keyframes,
            policy,
            coalesce_window_ms: COALESCE_WINDOW_MS,
        }
    }

    /// Override the coalescing window (default 33 ms).
    pub fn with_coalesce_window(mut self, window_ms: u64) -> Self {
        self.coalesce_window_ms = window_ms;
        self
    }

    /// The crop region this timeline belongs to.
    pub fn crop(&self) -> &CropRegion {
        &self.crop
    }

    pub fn policy(&self) -> DeletePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Keyframes in insertion order.
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Keyframes ordered by ascending `time_ms`. Ties keep insertion order.
    pub fn sorted(&self) -> Vec<Keyframe> {
        let mut sorted = self.keyframes.clone();
        sorted.sort_by_key(|kf| kf.time_ms);
        sorted
    }

    /// Keyframe at `index` of the time-sorted view.
    pub fn get(&self, index: usize) -> Option<Keyframe> {
        self.storage_index(index).map(|i| self.keyframes[i])
    }

    /// Record a keyframe.
    ///
    /// If the most recent insert is within the coalescing window it is
    /// replaced in place, which bounds density under continuous input.
    /// Out-of-range scales are clamped, never rejected.
    pub fn insert(&mut self, time_ms: u64, center: LogicalPoint, scale: f64) {
        let keyframe = Keyframe::new(time_ms, center, scale);

        let last = self.keyframes.len().checked_sub(1);
        match last {
            Some(i) if self.keyframes[i].time_ms.abs_diff(time_ms) < self.coalesce_window_ms => {
                let pinned = self.is_protected(i);
                self.keyframes[i] = Keyframe {
                    time_ms: if pinned { 0 } else { time_ms },
                    ..keyframe
                };
            }
            _ => self.keyframes.push(keyframe),
        }
    }

    /// Overwrite fields of the keyframe at `index` of the time-sorted view.
    ///
    /// Returns `false` when the index is out of range. Re-sorting happens on
    /// the next read.
    pub fn edit(&mut self, index: usize, patch: KeyframePatch) -> bool {
        let Some(i) = self.storage_index(index) else {
            return false;
        };
        let is_anchor = self.is_protected(i);
        let keyframe = &mut self.keyframes[i];

        if let Some(time_ms) = patch.time_ms {
            if !is_anchor {
                keyframe.time_ms = time_ms;
            }
        }
        if let Some(center) = patch.center {
            keyframe.center = center;
        }
        if let Some(scale) = patch.scale {
            keyframe.scale = clamp_scale(scale);
        }
        true
    }

    /// Remove the keyframe at `index` of the time-sorted view.
    ///
    /// Returns `None` for out-of-range indices and for the anchor when the
    /// policy protects it.
    pub fn delete(&mut self, index: usize) -> Option<Keyframe> {
        let i = self.storage_index(index)?;
        if self.is_protected(i) {
            return None;
        }
        Some(self.keyframes.remove(i))
    }

    fn is_protected(&self, storage_index: usize) -> bool {
        self.policy == DeletePolicy::ProtectAnchor
            && self.keyframes[storage_index].time_ms == 0
            && self
                .keyframes
                .iter()
                .position(|kf| kf.time_ms == 0)
                .is_some_and(|first| first == storage_index)
    }

    /// Map a sorted-view index to an index into insertion-ordered storage.
    fn storage_index(&self, sorted_index: usize) -> Option<usize> {
        let mut order: Vec<usize> = (0..self.keyframes.len()).collect();
        order.sort_by_key(|&i| self.keyframes[i].time_ms);
        order.get(sorted_index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn crop() -> CropRegion {
        CropRegion::new(100.0, 50.0, 800.0, 600.0)
    }

    #[test]
    fn test_new_timeline_has_anchor() {
        let timeline = Timeline::new(crop());
        assert_eq!(timeline.len(), 1);
        let anchor = timeline.get(0).unwrap();
        assert_eq!(anchor.time_ms, 0);
        assert_eq!(anchor.scale, 1.0);
        assert_eq!(anchor.center, LogicalPoint::new(400.0, 300.0));
    }

    #[test]
    fn test_inserts_within_window_coalesce() {
        let mut timeline = Timeline::new(crop());
        timeline.insert(100, LogicalPoint::new(10.0, 10.0), 1.2);
        timeline.insert(120, LogicalPoint::new(20.0, 20.0), 1.4);

        assert_eq!(timeline.len(), 2);
        let last = timeline.get(1).unwrap();
        assert_eq!(last.time_ms, 120);
        assert_eq!(last.scale, 1.4);
        assert_eq!(last.center, LogicalPoint::new(20.0, 20.0));
    }

    #[test]
    fn test_inserts_at_window_boundary_append() {
        let mut timeline = Timeline::new(crop());
        timeline.insert(100, LogicalPoint::new(10.0, 10.0), 1.2);
        timeline.insert(133, LogicalPoint::new(20.0, 20.0), 1.4);
        assert_eq!(timeline.len(), 3);
    }

    #[test]
    fn test_coalescing_onto_anchor_keeps_time_zero() {
        let mut timeline = Timeline::new(crop());
        timeline.insert(10, LogicalPoint::new(5.0, 6.0), 2.0);

        assert_eq!(timeline.len(), 1);
        let anchor = timeline.get(0).unwrap();
        assert_eq!(anchor.time_ms, 0);
        assert_eq!(anchor.scale, 2.0);
        assert_eq!(anchor.center, LogicalPoint::new(5.0, 6.0));
    }

    #[test]
    fn test_coalescing_onto_anchor_moves_it_when_unprotected() {
        let mut timeline = Timeline::with_policy(crop(), DeletePolicy::AllowAny);
        timeline.insert(10, LogicalPoint::new(5.0, 6.0), 2.0);
        assert_eq!(timeline.get(0).unwrap().time_ms, 10);
    }

    #[test]
    fn test_insert_clamps_scale() {
        let mut timeline = Timeline::new(crop());
        timeline.insert(500, LogicalPoint::default(), 9.0);
        timeline.insert(1000, LogicalPoint::default(), 0.1);
        timeline.insert(1500, LogicalPoint::default(), f64::NAN);
        let scales: Vec<f64> = timeline.sorted().iter().map(|kf| kf.scale).collect();
        assert_eq!(scales, vec![1.0, 5.0, 1.0, 1.0]);
    }

    #[test]
    fn test_sorted_is_recomputed_after_edit() {
        let mut timeline = Timeline::new(crop());
        timeline.insert(1000, LogicalPoint::default(), 2.0);
        timeline.insert(2000, LogicalPoint::default(), 3.0);

        assert!(timeline.edit(
            2,
            KeyframePatch {
                time_ms: Some(500),
                ..Default::default()
            }
        ));

        let times: Vec<u64> = timeline.sorted().iter().map(|kf| kf.time_ms).collect();
        assert_eq!(times, vec![0, 500, 1000]);
        assert_eq!(timeline.get(1).unwrap().scale, 3.0);
        // Insertion order is untouched.
        assert_eq!(timeline.keyframes()[2].time_ms, 500);
    }

    #[test]
    fn test_edit_clamps_scale_and_rejects_bad_index() {
        let mut timeline = Timeline::new(crop());
        timeline.insert(1000, LogicalPoint::default(), 2.0);
        assert!(timeline.edit(
            1,
            KeyframePatch {
                scale: Some(7.5),
                center: Some(LogicalPoint::new(1.0, 2.0)),
                ..Default::default()
            }
        ));
        let kf = timeline.get(1).unwrap();
        assert_eq!(kf.scale, 5.0);
        assert_eq!(kf.center, LogicalPoint::new(1.0, 2.0));

        assert!(!timeline.edit(5, KeyframePatch::default()));
    }

    #[test]
    fn test_protected_anchor_time_is_pinned() {
        let mut timeline = Timeline::new(crop());
        timeline.edit(
            0,
            KeyframePatch {
                time_ms: Some(900),
                scale: Some(1.5),
                ..Default::default()
            },
        );
        let anchor = timeline.get(0).unwrap();
        assert_eq!(anchor.time_ms, 0);
        assert_eq!(anchor.scale, 1.5);
    }

    #[test]
    fn test_delete_protects_anchor() {
        let mut timeline = Timeline::new(crop());
        timeline.insert(1000, LogicalPoint::default(), 2.0);

        assert!(timeline.delete(0).is_none());
        assert_eq!(timeline.len(), 2);

        let removed = timeline.delete(1).unwrap();
        assert_eq!(removed.time_ms, 1000);
        assert_eq!(timeline.len(), 1);
        assert!(timeline.delete(3).is_none());
    }

    #[test]
    fn test_delete_allow_any_can_empty_timeline() {
        let mut timeline = Timeline::with_policy(crop(), DeletePolicy::AllowAny);
        assert!(timeline.delete(0).is_some());
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_second_keyframe_at_zero_is_deletable() {
        let mut timeline = Timeline::new(crop());
        timeline.insert(1000, LogicalPoint::default(), 2.0);
        timeline.edit(
            1,
            KeyframePatch {
                time_ms: Some(0),
                ..Default::default()
            },
        );
        // Stable sort keeps the original anchor first.
        assert!(timeline.delete(0).is_none());
        assert_eq!(timeline.delete(1).unwrap().scale, 2.0);
    }

    #[test]
    fn test_coalescing_onto_keyframe_moved_to_zero_takes_new_time() {
        let mut timeline = Timeline::new(crop());
        timeline.insert(1000, LogicalPoint::default(), 2.0);
        timeline.edit(
            1,
            KeyframePatch {
                time_ms: Some(0),
                ..Default::default()
            },
        );
        timeline.insert(10, LogicalPoint::new(5.0, 6.0), 1.5);

        assert_eq!(timeline.len(), 2);
        let anchor = timeline.get(0).unwrap();
        assert_eq!((anchor.time_ms, anchor.scale), (0, 1.0));
        let moved = timeline.get(1).unwrap();
        assert_eq!(moved.time_ms, 10);
        assert_eq!(moved.scale, 1.5);
        assert_eq!(moved.center, LogicalPoint::new(5.0, 6.0));
    }

    #[test]
    fn test_from_keyframes_restores_anchor() {
        let timeline = Timeline::from_keyframes(
            crop(),
            vec![Keyframe::new(500, LogicalPoint::new(1.0, 1.0), 8.0)],
            DeletePolicy::ProtectAnchor,
        );
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.get(0).unwrap().time_ms, 0);
        assert_eq!(timeline.get(1).unwrap().scale, 5.0);

        let unprotected = Timeline::from_keyframes(crop(), vec![], DeletePolicy::AllowAny);
        assert!(unprotected.is_empty());
    }

    #[test]
    fn test_keyframe_json_layout() {
        let kf = Keyframe::new(1500, LogicalPoint::new(12.5, 40.0), 2.0);
        let json = serde_json::to_value(kf).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "time_ms": 1500,
                "center": {"x": 12.5, "y": 40.0},
                "scale": 2.0,
                "type": "zoom"
            })
        );

        // Anchors written without a type tag still parse.
        let parsed: Keyframe =
            serde_json::from_str(r#"{"time_ms":0,"center":{"x":1,"y":2},"scale":1.0}"#).unwrap();
        assert_eq!(parsed.kind, KeyframeKind::Zoom);
    }

    proptest! {
        #[test]
        fn prop_scale_never_leaves_range(scales in proptest::collection::vec(-100.0f64..100.0, 1..40)) {
            let mut timeline = Timeline::new(crop());
            for (i, scale) in scales.iter().enumerate() {
                timeline.insert(i as u64 * 17, LogicalPoint::default(), *scale);
            }
            for kf in timeline.keyframes() {
                prop_assert!(kf.scale >= MIN_SCALE && kf.scale <= MAX_SCALE);
            }
        }

        #[test]
        fn prop_coalesced_timeline_has_gaps_of_at_least_window(
            gaps in proptest::collection::vec(0u64..80, 1..60)
        ) {
            let mut timeline = Timeline::new(crop());
            let mut t = 0u64;
            for gap in gaps {
                t += gap;
                timeline.insert(t, LogicalPoint::default(), 2.0);
            }
            let sorted = timeline.sorted();
            for pair in sorted.windows(2) {
                prop_assert!(pair[1].time_ms - pair[0].time_ms >= COALESCE_WINDOW_MS);
            }
        }
    }
}
