//! Clip segments and per-asset grouping.
//!
//! Segments arrive from clients as `{videoId, startTimeSeconds,
//! endTimeSeconds}` and are validated lazily: structural checks happen at
//! submission, duration-dependent checks happen in the worker once the
//! source asset has been probed.

use serde::{Deserialize, Serialize};

/// A requested cut from one source asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Source asset identifier.
    #[serde(rename = "videoId")]
    pub asset_id: String,

    /// Start offset in seconds.
    #[serde(rename = "startTimeSeconds")]
    pub start_seconds: f64,

    /// End offset in seconds (exclusive).
    #[serde(rename = "endTimeSeconds")]
    pub end_seconds: f64,
}

impl Segment {
    pub fn new(asset_id: impl Into<String>, start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            asset_id: asset_id.into(),
            start_seconds,
            end_seconds,
        }
    }

    /// Requested length in seconds. May be negative for malformed input.
    pub fn requested_duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }

    /// Structural validity, independent of the asset's real duration.
    pub fn is_well_formed(&self) -> bool {
        self.start_seconds.is_finite()
            && self.end_seconds.is_finite()
            && self.start_seconds >= 0.0
            && self.end_seconds > self.start_seconds
            && !self.asset_id.is_empty()
    }
}

/// Why a segment was dropped during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentDrop {
    /// end <= start, negative start, or non-finite bounds.
    Malformed,
    /// Start offset at or past the end of the asset.
    StartBeyondDuration,
}

/// Result of validating a segment list against a probed asset duration.
#[derive(Debug, Clone, Default)]
pub struct ValidatedSegments {
    /// Usable segments, submission order preserved, ends clamped.
    pub kept: Vec<Segment>,
    /// Dropped segments with the reason, for logging.
    pub dropped: Vec<(Segment, SegmentDrop)>,
}

impl ValidatedSegments {
    /// Total expected output length of the kept segments.
    pub fn expected_duration(&self) -> f64 {
        self.kept.iter().map(Segment::requested_duration).sum()
    }
}

/// Validate and clamp segments against the asset's probed duration.
///
/// Rules:
/// - malformed segments (end <= start, start < 0, NaN/inf) are dropped
/// - segments starting at or past `asset_duration` are dropped
/// - segments ending past `asset_duration` are clamped to it
///
/// Submission order is preserved. Dropping is never fatal here; the caller
/// decides what an empty `kept` list means.
pub fn validate_segments(segments: &[Segment], asset_duration: f64) -> ValidatedSegments {
    let mut out = ValidatedSegments::default();

    for seg in segments {
        if !seg.is_well_formed() {
            tracing::warn!(
                asset_id = %seg.asset_id,
                start = seg.start_seconds,
                end = seg.end_seconds,
                "dropping malformed segment"
            );
            out.dropped.push((seg.clone(), SegmentDrop::Malformed));
            continue;
        }

        if seg.start_seconds >= asset_duration {
            tracing::warn!(
                asset_id = %seg.asset_id,
                start = seg.start_seconds,
                asset_duration,
                "dropping segment starting beyond asset duration"
            );
            out.dropped
                .push((seg.clone(), SegmentDrop::StartBeyondDuration));
            continue;
        }

        let mut kept = seg.clone();
        if kept.end_seconds > asset_duration {
            tracing::debug!(
                asset_id = %kept.asset_id,
                end = kept.end_seconds,
                asset_duration,
                "clamping segment end to asset duration"
            );
            kept.end_seconds = asset_duration;
        }
        out.kept.push(kept);
    }

    out
}

/// Segments for one asset, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSegments {
    pub asset_id: String,
    pub segments: Vec<Segment>,
}

/// Group segments by asset.
///
/// Within one asset the submission order is preserved; the groups themselves
/// come back in first-appearance order, which is also the order assets are
/// stitched into the final output.
pub fn group_by_asset(segments: &[Segment]) -> Vec<AssetSegments> {
    let mut groups: Vec<AssetSegments> = Vec::new();

    for seg in segments {
        match groups.iter_mut().find(|g| g.asset_id == seg.asset_id) {
            Some(group) => group.segments.push(seg.clone()),
            None => groups.push(AssetSegments {
                asset_id: seg.asset_id.clone(),
                segments: vec![seg.clone()],
            }),
        }
    }

    groups
}

/// Deduplicate asset IDs preserving first appearance.
pub fn unique_asset_ids(segments: &[Segment]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for seg in segments {
        if !ids.iter().any(|id| id == &seg.asset_id) {
            ids.push(seg.asset_id.clone());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(id: &str, start: f64, end: f64) -> Segment {
        Segment::new(id, start, end)
    }

    #[test]
    fn test_wire_format() {
        let s: Segment =
            serde_json::from_str(r#"{"videoId":"abc","startTimeSeconds":5,"endTimeSeconds":10}"#)
                .unwrap();
        assert_eq!(s.asset_id, "abc");
        assert_eq!(s.start_seconds, 5.0);
        assert_eq!(s.end_seconds, 10.0);

        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("videoId").is_some());
        assert!(json.get("startTimeSeconds").is_some());
    }

    #[test]
    fn test_drops_inverted_and_negative() {
        let result = validate_segments(
            &[seg("a", 10.0, 5.0), seg("a", -1.0, 5.0), seg("a", 3.0, 3.0)],
            100.0,
        );
        assert!(result.kept.is_empty());
        assert_eq!(result.dropped.len(), 3);
        assert!(result
            .dropped
            .iter()
            .all(|(_, why)| *why == SegmentDrop::Malformed));
    }

    #[test]
    fn test_clamps_end_beyond_duration() {
        let result = validate_segments(&[seg("a", 50.0, 500.0)], 120.0);
        assert_eq!(result.kept.len(), 1);
        assert_eq!(result.kept[0].end_seconds, 120.0);
        assert!(result.dropped.is_empty());
    }

    #[test]
    fn test_drops_start_beyond_duration() {
        let result = validate_segments(&[seg("a", 120.0, 130.0), seg("a", 150.0, 160.0)], 120.0);
        assert!(result.kept.is_empty());
        assert_eq!(result.dropped.len(), 2);
        assert!(result
            .dropped
            .iter()
            .all(|(_, why)| *why == SegmentDrop::StartBeyondDuration));
    }

    #[test]
    fn test_preserves_submission_order_not_chronological() {
        let result = validate_segments(&[seg("a", 60.0, 70.0), seg("a", 10.0, 20.0)], 100.0);
        assert_eq!(result.kept[0].start_seconds, 60.0);
        assert_eq!(result.kept[1].start_seconds, 10.0);
    }

    #[test]
    fn test_expected_duration_uses_clamped_ends() {
        let result = validate_segments(&[seg("a", 0.0, 10.0), seg("a", 115.0, 130.0)], 120.0);
        assert!((result.expected_duration() - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_grouping_first_appearance_order() {
        let groups = group_by_asset(&[
            seg("b", 0.0, 1.0),
            seg("a", 0.0, 1.0),
            seg("b", 2.0, 3.0),
            seg("c", 0.0, 1.0),
        ]);
        let ids: Vec<_> = groups.iter().map(|g| g.asset_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(groups[0].segments.len(), 2);
        assert_eq!(groups[0].segments[1].start_seconds, 2.0);
    }

    #[test]
    fn test_unique_asset_ids() {
        let ids = unique_asset_ids(&[
            seg("x", 0.0, 1.0),
            seg("y", 0.0, 1.0),
            seg("x", 1.0, 2.0),
        ]);
        assert_eq!(ids, vec!["x".to_string(), "y".to_string()]);
    }
}
