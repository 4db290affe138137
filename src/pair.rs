//! Scoring of a single ground-truth/computed track pair.
//!
//! Stages: quickfilter, alignment, per-frame overlap, policy filter,
//! min-frames gate, commit. Scoring is pure: it reads the tracks and returns
//! the frames it would mark as matched instead of writing them.

use serde::Serialize;

use crate::align::align_frames;
use crate::config::MatchingParams;
use crate::overlap::{
    compute_radial_overlap, compute_spatial_overlap, AcceptancePolicy, FrameOverlapRecord,
    FramePair, Strength,
};
use crate::quickfilter::{query, QuickfilterEnvelope, QuickfilterVerdict};
use crate::track::{TimeRange, TimedFrame, Track};
use crate::utils::mean;
use crate::Result;

/// Accepted frame overlaps between one ground-truth and one computed track.
///
/// Never empty: construction fails without at least one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairScore {
    overlaps: Vec<FrameOverlapRecord>,
    time_range: TimeRange,
    accepted_frames: usize,
}

impl PairScore {
    pub fn from_overlaps(overlaps: Vec<FrameOverlapRecord>) -> Option<Self> {
        let time_range = overlaps
            .iter()
            .map(|r| TimeRange::new(r.truth_timestamp, r.computed_timestamp))
            .reduce(|a, b| a.union(&b))?;
        let accepted_frames = overlaps.len();
        Some(Self {
            overlaps,
            time_range,
            accepted_frames,
        })
    }

    pub fn overlaps(&self) -> &[FrameOverlapRecord] {
        &self.overlaps
    }

    /// Union of both sides' timestamps over the accepted frames.
    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn accepted_frames(&self) -> usize {
        self.accepted_frames
    }

    /// Mean centroid distance over records that have one.
    pub fn mean_centroid_distance(&self) -> Option<f64> {
        mean(self.overlaps.iter().filter_map(|r| r.centroid_distance))
    }

    pub fn truth_frames(&self) -> impl Iterator<Item = usize> + '_ {
        self.overlaps.iter().map(|r| r.truth_frame)
    }

    pub fn computed_frames(&self) -> impl Iterator<Item = usize> + '_ {
        self.overlaps.iter().map(|r| r.computed_frame)
    }
}

/// A committed pair and the frames it marks as matched.
#[derive(Debug, Clone, PartialEq)]
pub struct PairOutcome {
    pub score: PairScore,
    pub matched_truth_frames: Vec<usize>,
    pub matched_computed_frames: Vec<usize>,
}

/// Everything about one track the scorer reuses across pairs.
#[derive(Debug, Clone)]
pub struct TrackContext<'a> {
    pub index: usize,
    pub track: &'a Track,
    /// Frames sorted by timestamp, computed once per track.
    pub timeline: Vec<TimedFrame>,
    pub envelope: Option<&'a QuickfilterEnvelope>,
}

impl<'a> TrackContext<'a> {
    pub fn new(index: usize, track: &'a Track, envelope: Option<&'a QuickfilterEnvelope>) -> Self {
        Self {
            index,
            track,
            timeline: track.sorted_timeline(),
            envelope,
        }
    }
}

/// Scores track pairs under one set of matching parameters.
#[derive(Debug, Clone)]
pub struct PairScorer<'a> {
    params: &'a MatchingParams,
    policy: AcceptancePolicy,
    use_radial: bool,
}

impl<'a> PairScorer<'a> {
    /// Validates the parameters once up front.
    pub fn new(params: &'a MatchingParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            policy: params.acceptance_policy(),
            use_radial: params.use_radial(),
        })
    }

    pub fn params(&self) -> &MatchingParams {
        self.params
    }

    /// Score one pair; `None` means the pair does not match.
    pub fn score(
        &self,
        truth: &TrackContext<'_>,
        computed: &TrackContext<'_>,
    ) -> Option<PairOutcome> {
        if let (Some(a), Some(b)) = (truth.envelope, computed.envelope) {
            if query(a, b, self.use_radial) == QuickfilterVerdict::Disjoint {
                return None;
            }
        }

        let aligned = align_frames(
            &truth.timeline,
            &computed.timeline,
            self.params.alignment_window_usecs,
        );
        if aligned.is_empty() {
            return None;
        }

        let mut survivors: Vec<(FrameOverlapRecord, Strength)> = Vec::new();
        for (ti, ci) in aligned {
            let pair = FramePair {
                truth_index: ti,
                truth: &truth.track.frames[ti],
                computed_index: ci,
                computed: &computed.track.frames[ci],
            };
            if let Some(record) = self.evaluate_frame(&pair) {
                let strength = self.policy.classify(&record);
                survivors.push((record, strength));
            }
        }

        let strong = survivors
            .iter()
            .filter(|(_, s)| *s == Strength::Strong)
            .count();
        let required = self
            .params
            .min_frames
            .required_frames(truth.track.in_aoi_frame_count());
        if strong < required {
            return None;
        }

        let committed: Vec<FrameOverlapRecord> = survivors
            .into_iter()
            .filter(|(_, s)| self.params.pass_all_nonzero_overlaps || *s == Strength::Strong)
            .map(|(r, _)| r)
            .collect();

        let score = PairScore::from_overlaps(committed)?;
        let matched_truth_frames = score.truth_frames().collect();
        let matched_computed_frames = score.computed_frames().collect();
        Some(PairOutcome {
            score,
            matched_truth_frames,
            matched_computed_frames,
        })
    }

    /// Overlap of one aligned pair after the frame state, window and AOI gates, if non-empty.
    fn evaluate_frame(&self, pair: &FramePair<'_>) -> Option<FrameOverlapRecord> {
        if !pair.truth.is_in_aoi() || !pair.computed.is_in_aoi() {
            return None;
        }
        if !self.params.frame_in_window(pair.truth) || !self.params.frame_in_window(pair.computed) {
            return None;
        }

        let record = if self.use_radial {
            compute_radial_overlap(pair, self.params)?
        } else {
            compute_spatial_overlap(pair, self.params)?
        };

        if self.params.aoi.is_some() && !self.params.aoi_accepts(record.in_aoi) {
            return None;
        }
        if record.is_empty(self.use_radial) {
            return None;
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MinFramesPolicy, PercentOverlap};
    use crate::quickfilter::QuickfilterEnvelope;
    use crate::track::{BoundingBox, Frame, MatchState};
    use approx::assert_relative_eq;

    const SECOND: u64 = 1_000_000;

    fn box_track(truth: bool, boxes: &[(u64, BoundingBox)]) -> Track {
        let frames = boxes
            .iter()
            .enumerate()
            .map(|(n, &(ts, b))| Frame::new(ts).with_frame_number(n as u32).with_bbox(b))
            .collect();
        if truth {
            Track::ground_truth(Some(1), frames)
        } else {
            Track::computed(Some(2), 0.5, frames)
        }
    }

    fn score_pair(params: &MatchingParams, truth: &Track, computed: &Track) -> Option<PairOutcome> {
        let scorer = PairScorer::new(params).unwrap();
        let te = QuickfilterEnvelope::from_track(truth, params).unwrap();
        let ce = QuickfilterEnvelope::from_track(computed, params).unwrap();
        scorer.score(
            &TrackContext::new(0, truth, Some(&te)),
            &TrackContext::new(0, computed, Some(&ce)),
        )
    }

    #[test]
    fn test_single_frame_strong_match() {
        let truth = box_track(true, &[(0, BoundingBox::new(0.0, 0.0, 10.0, 10.0))]);
        let computed = box_track(false, &[(0, BoundingBox::new(5.0, 5.0, 15.0, 15.0))]);

        let outcome = score_pair(&MatchingParams::default(), &truth, &computed).unwrap();
        assert_eq!(outcome.score.accepted_frames(), 1);
        assert_relative_eq!(outcome.score.overlaps()[0].overlap_area, 25.0);
        assert_eq!(outcome.matched_truth_frames, vec![0]);
        assert_eq!(outcome.score.time_range(), TimeRange::instant(0));
    }

    #[test]
    fn test_iou_threshold_rejects_pair() {
        let truth = box_track(true, &[(0, BoundingBox::new(0.0, 0.0, 10.0, 10.0))]);
        let computed = box_track(false, &[(0, BoundingBox::new(5.0, 5.0, 15.0, 15.0))]);
        let params = MatchingParams {
            iou_threshold: Some(0.5),
            ..Default::default()
        };
        assert!(score_pair(&params, &truth, &computed).is_none());
    }

    #[test]
    fn test_min_frames_gate() {
        let b = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let far = BoundingBox::new(100.0, 0.0, 110.0, 10.0);
        let truth = box_track(true, &[(0, b), (SECOND, b), (2 * SECOND, b), (3 * SECOND, b)]);
        let computed = box_track(
            false,
            &[(0, b), (SECOND, b), (2 * SECOND, far), (3 * SECOND, far)],
        );

        let mut params = MatchingParams {
            min_frames: MinFramesPolicy::Absolute(3),
            ..Default::default()
        };
        assert!(score_pair(&params, &truth, &computed).is_none());

        params.min_frames = MinFramesPolicy::Absolute(2);
        let outcome = score_pair(&params, &truth, &computed).unwrap();
        assert_eq!(outcome.score.accepted_frames(), 2);

        params.min_frames = MinFramesPolicy::Percentage(50.0);
        assert!(score_pair(&params, &truth, &computed).is_some());

        params.min_frames = MinFramesPolicy::Percentage(75.0);
        assert!(score_pair(&params, &truth, &computed).is_none());
    }

    #[test]
    fn test_pass_all_nonzero_overlaps_keeps_weak_frames() {
        let t = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let strong = BoundingBox::new(1.0, 1.0, 11.0, 11.0);
        let weak = BoundingBox::new(8.0, 8.0, 18.0, 18.0);
        let truth = box_track(true, &[(0, t), (SECOND, t)]);
        let computed = box_track(false, &[(0, strong), (SECOND, weak)]);

        let mut params = MatchingParams {
            min_pcent_overlap: Some(PercentOverlap {
                truth: Some(50.0),
                computed: None,
            }),
            ..Default::default()
        };
        let outcome = score_pair(&params, &truth, &computed).unwrap();
        assert_eq!(outcome.score.accepted_frames(), 1);

        params.pass_all_nonzero_overlaps = true;
        let outcome = score_pair(&params, &truth, &computed).unwrap();
        assert_eq!(outcome.score.accepted_frames(), 2);
        assert_eq!(outcome.score.time_range(), TimeRange::new(0, SECOND));
    }

    #[test]
    fn test_zero_min_frames_never_commits_empty_score() {
        let truth = box_track(true, &[(0, BoundingBox::new(0.0, 0.0, 10.0, 10.0))]);
        let computed = box_track(false, &[(0, BoundingBox::new(5.0, 5.0, 15.0, 15.0))]);
        let params = MatchingParams {
            iou_threshold: Some(0.9),
            min_frames: MinFramesPolicy::Absolute(0),
            ..Default::default()
        };
        assert!(score_pair(&params, &truth, &computed).is_none());
    }

    #[test]
    fn test_disjoint_envelopes_short_circuit() {
        let truth = box_track(true, &[(0, BoundingBox::new(0.0, 0.0, 10.0, 10.0))]);
        let computed = box_track(false, &[(0, BoundingBox::new(50.0, 50.0, 60.0, 60.0))]);
        assert!(score_pair(&MatchingParams::default(), &truth, &computed).is_none());
    }

    #[test]
    fn test_time_misaligned_tracks_do_not_match() {
        let b = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let truth = box_track(true, &[(0, b)]);
        let computed = box_track(false, &[(10 * SECOND, b)]);
        assert!(score_pair(&MatchingParams::default(), &truth, &computed).is_none());
    }

    #[test]
    fn test_exclusive_aoi_gate() {
        use crate::geodetic::WgsUtmConverter;
        let b = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let truth = box_track(true, &[(0, b)]);
        let computed = box_track(false, &[(0, b)]);

        let converter = WgsUtmConverter::default();
        let inclusive = MatchingParams::default()
            .with_aoi("20x20+0+0", true, &converter)
            .unwrap();
        assert!(score_pair(&inclusive, &truth, &computed).is_some());

        let exclusive = MatchingParams::default()
            .with_aoi("20x20+0+0", false, &converter)
            .unwrap();
        assert!(score_pair(&exclusive, &truth, &computed).is_none());
    }

    #[test]
    fn test_frames_outside_aoi_never_pair() {
        let b = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let mut truth = box_track(true, &[(0, b)]);
        let computed = box_track(false, &[(0, b)]);
        let params = MatchingParams::default();
        assert!(score_pair(&params, &truth, &computed).is_some());

        truth.frames[0].match_state = MatchState::OutsideAoi;
        assert!(score_pair(&params, &truth, &computed).is_none());

        let mut computed = computed;
        truth.frames[0].match_state = MatchState::InAoiUnmatched;
        computed.frames[0].match_state = MatchState::OutsideAoi;
        assert!(score_pair(&params, &truth, &computed).is_none());
    }

    #[test]
    fn test_mean_centroid_distance() {
        let truth = box_track(
            true,
            &[
                (0, BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
                (SECOND, BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
            ],
        );
        let computed = box_track(
            false,
            &[
                (0, BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
                (SECOND, BoundingBox::new(4.0, 0.0, 14.0, 10.0)),
            ],
        );
        let outcome = score_pair(&MatchingParams::default(), &truth, &computed).unwrap();
        assert_relative_eq!(outcome.score.mean_centroid_distance().unwrap(), 2.0);
    }
}
