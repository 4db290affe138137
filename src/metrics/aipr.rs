//! Time-exclusive assignment of computed tracks to ground truth.
//!
//! For each ground-truth track its candidate computed tracks are ranked by
//! association value (mean centroid distance, lower is better), then by
//! longer overlap. A candidate is kept unless its time range overlaps one
//! already kept.

use std::cmp::Ordering;

use log::info;
use serde::Serialize;

use super::Associations;
use crate::matrix::AssociationMatrix;
use crate::track::{TimeRange, TrackSet};
use crate::utils::ratio;

/// One computed track competing for a ground-truth track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiprCandidate {
    pub computed: usize,
    /// Mean centroid distance; infinite when no record carries one
    pub value: f64,
    pub time_range: TimeRange,
    pub overlap_frames: usize,
}

impl AiprCandidate {
    fn rank(&self, other: &AiprCandidate) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then_with(|| other.time_range.duration().cmp(&self.time_range.duration()))
            .then_with(|| self.computed.cmp(&other.computed))
    }
}

/// Kept and dropped candidates of one ground-truth track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiprAssignment {
    pub truth: usize,
    pub label: u64,
    pub in_aoi_frames: usize,
    /// Kept candidates in ranking order
    pub kept: Vec<AiprCandidate>,
    /// Computed tracks that lost a time conflict
    pub dropped: Vec<usize>,
}

impl AiprAssignment {
    pub fn is_detected(&self) -> bool {
        !self.kept.is_empty()
    }

    pub fn identity_switches(&self) -> usize {
        self.kept.len().saturating_sub(1)
    }

    pub fn kept_overlap_frames(&self) -> usize {
        self.kept.iter().map(|c| c.overlap_frames).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AiprReport {
    pub assignments: Vec<AiprAssignment>,
    pub detected_truth_tracks: usize,
    pub identity_switches: usize,
    /// Mean kept count over detected truth tracks
    pub track_fragmentation: f64,
    /// Total kept count over all truth tracks
    pub normalized_track_fragmentation: f64,
    /// Kept overlap frames over in-AOI frames of detected truth tracks
    pub track_completeness_factor: f64,
}

/// Resolve time conflicts per ground-truth track and derive fragmentation statistics.
pub fn compute_aipr(
    matrix: &AssociationMatrix,
    truth: TrackSet<'_>,
    computed: TrackSet<'_>,
) -> AiprReport {
    let associations = Associations::collect(matrix, truth, computed);

    let assignments: Vec<AiprAssignment> = truth
        .iter()
        .map(|(i, track)| {
            let mut candidates: Vec<AiprCandidate> = associations
                .of_truth(i)
                .iter()
                .map(|&(c, score)| AiprCandidate {
                    computed: c,
                    value: score.mean_centroid_distance().unwrap_or(f64::INFINITY),
                    time_range: score.time_range(),
                    overlap_frames: score.accepted_frames(),
                })
                .collect();
            candidates.sort_by(|a, b| a.rank(b));

            let mut kept: Vec<AiprCandidate> = Vec::new();
            let mut dropped = Vec::new();
            for candidate in candidates {
                if kept.iter().any(|k| k.time_range.overlaps(&candidate.time_range)) {
                    dropped.push(candidate.computed);
                } else {
                    kept.push(candidate);
                }
            }

            AiprAssignment {
                truth: i,
                label: track.label(i),
                in_aoi_frames: track.frames_in_aoi,
                kept,
                dropped,
            }
        })
        .collect();

    let detected: Vec<&AiprAssignment> = assignments.iter().filter(|a| a.is_detected()).collect();
    let total_kept: usize = assignments.iter().map(|a| a.kept.len()).sum();
    let detected_in_aoi: usize = detected.iter().map(|a| a.in_aoi_frames).sum();
    let detected_overlap: usize = detected.iter().map(|a| a.kept_overlap_frames()).sum();

    let report = AiprReport {
        detected_truth_tracks: detected.len(),
        identity_switches: assignments.iter().map(|a| a.identity_switches()).sum(),
        track_fragmentation: ratio(total_kept, detected.len()),
        normalized_track_fragmentation: ratio(total_kept, assignments.len()),
        track_completeness_factor: ratio(detected_overlap, detected_in_aoi),
        assignments,
    };

    info!(
        "aipr: {} identity switches, fragmentation {:.3}, completeness {:.3}",
        report.identity_switches, report.track_fragmentation, report.track_completeness_factor
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::PairKey;
    use crate::overlap::FrameOverlapRecord;
    use crate::pair::PairScore;
    use crate::track::{Frame, Track};
    use approx::assert_relative_eq;

    fn score(frames: std::ops::Range<u64>, distance: f64) -> PairScore {
        PairScore::from_overlaps(
            frames
                .map(|t| FrameOverlapRecord {
                    truth_frame: t as usize,
                    computed_frame: t as usize,
                    truth_frame_number: None,
                    computed_frame_number: None,
                    truth_timestamp: t,
                    computed_timestamp: t,
                    truth_area: Some(1.0),
                    computed_area: Some(1.0),
                    overlap_area: 1.0,
                    centroid_distance: Some(distance),
                    bottom_distance: Some(distance),
                    in_aoi: true,
                })
                .collect(),
        )
        .unwrap()
    }

    fn tracks(n: usize, len: u64) -> Vec<Track> {
        (0..n)
            .map(|_| Track::ground_truth(None, (0..len).map(Frame::new).collect()))
            .collect()
    }

    #[test]
    fn test_lower_value_wins_time_conflict() {
        let truth = tracks(1, 20);
        let computed = tracks(3, 20);

        let mut matrix = AssociationMatrix::new();
        matrix.insert(PairKey::new(0, 0), score(0..10, 5.0));
        matrix.insert(PairKey::new(0, 1), score(5..12, 1.0));
        matrix.insert(PairKey::new(0, 2), score(14..20, 3.0));

        let report = compute_aipr(&matrix, TrackSet::all(&truth), TrackSet::all(&computed));
        let assignment = &report.assignments[0];
        let kept: Vec<usize> = assignment.kept.iter().map(|c| c.computed).collect();

        assert_eq!(kept, vec![1, 2]);
        assert_eq!(assignment.dropped, vec![0]);
        assert_eq!(report.identity_switches, 1);
        assert_relative_eq!(report.track_fragmentation, 2.0);
        assert_relative_eq!(report.track_completeness_factor, 13.0 / 20.0);
    }

    #[test]
    fn test_equal_value_prefers_longer_duration() {
        let truth = tracks(1, 20);
        let computed = tracks(2, 20);

        let mut matrix = AssociationMatrix::new();
        matrix.insert(PairKey::new(0, 0), score(0..4, 2.0));
        matrix.insert(PairKey::new(0, 1), score(2..12, 2.0));

        let report = compute_aipr(&matrix, TrackSet::all(&truth), TrackSet::all(&computed));
        assert_eq!(report.assignments[0].kept[0].computed, 1);
        assert_eq!(report.assignments[0].dropped, vec![0]);
    }

    #[test]
    fn test_normalized_fragmentation_counts_undetected() {
        let truth = tracks(2, 10);
        let computed = tracks(1, 10);

        let mut matrix = AssociationMatrix::new();
        matrix.insert(PairKey::new(0, 0), score(0..10, 1.0));

        let report = compute_aipr(&matrix, TrackSet::all(&truth), TrackSet::all(&computed));
        assert_eq!(report.detected_truth_tracks, 1);
        assert_relative_eq!(report.track_fragmentation, 1.0);
        assert_relative_eq!(report.normalized_track_fragmentation, 0.5);
        assert_relative_eq!(report.track_completeness_factor, 1.0);
        assert_eq!(report.identity_switches, 0);
    }
}
