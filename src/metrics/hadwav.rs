//! Dominant-partner statistics.

use std::collections::BTreeSet;

use log::info;
use serde::Serialize;

use super::Associations;
use crate::matrix::AssociationMatrix;
use crate::pair::PairScore;
use crate::track::{Track, TrackSet};
use crate::utils::{mean, ratio};
use crate::{Error, Result};

/// Per-track dominance summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HadwavTrackStats {
    /// Index of the track in its slice
    pub track: usize,
    /// External id, or the index
    pub label: u64,
    /// Frames inside the AOI
    pub in_aoi_frames: usize,
    /// Distinct frames of this track matched by any partner
    pub matched_frames: usize,
    /// Partner with the most overlap frames
    pub dominant_partner: Option<usize>,
    /// Overlap frames shared with the dominant partner
    pub dominant_frames: usize,
    /// dominant_frames / in_aoi_frames
    pub purity: f64,
    /// Number of associated partners
    pub continuity: usize,
}

/// Aggregate dominance statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HadwavReport {
    pub truth_tracks: Vec<HadwavTrackStats>,
    pub computed_tracks: Vec<HadwavTrackStats>,
    /// Distinct matched truth frames over in-AOI truth frames
    pub frame_pd: f64,
    /// In-AOI computed frames matched by no truth frame
    pub frame_fa: usize,
    /// Distinct matched computed frames over in-AOI computed frames
    pub track_frame_precision: f64,
    /// Truth tracks with an association over all truth tracks
    pub detection_pd: f64,
    /// Computed tracks with no association over all computed tracks
    pub detection_pfa: f64,
    pub mean_truth_purity: f64,
    pub mean_truth_continuity: f64,
    pub mean_computed_purity: f64,
    pub mean_computed_continuity: f64,
}

/// Pick the partner with the most overlap frames. A tie for the maximum is an error.
fn dominant_partner(
    role: &'static str,
    track: usize,
    partners: &[(usize, &PairScore)],
) -> Result<Option<(usize, usize)>> {
    let Some(max) = partners.iter().map(|(_, s)| s.accepted_frames()).max() else {
        return Ok(None);
    };
    let best: Vec<usize> = partners
        .iter()
        .filter(|(_, s)| s.accepted_frames() == max)
        .map(|(p, _)| *p)
        .collect();
    match best.as_slice() {
        [only] => Ok(Some((*only, max))),
        _ => Err(Error::TiedDominance {
            role,
            track,
            frames: max,
            candidates: best,
        }),
    }
}

fn track_stats(
    role: &'static str,
    index: usize,
    track: &Track,
    partners: &[(usize, &PairScore)],
    frames_of: impl Fn(&PairScore) -> Vec<usize>,
) -> Result<HadwavTrackStats> {
    let dominant = dominant_partner(role, index, partners)?;
    let matched: BTreeSet<usize> = partners.iter().flat_map(|(_, s)| frames_of(s)).collect();
    let dominant_frames = dominant.map_or(0, |(_, frames)| frames);
    Ok(HadwavTrackStats {
        track: index,
        label: track.label(index),
        in_aoi_frames: track.frames_in_aoi,
        matched_frames: matched.len(),
        dominant_partner: dominant.map(|(p, _)| p),
        dominant_frames,
        purity: ratio(dominant_frames, track.frames_in_aoi),
        continuity: partners.len(),
    })
}

/// Compute dominance statistics for the pairs of `matrix` within the two sets.
pub fn compute_hadwav(
    matrix: &AssociationMatrix,
    truth: TrackSet<'_>,
    computed: TrackSet<'_>,
) -> Result<HadwavReport> {
    let associations = Associations::collect(matrix, truth, computed);

    let truth_tracks = truth
        .iter()
        .map(|(i, t)| {
            track_stats("ground-truth", i, t, associations.of_truth(i), |s| {
                s.truth_frames().collect()
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let computed_tracks = computed
        .iter()
        .map(|(i, t)| {
            track_stats("computed", i, t, associations.of_computed(i), |s| {
                s.computed_frames().collect()
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let truth_in_aoi: usize = truth_tracks.iter().map(|s| s.in_aoi_frames).sum();
    let truth_matched: usize = truth_tracks.iter().map(|s| s.matched_frames).sum();
    let computed_in_aoi: usize = computed_tracks.iter().map(|s| s.in_aoi_frames).sum();
    let computed_matched: usize = computed_tracks.iter().map(|s| s.matched_frames).sum();

    let detected = truth_tracks.iter().filter(|s| s.continuity > 0).count();
    let false_alarms = computed_tracks.iter().filter(|s| s.continuity == 0).count();

    let report = HadwavReport {
        frame_pd: ratio(truth_matched, truth_in_aoi),
        frame_fa: computed_tracks
            .iter()
            .map(|s| s.in_aoi_frames.saturating_sub(s.matched_frames))
            .sum(),
        track_frame_precision: ratio(computed_matched, computed_in_aoi),
        detection_pd: ratio(detected, truth_tracks.len()),
        detection_pfa: ratio(false_alarms, computed_tracks.len()),
        mean_truth_purity: mean(truth_tracks.iter().map(|s| s.purity)).unwrap_or(0.0),
        mean_truth_continuity: mean(truth_tracks.iter().map(|s| s.continuity as f64))
            .unwrap_or(0.0),
        mean_computed_purity: mean(computed_tracks.iter().map(|s| s.purity)).unwrap_or(0.0),
        mean_computed_continuity: mean(computed_tracks.iter().map(|s| s.continuity as f64))
            .unwrap_or(0.0),
        truth_tracks,
        computed_tracks,
    };

    info!(
        "hadwav: detection Pd {:.3}, PFA {:.3}, frame Pd {:.3}",
        report.detection_pd, report.detection_pfa, report.frame_pd
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::PairKey;
    use crate::overlap::FrameOverlapRecord;
    use crate::track::Frame;
    use approx::assert_relative_eq;

    fn record(truth_frame: usize, computed_frame: usize) -> FrameOverlapRecord {
        FrameOverlapRecord {
            truth_frame,
            computed_frame,
            truth_frame_number: None,
            computed_frame_number: None,
            truth_timestamp: truth_frame as u64,
            computed_timestamp: computed_frame as u64,
            truth_area: Some(100.0),
            computed_area: Some(100.0),
            overlap_area: 50.0,
            centroid_distance: Some(1.0),
            bottom_distance: Some(1.0),
            in_aoi: true,
        }
    }

    fn score(frames: &[(usize, usize)]) -> PairScore {
        PairScore::from_overlaps(frames.iter().map(|&(t, c)| record(t, c)).collect()).unwrap()
    }

    fn tracks(n: usize, len: usize) -> Vec<Track> {
        (0..n)
            .map(|i| {
                Track::ground_truth(
                    Some(i as u32 + 1),
                    (0..len).map(|k| Frame::new(k as u64)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_dominance_and_purity() {
        let truth = tracks(2, 10);
        let computed = tracks(3, 10);

        let mut matrix = AssociationMatrix::new();
        matrix.insert(PairKey::new(0, 0), score(&[(0, 0), (1, 1), (2, 2), (3, 3)]));
        matrix.insert(PairKey::new(0, 1), score(&[(5, 5), (6, 6)]));

        let report =
            compute_hadwav(&matrix, TrackSet::all(&truth), TrackSet::all(&computed)).unwrap();

        let t0 = &report.truth_tracks[0];
        assert_eq!(t0.dominant_partner, Some(0));
        assert_eq!(t0.dominant_frames, 4);
        assert_eq!(t0.matched_frames, 6);
        assert_eq!(t0.continuity, 2);
        assert_relative_eq!(t0.purity, 0.4);

        assert_eq!(report.truth_tracks[1].dominant_partner, None);
        assert_relative_eq!(report.detection_pd, 0.5);
        assert_relative_eq!(report.detection_pfa, 1.0 / 3.0);
        assert_relative_eq!(report.frame_pd, 6.0 / 20.0);
        assert_eq!(report.frame_fa, 30 - 6);
        assert_relative_eq!(report.track_frame_precision, 6.0 / 30.0);
        assert_relative_eq!(report.mean_truth_continuity, 1.0);
    }

    #[test]
    fn test_tied_dominance_is_fatal() {
        let truth = tracks(1, 10);
        let computed = tracks(2, 10);

        let mut matrix = AssociationMatrix::new();
        matrix.insert(PairKey::new(0, 0), score(&[(0, 0), (1, 1)]));
        matrix.insert(PairKey::new(0, 1), score(&[(2, 0), (3, 1)]));

        let err = compute_hadwav(&matrix, TrackSet::all(&truth), TrackSet::all(&computed))
            .unwrap_err();
        match err {
            Error::TiedDominance {
                track,
                frames,
                candidates,
                ..
            } => {
                assert_eq!(track, 0);
                assert_eq!(frames, 2);
                assert_eq!(candidates, vec![0, 1]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pairs_outside_sets_are_ignored() {
        let truth = tracks(2, 4);
        let computed = tracks(1, 4);
        let selected = [0];

        let mut matrix = AssociationMatrix::new();
        matrix.insert(PairKey::new(1, 0), score(&[(0, 0)]));

        let report = compute_hadwav(
            &matrix,
            TrackSet::subset(&truth, &selected),
            TrackSet::all(&computed),
        )
        .unwrap();
        assert_eq!(report.truth_tracks.len(), 1);
        assert_relative_eq!(report.detection_pd, 0.0);
        assert_relative_eq!(report.detection_pfa, 1.0);
    }

    #[test]
    fn test_empty_inputs() {
        let report = compute_hadwav(
            &AssociationMatrix::new(),
            TrackSet::all(&[]),
            TrackSet::all(&[]),
        )
        .unwrap();
        assert_eq!(report, HadwavReport::default());
    }
}
