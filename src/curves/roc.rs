//! Receiver operating characteristic sweep over computed-track relevancy.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::matrix::AssociationMatrix;
use crate::metrics::Associations;
use crate::track::TrackSet;
use crate::utils::ratio;

/// One ROC operating point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocRow {
    pub threshold: f64,
    /// Fraction of truth tracks matched by at least one detected computed track
    pub pd: f64,
    /// False alarm count (equal to `fp`)
    pub fa: usize,
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    /// `fa` over the number of computed tracks
    pub normalized_fa: f64,
}

/// Classify every computed track at each threshold.
///
/// A computed track is detected when its relevancy is at least the threshold
/// and matched when it has any partner in the matrix. Each truth track counts
/// once towards Pd however many detected tracks match it.
pub fn compute_roc(
    matrix: &AssociationMatrix,
    truth: TrackSet<'_>,
    computed: TrackSet<'_>,
    thresholds: &[f64],
) -> Vec<RocRow> {
    let associations = Associations::collect(matrix, truth, computed);
    let tracks: Vec<(f64, Vec<usize>)> = computed
        .iter()
        .map(|(i, t)| {
            let partners = associations.of_computed(i).iter().map(|(p, _)| *p).collect();
            (t.relevancy, partners)
        })
        .collect();
    let n_truth = truth.len();

    thresholds
        .iter()
        .map(|&threshold| {
            let mut row = RocRow {
                threshold,
                pd: 0.0,
                fa: 0,
                tp: 0,
                fp: 0,
                tn: 0,
                fn_: 0,
                normalized_fa: 0.0,
            };
            let mut detected_truth = BTreeSet::new();
            for (relevancy, partners) in &tracks {
                let detected = *relevancy >= threshold;
                let matched = !partners.is_empty();
                match (detected, matched) {
                    (true, true) => {
                        row.tp += 1;
                        detected_truth.extend(partners.iter().copied());
                    }
                    (true, false) => row.fp += 1,
                    (false, true) => row.fn_ += 1,
                    (false, false) => row.tn += 1,
                }
            }
            row.fa = row.fp;
            row.pd = ratio(detected_truth.len(), n_truth);
            row.normalized_fa = ratio(row.fa, tracks.len());
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::PairKey;
    use crate::overlap::FrameOverlapRecord;
    use crate::pair::PairScore;
    use crate::track::{Frame, Track};
    use approx::assert_relative_eq;

    fn one_frame_score() -> PairScore {
        PairScore::from_overlaps(vec![FrameOverlapRecord {
            truth_frame: 0,
            computed_frame: 0,
            truth_frame_number: Some(0),
            computed_frame_number: Some(0),
            truth_timestamp: 0,
            computed_timestamp: 0,
            truth_area: Some(100.0),
            computed_area: Some(100.0),
            overlap_area: 100.0,
            centroid_distance: Some(0.0),
            bottom_distance: Some(0.0),
            in_aoi: true,
        }])
        .unwrap()
    }

    #[test]
    fn test_each_truth_credited_once() {
        let truth = vec![Track::ground_truth(Some(1), vec![Frame::new(0)])];
        let computed = vec![
            Track::computed(Some(1), 0.8, vec![Frame::new(0)]),
            Track::computed(Some(2), 0.7, vec![Frame::new(0)]),
        ];
        let mut matrix = AssociationMatrix::new();
        matrix.insert(PairKey::new(0, 0), one_frame_score());
        matrix.insert(PairKey::new(0, 1), one_frame_score());

        let rows = compute_roc(&matrix, TrackSet::all(&truth), TrackSet::all(&computed), &[0.5]);
        assert_eq!(rows[0].tp, 2);
        assert_relative_eq!(rows[0].pd, 1.0);
    }

    #[test]
    fn test_confusion_counts() {
        let truth = vec![
            Track::ground_truth(Some(1), vec![Frame::new(0)]),
            Track::ground_truth(Some(2), vec![Frame::new(0)]),
        ];
        let computed = vec![
            Track::computed(None, 0.9, vec![Frame::new(0)]),
            Track::computed(None, 0.8, vec![Frame::new(0)]),
            Track::computed(None, 0.2, vec![Frame::new(0)]),
            Track::computed(None, 0.1, vec![Frame::new(0)]),
        ];
        let mut matrix = AssociationMatrix::new();
        matrix.insert(PairKey::new(0, 0), one_frame_score());
        matrix.insert(PairKey::new(1, 2), one_frame_score());

        let rows = compute_roc(&matrix, TrackSet::all(&truth), TrackSet::all(&computed), &[0.5]);
        let row = &rows[0];
        assert_eq!((row.tp, row.fp, row.fn_, row.tn), (1, 1, 1, 1));
        assert_relative_eq!(row.pd, 0.5);
        assert_eq!(row.fa, 1);
        assert_relative_eq!(row.normalized_fa, 0.25);
    }
}
