//! ROC and precision/recall curves over computed-track relevancy.

mod pr;
mod roc;
mod thresholds;

pub use pr::{compute_pr, PrOrdering, PrRow};
pub use roc::{compute_roc, RocRow};
pub use thresholds::{
    generate_roc_thresholds, roc_thresholds, ThresholdRange, MAX_RANGE_THRESHOLDS, SENTINEL_EPSILON,
};

use crate::config::MatchingParams;
use crate::matrix::AssociationMatrix;
use crate::track::TrackSet;

/// ROC sweep at the thresholds configured in `params`.
pub fn compute_roc_curve(
    matrix: &AssociationMatrix,
    truth: TrackSet<'_>,
    computed: TrackSet<'_>,
    params: &MatchingParams,
) -> Vec<RocRow> {
    let thresholds = roc_thresholds(computed, params);
    compute_roc(matrix, truth, computed, &thresholds)
}
