//! Track-level accuracy statistics derived from a finished association matrix.
//!
//! Two aggregation styles are provided:
//!
//! - `hadwav` - every matrix pair is an association; each track has one dominant
//!   partner. Frame Pd/FA, detection Pd/PFA, purity and continuity.
//! - `aipr` - per ground-truth track, computed tracks compete for time; the
//!   closest non-overlapping ones are kept. Identity switches, fragmentation
//!   and completeness.

mod aipr;
mod hadwav;

pub use aipr::{compute_aipr, AiprAssignment, AiprCandidate, AiprReport};
pub use hadwav::{compute_hadwav, HadwavReport, HadwavTrackStats};

use std::collections::{BTreeMap, BTreeSet};

use crate::matrix::AssociationMatrix;
use crate::pair::PairScore;
use crate::track::TrackSet;

/// Matrix cells restricted to two track sets, grouped by either side.
#[derive(Debug, Default)]
pub(crate) struct Associations<'m> {
    pub by_truth: BTreeMap<usize, Vec<(usize, &'m PairScore)>>,
    pub by_computed: BTreeMap<usize, Vec<(usize, &'m PairScore)>>,
}

impl<'m> Associations<'m> {
    pub fn collect(
        matrix: &'m AssociationMatrix,
        truth: TrackSet<'_>,
        computed: TrackSet<'_>,
    ) -> Self {
        let truth_ids: BTreeSet<usize> = truth.indices().into_iter().collect();
        let computed_ids: BTreeSet<usize> = computed.indices().into_iter().collect();

        let mut associations = Self::default();
        for (key, score) in matrix.iter() {
            if !truth_ids.contains(&key.truth) || !computed_ids.contains(&key.computed) {
                continue;
            }
            associations
                .by_truth
                .entry(key.truth)
                .or_default()
                .push((key.computed, score));
            associations
                .by_computed
                .entry(key.computed)
                .or_default()
                .push((key.truth, score));
        }
        associations
    }

    pub fn of_truth(&self, truth: usize) -> &[(usize, &'m PairScore)] {
        self.by_truth.get(&truth).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn of_computed(&self, computed: usize) -> &[(usize, &'m PairScore)] {
        self.by_computed.get(&computed).map(Vec::as_slice).unwrap_or(&[])
    }
}
