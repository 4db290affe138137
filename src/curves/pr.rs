//! Precision/recall over a ranked list of computed tracks.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::matrix::AssociationMatrix;
use crate::metrics::Associations;
use crate::track::{Track, TrackSet};
use crate::utils::ratio;

/// How computed tracks are ordered before walking the PR curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrOrdering {
    /// By rank when every track has one, otherwise by relevancy.
    #[default]
    Auto,
    /// Ascending rank; unranked tracks last.
    Rank,
    /// Descending relevancy.
    Relevancy,
    /// Ascending first-frame timestamp; empty tracks last.
    FirstTimestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrRow {
    /// Position in the ordered list, from 0
    pub index: usize,
    /// Track index of the computed track at this position
    pub computed: usize,
    pub relevancy: f64,
    pub tp: usize,
    pub fp: usize,
    pub precision: f64,
    /// Distinct truth tracks detected so far
    pub td: usize,
    pub recall: f64,
}

fn order_by(ordering: PrOrdering, a: &Track, b: &Track) -> Ordering {
    match ordering {
        PrOrdering::Auto | PrOrdering::Rank => match (a.rank, b.rank) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        PrOrdering::Relevancy => b.relevancy.total_cmp(&a.relevancy),
        PrOrdering::FirstTimestamp => match (a.first_timestamp(), b.first_timestamp()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

/// Walk computed tracks in `ordering` and accumulate precision and recall.
///
/// A computed track is a true positive when it has any partner in the
/// matrix. Recall counts each truth track the first time any of its partners
/// appears in the list.
pub fn compute_pr(
    matrix: &AssociationMatrix,
    truth: TrackSet<'_>,
    computed: TrackSet<'_>,
    ordering: PrOrdering,
) -> Vec<PrRow> {
    let ordering = match ordering {
        PrOrdering::Auto if computed.iter().all(|(_, t)| t.rank.is_some()) => PrOrdering::Rank,
        PrOrdering::Auto => PrOrdering::Relevancy,
        other => other,
    };

    let mut order: Vec<(usize, &Track)> = computed.iter().collect();
    order.sort_by(|(_, a), (_, b)| order_by(ordering, a, b));

    let associations = Associations::collect(matrix, truth, computed);
    let n_truth = truth.len();

    let mut first_seen: BTreeMap<usize, usize> = BTreeMap::new();
    let (mut tp, mut fp) = (0, 0);
    order
        .into_iter()
        .enumerate()
        .map(|(index, (c, track))| {
            let partners = associations.of_computed(c);
            if partners.is_empty() {
                fp += 1;
            } else {
                tp += 1;
                for (t, _) in partners {
                    first_seen.entry(*t).or_insert(index);
                }
            }
            PrRow {
                index,
                computed: c,
                relevancy: track.relevancy,
                tp,
                fp,
                precision: ratio(tp, index + 1),
                td: first_seen.len(),
                recall: ratio(first_seen.len(), n_truth),
            }
        })
        .collect()
}
