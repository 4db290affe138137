//! Timestamp alignment of two frame sequences.

use crate::track::TimedFrame;

/// Whether two timestamps are close enough to be paired.
///
/// Identical timestamps always pair, even with a zero tolerance.
fn within_tolerance(gap: u64, tolerance_usecs: u64) -> bool {
    gap == 0 || gap < tolerance_usecs
}

/// Pair up two timestamp-sorted sequences.
///
/// Returns `(position in a, position in b)` pairs in increasing order. Two
/// cursors walk the sequences; the one with the earlier timestamp leads. When
/// the gap to the other cursor is within tolerance both advance and a pair is
/// emitted, otherwise only the leader advances. No element is paired twice.
///
/// The pairing is greedy: an element is paired with the first in-tolerance
/// partner the cursors reach, which is not necessarily the closest one.
pub fn align_by<A, B>(
    a: &[A],
    b: &[B],
    tolerance_usecs: u64,
    timestamp_a: impl Fn(&A) -> u64,
    timestamp_b: impl Fn(&B) -> u64,
) -> Vec<(usize, usize)> {
    let (Some(a_first), Some(a_last), Some(b_first), Some(b_last)) =
        (a.first(), a.last(), b.first(), b.last())
    else {
        return Vec::new();
    };

    debug_assert!(a.windows(2).all(|w| timestamp_a(&w[0]) <= timestamp_a(&w[1])));
    debug_assert!(b.windows(2).all(|w| timestamp_b(&w[0]) <= timestamp_b(&w[1])));

    // Quick reject when the spans, widened by the tolerance, never meet.
    if timestamp_a(a_last).saturating_add(tolerance_usecs) < timestamp_b(b_first)
        || timestamp_b(b_last).saturating_add(tolerance_usecs) < timestamp_a(a_first)
    {
        return Vec::new();
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let ta = timestamp_a(&a[i]);
        let tb = timestamp_b(&b[j]);
        if within_tolerance(ta.abs_diff(tb), tolerance_usecs) {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if ta < tb {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

/// Align two sorted timelines and return pairs of frame indices.
pub fn align_frames(
    a: &[TimedFrame],
    b: &[TimedFrame],
    tolerance_usecs: u64,
) -> Vec<(usize, usize)> {
    align_by(a, b, tolerance_usecs, |f| f.timestamp_usecs, |f| f.timestamp_usecs)
        .into_iter()
        .map(|(i, j)| (a[i].index, b[j].index))
        .collect()
}
