//! The pairwise association matrix.
//!
//! Holds one [`PairScore`] per matching (ground truth, computed) pair, keyed
//! by track indices into the caller's slices.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::MatchingParams;
use crate::pair::{PairOutcome, PairScore, PairScorer, TrackContext};
use crate::quickfilter::QuickfilterIndex;
use crate::track::{MatchState, Track, TrackSet};
use crate::utils::warn_once;
use crate::{Error, Result};

/// Ground-truth rows scored between progress messages.
const PROGRESS_INTERVAL: usize = 100;

/// Key of one matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PairKey {
    pub truth: usize,
    pub computed: usize,
}

impl PairKey {
    pub fn new(truth: usize, computed: usize) -> Self {
        Self { truth, computed }
    }
}

/// A key with only one side bound, for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialKey {
    Truth(usize),
    Computed(usize),
}

impl PartialKey {
    pub fn matches(&self, key: &PairKey) -> bool {
        match *self {
            PartialKey::Truth(t) => key.truth == t,
            PartialKey::Computed(c) => key.computed == c,
        }
    }
}

/// Frames that scoring found matched, as (track index, frame index).
///
/// Returned by the matrix instead of written into the tracks; see [`MatchedFrames::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchedFrames {
    pub truth: BTreeSet<(usize, usize)>,
    pub computed: BTreeSet<(usize, usize)>,
}

impl MatchedFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: PairKey, outcome: &PairOutcome) {
        self.truth
            .extend(outcome.matched_truth_frames.iter().map(|&f| (key.truth, f)));
        self.computed
            .extend(outcome.matched_computed_frames.iter().map(|&f| (key.computed, f)));
    }

    pub fn merge(&mut self, other: MatchedFrames) {
        self.truth.extend(other.truth);
        self.computed.extend(other.computed);
    }

    pub fn is_empty(&self) -> bool {
        self.truth.is_empty() && self.computed.is_empty()
    }

    /// Advance every listed frame to `InAoiMatched`.
    ///
    /// Out-of-range entries and frames classified `OutsideAoi` are left untouched.
    pub fn apply(&self, truth: &mut [Track], computed: &mut [Track]) {
        advance_frames(truth, &self.truth);
        advance_frames(computed, &self.computed);
    }
}

fn advance_frames(tracks: &mut [Track], frames: &BTreeSet<(usize, usize)>) {
    for &(t, f) in frames {
        let frame = tracks
            .get_mut(t)
            .and_then(|track| track.frames.get_mut(f))
            .filter(|frame| frame.is_in_aoi());
        if let Some(frame) = frame {
            frame.match_state.advance(MatchState::InAoiMatched);
        }
    }
}

/// Single-frame tracks share a bucket when they describe the same frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DetectionBucket {
    Frame(u32),
    Timestamp(u64),
}

/// Ordered map from [`PairKey`] to a non-empty [`PairScore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssociationMatrix {
    scores: BTreeMap<PairKey, PairScore>,
}

impl AssociationMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn clear(&mut self) {
        self.scores.clear();
    }

    pub fn get(&self, key: &PairKey) -> Option<&PairScore> {
        self.scores.get(key)
    }

    pub fn contains(&self, key: &PairKey) -> bool {
        self.scores.contains_key(key)
    }

    pub fn insert(&mut self, key: PairKey, score: PairScore) {
        self.scores.insert(key, score);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &PairScore)> {
        self.scores.iter()
    }

    /// Keys whose bound side equals the partial key.
    pub fn matching_keys(&self, partial: PartialKey) -> Vec<PairKey> {
        self.scores
            .keys()
            .filter(|key| partial.matches(key))
            .copied()
            .collect()
    }

    /// Cells of one ground-truth row.
    pub fn partners_of_truth(&self, truth: usize) -> impl Iterator<Item = (&PairKey, &PairScore)> {
        self.scores
            .range(PairKey::new(truth, 0)..=PairKey::new(truth, usize::MAX))
    }

    /// Cells of one computed column.
    pub fn partners_of_computed(
        &self,
        computed: usize,
    ) -> impl Iterator<Item = (&PairKey, &PairScore)> {
        self.scores.iter().filter(move |(k, _)| k.computed == computed)
    }

    pub fn has_truth_match(&self, truth: usize) -> bool {
        self.partners_of_truth(truth).next().is_some()
    }

    pub fn has_computed_match(&self, computed: usize) -> bool {
        self.scores.keys().any(|k| k.computed == computed)
    }

    /// Score the full cross product of the two sets.
    ///
    /// Pairs already present are skipped. Returns the frames of newly
    /// committed pairs, for the caller to merge into the tracks.
    pub fn compute_all(
        &mut self,
        truth: TrackSet<'_>,
        computed: TrackSet<'_>,
        params: &MatchingParams,
    ) -> Result<MatchedFrames> {
        let scorer = PairScorer::new(params)?;
        preflight(truth, computed, params)?;

        let truth_index = QuickfilterIndex::build(truth, params)?;
        let computed_index = QuickfilterIndex::build(computed, params)?;

        let truth_rows: Vec<TrackContext<'_>> = truth
            .iter()
            .map(|(i, t)| TrackContext::new(i, t, truth_index.envelope(i)))
            .collect();
        let computed_cols: Vec<TrackContext<'_>> = computed
            .iter()
            .map(|(i, t)| TrackContext::new(i, t, computed_index.envelope(i)))
            .collect();

        let committed = self.score_rows(&scorer, &truth_rows, &computed_cols);
        let matched = self.commit(committed);

        info!(
            "Association matrix holds {} pairs after scoring {} x {} tracks",
            self.len(),
            truth_rows.len(),
            computed_cols.len()
        );
        Ok(matched)
    }

    /// Score single-frame tracks, pairing only tracks that share a frame.
    ///
    /// Tracks are bucketed by frame number, or by timestamp when a frame has
    /// no number. Any track without exactly one frame is an error.
    pub fn compute_all_detection_mode(
        &mut self,
        truth: TrackSet<'_>,
        computed: TrackSet<'_>,
        params: &MatchingParams,
    ) -> Result<MatchedFrames> {
        let scorer = PairScorer::new(params)?;
        preflight(truth, computed, params)?;

        let truth_buckets = bucket_detections(truth, "ground-truth")?;
        let computed_buckets = bucket_detections(computed, "computed")?;

        let mut committed = Vec::new();
        for (bucket, truth_tracks) in &truth_buckets {
            let Some(computed_tracks) = computed_buckets.get(bucket) else {
                continue;
            };
            let rows: Vec<TrackContext<'_>> = truth_tracks
                .iter()
                .map(|&(i, t)| TrackContext::new(i, t, None))
                .collect();
            let cols: Vec<TrackContext<'_>> = computed_tracks
                .iter()
                .map(|&(i, t)| TrackContext::new(i, t, None))
                .collect();
            committed.extend(self.score_rows(&scorer, &rows, &cols));
        }

        let matched = self.commit(committed);
        info!(
            "Detection mode: {} pairs over {} shared frames",
            self.len(),
            truth_buckets
                .keys()
                .filter(|b| computed_buckets.contains_key(b))
                .count()
        );
        Ok(matched)
    }

    fn commit(&mut self, committed: Vec<(PairKey, PairOutcome)>) -> MatchedFrames {
        let mut matched = MatchedFrames::new();
        for (key, outcome) in committed {
            matched.record(key, &outcome);
            self.scores.insert(key, outcome.score);
        }
        matched
    }

    #[cfg(not(feature = "parallel"))]
    fn score_rows(
        &self,
        scorer: &PairScorer<'_>,
        rows: &[TrackContext<'_>],
        cols: &[TrackContext<'_>],
    ) -> Vec<(PairKey, PairOutcome)> {
        let mut committed = Vec::new();
        for (n, row) in rows.iter().enumerate() {
            committed.extend(self.score_row(scorer, row, cols));
            if (n + 1) % PROGRESS_INTERVAL == 0 {
                debug!("Scored {}/{} ground-truth tracks", n + 1, rows.len());
            }
        }
        committed
    }

    #[cfg(feature = "parallel")]
    fn score_rows(
        &self,
        scorer: &PairScorer<'_>,
        rows: &[TrackContext<'_>],
        cols: &[TrackContext<'_>],
    ) -> Vec<(PairKey, PairOutcome)> {
        use rayon::prelude::*;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let done = AtomicUsize::new(0);
        let per_row: Vec<Vec<(PairKey, PairOutcome)>> = rows
            .par_iter()
            .map(|row| {
                let scored = self.score_row(scorer, row, cols);
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                if n % PROGRESS_INTERVAL == 0 {
                    debug!("Scored {}/{} ground-truth tracks", n, rows.len());
                }
                scored
            })
            .collect();
        per_row.into_iter().flatten().collect()
    }

    fn score_row(
        &self,
        scorer: &PairScorer<'_>,
        row: &TrackContext<'_>,
        cols: &[TrackContext<'_>],
    ) -> Vec<(PairKey, PairOutcome)> {
        cols.iter()
            .filter_map(|col| {
                let key = PairKey::new(row.index, col.index);
                if self.scores.contains_key(&key) {
                    return None;
                }
                scorer.score(row, col).map(|outcome| (key, outcome))
            })
            .collect()
    }
}

/// Checks that must pass before any pair is scored.
fn preflight(truth: TrackSet<'_>, computed: TrackSet<'_>, params: &MatchingParams) -> Result<()> {
    if params.use_radial()
        && !truth.is_empty()
        && !truth
            .iter()
            .any(|(_, t)| t.frames.iter().any(|f| f.geo.is_some()))
    {
        return Err(Error::InvalidConfig(
            "radial overlap requested but no ground-truth frame has a geodetic point".to_string(),
        ));
    }

    if let (Some(t), Some(c)) = (truth.time_range(), computed.time_range()) {
        if !t.overlaps(&c) {
            let message = format!(
                "ground truth spans [{}, {}] us but computed tracks span [{}, {}] us; \
                 check that both files describe the same video, clock and time units",
                t.start, t.end, c.start, c.end
            );
            if params.sanity_check {
                return Err(Error::SanityCheck(message));
            }
            warn!("{} (sanity check disabled, continuing)", message);
        }
    }
    Ok(())
}

fn bucket_detections<'a>(
    set: TrackSet<'a>,
    side: &str,
) -> Result<BTreeMap<DetectionBucket, Vec<(usize, &'a Track)>>> {
    let mut buckets: BTreeMap<DetectionBucket, Vec<(usize, &'a Track)>> = BTreeMap::new();
    for (i, track) in set.iter() {
        let frame = match track.frames.as_slice() {
            [frame] => frame,
            frames => {
                return Err(Error::DataConsistency(format!(
                    "detection mode needs single-frame tracks, {} track {} has {} frames",
                    side,
                    track.label(i),
                    frames.len()
                )))
            }
        };
        let bucket = match frame.frame_number {
            Some(n) => DetectionBucket::Frame(n),
            None => {
                warn_once("detection without a frame number; bucketing by timestamp");
                DetectionBucket::Timestamp(frame.timestamp_usecs)
            }
        };
        buckets.entry(bucket).or_default().push((i, track));
    }
    Ok(buckets)
}
