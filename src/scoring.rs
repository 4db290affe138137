//! One scoring run: AOI filtering, matching and the match-state merge.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::aoi::{filter_tracks_on_aoi, AoiFilterOutcome};
use crate::config::MatchingParams;
use crate::curves::{compute_pr, compute_roc_curve, PrOrdering, PrRow, RocRow};
use crate::matrix::{AssociationMatrix, MatchedFrames};
use crate::metrics::{compute_aipr, compute_hadwav, AiprReport, HadwavReport};
use crate::plot::{write_plot_dump, PlotDumpPaths};
use crate::track::{TimeRange, Track, TrackSet};
use crate::Result;

/// Whether tracks are matched as whole tracks or as single-frame detections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoringMode {
    #[default]
    Track,
    Detection,
}

/// The finished matrix and the classifications that produced it.
#[derive(Debug, Clone)]
pub struct ScoringRun {
    pub matrix: AssociationMatrix,
    pub truth_aoi: AoiFilterOutcome,
    pub computed_aoi: AoiFilterOutcome,
    pub matched: MatchedFrames,
    /// Span of in-AOI frames on both sides
    pub time_range: Option<TimeRange>,
}

impl ScoringRun {
    /// Ground-truth tracks that survived the AOI filter.
    pub fn truth_set<'a>(&'a self, truth: &'a [Track]) -> TrackSet<'a> {
        self.truth_aoi.kept_set(truth)
    }

    /// Computed tracks that survived the AOI filter.
    pub fn computed_set<'a>(&'a self, computed: &'a [Track]) -> TrackSet<'a> {
        self.computed_aoi.kept_set(computed)
    }

    pub fn hadwav(&self, truth: &[Track], computed: &[Track]) -> Result<HadwavReport> {
        compute_hadwav(&self.matrix, self.truth_set(truth), self.computed_set(computed))
    }

    pub fn aipr(&self, truth: &[Track], computed: &[Track]) -> AiprReport {
        compute_aipr(&self.matrix, self.truth_set(truth), self.computed_set(computed))
    }

    pub fn roc_curve(
        &self,
        truth: &[Track],
        computed: &[Track],
        params: &MatchingParams,
    ) -> Vec<RocRow> {
        compute_roc_curve(
            &self.matrix,
            self.truth_set(truth),
            self.computed_set(computed),
            params,
        )
    }

    pub fn pr_curve(
        &self,
        truth: &[Track],
        computed: &[Track],
        ordering: PrOrdering,
    ) -> Vec<PrRow> {
        compute_pr(
            &self.matrix,
            self.truth_set(truth),
            self.computed_set(computed),
            ordering,
        )
    }

    pub fn write_plot_dump<P: AsRef<Path>>(
        &self,
        prefix: P,
        truth: &[Track],
        computed: &[Track],
    ) -> Result<PlotDumpPaths> {
        write_plot_dump(
            prefix,
            &self.matrix,
            self.truth_set(truth),
            self.computed_set(computed),
        )
    }
}

/// Filter both sides on the AOI, score every candidate pair and mark matched frames.
///
/// Frame match states in both slices are overwritten by the AOI
/// classification and then advanced for matched frames.
pub fn score_tracks(
    truth: &mut [Track],
    computed: &mut [Track],
    params: &MatchingParams,
    mode: ScoringMode,
) -> Result<ScoringRun> {
    params.validate()?;

    let truth_aoi = filter_tracks_on_aoi(truth, params);
    truth_aoi.apply(truth);
    let computed_aoi = filter_tracks_on_aoi(computed, params);
    computed_aoi.apply(computed);

    let mut matrix = AssociationMatrix::new();
    let truth_set = truth_aoi.kept_set(truth);
    let computed_set = computed_aoi.kept_set(computed);
    let matched = match mode {
        ScoringMode::Track => matrix.compute_all(truth_set, computed_set, params)?,
        ScoringMode::Detection => {
            matrix.compute_all_detection_mode(truth_set, computed_set, params)?
        }
    };
    matched.apply(truth, computed);

    let time_range = match (truth_aoi.time_range, computed_aoi.time_range) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (a, b) => a.or(b),
    };

    info!(
        "Scored {} ground-truth against {} computed tracks: {} matching pairs",
        truth_aoi.kept.len(),
        computed_aoi.kept.len(),
        matrix.len()
    );

    Ok(ScoringRun {
        matrix,
        truth_aoi,
        computed_aoi,
        matched,
        time_range,
    })
}
