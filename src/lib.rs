//! # trackscore - Track-to-Track Scoring Engine
//!
//! Scores a set of computed object tracks against ground truth by matching
//! them across space and time.
//!
//! ## Features
//!
//! - AOI (pixel or geodetic) and frame-window filtering
//! - Quickfilter bounding envelopes to prune provably disjoint track pairs
//! - Timestamp alignment within a tolerance window
//! - Image-plane box overlap or geodetic (UTM) radial overlap per frame
//! - Pairwise association matrix, in full or detection mode
//! - Dominance, purity and continuity statistics ("hadwav" and "aipr" styles)
//! - ROC and precision/recall curves, plus a plot dump for external scripts
//!
//! ## Example
//!
//! ```rust,ignore
//! use trackscore_rs::{score_tracks, MatchingParams, ScoringMode};
//! use trackscore_rs::curves::{compute_roc_curve};
//!
//! let params = MatchingParams::default();
//! let run = score_tracks(&mut truth, &mut computed, &params, ScoringMode::Track)?;
//! let roc = compute_roc_curve(
//!     &run.matrix,
//!     run.truth_set(&truth),
//!     run.computed_set(&computed),
//!     &params,
//! );
//! ```

pub mod track;
pub mod geodetic;
pub mod config;
pub mod aoi;
pub mod quickfilter;
pub mod align;
pub mod overlap;
pub mod pair;
pub mod matrix;
pub mod metrics;
pub mod curves;
pub mod plot;
pub mod scoring;
pub mod synthetic;
pub mod utils;

// Re-exports for convenience
pub use track::{BoundingBox, Frame, MatchState, TimeRange, Track, TrackRole, TrackSet};
pub use geodetic::{GeoPoint, GeodeticConverter, UtmCoord, UtmZone, WgsUtmConverter};
pub use config::{FrameWindow, MatchingParams, MinFramesPolicy, PercentOverlap};
pub use aoi::{filter_tracks_on_aoi, parse_aoi, AoiFilterOutcome, AreaOfInterest};
pub use matrix::{AssociationMatrix, MatchedFrames, PairKey, PartialKey};
pub use pair::{PairScore, PairScorer};
pub use scoring::{score_tracks, ScoringMode, ScoringRun};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur while scoring tracks
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Malformed AOI '{spec}': {reason}")]
        AoiParse { spec: String, reason: String },

        #[error("Data consistency error: {0}")]
        DataConsistency(String),

        #[error(
            "Tied dominance: {role} track {track} ties {candidates:?} at {frames} frames"
        )]
        TiedDominance {
            role: &'static str,
            track: usize,
            frames: usize,
            candidates: Vec<usize>,
        },

        #[error("Sanity check failed: {0}")]
        SanityCheck(String),

        #[error("Geodetic conversion error: {0}")]
        Geodetic(String),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),

        #[error("JSON error: {0}")]
        JsonError(#[from] serde_json::Error),
    }

    /// Result type for scoring operations
    pub type Result<T> = std::result::Result<T, Error>;
}
