//! Track and frame data model.
//!
//! Tracks are created by the caller (usually a file loader). The scoring engine
//! only reads them, except for frame match states and AOI counters, which are
//! written back through explicit outcome values (see [`crate::aoi::AoiFilterOutcome`]
//! and [`crate::matrix::MatchedFrames`]).

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::geodetic::GeoPoint;

/// Axis-aligned bounding box in image coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a box from two corners, normalizing their order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// Create a box from its top-left corner and size.
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max_y - self.min_y).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn centroid(&self) -> Point2<f64> {
        Point2::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Center of the bottom edge (the "foot point" of an upright target).
    pub fn bottom_center(&self) -> Point2<f64> {
        Point2::new((self.min_x + self.max_x) / 2.0, self.max_y)
    }

    /// Grow the box by `amount` on every side. Negative amounts shrink it.
    pub fn expanded(&self, amount: f64) -> Self {
        Self::new(
            self.min_x - amount,
            self.min_y - amount,
            self.max_x + amount,
            self.max_y + amount,
        )
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Intersection with strictly positive area, or `None`.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let min_x = self.min_x.max(other.min_x);
        let min_y = self.min_y.max(other.min_y);
        let max_x = self.max_x.min(other.max_x);
        let max_y = self.max_y.min(other.max_y);

        if max_x > min_x && max_y > min_y {
            Some(BoundingBox {
                min_x,
                min_y,
                max_x,
                max_y,
            })
        } else {
            None
        }
    }

    /// Area of the intersection (zero when the boxes only touch or are apart).
    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        self.intersection(other).map_or(0.0, |b| b.area())
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.intersection(other).is_some()
    }

    /// True only when the boxes are strictly separated along some axis.
    ///
    /// Touching boxes are not disjoint.
    pub fn is_disjoint(&self, other: &BoundingBox) -> bool {
        self.max_x < other.min_x
            || other.max_x < self.min_x
            || self.max_y < other.min_y
            || other.max_y < self.min_y
    }
}

/// Per-frame matching state. Ordered so that transitions only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchState {
    OutsideAoi,
    #[default]
    InAoiUnmatched,
    InAoiMatched,
}

impl MatchState {
    /// Move forward to `next`; never moves backward.
    pub fn advance(&mut self, next: MatchState) {
        if next > *self {
            *self = next;
        }
    }
}

/// A single observation of a tracked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub timestamp_usecs: u64,
    pub frame_number: Option<u32>,
    pub bbox: Option<BoundingBox>,
    pub geo: Option<GeoPoint>,
    #[serde(default)]
    pub match_state: MatchState,
}

impl Frame {
    pub fn new(timestamp_usecs: u64) -> Self {
        Self {
            timestamp_usecs,
            frame_number: None,
            bbox: None,
            geo: None,
            match_state: MatchState::default(),
        }
    }

    pub fn with_frame_number(mut self, frame_number: u32) -> Self {
        self.frame_number = Some(frame_number);
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_geo(mut self, geo: GeoPoint) -> Self {
        self.geo = Some(geo);
        self
    }

    pub fn is_in_aoi(&self) -> bool {
        self.match_state != MatchState::OutsideAoi
    }
}

/// Which side of the evaluation a track belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackRole {
    GroundTruth,
    Computed,
}

/// An ordered collection of frames for one object.
///
/// Frames are kept in the caller's order, which need not be time-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub external_id: Option<u32>,
    pub role: TrackRole,
    /// Detector confidence; only meaningful for computed tracks.
    pub relevancy: f64,
    pub rank: Option<u32>,
    pub frames: Vec<Frame>,
    /// Number of frames inside the AOI, as of the last applied AOI filter.
    pub frames_in_aoi: usize,
}

impl Track {
    pub fn new(role: TrackRole, external_id: Option<u32>, frames: Vec<Frame>) -> Self {
        let frames_in_aoi = frames.iter().filter(|f| f.is_in_aoi()).count();
        Self {
            external_id,
            role,
            relevancy: 0.0,
            rank: None,
            frames,
            frames_in_aoi,
        }
    }

    pub fn ground_truth(external_id: Option<u32>, frames: Vec<Frame>) -> Self {
        Self::new(TrackRole::GroundTruth, external_id, frames)
    }

    pub fn computed(external_id: Option<u32>, relevancy: f64, frames: Vec<Frame>) -> Self {
        let mut track = Self::new(TrackRole::Computed, external_id, frames);
        track.relevancy = relevancy;
        track
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Identifier used in reports: the external id, or the index in its set.
    pub fn label(&self, index: usize) -> u64 {
        self.external_id.map_or(index as u64, u64::from)
    }

    /// Time span over all frames.
    pub fn time_range(&self) -> Option<TimeRange> {
        self.frames
            .iter()
            .map(|f| TimeRange::instant(f.timestamp_usecs))
            .reduce(|a, b| a.union(&b))
    }

    pub fn first_timestamp(&self) -> Option<u64> {
        self.frames.iter().map(|f| f.timestamp_usecs).min()
    }

    /// Frames currently classified as inside the AOI.
    pub fn in_aoi_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_in_aoi()).count()
    }

    /// Frames in timestamp order. Ties keep their sequence order.
    pub fn sorted_timeline(&self) -> Vec<TimedFrame> {
        let mut timeline: Vec<TimedFrame> = self
            .frames
            .iter()
            .enumerate()
            .map(|(index, f)| TimedFrame {
                timestamp_usecs: f.timestamp_usecs,
                index,
            })
            .collect();
        timeline.sort_by_key(|t| (t.timestamp_usecs, t.index));
        timeline
    }

    /// Put every frame back to the default state before a new run.
    pub fn reset_match_states(&mut self) {
        for frame in &mut self.frames {
            frame.match_state = MatchState::default();
        }
        self.frames_in_aoi = self.frames.len();
    }
}

/// A frame's timestamp and its position in the owning track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedFrame {
    pub timestamp_usecs: u64,
    pub index: usize,
}

/// Closed interval of timestamps in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: u64,
    pub end: u64,
}

impl TimeRange {
    pub fn new(a: u64, b: u64) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn instant(t: u64) -> Self {
        Self { start: t, end: t }
    }

    pub fn extend(&mut self, t: u64) {
        self.start = self.start.min(t);
        self.end = self.end.max(t);
    }

    pub fn union(&self, other: &TimeRange) -> TimeRange {
        TimeRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Closed-interval overlap test.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn duration(&self) -> u64 {
        self.end - self.start
    }

    /// Widen both ends by `tolerance`, saturating at the u64 bounds.
    pub fn widened(&self, tolerance: u64) -> TimeRange {
        TimeRange {
            start: self.start.saturating_sub(tolerance),
            end: self.end.saturating_add(tolerance),
        }
    }
}

/// A borrowed track slice plus an optional selection of indices.
///
/// Track identity throughout the engine is the index into `tracks`, so a
/// selection (e.g. the AOI filter's kept set) never renumbers tracks.
#[derive(Debug, Clone, Copy)]
pub struct TrackSet<'a> {
    tracks: &'a [Track],
    selected: Option<&'a [usize]>,
}

impl<'a> TrackSet<'a> {
    pub fn all(tracks: &'a [Track]) -> Self {
        Self {
            tracks,
            selected: None,
        }
    }

    pub fn subset(tracks: &'a [Track], selected: &'a [usize]) -> Self {
        Self {
            tracks,
            selected: Some(selected),
        }
    }

    pub fn tracks(&self) -> &'a [Track] {
        self.tracks
    }

    /// Selected indices that are in range, in selection order.
    pub fn indices(&self) -> Vec<usize> {
        match self.selected {
            Some(selected) => selected
                .iter()
                .copied()
                .filter(|&i| i < self.tracks.len())
                .collect(),
            None => (0..self.tracks.len()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.indices().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&'a Track> {
        self.tracks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a Track)> + '_ {
        let tracks = self.tracks;
        self.indices().into_iter().map(move |i| (i, &tracks[i]))
    }

    /// Union of the selected tracks' time spans.
    pub fn time_range(&self) -> Option<TimeRange> {
        self.iter()
            .filter_map(|(_, t)| t.time_range())
            .reduce(|a, b| a.union(&b))
    }
}
