//! Deterministic synthetic tracks for tests and benchmarks.

use crate::geodetic::GeoPoint;
use crate::track::{BoundingBox, Frame, Track, TrackRole};

/// Builds tracks on a fixed frame clock.
///
/// Frame `n` is stamped `start_usecs + n * period_usecs` and carries frame number `n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSynthesizer {
    pub period_usecs: u64,
    pub start_usecs: u64,
}

impl Default for TrackSynthesizer {
    /// 30 frames per second starting at zero.
    fn default() -> Self {
        Self {
            period_usecs: 33_333,
            start_usecs: 0,
        }
    }
}

impl TrackSynthesizer {
    pub fn new(period_usecs: u64) -> Self {
        Self {
            period_usecs,
            start_usecs: 0,
        }
    }

    pub fn with_start(mut self, start_usecs: u64) -> Self {
        self.start_usecs = start_usecs;
        self
    }

    pub fn timestamp(&self, frame_number: u32) -> u64 {
        self.start_usecs + u64::from(frame_number) * self.period_usecs
    }

    fn frame(&self, frame_number: u32) -> Frame {
        Frame::new(self.timestamp(frame_number)).with_frame_number(frame_number)
    }

    /// A box moving at constant velocity (pixels per frame) over `frames`.
    pub fn box_track(
        &self,
        role: TrackRole,
        external_id: Option<u32>,
        frames: std::ops::Range<u32>,
        start: BoundingBox,
        velocity: (f64, f64),
    ) -> Track {
        let first = frames.start;
        let frames = frames
            .map(|n| {
                let dt = f64::from(n - first);
                let bbox = BoundingBox::new(
                    start.min_x + velocity.0 * dt,
                    start.min_y + velocity.1 * dt,
                    start.max_x + velocity.0 * dt,
                    start.max_y + velocity.1 * dt,
                );
                self.frame(n).with_bbox(bbox)
            })
            .collect();
        Track::new(role, external_id, frames)
    }

    pub fn ground_truth_boxes(
        &self,
        external_id: u32,
        frames: std::ops::Range<u32>,
        start: BoundingBox,
        velocity: (f64, f64),
    ) -> Track {
        self.box_track(
            TrackRole::GroundTruth,
            Some(external_id),
            frames,
            start,
            velocity,
        )
    }

    pub fn computed_boxes(
        &self,
        external_id: u32,
        relevancy: f64,
        frames: std::ops::Range<u32>,
        start: BoundingBox,
        velocity: (f64, f64),
    ) -> Track {
        let mut track = self.box_track(
            TrackRole::Computed,
            Some(external_id),
            frames,
            start,
            velocity,
        );
        track.relevancy = relevancy;
        track
    }

    /// A geodetic point moving at constant velocity (meters per frame, east/north).
    pub fn geo_track(
        &self,
        role: TrackRole,
        external_id: Option<u32>,
        frames: std::ops::Range<u32>,
        origin: GeoPoint,
        velocity: (f64, f64),
    ) -> Track {
        let first = frames.start;
        let frames = frames
            .map(|n| {
                let dt = f64::from(n - first);
                self.frame(n)
                    .with_geo(origin.offset(velocity.0 * dt, velocity.1 * dt))
            })
            .collect();
        Track::new(role, external_id, frames)
    }

    /// Split a track into single-frame computed tracks, one per frame.
    pub fn detections(&self, track: &Track, relevancy: f64) -> Vec<Track> {
        track
            .frames
            .iter()
            .map(|frame| {
                let mut frame = frame.clone();
                frame.match_state = Default::default();
                Track::computed(track.external_id, relevancy, vec![frame])
            })
            .collect()
    }
}
