//! Per-frame geometric overlap and the acceptance policy.

use nalgebra::distance;
use serde::Serialize;

use crate::aoi::AreaOfInterest;
use crate::config::{MatchingParams, PercentOverlap};
use crate::track::{BoundingBox, Frame};

/// An aligned ground-truth/computed frame pair.
#[derive(Debug, Clone, Copy)]
pub struct FramePair<'a> {
    pub truth_index: usize,
    pub truth: &'a Frame,
    pub computed_index: usize,
    pub computed: &'a Frame,
}

/// Geometric comparison of one aligned frame pair.
///
/// Areas and distances stay `None` until a non-empty overlap populates them.
/// In radial mode the area fields are always `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameOverlapRecord {
    pub truth_frame: usize,
    pub computed_frame: usize,
    pub truth_frame_number: Option<u32>,
    pub computed_frame_number: Option<u32>,
    pub truth_timestamp: u64,
    pub computed_timestamp: u64,
    pub truth_area: Option<f64>,
    pub computed_area: Option<f64>,
    pub overlap_area: f64,
    pub centroid_distance: Option<f64>,
    pub bottom_distance: Option<f64>,
    pub in_aoi: bool,
}

impl FrameOverlapRecord {
    fn blank(pair: &FramePair<'_>) -> Self {
        Self {
            truth_frame: pair.truth_index,
            computed_frame: pair.computed_index,
            truth_frame_number: pair.truth.frame_number,
            computed_frame_number: pair.computed.frame_number,
            truth_timestamp: pair.truth.timestamp_usecs,
            computed_timestamp: pair.computed.timestamp_usecs,
            truth_area: None,
            computed_area: None,
            overlap_area: 0.0,
            centroid_distance: None,
            bottom_distance: None,
            in_aoi: false,
        }
    }

    /// No spatial overlap, or (radial) no comparable positions.
    pub fn is_empty(&self, radial: bool) -> bool {
        if radial {
            self.centroid_distance.is_none()
        } else {
            self.overlap_area <= 0.0
        }
    }

    /// Intersection over union; `None` when the union is zero or areas are unset.
    pub fn iou(&self) -> Option<f64> {
        let union = self.truth_area? + self.computed_area? - self.overlap_area;
        if union > 0.0 {
            Some(self.overlap_area / union)
        } else {
            None
        }
    }
}

fn expand(bbox: BoundingBox, params: &MatchingParams) -> BoundingBox {
    match params.bbox_expansion {
        Some(amount) => bbox.expanded(amount),
        None => bbox,
    }
}

/// Box overlap in the image plane.
///
/// Returns `None` when either frame has no bounding box.
pub fn compute_spatial_overlap(
    pair: &FramePair<'_>,
    params: &MatchingParams,
) -> Option<FrameOverlapRecord> {
    let truth_box = expand(pair.truth.bbox?, params);
    let computed_box = expand(pair.computed.bbox?, params);

    let mut record = FrameOverlapRecord::blank(pair);
    record.in_aoi = match &params.aoi {
        None => true,
        Some(AreaOfInterest::Pixel(rect)) => {
            truth_box.intersects(rect) && computed_box.intersects(rect)
        }
        Some(aoi) => [pair.truth, pair.computed]
            .iter()
            .all(|f| aoi.contains_frame(f).unwrap_or(true)),
    };

    if let Some(intersection) = truth_box.intersection(&computed_box) {
        record.overlap_area = intersection.area();
        record.truth_area = Some(truth_box.area());
        record.computed_area = Some(computed_box.area());
        record.centroid_distance = Some(distance(&truth_box.centroid(), &computed_box.centroid()));
        record.bottom_distance = Some(distance(
            &truth_box.bottom_center(),
            &computed_box.bottom_center(),
        ));
    }

    Some(record)
}

/// Geodetic distance between the two frames' points in a shared UTM zone.
///
/// Returns `None` when either frame has no geodetic point. Without a shared
/// zone the record is out of the AOI and carries no distance.
pub fn compute_radial_overlap(
    pair: &FramePair<'_>,
    params: &MatchingParams,
) -> Option<FrameOverlapRecord> {
    let truth_geo = pair.truth.geo.as_ref()?;
    let computed_geo = pair.computed.geo.as_ref()?;

    let mut record = FrameOverlapRecord::blank(pair);
    let common = truth_geo.common_zones(computed_geo);
    let Some(&zone) = common.first() else {
        return Some(record);
    };

    if let (Some(t), Some(c)) = (truth_geo.in_zone(zone), computed_geo.in_zone(zone)) {
        record.centroid_distance = Some(distance(&t.position(), &c.position()));
    }

    record.in_aoi = match &params.aoi {
        Some(AreaOfInterest::Geodetic(regions)) => common.iter().any(|z| {
            regions.iter().filter(|r| r.zone == *z).any(|r| {
                truth_geo.in_zone(*z).map_or(false, |t| r.contains_coord(t))
                    && computed_geo.in_zone(*z).map_or(false, |c| r.contains_coord(c))
            })
        }),
        _ => true,
    };

    Some(record)
}

/// Outcome of the acceptance test for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Strong,
    Weak,
}

/// The single active rule deciding whether an overlap is strong.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceptancePolicy {
    /// Centroid distance at most `radius` meters.
    Radial { radius: f64 },
    /// Overlap area as a percentage of the configured side(s).
    PercentOverlap(PercentOverlap),
    /// Intersection over union at least this value.
    Iou(f64),
    /// Overlap area at least this many pixels².
    MinArea(f64),
}

impl AcceptancePolicy {
    pub fn classify(&self, record: &FrameOverlapRecord) -> Strength {
        let strong = match *self {
            AcceptancePolicy::Radial { radius } => {
                record.centroid_distance.map_or(false, |d| d <= radius)
            }
            AcceptancePolicy::PercentOverlap(pct) => {
                side_passes(record.overlap_area, record.truth_area, pct.truth)
                    && side_passes(record.overlap_area, record.computed_area, pct.computed)
            }
            AcceptancePolicy::Iou(threshold) => record.iou().map_or(false, |iou| iou >= threshold),
            AcceptancePolicy::MinArea(min_area) => record.overlap_area >= min_area,
        };
        if strong {
            Strength::Strong
        } else {
            Strength::Weak
        }
    }
}

fn side_passes(overlap: f64, area: Option<f64>, min_percent: Option<f64>) -> bool {
    let Some(min_percent) = min_percent else {
        return true;
    };
    match area {
        Some(area) if area > 0.0 => overlap / area * 100.0 >= min_percent,
        _ => false,
    }
}
