//! Area-of-interest parsing and track/frame AOI filtering.

use log::{debug, info};

use crate::config::MatchingParams;
use crate::geodetic::{GeoPoint, GeoRegion, GeodeticConverter};
use crate::track::{BoundingBox, Frame, MatchState, TimeRange, Track, TrackSet};
use crate::{Error, Result};

/// Region gating which frames take part in scoring.
#[derive(Debug, Clone, PartialEq)]
pub enum AreaOfInterest {
    /// Rectangle in image coordinates.
    Pixel(BoundingBox),
    /// One convex polygon per UTM zone the AOI corners share.
    Geodetic(Vec<GeoRegion>),
}

impl AreaOfInterest {
    /// Geometric membership of a frame, or `None` when the frame lacks the
    /// field this AOI tests (the filter then does not apply).
    pub fn contains_frame(&self, frame: &Frame) -> Option<bool> {
        match self {
            AreaOfInterest::Pixel(rect) => frame.bbox.map(|b| b.intersects(rect)),
            AreaOfInterest::Geodetic(_) => frame.geo.as_ref().map(|g| self.contains_geo(g)),
        }
    }

    /// Whether a point falls in any zone's polygon. Always false for pixel AOIs.
    pub fn contains_geo(&self, point: &GeoPoint) -> bool {
        match self {
            AreaOfInterest::Pixel(_) => false,
            AreaOfInterest::Geodetic(regions) => regions.iter().any(|r| r.contains_point(point)),
        }
    }

    /// Area in pixels² or m² (largest zone polygon).
    pub fn area(&self) -> f64 {
        match self {
            AreaOfInterest::Pixel(rect) => rect.area(),
            AreaOfInterest::Geodetic(regions) => {
                regions.iter().map(GeoRegion::area).fold(0.0, f64::max)
            }
        }
    }
}

fn aoi_error(spec: &str, reason: impl Into<String>) -> Error {
    Error::AoiParse {
        spec: spec.to_string(),
        reason: reason.into(),
    }
}

fn parse_number(spec: &str, field: &str) -> Result<f64> {
    let value: f64 = field
        .trim()
        .parse()
        .map_err(|_| aoi_error(spec, format!("'{}' is not a number", field)))?;
    if !value.is_finite() {
        return Err(aoi_error(spec, format!("'{}' is not finite", field)));
    }
    Ok(value)
}

/// Parse an AOI specification.
///
/// Accepted forms:
/// * `"WxH+x+y"` - pixel rectangle
/// * `"lon,lat:lon,lat"` - two geodetic corners of a lon/lat box
/// * `"lon,lat:lon,lat:lon,lat:lon,lat"` - four geodetic corners
pub fn parse_aoi(spec: &str, converter: &dyn GeodeticConverter) -> Result<AreaOfInterest> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(aoi_error(spec, "empty specification"));
    }

    if trimmed.contains(',') {
        parse_geodetic_aoi(spec, trimmed, converter)
    } else {
        parse_pixel_aoi(spec, trimmed)
    }
}

fn parse_pixel_aoi(spec: &str, trimmed: &str) -> Result<AreaOfInterest> {
    let (width, rest) = trimmed
        .split_once('x')
        .ok_or_else(|| aoi_error(spec, "expected WxH+x+y"))?;
    let fields: Vec<&str> = rest.split('+').collect();
    if fields.len() != 3 {
        return Err(aoi_error(spec, "expected WxH+x+y"));
    }

    let width = parse_number(spec, width)?;
    let height = parse_number(spec, fields[0])?;
    let x = parse_number(spec, fields[1])?;
    let y = parse_number(spec, fields[2])?;

    if width <= 0.0 || height <= 0.0 {
        return Err(aoi_error(spec, "width and height must be positive"));
    }

    Ok(AreaOfInterest::Pixel(BoundingBox::from_xywh(x, y, width, height)))
}

fn parse_geodetic_aoi(
    spec: &str,
    trimmed: &str,
    converter: &dyn GeodeticConverter,
) -> Result<AreaOfInterest> {
    let mut lon_lat = Vec::new();
    for group in trimmed.split(':') {
        let (lon, lat) = group
            .split_once(',')
            .ok_or_else(|| aoi_error(spec, format!("corner '{}' must be lon,lat", group)))?;
        lon_lat.push((parse_number(spec, lon)?, parse_number(spec, lat)?));
    }

    let corners = match lon_lat.len() {
        2 => {
            let ((lon1, lat1), (lon2, lat2)) = (lon_lat[0], lon_lat[1]);
            vec![(lon1, lat1), (lon2, lat1), (lon2, lat2), (lon1, lat2)]
        }
        4 => lon_lat,
        n => {
            return Err(aoi_error(
                spec,
                format!("expected 2 or 4 corners, got {}", n),
            ))
        }
    };

    let points = corners
        .iter()
        .map(|&(lon, lat)| converter.to_geo_point(lat, lon))
        .collect::<Result<Vec<GeoPoint>>>()?;

    // One hull per zone in which all four corners are expressible.
    let mut regions = Vec::new();
    for zone in points[0].valid_zones() {
        let in_zone: Option<Vec<(f64, f64)>> = points
            .iter()
            .map(|p| p.in_zone(zone).map(|c| (c.easting, c.northing)))
            .collect();
        match in_zone {
            Some(hull_points) => regions.push(GeoRegion::from_hull(zone, &hull_points)),
            None => debug!("AOI corners do not share zone {}; dropping it", zone),
        }
    }

    if regions.is_empty() {
        return Err(aoi_error(spec, "corners share no common UTM zone"));
    }

    Ok(AreaOfInterest::Geodetic(regions))
}

/// Result of AOI filtering: which tracks survive and how each frame is classified.
///
/// Nothing is written to the tracks until [`AoiFilterOutcome::apply`] is called.
#[derive(Debug, Clone, PartialEq)]
pub struct AoiFilterOutcome {
    /// Indices of kept tracks, in input order.
    pub kept: Vec<usize>,
    /// Span of in-AOI frame timestamps over all tracks.
    pub time_range: Option<TimeRange>,
    /// Per track, per frame classification.
    pub frame_states: Vec<Vec<MatchState>>,
    /// Per track in-AOI frame counts.
    pub frames_in_aoi: Vec<usize>,
}

impl AoiFilterOutcome {
    /// Write frame states and AOI counters into the tracks.
    ///
    /// This starts a new matching run, so states are overwritten rather than advanced.
    pub fn apply(&self, tracks: &mut [Track]) {
        for ((track, states), count) in tracks
            .iter_mut()
            .zip(&self.frame_states)
            .zip(&self.frames_in_aoi)
        {
            for (frame, state) in track.frames.iter_mut().zip(states) {
                frame.match_state = *state;
            }
            track.frames_in_aoi = *count;
        }
    }

    /// The kept tracks as a selection over `tracks`.
    pub fn kept_set<'a>(&'a self, tracks: &'a [Track]) -> TrackSet<'a> {
        TrackSet::subset(tracks, &self.kept)
    }
}

/// Whether one frame passes the frame window and the AOI.
pub fn frame_passes(frame: &Frame, params: &MatchingParams) -> bool {
    if !params.frame_in_window(frame) {
        return false;
    }
    match &params.aoi {
        None => true,
        Some(aoi) => aoi
            .contains_frame(frame)
            .map_or(true, |inside| params.aoi_accepts(inside)),
    }
}

/// Classify every frame and keep tracks with at least one in-AOI frame.
pub fn filter_tracks_on_aoi(tracks: &[Track], params: &MatchingParams) -> AoiFilterOutcome {
    let mut outcome = AoiFilterOutcome {
        kept: Vec::with_capacity(tracks.len()),
        time_range: None,
        frame_states: Vec::with_capacity(tracks.len()),
        frames_in_aoi: Vec::with_capacity(tracks.len()),
    };

    if params.is_unrestricted() {
        for (index, track) in tracks.iter().enumerate() {
            outcome
                .frame_states
                .push(vec![MatchState::InAoiUnmatched; track.len()]);
            outcome.frames_in_aoi.push(track.len());
            outcome.kept.push(index);
            if let Some(range) = track.time_range() {
                outcome.time_range = Some(match outcome.time_range {
                    Some(r) => r.union(&range),
                    None => range,
                });
            }
        }
        return outcome;
    }

    for (index, track) in tracks.iter().enumerate() {
        let mut states = Vec::with_capacity(track.len());
        let mut in_aoi = 0;
        for frame in &track.frames {
            if frame_passes(frame, params) {
                states.push(MatchState::InAoiUnmatched);
                in_aoi += 1;
                match outcome.time_range.as_mut() {
                    Some(range) => range.extend(frame.timestamp_usecs),
                    None => outcome.time_range = Some(TimeRange::instant(frame.timestamp_usecs)),
                }
            } else {
                states.push(MatchState::OutsideAoi);
            }
        }

        if in_aoi > 0 {
            outcome.kept.push(index);
        }
        outcome.frame_states.push(states);
        outcome.frames_in_aoi.push(in_aoi);
    }

    info!(
        "AOI filter kept {} of {} tracks",
        outcome.kept.len(),
        tracks.len()
    );
    outcome
}
