//! Per-track bounding envelopes for cheap pairwise disjointness tests.
//!
//! A track pair whose envelopes are strictly separated can never produce an
//! overlapping frame, so the pair scorer skips alignment entirely. When the
//! envelopes cannot be compared (unset, different coordinate systems, or no
//! shared UTM zone) the verdict is [`QuickfilterVerdict::Unknown`] and the
//! full comparison runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::MatchingParams;
use crate::geodetic::{GeoPoint, UtmZone};
use crate::track::{BoundingBox, Track, TrackSet};
use crate::{Error, Result};

/// Southwest/northeast corners of a track's geodetic extent.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoEnvelope {
    sw: GeoPoint,
    ne: GeoPoint,
    valid: bool,
}

impl GeoEnvelope {
    pub fn new(point: GeoPoint) -> Self {
        let valid = point.has_valid_zone();
        Self {
            sw: point,
            ne: point,
            valid,
        }
    }

    pub fn sw(&self) -> &GeoPoint {
        &self.sw
    }

    pub fn ne(&self) -> &GeoPoint {
        &self.ne
    }

    /// Once false, stays false.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Widen the envelope to cover `point`.
    pub fn incorporate(&mut self, point: GeoPoint) -> Result<()> {
        if !self.valid {
            return Ok(());
        }
        let mut point = point;
        if !incorporate_geodetic_point(&mut self.sw, &mut self.ne, &mut point)? {
            self.valid = false;
        }
        Ok(())
    }

    /// Zones valid on both corners.
    pub fn zones(&self) -> BTreeSet<UtmZone> {
        self.sw
            .valid_zones()
            .intersection(&self.ne.valid_zones())
            .copied()
            .collect()
    }

    fn rect_in_zone(&self, zone: UtmZone) -> Option<BoundingBox> {
        let sw = self.sw.in_zone(zone)?;
        let ne = self.ne.in_zone(zone)?;
        Some(BoundingBox::new(sw.easting, sw.northing, ne.easting, ne.northing))
    }
}

const ROLE_NEW: usize = 0;
const ROLE_SOUTHWEST: usize = 1;
const ROLE_NORTHEAST: usize = 2;

/// Reconcile the zones of `new`, `sw` and `ne` and widen the corners.
///
/// Only zones in which all three points are expressible survive; other
/// candidates are invalidated on each point. Returns `Ok(false)` when a point
/// is left without any valid zone, meaning the envelope can no longer be
/// trusted.
pub fn incorporate_geodetic_point(
    sw: &mut GeoPoint,
    ne: &mut GeoPoint,
    new: &mut GeoPoint,
) -> Result<bool> {
    let mut roles_seen: BTreeMap<UtmZone, [bool; 3]> = BTreeMap::new();
    for (role, point) in [(ROLE_NEW, &*new), (ROLE_SOUTHWEST, &*sw), (ROLE_NORTHEAST, &*ne)] {
        for zone in point.valid_zones() {
            roles_seen.entry(zone).or_default()[role] = true;
        }
    }

    let common: BTreeSet<UtmZone> = roles_seen
        .into_iter()
        .filter(|(_, seen)| seen.iter().all(|&s| s))
        .map(|(zone, _)| zone)
        .collect();

    new.retain_zones(&common);
    sw.retain_zones(&common);
    ne.retain_zones(&common);

    if !new.has_valid_zone() || !sw.has_valid_zone() || !ne.has_valid_zone() {
        return Ok(false);
    }

    let mut widened = false;
    for &zone in &common {
        let Some(p) = new.in_zone(zone).copied() else {
            continue;
        };
        let mut sw_done = false;
        if let Some(corner) = sw.in_zone_mut(zone) {
            corner.easting = corner.easting.min(p.easting);
            corner.northing = corner.northing.min(p.northing);
            sw_done = true;
        }
        let mut ne_done = false;
        if let Some(corner) = ne.in_zone_mut(zone) {
            corner.easting = corner.easting.max(p.easting);
            corner.northing = corner.northing.max(p.northing);
            ne_done = true;
        }
        widened |= sw_done && ne_done;
    }

    if !widened {
        return Err(Error::DataConsistency(format!(
            "zones {:?} are common to the envelope and the new point but no corner was widened",
            common
        )));
    }
    Ok(true)
}

/// A track's bounding envelope in whichever coordinate system it was built.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum QuickfilterEnvelope {
    #[default]
    Unset,
    Image(BoundingBox),
    Geodetic(GeoEnvelope),
}

impl QuickfilterEnvelope {
    /// Build the envelope of a whole track.
    ///
    /// Image mode unions (expanded) frame boxes. Radial mode turns every
    /// geodetic point into a square of half-width `radial_overlap` and
    /// incorporates its four corners.
    pub fn from_track(track: &Track, params: &MatchingParams) -> Result<Self> {
        let mut envelope = QuickfilterEnvelope::Unset;
        if params.use_radial() {
            let r = params.radial_overlap;
            for geo in track.frames.iter().filter_map(|f| f.geo.as_ref()) {
                for (de, dn) in [(-r, -r), (r, -r), (r, r), (-r, r)] {
                    envelope.add_geo_point(geo.offset(de, dn))?;
                }
            }
        } else {
            for bbox in track.frames.iter().filter_map(|f| f.bbox) {
                let bbox = match params.bbox_expansion {
                    Some(amount) => bbox.expanded(amount),
                    None => bbox,
                };
                envelope.add_box(&bbox);
            }
        }
        Ok(envelope)
    }

    fn add_box(&mut self, bbox: &BoundingBox) {
        let merged = match self {
            QuickfilterEnvelope::Image(current) => current.union(bbox),
            _ => *bbox,
        };
        *self = QuickfilterEnvelope::Image(merged);
    }

    fn add_geo_point(&mut self, point: GeoPoint) -> Result<()> {
        match self {
            QuickfilterEnvelope::Geodetic(envelope) => envelope.incorporate(point),
            _ => {
                *self = QuickfilterEnvelope::Geodetic(GeoEnvelope::new(point));
                Ok(())
            }
        }
    }
}

/// Outcome of comparing two envelopes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuickfilterVerdict {
    /// Envelopes are not comparable; run the full comparison.
    Unknown,
    /// Strictly separated; no frame pair can overlap.
    Disjoint,
    /// Envelopes touch or overlap with this intersection area.
    Overlap(f64),
}

/// Compare two envelopes in the coordinate system selected by `use_radial`.
pub fn query(
    a: &QuickfilterEnvelope,
    b: &QuickfilterEnvelope,
    use_radial: bool,
) -> QuickfilterVerdict {
    match (a, b) {
        (QuickfilterEnvelope::Image(x), QuickfilterEnvelope::Image(y)) if !use_radial => {
            rect_verdict(x, y)
        }
        (QuickfilterEnvelope::Geodetic(x), QuickfilterEnvelope::Geodetic(y)) if use_radial => {
            if !x.is_valid() || !y.is_valid() {
                return QuickfilterVerdict::Unknown;
            }
            let Some(zone) = x.zones().intersection(&y.zones()).next().copied() else {
                return QuickfilterVerdict::Unknown;
            };
            match (x.rect_in_zone(zone), y.rect_in_zone(zone)) {
                (Some(rx), Some(ry)) => rect_verdict(&rx, &ry),
                _ => QuickfilterVerdict::Unknown,
            }
        }
        _ => QuickfilterVerdict::Unknown,
    }
}

fn rect_verdict(a: &BoundingBox, b: &BoundingBox) -> QuickfilterVerdict {
    if a.is_disjoint(b) {
        QuickfilterVerdict::Disjoint
    } else {
        QuickfilterVerdict::Overlap(a.intersection_area(b))
    }
}

/// Envelopes for one side's tracks, keyed by track index.
#[derive(Debug, Clone, Default)]
pub struct QuickfilterIndex {
    envelopes: HashMap<usize, QuickfilterEnvelope>,
}

impl QuickfilterIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build envelopes for every selected track.
    pub fn build(set: TrackSet<'_>, params: &MatchingParams) -> Result<Self> {
        let mut index = Self::new();
        for (i, track) in set.iter() {
            index.add_track(i, track, params)?;
        }
        Ok(index)
    }

    pub fn add_track(
        &mut self,
        index: usize,
        track: &Track,
        params: &MatchingParams,
    ) -> Result<()> {
        let envelope = QuickfilterEnvelope::from_track(track, params)?;
        self.envelopes.insert(index, envelope);
        Ok(())
    }

    pub fn envelope(&self, index: usize) -> Option<&QuickfilterEnvelope> {
        self.envelopes.get(&index)
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    /// Compare track `a` of this index with track `b` of `other`.
    pub fn query(
        &self,
        a: usize,
        other: &QuickfilterIndex,
        b: usize,
        use_radial: bool,
    ) -> QuickfilterVerdict {
        match (self.envelope(a), other.envelope(b)) {
            (Some(x), Some(y)) => query(x, y, use_radial),
            _ => QuickfilterVerdict::Unknown,
        }
    }
}
