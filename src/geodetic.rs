//! Geodetic support: UTM zones, zone-tagged points and zone-tagged polygons.
//!
//! Points near a UTM zone boundary can be expressed in two zones. A
//! [`GeoPoint`] therefore carries up to two (zone, easting, northing)
//! candidates, each with its own validity flag. Comparisons between points
//! only ever happen inside a zone both points share.

use std::collections::BTreeSet;

use geo::{Area, ConvexHull, Intersects, MultiPoint, Point, Polygon};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
const UTM_ZONE_WIDTH_DEG: f64 = 6.0;

/// A UTM zone: number 1..=60 plus hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtmZone {
    pub number: u8,
    pub north: bool,
}

impl UtmZone {
    pub fn new(number: u8, north: bool) -> Self {
        Self { number, north }
    }

    /// Longitude of the zone's central meridian, in degrees.
    pub fn central_meridian(&self) -> f64 {
        (f64::from(self.number) - 1.0) * UTM_ZONE_WIDTH_DEG - 180.0 + UTM_ZONE_WIDTH_DEG / 2.0
    }

    fn east_neighbor(&self) -> UtmZone {
        UtmZone::new(if self.number >= 60 { 1 } else { self.number + 1 }, self.north)
    }

    fn west_neighbor(&self) -> UtmZone {
        UtmZone::new(if self.number <= 1 { 60 } else { self.number - 1 }, self.north)
    }
}

impl std::fmt::Display for UtmZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.number, if self.north { 'N' } else { 'S' })
    }
}

/// Easting/northing in one zone, with a validity flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtmCoord {
    pub zone: UtmZone,
    pub easting: f64,
    pub northing: f64,
    pub valid: bool,
}

impl UtmCoord {
    pub fn new(zone: UtmZone, easting: f64, northing: f64) -> Self {
        Self {
            zone,
            easting,
            northing,
            valid: true,
        }
    }

    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.easting, self.northing)
    }
}

/// A geodetic location expressed in up to two UTM zones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub candidates: [UtmCoord; 2],
}

impl GeoPoint {
    /// A point known in exactly one zone.
    pub fn single(zone: UtmZone, easting: f64, northing: f64) -> Self {
        let primary = UtmCoord::new(zone, easting, northing);
        let mut unused = primary;
        unused.valid = false;
        Self {
            candidates: [primary, unused],
        }
    }

    /// A point near a zone boundary, known in two zones.
    pub fn dual(first: UtmCoord, second: UtmCoord) -> Self {
        Self {
            candidates: [first, second],
        }
    }

    pub fn valid_coords(&self) -> impl Iterator<Item = &UtmCoord> {
        self.candidates.iter().filter(|c| c.valid)
    }

    pub fn valid_zones(&self) -> BTreeSet<UtmZone> {
        self.valid_coords().map(|c| c.zone).collect()
    }

    pub fn has_valid_zone(&self) -> bool {
        self.candidates.iter().any(|c| c.valid)
    }

    pub fn in_zone(&self, zone: UtmZone) -> Option<&UtmCoord> {
        self.valid_coords().find(|c| c.zone == zone)
    }

    pub fn in_zone_mut(&mut self, zone: UtmZone) -> Option<&mut UtmCoord> {
        self.candidates
            .iter_mut()
            .find(|c| c.valid && c.zone == zone)
    }

    /// Invalidate every candidate whose zone is not in `keep`.
    pub fn retain_zones(&mut self, keep: &BTreeSet<UtmZone>) {
        for candidate in &mut self.candidates {
            if !keep.contains(&candidate.zone) {
                candidate.valid = false;
            }
        }
    }

    /// Zones valid on both points, in zone order.
    pub fn common_zones(&self, other: &GeoPoint) -> Vec<UtmZone> {
        self.valid_zones()
            .intersection(&other.valid_zones())
            .copied()
            .collect()
    }

    /// The same location shifted by a planar offset in every zone.
    pub fn offset(&self, d_easting: f64, d_northing: f64) -> GeoPoint {
        let mut shifted = *self;
        for candidate in &mut shifted.candidates {
            candidate.easting += d_easting;
            candidate.northing += d_northing;
        }
        shifted
    }
}

/// Converts latitude/longitude into zone-tagged UTM points.
pub trait GeodeticConverter: Send + Sync {
    fn to_geo_point(&self, lat_deg: f64, lon_deg: f64) -> Result<GeoPoint>;
}

/// WGS84 transverse Mercator conversion.
///
/// A second candidate is produced in the neighbouring zone when the point is
/// within `boundary_band_deg` degrees of longitude of a zone edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WgsUtmConverter {
    pub boundary_band_deg: f64,
}

impl Default for WgsUtmConverter {
    fn default() -> Self {
        Self {
            boundary_band_deg: 0.5,
        }
    }
}

impl WgsUtmConverter {
    pub fn new(boundary_band_deg: f64) -> Self {
        Self { boundary_band_deg }
    }

    /// The standard zone for a location (no Norway/Svalbard exceptions).
    pub fn zone_for(lat_deg: f64, lon_deg: f64) -> UtmZone {
        let number = (((lon_deg + 180.0) / UTM_ZONE_WIDTH_DEG).floor() as i64 + 1).clamp(1, 60);
        UtmZone::new(number as u8, lat_deg >= 0.0)
    }

    /// Project a location into a given zone.
    pub fn project(lat_deg: f64, lon_deg: f64, zone: UtmZone) -> UtmCoord {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);

        let phi = lat_deg.to_radians();
        let mut dlon = lon_deg - zone.central_meridian();
        if dlon > 180.0 {
            dlon -= 360.0;
        } else if dlon < -180.0 {
            dlon += 360.0;
        }
        let lam = dlon.to_radians();

        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = cos_phi * lam;

        let m = WGS84_A
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

        let easting = UTM_K0
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
            + UTM_FALSE_EASTING;

        let mut northing = UTM_K0
            * (m + n
                * tan_phi
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
        if !zone.north {
            northing += UTM_FALSE_NORTHING_SOUTH;
        }

        UtmCoord::new(zone, easting, northing)
    }
}

impl GeodeticConverter for WgsUtmConverter {
    fn to_geo_point(&self, lat_deg: f64, lon_deg: f64) -> Result<GeoPoint> {
        if !(-80.0..=84.0).contains(&lat_deg) {
            return Err(Error::Geodetic(format!(
                "latitude {} is outside the UTM range [-80, 84]",
                lat_deg
            )));
        }
        if !(-180.0..=180.0).contains(&lon_deg) {
            return Err(Error::Geodetic(format!(
                "longitude {} is outside [-180, 180]",
                lon_deg
            )));
        }

        let zone = Self::zone_for(lat_deg, lon_deg);
        let primary = Self::project(lat_deg, lon_deg, zone);

        let offset_in_zone = (lon_deg + 180.0).rem_euclid(UTM_ZONE_WIDTH_DEG);
        let neighbor = if offset_in_zone < self.boundary_band_deg {
            Some(zone.west_neighbor())
        } else if offset_in_zone > UTM_ZONE_WIDTH_DEG - self.boundary_band_deg {
            Some(zone.east_neighbor())
        } else {
            None
        };

        Ok(match neighbor {
            Some(other) => GeoPoint::dual(primary, Self::project(lat_deg, lon_deg, other)),
            None => GeoPoint::single(zone, primary.easting, primary.northing),
        })
    }
}

/// A convex polygon expressed in one UTM zone.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRegion {
    pub zone: UtmZone,
    pub polygon: Polygon<f64>,
}

impl GeoRegion {
    /// Convex hull of `(easting, northing)` points in `zone`.
    pub fn from_hull(zone: UtmZone, points: &[(f64, f64)]) -> Self {
        let cloud: MultiPoint<f64> = points.iter().map(|&(x, y)| Point::new(x, y)).collect();
        Self {
            zone,
            polygon: cloud.convex_hull(),
        }
    }

    /// Boundary points count as inside.
    pub fn contains_coord(&self, coord: &UtmCoord) -> bool {
        coord.valid
            && coord.zone == self.zone
            && self
                .polygon
                .intersects(&Point::new(coord.easting, coord.northing))
    }

    /// True when any valid candidate of `point` lies in the region.
    pub fn contains_point(&self, point: &GeoPoint) -> bool {
        point.valid_coords().any(|c| self.contains_coord(c))
    }

    /// Area in square meters.
    pub fn area(&self) -> f64 {
        self.polygon.unsigned_area()
    }
}
