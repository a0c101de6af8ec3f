/*!
 * Geographic calculations.
 *
 * Everything here uses a spherical Earth. At the scale of a launch site (a few hundred meters)
 * the error compared to an ellipsoid is far smaller than the scatter in the predictions.
 */

use std::fmt::{self, Display};

/// Mean radius of the Earth in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0090;

const DEG2RAD: f64 = 2.0 * std::f64::consts::PI / 360.0;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    /// Check that the latitude and longitude are finite and in their valid ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Test whether two coordinates are within `eps` degrees of each other in both directions.
    pub fn is_close(&self, other: Coord, eps: f64) -> bool {
        (self.lat - other.lat).abs() < eps && (self.lon - other.lon).abs() < eps
    }

    /// Position on the sphere in Earth centered Cartesian coordinates, in kilometers.
    pub(crate) fn to_cartesian(self) -> [f64; 3] {
        let lat_r = self.lat * DEG2RAD;
        let lon_r = self.lon * DEG2RAD;

        [
            EARTH_RADIUS_KM * lat_r.cos() * lon_r.cos(),
            EARTH_RADIUS_KM * lat_r.cos() * lon_r.sin(),
            EARTH_RADIUS_KM * lat_r.sin(),
        ]
    }
}

impl Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// A latitude-longitude box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Lower left (south west) corner.
    pub ll: Coord,
    /// Upper right (north east) corner.
    pub ur: Coord,
}

impl BoundingBox {
    /// A box that contains nothing, ready to be expanded.
    pub fn empty() -> Self {
        BoundingBox {
            ll: Coord {
                lat: f64::INFINITY,
                lon: f64::INFINITY,
            },
            ur: Coord {
                lat: -f64::INFINITY,
                lon: -f64::INFINITY,
            },
        }
    }

    /// Grow the box so it includes `coord`.
    pub fn expand(&mut self, coord: Coord) {
        self.ll.lat = self.ll.lat.min(coord.lat);
        self.ll.lon = self.ll.lon.min(coord.lon);
        self.ur.lat = self.ur.lat.max(coord.lat);
        self.ur.lon = self.ur.lon.max(coord.lon);
    }

    /// Does the box contain the coordinate? Points on the edge are inside.
    pub fn contains(&self, coord: Coord) -> bool {
        coord.lat >= self.ll.lat
            && coord.lat <= self.ur.lat
            && coord.lon >= self.ll.lon
            && coord.lon <= self.ur.lon
    }
}

/// Types with a location and an extent.
pub trait Geo {
    fn centroid(&self) -> Coord;

    fn bounding_box(&self) -> BoundingBox;
}

/**
 * The simple great circle distance calculation.
 *
 * #Arguments
 * * lat1 - the latitude of the first point in degrees.
 * * lon1 - the longitude of the first point in degrees.
 * * lat2 - the latitude of the second point in degrees.
 * * lon2 - the longitude of the second point in degrees.
 *
 * #Returns
 * The distance between the points in kilometers.
 */
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_r = lat1 * DEG2RAD;
    let lon1_r = lon1 * DEG2RAD;
    let lat2_r = lat2 * DEG2RAD;
    let lon2_r = lon2 * DEG2RAD;

    let dlat2 = (lat2_r - lat1_r) / 2.0;
    let dlon2 = (lon2_r - lon1_r) / 2.0;

    let sin2_dlat = f64::powf(f64::sin(dlat2), 2.0);
    let sin2_dlon = f64::powf(f64::sin(dlon2), 2.0);

    // Rounding can push the argument a hair past 1.0 for antipodal points.
    let h = (sin2_dlat + sin2_dlon * f64::cos(lat1_r) * f64::cos(lat2_r)).min(1.0);
    let arc = 2.0 * f64::asin(f64::sqrt(h));

    arc * EARTH_RADIUS_KM
}

/// Great circle distance between two coordinates in meters.
pub fn distance_m(a: Coord, b: Coord) -> f64 {
    great_circle_distance(a.lat, a.lon, b.lat, b.lon) * 1000.0
}

/// Wrap a longitude into [-180, 180).
pub fn normalize_lon(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// The arithmetic mean position of a set of coordinates.
///
/// Longitudes are unwrapped relative to the first coordinate before averaging so a group
/// straddling the antimeridian averages to a point next to its members instead of the far side
/// of the planet. Returns `None` for an empty set.
pub fn mean_coord<I: IntoIterator<Item = Coord>>(coords: I) -> Option<Coord> {
    let mut coords = coords.into_iter();
    let first = coords.next()?;

    let mut lat_sum = first.lat;
    let mut dlon_sum = 0.0;
    let mut count = 1.0;
    for coord in coords {
        lat_sum += coord.lat;
        dlon_sum += normalize_lon(coord.lon - first.lon);
        count += 1.0;
    }

    Some(Coord {
        lat: lat_sum / count,
        lon: normalize_lon(first.lon + dlon_sum / count),
    })
}
