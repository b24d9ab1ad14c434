//! Geographic utilities: great-circle distance, coordinate rounding and bounds.

use geo::{BoundingRect, MultiPoint, Point};

use crate::{Bounds, Coordinate};

/// Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Meters spanned by one degree of latitude on the haversine sphere.
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;

/// Great-circle distance between two coordinates in meters.
///
/// Uses latitude (`x`) and longitude (`y`) only; altitude is ignored.
/// NaN inputs yield NaN.
///
/// # Example
/// ```
/// use path_matcher::{haversine_distance, Coordinate};
///
/// let a = Coordinate::new(0.0, 0.0, 0.0);
/// let b = Coordinate::new(0.0, 0.001, 40.0);
/// let d = haversine_distance(&a, &b);
/// assert!((d - 111.19).abs() < 0.01);
/// ```
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.x.to_radians();
    let lat2 = b.x.to_radians();
    let dlat = (b.x - a.x).to_radians();
    let dlng = (b.y - a.y).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    // Rounding can push near-antipodal pairs just above 1
    let h = if h > 1.0 { 1.0 } else { h };

    EARTH_RADIUS_METERS * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Round latitude and longitude to `decimals` places, leaving altitude as is.
///
/// Halfway cases round up (towards positive infinity), so `-0.0005`
/// becomes `-0.0` at three places rather than `-0.001`.
pub fn round_coordinate(c: &Coordinate, decimals: u32) -> Coordinate {
    let scale = 10f64.powi(decimals as i32);
    let round_half_up = |v: f64| (v * scale + 0.5).floor() / scale;
    Coordinate::new(round_half_up(c.x), round_half_up(c.y), c.z)
}

/// Convert a distance to (latitude, longitude) degree spans at a latitude.
///
/// The longitude span grows towards the poles and is capped at 360 degrees.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> (f64, f64) {
    let lat_degrees = meters / METERS_PER_DEGREE;
    let cos_lat = latitude.to_radians().cos().abs();
    let lng_degrees = if cos_lat < 1e-9 {
        360.0
    } else {
        (lat_degrees / cos_lat).min(360.0)
    };
    (lat_degrees, lng_degrees)
}

/// Bounding box of a segment, for fitting a map view around it.
pub fn segment_bounds(points: &[Coordinate]) -> Option<Bounds> {
    let multi: MultiPoint<f64> = points
        .iter()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .map(|p| Point::new(p.y, p.x))
        .collect::<Vec<_>>()
        .into();

    multi.bounding_rect().map(|rect| Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}
