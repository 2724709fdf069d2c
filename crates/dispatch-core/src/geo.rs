use std::f64::consts::PI;

use crate::models::Coordinate;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[inline(always)]
fn to_radians(degrees: f64) -> f64 {
    degrees * (PI / 180.0)
}

/// Great-circle distance between two points via the haversine formula.
/// Symmetric, and zero exactly when both points coincide. Straight-line
/// approximation only; road topology is out of scope.
pub fn distance_km(from: Coordinate, to: Coordinate) -> f64 {
    let d_lat = to_radians(to.lat() - from.lat());
    let d_lng = to_radians(to.lng() - from.lng());

    let a = (d_lat / 2.0).sin().powi(2)
        + to_radians(from.lat()).cos() * to_radians(to.lat()).cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * a.sqrt().asin() * EARTH_RADIUS_KM
}
