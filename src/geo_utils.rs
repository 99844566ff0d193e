//! Geographic utilities: distances and degree/meter conversion.

use geo::{Closest, ClosestPoint, Coord, Distance, Haversine, LineString, Point};

use crate::GpsPoint;

/// Meters-per-degree factor used by the planar proximity test
/// (50 m is expressed as 50 / 100 000 degrees).
pub const PLANAR_METERS_PER_DEGREE: f64 = 100_000.0;

/// Great-circle distance between two GPS points in meters.
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Convert a meter tolerance to the planar degree tolerance used by the
/// planar proximity test.
///
/// This is a fixed approximation and ignores latitude entirely.
pub fn meters_to_degrees(meters: f64) -> f64 {
    meters / PLANAR_METERS_PER_DEGREE
}

/// Build a geo LineString in (x = lng, y = lat) order.
pub fn to_line_string(points: &[GpsPoint]) -> LineString<f64> {
    LineString::new(
        points
            .iter()
            .map(|p| Coord {
                x: p.longitude,
                y: p.latitude,
            })
            .collect(),
    )
}

/// Closest point on a polyline to `point`, in (lat, lng).
///
/// Returns `None` for an empty polyline. A single-vertex polyline returns
/// that vertex.
pub fn closest_point_on_polyline(point: &GpsPoint, polyline: &[GpsPoint]) -> Option<GpsPoint> {
    // Zero-length segments have no defined projection
    let mut distinct: Vec<GpsPoint> = polyline.to_vec();
    distinct.dedup();

    match distinct.as_slice() {
        [] => None,
        [only] => Some(*only),
        _ => {
            let line = to_line_string(&distinct);
            match line.closest_point(&Point::new(point.longitude, point.latitude)) {
                Closest::Intersection(p) | Closest::SinglePoint(p) => {
                    Some(GpsPoint::new(p.y(), p.x()))
                }
                Closest::Indeterminate => None,
            }
        }
    }
}

/// Euclidean distance in degree space from a point to a segment.
pub fn planar_segment_distance(point: &GpsPoint, start: &GpsPoint, end: &GpsPoint) -> f64 {
    let dx = end.longitude - start.longitude;
    let dy = end.latitude - start.latitude;
    let px = point.longitude - start.longitude;
    let py = point.latitude - start.latitude;

    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-20 {
        return (px * px + py * py).sqrt();
    }

    // Projection parameter clamped onto the segment
    let t = ((px * dx + py * dy) / len_sq).clamp(0.0, 1.0);
    let ex = px - t * dx;
    let ey = py - t * dy;
    (ex * ex + ey * ey).sqrt()
}

/// Minimum planar degree distance from a point to any segment of a polyline.
///
/// Returns `f64::INFINITY` for an empty polyline.
pub fn planar_polyline_distance(point: &GpsPoint, polyline: &[GpsPoint]) -> f64 {
    match polyline {
        [] => f64::INFINITY,
        [only] => planar_segment_distance(point, only, only),
        _ => polyline
            .windows(2)
            .map(|w| planar_segment_distance(point, &w[0], &w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Haversine distance in meters from a point to its closest point on a polyline.
///
/// Returns `f64::INFINITY` for an empty polyline.
pub fn geodesic_polyline_distance(point: &GpsPoint, polyline: &[GpsPoint]) -> f64 {
    closest_point_on_polyline(point, polyline)
        .map(|closest| haversine_distance(point, &closest))
        .unwrap_or(f64::INFINITY)
}
