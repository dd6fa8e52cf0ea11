//! # Geographic Utilities
//!
//! Geometry helpers used by the building matcher and path reconstruction.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`polyline_length`] | Total length of a path in meters |
//! | [`squared_planar_distance`] | Squared distance in degree-space |
//! | [`polygon_centroid`] | Sampled centroid of a polygon's outer ring |
//! | [`compute_bounds`] | Bounding box of a set of points |
//! | [`compute_center`] | Arithmetic mean of a set of points |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//!
//! ## Algorithm Notes
//!
//! The building matcher works in degree-space with a squared Euclidean
//! distance, not great-circle distance. This is only meaningful over small
//! areas near the dataset's reference latitude; [`haversine_distance`] is
//! used where real meters matter (path lengths).
//!
//! Polygon rings are GeoJSON-ordered `[lon, lat]` pairs.

use crate::{Bounds, GpsPoint};
use geo::{Distance, Haversine, Point};

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface (spherical Earth,
/// radius 6,371 km).
///
/// # Example
///
/// ```rust
/// use sentiment_mapper::{GpsPoint, geo_utils};
///
/// let usc = GpsPoint::new(34.0224, -118.2851);
/// let downtown = GpsPoint::new(34.0522, -118.2437);
///
/// let distance = geo_utils::haversine_distance(&usc, &downtown);
/// assert!((distance - 5_000.0).abs() < 500.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Total length in meters of a `[lon, lat]` path. Empty or single-point paths return 0.0.
pub fn polyline_length(path: &[[f64; 2]]) -> f64 {
    if path.len() < 2 {
        return 0.0;
    }

    path.windows(2)
        .map(|w| {
            haversine_distance(
                &GpsPoint::new(w[0][1], w[0][0]),
                &GpsPoint::new(w[1][1], w[1][0]),
            )
        })
        .sum()
}

/// Squared Euclidean distance between two points in degree-space.
///
/// Cheap proximity test for small areas. Compare against a squared threshold.
#[inline]
pub fn squared_planar_distance(a: &GpsPoint, b: &GpsPoint) -> f64 {
    let d_lat = a.latitude - b.latitude;
    let d_lng = a.longitude - b.longitude;
    d_lat * d_lat + d_lng * d_lng
}

/// Convert meters to approximate degrees at a given latitude.
///
/// Uses the longitude scale at `latitude`, which is the larger of the two
/// degree counts, so a square search area built from it is conservative.
///
/// # Notes
///
/// - At the equator, 1 degree ≈ 111,320 meters
/// - At the poles, longitude degrees become meaningless (clamped at cos = 0.1)
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = 111_320.0 * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

// =============================================================================
// Bounding Box / Center Functions
// =============================================================================

/// Compute the bounding box of a set of points.
///
/// For empty input, returns bounds with MIN/MAX values; use
/// [`Bounds::from_points`] to get `None` instead.
pub fn compute_bounds(points: &[GpsPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

/// Arithmetic mean of all latitudes and longitudes.
///
/// Returns `None` for empty input. Not suitable across the antimeridian.
pub fn compute_center(points: &[GpsPoint]) -> Option<GpsPoint> {
    if points.is_empty() {
        return None;
    }

    let sum_lat: f64 = points.iter().map(|p| p.latitude).sum();
    let sum_lng: f64 = points.iter().map(|p| p.longitude).sum();
    let n = points.len() as f64;

    Some(GpsPoint::new(sum_lat / n, sum_lng / n))
}

/// Approximate centroid of a polygon from the first `sample_size` ring coordinates.
///
/// Building footprints are small and roughly convex, so averaging a handful
/// of vertices is close enough and avoids walking long rings. Note that a
/// closed ring repeats its first vertex; when the whole ring is sampled that
/// vertex is counted twice.
///
/// # Example
///
/// ```rust
/// use sentiment_mapper::geo_utils::polygon_centroid;
///
/// let ring = [[-118.0, 34.0], [-117.0, 34.0], [-117.0, 35.0], [-118.0, 35.0]];
/// let c = polygon_centroid(&ring, 10).unwrap();
/// assert_eq!(c.latitude, 34.5);
/// assert_eq!(c.longitude, -117.5);
/// ```
pub fn polygon_centroid(ring: &[[f64; 2]], sample_size: usize) -> Option<GpsPoint> {
    let sample: Vec<GpsPoint> = ring
        .iter()
        .take(sample_size.max(1))
        .map(|c| GpsPoint::new(c[1], c[0]))
        .collect();
    compute_center(&sample)
}

// =============================================================================
// Unit Tests
// =============================================================================
