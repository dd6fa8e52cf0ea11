//! Travel path reconstruction from the chronological interval stream.
//!
//! ## Algorithm
//! 1. Stable-sort intervals by start time
//! 2. Collapse each maximal run of consecutive transit intervals into one
//!    multi-point [`TravelPath::Route`]
//! 3. Emit a two-point [`TravelPath::Direct`] where a stay is immediately
//!    followed by a stay at a different coordinate
//!
//! A transit run of length 1 is dropped: a single point has no direction.
//!
//! Sentiment is attributed differently for the two shapes. A route carries
//! the mean of its run; a direct jump carries the destination's own score.
//! Both are kept as-is pending a product decision.

use crate::geo_utils::polyline_length;
use crate::Interval;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

/// A path for the rendering layer. Coordinates are `[lon, lat]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TravelPath {
    /// Jump between two consecutive stays at different coordinates.
    #[serde(rename_all = "camelCase")]
    Direct {
        source: [f64; 2],
        target: [f64; 2],
        /// End of the departure stay
        start_time: DateTime<Utc>,
        /// Start of the arrival stay
        end_time: DateTime<Utc>,
        /// Score of the arrival stay
        sentiment: f64,
    },
    /// A run of two or more consecutive transit intervals.
    #[serde(rename_all = "camelCase")]
    Route {
        path: Vec<[f64; 2]>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        /// Unweighted mean over the run
        sentiment: f64,
        /// Haversine length of the path
        distance_meters: f64,
    },
}

impl TravelPath {
    pub fn start_time(&self) -> DateTime<Utc> {
        match self {
            TravelPath::Direct { start_time, .. } | TravelPath::Route { start_time, .. } => {
                *start_time
            }
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        match self {
            TravelPath::Direct { end_time, .. } | TravelPath::Route { end_time, .. } => *end_time,
        }
    }

    pub fn sentiment(&self) -> f64 {
        match self {
            TravelPath::Direct { sentiment, .. } | TravelPath::Route { sentiment, .. } => {
                *sentiment
            }
        }
    }

    pub fn is_route(&self) -> bool {
        matches!(self, TravelPath::Route { .. })
    }

    /// All points of the path, in travel order.
    pub fn points(&self) -> Vec<[f64; 2]> {
        match self {
            TravelPath::Direct { source, target, .. } => vec![*source, *target],
            TravelPath::Route { path, .. } => path.clone(),
        }
    }
}

/// Reconstruct travel paths from intervals in any order.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use sentiment_mapper::{create_travel_paths, Interval};
///
/// let t = |h, m| Utc.with_ymd_and_hms(2025, 11, 3, h, m, 0).unwrap();
/// let intervals = vec![
///     Interval::new(34.0224, -118.2851, t(8, 0), t(8, 30), 0.2, "Home", "home"),
///     Interval::new(34.0220, -118.2855, t(8, 30), t(8, 35), 0.0, "Traveling", "traveling"),
///     Interval::new(34.0210, -118.2860, t(8, 35), t(8, 40), 0.1, "Traveling", "traveling"),
///     Interval::new(34.0201, -118.2863, t(8, 40), t(10, 0), 0.3, "Class", "class"),
/// ];
///
/// let paths = create_travel_paths(&intervals);
/// assert_eq!(paths.len(), 1);
/// assert!(paths[0].is_route());
/// ```
pub fn create_travel_paths(intervals: &[Interval]) -> Vec<TravelPath> {
    let mut sorted: Vec<&Interval> = intervals.iter().collect();
    sorted.sort_by_key(|i| i.start_time);

    let mut paths = Vec::new();
    let mut dropped_runs = 0usize;
    let mut i = 0;

    while i < sorted.len() {
        let current = sorted[i];

        if current.is_transit() {
            let run_len = sorted[i..].iter().take_while(|x| x.is_transit()).count();
            if run_len >= 2 {
                paths.push(route_from_run(&sorted[i..i + run_len]));
            } else {
                dropped_runs += 1;
            }
            i += run_len;
            continue;
        }

        if let Some(next) = sorted.get(i + 1) {
            let moved = current.latitude != next.latitude || current.longitude != next.longitude;
            if !next.is_transit() && moved {
                paths.push(TravelPath::Direct {
                    source: current.lon_lat(),
                    target: next.lon_lat(),
                    start_time: current.end_time,
                    end_time: next.start_time,
                    sentiment: next.sentiment_score,
                });
            }
        }
        i += 1;
    }

    debug!(
        "[Paths] {} intervals -> {} paths ({} routes, {} single-point runs dropped)",
        intervals.len(),
        paths.len(),
        paths.iter().filter(|p| p.is_route()).count(),
        dropped_runs
    );
    paths
}

/// Build a route from a run of at least two transit intervals.
fn route_from_run(run: &[&Interval]) -> TravelPath {
    let path: Vec<[f64; 2]> = run.iter().map(|i| i.lon_lat()).collect();
    let sentiment = run.iter().map(|i| i.sentiment_score).sum::<f64>() / run.len() as f64;
    let distance_meters = polyline_length(&path);

    TravelPath::Route {
        start_time: run[0].start_time,
        end_time: run[run.len() - 1].end_time,
        path,
        sentiment,
        distance_meters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::interval_at;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn travel(lat: f64, lng: f64, hour: u32, minute: u32, sentiment: f64) -> Interval {
        interval_at(lat, lng, hour, minute, 5, sentiment, "Traveling")
    }

    #[test]
    fn test_transit_run_collapses_into_one_route() {
        let intervals = vec![
            travel(34.0220, -118.2855, 8, 30, 0.1),
            travel(34.0215, -118.2858, 8, 35, -0.1),
            travel(34.0210, -118.2860, 8, 40, 0.3),
            interval_at(34.0201, -118.2863, 8, 45, 60, 0.5, "Class"),
        ];

        let paths = create_travel_paths(&intervals);
        assert_eq!(paths.len(), 1);

        match &paths[0] {
            TravelPath::Route {
                path,
                start_time,
                end_time,
                sentiment,
                distance_meters,
            } => {
                assert_eq!(path.len(), 3);
                assert_eq!(path[0], [-118.2855, 34.0220]);
                assert_eq!(path[2], [-118.2860, 34.0210]);
                assert_eq!(*start_time, intervals[0].start_time);
                assert_eq!(*end_time, intervals[2].end_time);
                assert!(approx_eq(*sentiment, 0.1, 1e-12));
                assert!(*distance_meters > 0.0);
            }
            other => panic!("expected a route, got {other:?}"),
        }
        assert_eq!(paths.iter().filter(|p| !p.is_route()).count(), 0);
    }

    #[test]
    fn test_single_transit_interval_is_dropped() {
        let intervals = vec![
            interval_at(34.0224, -118.2851, 8, 0, 30, 0.2, "Home"),
            travel(34.0215, -118.2858, 8, 30, 0.0),
            interval_at(34.0201, -118.2863, 8, 35, 60, 0.5, "Class"),
        ];
        assert!(create_travel_paths(&intervals).is_empty());
    }

    #[test]
    fn test_direct_jump_uses_destination_sentiment() {
        let intervals = vec![
            interval_at(34.0224, -118.2851, 8, 0, 30, -0.6, "Home"),
            interval_at(34.0201, -118.2863, 9, 0, 60, 0.8, "Class"),
        ];

        let paths = create_travel_paths(&intervals);
        assert_eq!(paths.len(), 1);
        match &paths[0] {
            TravelPath::Direct {
                source,
                target,
                start_time,
                end_time,
                sentiment,
            } => {
                assert_eq!(*source, [-118.2851, 34.0224]);
                assert_eq!(*target, [-118.2863, 34.0201]);
                assert_eq!(*start_time, intervals[0].end_time);
                assert_eq!(*end_time, intervals[1].start_time);
                // Destination only, not the mean of both ends
                assert_eq!(*sentiment, 0.8);
            }
            other => panic!("expected a direct path, got {other:?}"),
        }
    }

    #[test]
    fn test_same_location_stays_emit_nothing() {
        let intervals = vec![
            interval_at(34.0224, -118.2851, 7, 0, 60, 0.2, "Home"),
            interval_at(34.0224, -118.2851, 8, 0, 60, 0.3, "Home"),
        ];
        assert!(create_travel_paths(&intervals).is_empty());
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut intervals = vec![
            interval_at(34.0224, -118.2851, 8, 0, 30, 0.2, "Home"),
            travel(34.0220, -118.2855, 8, 30, 0.1),
            travel(34.0210, -118.2860, 8, 35, 0.3),
            interval_at(34.0201, -118.2863, 8, 40, 60, 0.5, "Class"),
            interval_at(34.0250, -118.2800, 10, 0, 60, 0.7, "Cafe"),
        ];
        let expected = create_travel_paths(&intervals);
        intervals.reverse();
        assert_eq!(create_travel_paths(&intervals), expected);

        // One route, then the Class -> Cafe jump
        assert_eq!(expected.len(), 2);
        assert!(expected[0].is_route());
        assert!(!expected[1].is_route());
        assert_eq!(expected[1].sentiment(), 0.7);
    }

    #[test]
    fn test_separate_runs_produce_separate_routes() {
        let intervals = vec![
            travel(34.0220, -118.2855, 8, 0, 0.1),
            travel(34.0210, -118.2860, 8, 5, 0.1),
            interval_at(34.0201, -118.2863, 8, 10, 60, 0.5, "Class"),
            travel(34.0210, -118.2860, 9, 10, -0.2),
            travel(34.0220, -118.2855, 9, 15, -0.4),
            travel(34.0224, -118.2851, 9, 20, 0.0),
        ];
        let paths = create_travel_paths(&intervals);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].points().len(), 2);
        assert_eq!(paths[1].points().len(), 3);
        assert!(approx_eq(paths[1].sentiment(), -0.2, 1e-12));
    }

    #[test]
    fn test_empty_and_single() {
        assert!(create_travel_paths(&[]).is_empty());
        assert!(create_travel_paths(&[travel(34.0, -118.0, 8, 0, 0.0)]).is_empty());
    }

    #[test]
    fn test_serialized_field_names() {
        let intervals = vec![
            interval_at(34.0224, -118.2851, 8, 0, 30, 0.2, "Home"),
            interval_at(34.0201, -118.2863, 9, 0, 60, 0.8, "Class"),
        ];
        let json = serde_json::to_value(create_travel_paths(&intervals)).unwrap();
        assert!(json[0].get("startTime").is_some());
        assert!(json[0].get("endTime").is_some());
        assert_eq!(json[0]["source"][0], -118.2851);
    }
}
