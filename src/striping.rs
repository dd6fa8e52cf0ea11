//! Striped dot and polygon data.
//!
//! A location with several intervals is drawn as a pie: one angular segment
//! per interval, sized by its share of the total duration. A building is
//! drawn in stripes, one per 3-hour time-of-day bucket.

use crate::aggregation::{total_duration, LocationGroup};
use crate::buildings::{time_of_day_buckets, Building, SentimentBucket};
use crate::{Interval, LocationInfo, DEFAULT_BUCKET_SIZE_HOURS};
use chrono::FixedOffset;
use serde::Serialize;
use std::f64::consts::TAU;

/// One pie segment, angles in radians from 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieSegment {
    pub interval: Interval,
    pub start_angle: f64,
    pub end_angle: f64,
    pub sentiment: f64,
}

impl PieSegment {
    pub fn span(&self) -> f64 {
        self.end_angle - self.start_angle
    }
}

/// Marker data for one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StripedDot {
    /// A single interval: a plain dot.
    Simple {
        position: [f64; 2],
        sentiment: f64,
        interval: Interval,
    },
    /// Several intervals: a pie sorted by start time.
    #[serde(rename_all = "camelCase")]
    Striped {
        position: [f64; 2],
        segments: Vec<PieSegment>,
        intervals: Vec<Interval>,
        total_duration: f64,
    },
}

impl StripedDot {
    pub fn position(&self) -> [f64; 2] {
        match self {
            StripedDot::Simple { position, .. } | StripedDot::Striped { position, .. } => {
                *position
            }
        }
    }

    /// Pie segments; empty for a simple dot.
    pub fn segments(&self) -> &[PieSegment] {
        match self {
            StripedDot::Simple { .. } => &[],
            StripedDot::Striped { segments, .. } => segments,
        }
    }
}

/// Fill data for one building.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StripedPolygon {
    pub building: Building,
    /// Ascending by bucket start
    pub buckets: Vec<SentimentBucket>,
    pub total_duration: f64,
}

/// Build marker data for the intervals at one location. `None` for no intervals.
///
/// Segments are laid out contiguously from angle 0 in start-time order and
/// the last one ends at exactly `2π`. A zero total duration gives zero-width
/// segments at angle 0.
pub fn striped_dot(location: &LocationInfo, intervals: &[Interval]) -> Option<StripedDot> {
    let position = location.lon_lat();

    match intervals {
        [] => None,
        [only] => Some(StripedDot::Simple {
            position,
            sentiment: only.sentiment_score,
            interval: only.clone(),
        }),
        _ => {
            let mut sorted = intervals.to_vec();
            sorted.sort_by_key(|i| i.start_time);

            let total = total_duration(&sorted);
            let segments = pie_segments(&sorted, total);

            Some(StripedDot::Striped {
                position,
                segments,
                intervals: sorted,
                total_duration: total,
            })
        }
    }
}

fn pie_segments(sorted: &[Interval], total: f64) -> Vec<PieSegment> {
    let last = sorted.len().saturating_sub(1);
    let mut angle = 0.0;

    sorted
        .iter()
        .enumerate()
        .map(|(idx, interval)| {
            let start_angle = angle;
            let end_angle = if total > 0.0 {
                if idx == last {
                    TAU
                } else {
                    start_angle + interval.duration_minutes / total * TAU
                }
            } else {
                start_angle
            };
            angle = end_angle;

            PieSegment {
                interval: interval.clone(),
                start_angle,
                end_angle,
                sentiment: interval.sentiment_score,
            }
        })
        .collect()
}

/// Marker data for every location group.
pub fn striped_dots(groups: &[LocationGroup]) -> Vec<StripedDot> {
    groups
        .iter()
        .filter_map(|g| striped_dot(&g.location, &g.intervals))
        .collect()
}

/// Build stripe data for a building's matched intervals. `None` for no intervals.
///
/// Buckets are recomputed here from the given intervals (3-hour windows in `tz`).
pub fn striped_polygon(
    building: &Building,
    intervals: &[Interval],
    tz: &FixedOffset,
) -> Option<StripedPolygon> {
    if intervals.is_empty() {
        return None;
    }

    let buckets = time_of_day_buckets(intervals, DEFAULT_BUCKET_SIZE_HOURS, tz);
    let total_duration = buckets.iter().map(|b| b.total_duration).sum();

    Some(StripedPolygon {
        building: building.clone(),
        buckets,
        total_duration,
    })
}
