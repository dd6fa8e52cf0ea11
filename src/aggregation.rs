//! Grouping of intervals by rounded location and by time-of-day bucket.
//!
//! Groups are keyed by a value type ([`LocationKey`], optionally paired with a
//! bucket start hour) and returned in order of first occurrence in the input.
//! Input order therefore never changes which groups form, only the order
//! they come back in.

use crate::{Interval, LocationInfo, LocationKey};
use chrono::FixedOffset;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

/// Intervals sharing a rounded coordinate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationGroup {
    #[serde(skip)]
    pub key: LocationKey,
    pub location: LocationInfo,
    pub intervals: Vec<Interval>,
}

/// Intervals sharing a rounded coordinate, with duration and sentiment totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationAggregate {
    #[serde(skip)]
    pub key: LocationKey,
    pub location: LocationInfo,
    pub intervals: Vec<Interval>,
    /// Sum of `duration_minutes`
    pub total_duration: f64,
    /// Unweighted mean of `sentiment_score`
    pub avg_sentiment: f64,
}

/// Intervals sharing a rounded coordinate and a time-of-day bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucketAggregate {
    #[serde(skip)]
    pub key: LocationKey,
    pub location: LocationInfo,
    /// First hour of the bucket (0, 3, 6, ... for 3-hour buckets)
    pub time_bucket: u32,
    pub intervals: Vec<Interval>,
    pub total_duration: f64,
    pub avg_sentiment: f64,
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Unweighted mean sentiment. `None` for an empty slice.
pub fn mean_sentiment(intervals: &[Interval]) -> Option<f64> {
    if intervals.is_empty() {
        return None;
    }
    let sum: f64 = intervals.iter().map(|i| i.sentiment_score).sum();
    Some(sum / intervals.len() as f64)
}

/// Sum of `duration_minutes`.
pub fn total_duration(intervals: &[Interval]) -> f64 {
    intervals.iter().map(|i| i.duration_minutes).sum()
}

/// Group by `key_fn`, keeping groups in first-occurrence order.
pub(crate) fn group_ordered<'a, K, I, F>(intervals: I, key_fn: F) -> Vec<(K, Vec<Interval>)>
where
    K: Hash + Eq + Copy,
    I: IntoIterator<Item = &'a Interval>,
    F: Fn(&Interval) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<Interval>)> = Vec::new();

    for interval in intervals {
        let key = key_fn(interval);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(interval.clone());
    }

    groups
}

// ============================================================================
// Aggregators
// ============================================================================

/// Group intervals by coordinate rounded to 6 decimal digits.
///
/// Every input interval lands in exactly one group.
pub fn group_by_location(intervals: &[Interval]) -> Vec<LocationGroup> {
    let groups: Vec<LocationGroup> = group_ordered(intervals, Interval::location_key)
        .into_iter()
        .map(|(key, intervals)| LocationGroup {
            key,
            location: LocationInfo::from_interval(&intervals[0]),
            intervals,
        })
        .collect();

    debug!(
        "[Aggregation] {} intervals -> {} locations",
        intervals.len(),
        groups.len()
    );
    groups
}

/// Aggregate stays by location: transit intervals are excluded, then each
/// group gets its total duration and mean sentiment.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use sentiment_mapper::{aggregate_by_location, Interval};
///
/// let t = |h| Utc.with_ymd_and_hms(2025, 11, 3, h, 0, 0).unwrap();
/// let intervals = vec![
///     Interval::new(34.02, -118.28, t(9), t(10), 0.2, "Library", "library"),
///     Interval::new(34.02, -118.28, t(11), t(12), 0.6, "Library", "library"),
///     Interval::new(34.03, -118.29, t(10), t(11), 0.0, "Traveling", "traveling"),
/// ];
///
/// let groups = aggregate_by_location(&intervals);
/// assert_eq!(groups.len(), 1);
/// assert_eq!(groups[0].total_duration, 120.0);
/// assert!((groups[0].avg_sentiment - 0.4).abs() < 1e-9);
/// ```
pub fn aggregate_by_location(intervals: &[Interval]) -> Vec<LocationAggregate> {
    let stays = intervals.iter().filter(|i| !i.is_transit());

    let groups: Vec<LocationAggregate> = group_ordered(stays, Interval::location_key)
        .into_iter()
        .map(|(key, intervals)| LocationAggregate {
            key,
            location: LocationInfo::from_interval(&intervals[0]),
            total_duration: total_duration(&intervals),
            avg_sentiment: mean_sentiment(&intervals).unwrap_or(0.0),
            intervals,
        })
        .collect();

    debug!(
        "[Aggregation] {} intervals -> {} stay locations",
        intervals.len(),
        groups.len()
    );
    groups
}

/// Aggregate by (rounded location, time-of-day bucket). Transit intervals are kept.
///
/// `bucket_size` is in hours; 0 is treated as 1.
pub fn aggregate_by_time_buckets(
    intervals: &[Interval],
    bucket_size: u32,
    tz: &FixedOffset,
) -> Vec<TimeBucketAggregate> {
    let groups: Vec<TimeBucketAggregate> = group_ordered(intervals, |i| {
        (i.location_key(), i.time_bucket(bucket_size, tz))
    })
    .into_iter()
    .map(|((key, time_bucket), intervals)| TimeBucketAggregate {
        key,
        location: LocationInfo::from_interval(&intervals[0]),
        time_bucket,
        total_duration: total_duration(&intervals),
        avg_sentiment: mean_sentiment(&intervals).unwrap_or(0.0),
        intervals,
    })
    .collect();

    debug!(
        "[Aggregation] {} intervals -> {} location/time buckets ({}h)",
        intervals.len(),
        groups.len(),
        bucket_size
    );
    groups
}

// ============================================================================
// Unit Tests
// ============================================================================
