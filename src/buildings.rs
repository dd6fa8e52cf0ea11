//! Building footprints and building-sentiment matching.
//!
//! A building is matched to the intervals recorded near it: the centroid of
//! the outer ring (sampled from its leading vertices) is compared against
//! each interval position with a squared degree-space distance. This is an
//! approximation that holds near the dataset's reference latitude only.
//!
//! [`building_sentiment`] scans all intervals for one building.
//! [`BuildingMatcher`] indexes the intervals once in an R-tree and answers
//! many buildings with identical results.

use crate::aggregation::{group_ordered, mean_sentiment, total_duration};
use crate::geo_utils::{polygon_centroid, squared_planar_distance};
use crate::{AnalysisConfig, Bounds, GpsPoint, Interval, CENTROID_SAMPLE_SIZE, KM_PER_DEGREE};
use chrono::FixedOffset;
use log::{debug, info};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::Serialize;
use serde_json::{Map, Value};

// ============================================================================
// Types
// ============================================================================

/// A building footprint. Only the outer ring is kept; holes are ignored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Building {
    /// OSM way id, if present.
    pub id: Option<i64>,
    /// OSM tags (`building`, `name`, ...).
    pub tags: Map<String, Value>,
    /// Outer ring as `[lon, lat]` pairs.
    pub outer_ring: Vec<[f64; 2]>,
}

impl Building {
    pub fn new(id: Option<i64>, tags: Map<String, Value>, outer_ring: Vec<[f64; 2]>) -> Self {
        Self {
            id,
            tags,
            outer_ring,
        }
    }

    /// `tags.name`, if present.
    pub fn name(&self) -> Option<&str> {
        self.tags.get("name").and_then(Value::as_str)
    }

    /// Centroid sampled from the first `sample_size` ring coordinates.
    pub fn centroid(&self, sample_size: usize) -> Option<GpsPoint> {
        polygon_centroid(&self.outer_ring, sample_size)
    }
}

/// An ordered set of building footprints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildingCollection {
    buildings: Vec<Building>,
}

impl BuildingCollection {
    pub fn new(buildings: Vec<Building>) -> Self {
        Self { buildings }
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Building> {
        self.buildings.iter()
    }

    /// Bounding box of every outer-ring coordinate. `None` if there are none.
    pub fn coverage(&self) -> Option<Bounds> {
        let points: Vec<GpsPoint> = self
            .buildings
            .iter()
            .flat_map(|b| b.outer_ring.iter())
            .map(|c| GpsPoint::new(c[1], c[0]))
            .collect();
        Bounds::from_points(&points)
    }

    /// Buildings whose sampled centroid lies within `radius_km` of `center`.
    ///
    /// Uses a flat `radius_km / 111` degree radius, compared squared and inclusive.
    pub fn within_radius(&self, center: &GpsPoint, radius_km: f64) -> BuildingCollection {
        let radius_deg = radius_km / KM_PER_DEGREE;
        let radius_sq = radius_deg * radius_deg;

        let kept: Vec<Building> = self
            .buildings
            .iter()
            .filter(|b| {
                b.centroid(CENTROID_SAMPLE_SIZE)
                    .is_some_and(|c| squared_planar_distance(&c, center) <= radius_sq)
            })
            .cloned()
            .collect();

        info!(
            "[Buildings] {} of {} buildings within {}km",
            kept.len(),
            self.buildings.len(),
            radius_km
        );
        BuildingCollection::new(kept)
    }
}

impl<'a> IntoIterator for &'a BuildingCollection {
    type Item = &'a Building;
    type IntoIter = std::slice::Iter<'a, Building>;

    fn into_iter(self) -> Self::IntoIter {
        self.buildings.iter()
    }
}

/// Intervals in one time-of-day bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentBucket {
    /// First hour of the bucket
    pub bucket: u32,
    pub intervals: Vec<Interval>,
    pub avg_sentiment: f64,
    pub total_duration: f64,
}

/// Sentiment of the intervals matched to a building.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BuildingSentiment {
    /// Unweighted mean over all matched intervals.
    Overall {
        sentiment: f64,
        intervals: Vec<Interval>,
    },
    /// Matched intervals split into time-of-day buckets.
    #[serde(rename_all = "camelCase")]
    Bucketed {
        /// Mean over all matched intervals (not a mean of bucket means).
        sentiment: f64,
        intervals: Vec<Interval>,
        time_buckets: Vec<SentimentBucket>,
        has_multiple_buckets: bool,
    },
}

impl BuildingSentiment {
    pub fn sentiment(&self) -> f64 {
        match self {
            BuildingSentiment::Overall { sentiment, .. }
            | BuildingSentiment::Bucketed { sentiment, .. } => *sentiment,
        }
    }

    pub fn intervals(&self) -> &[Interval] {
        match self {
            BuildingSentiment::Overall { intervals, .. }
            | BuildingSentiment::Bucketed { intervals, .. } => intervals,
        }
    }

    /// Buckets, when bucketing was requested.
    pub fn time_buckets(&self) -> Option<&[SentimentBucket]> {
        match self {
            BuildingSentiment::Overall { .. } => None,
            BuildingSentiment::Bucketed { time_buckets, .. } => Some(time_buckets),
        }
    }

    pub fn has_multiple_buckets(&self) -> bool {
        self.time_buckets().is_some_and(|b| b.len() > 1)
    }
}

// ============================================================================
// Bucketing
// ============================================================================

/// Split intervals into time-of-day buckets, ascending by bucket start.
pub fn time_of_day_buckets(
    intervals: &[Interval],
    bucket_size: u32,
    tz: &FixedOffset,
) -> Vec<SentimentBucket> {
    let mut buckets: Vec<SentimentBucket> =
        group_ordered(intervals, |i| i.time_bucket(bucket_size, tz))
            .into_iter()
            .map(|(bucket, intervals)| SentimentBucket {
                bucket,
                avg_sentiment: mean_sentiment(&intervals).unwrap_or(0.0),
                total_duration: total_duration(&intervals),
                intervals,
            })
            .collect();
    buckets.sort_by_key(|b| b.bucket);
    buckets
}

fn summarize(
    nearby: Vec<Interval>,
    group_by_time_bucket: bool,
    config: &AnalysisConfig,
) -> Option<BuildingSentiment> {
    let sentiment = mean_sentiment(&nearby)?;

    if !group_by_time_bucket {
        return Some(BuildingSentiment::Overall {
            sentiment,
            intervals: nearby,
        });
    }

    let time_buckets = time_of_day_buckets(&nearby, config.bucket_size_hours, &config.timezone);

    // Weighted by bucket size: recombine the bucket sums, not the bucket means.
    let (sum, count) = time_buckets
        .iter()
        .flat_map(|b| b.intervals.iter())
        .fold((0.0, 0usize), |(s, n), i| (s + i.sentiment_score, n + 1));
    let sentiment = if count > 0 { sum / count as f64 } else { sentiment };

    Some(BuildingSentiment::Bucketed {
        sentiment,
        intervals: nearby,
        has_multiple_buckets: time_buckets.len() > 1,
        time_buckets,
    })
}

// ============================================================================
// Matching
// ============================================================================

/// Sentiment of the intervals near a building.
///
/// An interval is near when its squared degree-space distance to the
/// building's sampled centroid is strictly below
/// `config.building_threshold_deg²`. Returns `None` when nothing is near.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use sentiment_mapper::{building_sentiment, AnalysisConfig, Building, Interval};
///
/// let ring = vec![[-118.2852, 34.0223], [-118.2850, 34.0223], [-118.2850, 34.0225], [-118.2852, 34.0225]];
/// let building = Building::new(None, Default::default(), ring);
///
/// let t = |h| Utc.with_ymd_and_hms(2025, 11, 3, h, 0, 0).unwrap();
/// let inside = Interval::new(34.0224, -118.2851, t(9), t(10), 0.5, "Library", "library");
/// let far = Interval::new(34.0300, -118.2900, t(9), t(10), -0.5, "Gym", "gym");
///
/// let config = AnalysisConfig::default();
/// let result = building_sentiment(&building, &[inside, far.clone()], &config, false).unwrap();
/// assert_eq!(result.intervals().len(), 1);
/// assert!(building_sentiment(&building, &[far], &config, false).is_none());
/// ```
pub fn building_sentiment(
    building: &Building,
    intervals: &[Interval],
    config: &AnalysisConfig,
    group_by_time_bucket: bool,
) -> Option<BuildingSentiment> {
    let centroid = building.centroid(config.centroid_sample_size)?;
    let threshold_sq = config.building_threshold_deg * config.building_threshold_deg;

    let nearby: Vec<Interval> = intervals
        .iter()
        .filter(|i| squared_planar_distance(&i.position(), &centroid) < threshold_sq)
        .cloned()
        .collect();

    debug!(
        "[Buildings] {} of {} intervals near building {:?}",
        nearby.len(),
        intervals.len(),
        building.id
    );

    if nearby.is_empty() {
        return None;
    }
    summarize(nearby, group_by_time_bucket, config)
}

/// Interval position in the R-tree, with its index in the source slice.
#[derive(Debug, Clone, Copy)]
struct IndexedPosition {
    index: usize,
    lng: f64,
    lat: f64,
}

impl RTreeObject for IndexedPosition {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

impl PointDistance for IndexedPosition {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let d_lng = self.lng - point[0];
        let d_lat = self.lat - point[1];
        d_lng * d_lng + d_lat * d_lat
    }
}

/// Matches many buildings against one interval set via a spatial index.
///
/// Gives the same results as calling [`building_sentiment`] per building.
pub struct BuildingMatcher<'a> {
    intervals: &'a [Interval],
    tree: RTree<IndexedPosition>,
    config: AnalysisConfig,
}

impl<'a> BuildingMatcher<'a> {
    pub fn new(intervals: &'a [Interval], config: AnalysisConfig) -> Self {
        let positions: Vec<IndexedPosition> = intervals
            .iter()
            .enumerate()
            .map(|(index, i)| IndexedPosition {
                index,
                lng: i.longitude,
                lat: i.latitude,
            })
            .collect();

        Self {
            intervals,
            tree: RTree::bulk_load(positions),
            config,
        }
    }

    /// Sentiment of the intervals near `building`. See [`building_sentiment`].
    pub fn sentiment_for(
        &self,
        building: &Building,
        group_by_time_bucket: bool,
    ) -> Option<BuildingSentiment> {
        let centroid = building.centroid(self.config.centroid_sample_size)?;
        let threshold_sq = self.config.building_threshold_deg * self.config.building_threshold_deg;

        // The tree query is inclusive; re-check strictly with the scan's distance.
        let mut indices: Vec<usize> = self
            .tree
            .locate_within_distance([centroid.longitude, centroid.latitude], threshold_sq)
            .filter(|p| {
                squared_planar_distance(&GpsPoint::new(p.lat, p.lng), &centroid) < threshold_sq
            })
            .map(|p| p.index)
            .collect();

        if indices.is_empty() {
            return None;
        }

        // Keep the source order of the interval slice
        indices.sort_unstable();
        let nearby: Vec<Interval> = indices
            .into_iter()
            .map(|idx| self.intervals[idx].clone())
            .collect();

        summarize(nearby, group_by_time_bucket, &self.config)
    }

    /// One result per building, in collection order.
    pub fn sentiments_for_all(
        &self,
        buildings: &BuildingCollection,
        group_by_time_bucket: bool,
    ) -> Vec<Option<BuildingSentiment>> {
        let start = std::time::Instant::now();

        let results: Vec<Option<BuildingSentiment>> = buildings
            .iter()
            .map(|b| self.sentiment_for(b, group_by_time_bucket))
            .collect();

        info!(
            "[BuildingMatcher] {} of {} buildings matched against {} intervals in {:?}",
            results.iter().filter(|r| r.is_some()).count(),
            buildings.len(),
            self.intervals.len(),
            start.elapsed()
        );
        results
    }

    /// Parallel version of [`Self::sentiments_for_all`]; results are identical.
    #[cfg(feature = "parallel")]
    pub fn sentiments_for_all_parallel(
        &self,
        buildings: &BuildingCollection,
        group_by_time_bucket: bool,
    ) -> Vec<Option<BuildingSentiment>> {
        use rayon::prelude::*;

        let start = std::time::Instant::now();

        let results: Vec<Option<BuildingSentiment>> = buildings
            .buildings()
            .par_iter()
            .map(|b| self.sentiment_for(b, group_by_time_bucket))
            .collect();

        info!(
            "[BuildingMatcher] PARALLEL {} of {} buildings matched in {:?}",
            results.iter().filter(|r| r.is_some()).count(),
            buildings.len(),
            start.elapsed()
        );
        debug!(
            "[BuildingMatcher] {} intervals indexed",
            self.tree.size()
        );
        results
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::interval_at;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    /// Square footprint of side `2 * half` degrees centered on (lat, lng), closed ring.
    fn square(lat: f64, lng: f64, half: f64) -> Building {
        let ring = vec![
            [lng - half, lat - half],
            [lng + half, lat - half],
            [lng + half, lat + half],
            [lng - half, lat + half],
            [lng - half, lat - half],
        ];
        Building::new(None, Map::new(), ring)
    }

    fn campus_intervals() -> Vec<Interval> {
        vec![
            interval_at(34.0224, -118.2851, 9, 0, 60, 0.2, "Library"),
            interval_at(34.0225, -118.2852, 10, 0, 30, 0.4, "Library"),
            interval_at(34.0224, -118.2851, 14, 0, 60, -0.3, "Library"),
            interval_at(34.0224, -118.2851, 15, 0, 60, 0.5, "Library"),
            interval_at(34.0224, -118.2851, 16, 0, 60, 0.9, "Library"),
            interval_at(34.0300, -118.2900, 9, 0, 60, -0.8, "Gym"),
        ]
    }

    #[test]
    fn test_building_sentiment_overall() {
        // Closed square ring: the repeated first vertex pulls the sampled
        // centroid slightly toward it but stays well inside the threshold.
        let building = square(34.0224, -118.2851, 0.0001);
        let config = AnalysisConfig::default();

        let result = building_sentiment(&building, &campus_intervals(), &config, false).unwrap();
        assert_eq!(result.intervals().len(), 5);
        assert!(approx_eq(result.sentiment(), (0.2 + 0.4 - 0.3 + 0.5 + 0.9) / 5.0, 1e-12));
        assert!(result.time_buckets().is_none());
        assert!(!result.has_multiple_buckets());
    }

    #[test]
    fn test_building_sentiment_no_match_is_none() {
        let building = square(34.0500, -118.2500, 0.0001);
        let config = AnalysisConfig::default();
        assert!(building_sentiment(&building, &campus_intervals(), &config, false).is_none());
        assert!(building_sentiment(&building, &campus_intervals(), &config, true).is_none());
        assert!(building_sentiment(&building, &[], &config, false).is_none());
    }

    #[test]
    fn test_building_with_empty_ring_is_none() {
        let building = Building::new(None, Map::new(), vec![]);
        let config = AnalysisConfig::default();
        assert!(building_sentiment(&building, &campus_intervals(), &config, false).is_none());
    }

    #[test]
    fn test_threshold_is_strict() {
        let building = Building::new(None, Map::new(), vec![[-118.0, 34.0]]);
        let config = AnalysisConfig {
            building_threshold_deg: 0.5,
            ..AnalysisConfig::default()
        };
        // Exactly 0.5 degrees away: distance² == threshold², excluded
        let on_edge = vec![interval_at(34.5, -118.0, 9, 0, 10, 0.1, "Edge")];
        assert!(building_sentiment(&building, &on_edge, &config, false).is_none());

        let inside = vec![interval_at(34.25, -118.0, 9, 0, 10, 0.1, "Inside")];
        assert!(building_sentiment(&building, &inside, &config, false).is_some());
    }

    #[test]
    fn test_building_sentiment_bucketed_weights_by_count() {
        let building = square(34.0224, -118.2851, 0.0001);
        let config = AnalysisConfig::default();

        let result = building_sentiment(&building, &campus_intervals(), &config, true).unwrap();
        let buckets = result.time_buckets().unwrap();

        let starts: Vec<u32> = buckets.iter().map(|b| b.bucket).collect();
        assert_eq!(starts, vec![9, 12, 15]);
        assert_eq!(buckets[0].intervals.len(), 2);
        assert!(approx_eq(buckets[0].avg_sentiment, 0.3, 1e-12));
        assert_eq!(buckets[0].total_duration, 90.0);
        assert!(approx_eq(buckets[1].avg_sentiment, -0.3, 1e-12));
        assert!(approx_eq(buckets[2].avg_sentiment, 0.7, 1e-12));
        assert!(result.has_multiple_buckets());

        // Mean of all five, not mean of the three bucket means (0.2333...)
        assert!(approx_eq(result.sentiment(), 0.34, 1e-12));
    }

    #[test]
    fn test_single_bucket_flag() {
        let building = square(34.0224, -118.2851, 0.0001);
        let intervals = vec![
            interval_at(34.0224, -118.2851, 9, 0, 60, 0.2, "Library"),
            interval_at(34.0224, -118.2851, 10, 0, 60, 0.4, "Library"),
        ];
        let result =
            building_sentiment(&building, &intervals, &AnalysisConfig::default(), true).unwrap();
        assert_eq!(result.time_buckets().map(|b| b.len()), Some(1));
        assert!(!result.has_multiple_buckets());
    }

    #[test]
    fn test_matcher_agrees_with_scan() {
        let intervals = campus_intervals();
        let buildings = BuildingCollection::new(vec![
            square(34.0224, -118.2851, 0.0001),
            square(34.0300, -118.2900, 0.0001),
            square(34.0500, -118.2500, 0.0001),
        ]);
        let config = AnalysisConfig::default();
        let matcher = BuildingMatcher::new(&intervals, config.clone());

        for bucketed in [false, true] {
            let batch = matcher.sentiments_for_all(&buildings, bucketed);
            let scanned: Vec<Option<BuildingSentiment>> = buildings
                .iter()
                .map(|b| building_sentiment(b, &intervals, &config, bucketed))
                .collect();
            assert_eq!(batch, scanned);
        }

        let batch = matcher.sentiments_for_all(&buildings, false);
        assert!(batch[0].is_some());
        assert!(batch[1].is_some());
        assert!(batch[2].is_none());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_matcher_parallel_matches_sequential() {
        let intervals = campus_intervals();
        let buildings = BuildingCollection::new(vec![
            square(34.0224, -118.2851, 0.0001),
            square(34.0500, -118.2500, 0.0001),
        ]);
        let matcher = BuildingMatcher::new(&intervals, AnalysisConfig::default());
        assert_eq!(
            matcher.sentiments_for_all(&buildings, true),
            matcher.sentiments_for_all_parallel(&buildings, true)
        );
    }

    #[test]
    fn test_within_radius() {
        let buildings = BuildingCollection::new(vec![
            square(34.0224, -118.2851, 0.0001),
            square(34.0300, -118.2851, 0.0001), // ~0.85km north
            square(34.0500, -118.2851, 0.0001), // ~3km north
        ]);
        let near = buildings.within_radius(&crate::CAMPUS_CENTER, 1.3);
        assert_eq!(near.len(), 2);
        assert!(buildings.within_radius(&crate::CAMPUS_CENTER, 0.0).len() <= 1);
    }

    #[test]
    fn test_coverage() {
        let buildings = BuildingCollection::new(vec![
            square(34.0224, -118.2851, 0.0001),
            square(34.0300, -118.2900, 0.0002),
        ]);
        let bounds = buildings.coverage().unwrap();
        assert!(approx_eq(bounds.min_lat, 34.0223, 1e-9));
        assert!(approx_eq(bounds.max_lat, 34.0302, 1e-9));
        assert!(approx_eq(bounds.min_lng, -118.2902, 1e-9));
        assert!(approx_eq(bounds.max_lng, -118.2850, 1e-9));

        assert!(BuildingCollection::default().coverage().is_none());
    }

    #[test]
    fn test_bucketed_serialization_shape() {
        let building = square(34.0224, -118.2851, 0.0001);
        let result = building_sentiment(
            &building,
            &campus_intervals(),
            &AnalysisConfig::default(),
            true,
        )
        .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("timeBuckets").is_some());
        assert_eq!(json["hasMultipleBuckets"], true);
        assert!(json["timeBuckets"][0].get("avgSentiment").is_some());
    }
}
