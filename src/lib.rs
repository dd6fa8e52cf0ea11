//! # Sentiment Mapper
//!
//! Data transformation for a geospatial sentiment map.
//!
//! This library provides:
//! - Loading of time-stamped location intervals and building footprints
//! - Aggregation by location, by time-of-day bucket and by building proximity
//! - Travel path reconstruction from the chronological interval stream
//! - Striped (multi-segment) dot and polygon data for rendering
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel batch building matching with rayon
//! - **`http`** - Enable the HTTP data source
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use sentiment_mapper::{loader, aggregation, AnalysisConfig};
//!
//! let json = r#"[
//!   {"latitude": 34.0224, "longitude": -118.2851,
//!    "start_time": "2025-11-03T09:00:00", "end_time": "2025-11-03T10:00:00",
//!    "duration_minutes": 60, "sentiment_score": 0.4,
//!    "location_name": "Library", "location_type": "library"}
//! ]"#;
//!
//! let config = AnalysisConfig::default();
//! let intervals = loader::parse_intervals(json, &config.timezone).unwrap();
//! let groups = aggregation::aggregate_by_location(&intervals);
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].total_duration, 60.0);
//! ```

use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{LoadError, Result};

// Geographic utilities (distance, centroid, bounds)
pub mod geo_utils;

// Source parsing and normalization
pub mod loader;
pub use loader::{
    buildings_from_osm, normalize_intervals, parse_buildings, parse_intervals, parse_locations,
    parse_osm_buildings,
};

// HTTP data source
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::{fetch_all_blocking, DataSource, Dataset, SourcePaths};

// Date and hour-of-day filters
pub mod filters;
pub use filters::{filter_by_date, filter_by_time};

// Location and time-bucket aggregation
pub mod aggregation;
pub use aggregation::{
    aggregate_by_location, aggregate_by_time_buckets, group_by_location, LocationAggregate,
    LocationGroup, TimeBucketAggregate,
};

// Building footprints and proximity matching
pub mod buildings;
pub use buildings::{
    building_sentiment, Building, BuildingCollection, BuildingMatcher, BuildingSentiment,
    SentimentBucket,
};

// Travel path reconstruction
pub mod paths;
pub use paths::{create_travel_paths, TravelPath};

// Striped dot and polygon builders
pub mod striping;
pub use striping::{striped_dot, striped_dots, striped_polygon, PieSegment, StripedDot, StripedPolygon};

// Sentiment color ramp
pub mod colors;
pub use colors::sentiment_color;

// ============================================================================
// Constants
// ============================================================================

/// Width of a time-of-day bucket in hours.
pub const DEFAULT_BUCKET_SIZE_HOURS: u32 = 3;

/// Building proximity threshold in degrees (compared squared).
/// Tuned for the campus dataset near 34°N; not geodetically meaningful elsewhere.
pub const DEFAULT_BUILDING_THRESHOLD_DEG: f64 = 3e-4;

/// Number of leading outer-ring coordinates averaged for a building centroid.
pub const CENTROID_SAMPLE_SIZE: usize = 10;

/// Reference center of the campus dataset (USC).
pub const CAMPUS_CENTER: GpsPoint = GpsPoint {
    latitude: 34.0224,
    longitude: -118.2851,
};

/// Rough kilometres per degree used by radius filtering.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Coordinates are grouped at this many decimal digits.
const KEY_SCALE: f64 = 1e6;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use sentiment_mapper::GpsPoint;
/// let point = GpsPoint::new(34.0224, -118.2851); // USC
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// `[lon, lat]` ordering, as GeoJSON and the renderer expect.
    pub fn lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// Bounding box of a set of coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(geo_utils::compute_bounds(points))
    }
}

/// Whether an interval is spent at a place or moving between places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Stay,
    Transit,
}

impl LocationKind {
    /// Transit records are tagged with the name "Traveling" or the type "traveling".
    pub fn classify(location_name: &str, location_type: &str) -> Self {
        if location_name == "Traveling" || location_type == "traveling" {
            LocationKind::Transit
        } else {
            LocationKind::Stay
        }
    }
}

/// A span of time a person spends at, or moving through, a location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interval {
    pub latitude: f64,
    pub longitude: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Not re-derived from the timestamps; callers keep the two consistent.
    pub duration_minutes: f64,
    pub sentiment_score: f64,
    pub location_name: String,
    pub location_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    pub kind: LocationKind,
}

impl Interval {
    /// Create an interval whose duration is derived from its timestamps.
    ///
    /// # Example
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use sentiment_mapper::{Interval, LocationKind};
    ///
    /// let start = Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap();
    /// let end = Utc.with_ymd_and_hms(2025, 11, 3, 9, 45, 0).unwrap();
    /// let interval = Interval::new(34.02, -118.28, start, end, 0.5, "Library", "library");
    /// assert_eq!(interval.duration_minutes, 45.0);
    /// assert_eq!(interval.kind, LocationKind::Stay);
    /// ```
    pub fn new(
        latitude: f64,
        longitude: f64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        sentiment_score: f64,
        location_name: &str,
        location_type: &str,
    ) -> Self {
        let duration_minutes = (end_time - start_time).num_seconds() as f64 / 60.0;
        Self {
            latitude,
            longitude,
            start_time,
            end_time,
            duration_minutes,
            sentiment_score,
            location_name: location_name.to_string(),
            location_type: location_type.to_string(),
            activity: None,
            kind: LocationKind::classify(location_name, location_type),
        }
    }

    pub fn position(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    pub fn lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    pub fn is_transit(&self) -> bool {
        self.kind == LocationKind::Transit
    }

    /// Coordinate rounded to 6 decimal digits.
    pub fn location_key(&self) -> LocationKey {
        LocationKey::from_coords(self.latitude, self.longitude)
    }

    /// Start time in the reference timezone.
    pub fn local_start(&self, tz: &FixedOffset) -> DateTime<FixedOffset> {
        self.start_time.with_timezone(tz)
    }

    /// Local hour-of-day of the start time.
    pub fn local_hour(&self, tz: &FixedOffset) -> u32 {
        self.local_start(tz).hour()
    }

    /// Local hour-of-day of the start time including minutes (`hour + minute / 60`).
    pub fn local_fractional_hour(&self, tz: &FixedOffset) -> f64 {
        let local = self.local_start(tz);
        local.hour() as f64 + local.minute() as f64 / 60.0
    }

    /// Start of the `bucket_size`-hour time-of-day window containing the start time.
    pub fn time_bucket(&self, bucket_size: u32, tz: &FixedOffset) -> u32 {
        let size = bucket_size.max(1);
        (self.local_hour(tz) / size) * size
    }
}

/// Grouping key: latitude and longitude rounded to 6 decimal digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey {
    lat_e6: i64,
    lng_e6: i64,
}

impl LocationKey {
    pub fn from_coords(latitude: f64, longitude: f64) -> Self {
        Self {
            lat_e6: (latitude * KEY_SCALE).round() as i64,
            lng_e6: (longitude * KEY_SCALE).round() as i64,
        }
    }

    /// The rounded coordinate this key stands for.
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.lat_e6 as f64 / KEY_SCALE, self.lng_e6 as f64 / KEY_SCALE)
    }
}

/// Display form used by the renderer, e.g. `34.022400,-118.285100`.
impl std::fmt::Display for LocationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let p = self.point();
        write!(f, "{:.6},{:.6}", p.latitude, p.longitude)
    }
}

/// Location descriptor copied from the first interval of a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationInfo {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: String,
}

impl LocationInfo {
    pub fn from_interval(interval: &Interval) -> Self {
        Self {
            latitude: interval.latitude,
            longitude: interval.longitude,
            name: interval.location_name.clone(),
            location_type: interval.location_type.clone(),
        }
    }

    pub fn lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration shared by filters, bucketers and the building matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Reference timezone for local dates and hours.
    /// Serialized as seconds east of UTC. Default: UTC
    #[serde(with = "offset_seconds")]
    pub timezone: FixedOffset,

    /// Width of time-of-day buckets in hours. Default: 3
    pub bucket_size_hours: u32,

    /// Building proximity threshold in degrees. Default: 3e-4 (~30m near 34°N)
    pub building_threshold_deg: f64,

    /// Leading ring coordinates averaged for a building centroid. Default: 10
    pub centroid_sample_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            timezone: utc_offset(),
            bucket_size_hours: DEFAULT_BUCKET_SIZE_HOURS,
            building_threshold_deg: DEFAULT_BUILDING_THRESHOLD_DEG,
            centroid_sample_size: CENTROID_SAMPLE_SIZE,
        }
    }
}

impl AnalysisConfig {
    /// Default configuration with a fixed UTC offset in hours (e.g. `-8` for PST).
    /// Returns `None` for offsets outside ±24h.
    pub fn with_utc_offset_hours(hours: i32) -> Option<Self> {
        let timezone = FixedOffset::east_opt(hours.checked_mul(3600)?)?;
        Some(Self {
            timezone,
            ..Self::default()
        })
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

mod offset_seconds {
    use chrono::FixedOffset;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        tz: &FixedOffset,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i32(tz.local_minus_utc())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<FixedOffset, D::Error> {
        let secs = i32::deserialize(deserializer)?;
        FixedOffset::east_opt(secs)
            .ok_or_else(|| D::Error::custom(format!("UTC offset out of range: {}s", secs)))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;

    /// Interval starting at `hour:minute` UTC on 2025-11-03, lasting `minutes`.
    pub fn interval_at(
        lat: f64,
        lng: f64,
        hour: u32,
        minute: u32,
        minutes: i64,
        sentiment: f64,
        name: &str,
    ) -> Interval {
        let start = Utc.with_ymd_and_hms(2025, 11, 3, hour, minute, 0).unwrap();
        let end = start + chrono::Duration::minutes(minutes);
        let location_type = if name == "Traveling" { "traveling" } else { "place" };
        Interval::new(lat, lng, start, end, sentiment, name, location_type)
    }
}
