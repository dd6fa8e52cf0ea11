//! Parsing and normalization of the interval, location and building sources.
//!
//! The interval source is a JSON array of records with string timestamps.
//! Normalization parses the timestamps, classifies transit records once, and
//! passes every other field through unchanged.
//!
//! Timestamps written with an offset (RFC 3339) are taken as-is. Naive
//! timestamps (`2025-11-03T07:00:00`, as the data generator writes them) are
//! wall-clock times in the reference timezone.

use crate::buildings::{Building, BuildingCollection};
use crate::error::{json_kind, LoadError, Result};
use crate::{GpsPoint, Interval, LocationKind};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use log::{debug, info};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Naive timestamp layouts accepted in addition to RFC 3339.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Interval record as it appears in the source.
#[derive(Debug, Deserialize)]
struct RawInterval {
    latitude: f64,
    longitude: f64,
    start_time: String,
    end_time: String,
    duration_minutes: f64,
    sentiment_score: f64,
    location_name: String,
    location_type: String,
    #[serde(default)]
    activity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Value,
}

/// Element of an Overpass API response (`out geom`).
#[derive(Debug, Deserialize)]
struct RawOsmElement {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    tags: Map<String, Value>,
    #[serde(default)]
    geometry: Option<Vec<RawOsmNode>>,
}

#[derive(Debug, Deserialize)]
struct RawOsmNode {
    lat: f64,
    lon: f64,
}

// ============================================================================
// Intervals
// ============================================================================

/// Parse and normalize an interval source from JSON text.
///
/// # Errors
/// - [`LoadError::Json`] if the text is not JSON
/// - [`LoadError::NotAnArray`] if the top-level value is not an array
/// - [`LoadError::InvalidRecord`] / [`LoadError::InvalidTimestamp`] for a bad record
/// - [`LoadError::InvalidCoordinate`] for a latitude or longitude out of range
pub fn parse_intervals(json: &str, tz: &FixedOffset) -> Result<Vec<Interval>> {
    let value: Value = serde_json::from_str(json)?;
    normalize_intervals(value, tz)
}

/// Normalize an already-decoded interval source.
pub fn normalize_intervals(value: Value, tz: &FixedOffset) -> Result<Vec<Interval>> {
    let records = match value {
        Value::Array(records) => records,
        other => {
            return Err(LoadError::NotAnArray {
                found: json_kind(&other),
            })
        }
    };

    let intervals = records
        .into_iter()
        .enumerate()
        .map(|(index, record)| normalize_record(index, record, tz))
        .collect::<Result<Vec<_>>>()?;

    let transit = intervals.iter().filter(|i| i.is_transit()).count();
    info!(
        "[Loader] Normalized {} intervals ({} transit)",
        intervals.len(),
        transit
    );

    Ok(intervals)
}

fn normalize_record(index: usize, record: Value, tz: &FixedOffset) -> Result<Interval> {
    let raw: RawInterval = serde_json::from_value(record)
        .map_err(|source| LoadError::InvalidRecord { index, source })?;

    let start_time = parse_timestamp(&raw.start_time, tz).ok_or_else(|| {
        LoadError::InvalidTimestamp {
            index,
            value: raw.start_time.clone(),
        }
    })?;
    let end_time = parse_timestamp(&raw.end_time, tz).ok_or_else(|| {
        LoadError::InvalidTimestamp {
            index,
            value: raw.end_time.clone(),
        }
    })?;

    if !GpsPoint::new(raw.latitude, raw.longitude).is_valid() {
        return Err(LoadError::InvalidCoordinate {
            index,
            latitude: raw.latitude,
            longitude: raw.longitude,
        });
    }

    let kind = LocationKind::classify(&raw.location_name, &raw.location_type);

    Ok(Interval {
        latitude: raw.latitude,
        longitude: raw.longitude,
        start_time,
        end_time,
        duration_minutes: raw.duration_minutes,
        sentiment_score: raw.sentiment_score,
        location_name: raw.location_name,
        location_type: raw.location_type,
        activity: raw.activity,
        kind,
    })
}

/// Parse an ISO-8601 timestamp. Naive values are read in `tz`.
pub fn parse_timestamp(value: &str, tz: &FixedOffset) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .and_then(|naive| naive.and_local_timezone(*tz).single())
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// Locations
// ============================================================================

/// Parse the location source. Records are passed through unmodified.
pub fn parse_locations(json: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(json)?;
    match value {
        Value::Array(records) => Ok(records),
        other => Err(LoadError::NotAnArray {
            found: json_kind(&other),
        }),
    }
}

// ============================================================================
// Buildings
// ============================================================================

/// Parse a GeoJSON FeatureCollection of building footprints.
///
/// Only `Polygon` features with a non-empty outer ring are kept; holes are
/// ignored.
pub fn parse_buildings(json: &str) -> Result<BuildingCollection> {
    let value: Value = serde_json::from_str(json)?;
    buildings_from_geojson(value)
}

/// Convert an already-decoded FeatureCollection.
pub fn buildings_from_geojson(value: Value) -> Result<BuildingCollection> {
    let features = match value {
        Value::Object(mut obj) => match obj.remove("features") {
            Some(Value::Array(features)) => features,
            _ => return Err(LoadError::NotAFeatureCollection),
        },
        _ => return Err(LoadError::NotAFeatureCollection),
    };

    let total = features.len();
    let buildings: Vec<Building> = features
        .into_iter()
        .enumerate()
        .filter_map(|(index, feature)| building_from_feature(index, feature))
        .collect();

    info!(
        "[Loader] Parsed {} buildings ({} features skipped)",
        buildings.len(),
        total - buildings.len()
    );

    Ok(BuildingCollection::new(buildings))
}

fn building_from_feature(index: usize, feature: Value) -> Option<Building> {
    let raw: RawFeature = match serde_json::from_value(feature) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("[Loader] Skipping feature {}: {}", index, e);
            return None;
        }
    };

    let geometry = raw.geometry?;
    if geometry.kind != "Polygon" {
        debug!("[Loader] Skipping feature {}: {} geometry", index, geometry.kind);
        return None;
    }

    // Only the outer ring is read; holes are never decoded.
    let outer = match geometry.coordinates {
        Value::Array(mut rings) if !rings.is_empty() => rings.swap_remove(0),
        _ => {
            debug!("[Loader] Skipping feature {}: no outer ring", index);
            return None;
        }
    };
    let positions: Vec<Vec<f64>> = match serde_json::from_value(outer) {
        Ok(positions) => positions,
        Err(e) => {
            debug!("[Loader] Skipping feature {}: bad outer ring ({})", index, e);
            return None;
        }
    };

    // Positions may carry a third (altitude) element; only lon/lat are kept.
    let outer_ring: Vec<[f64; 2]> = positions
        .into_iter()
        .filter(|pos| pos.len() >= 2)
        .map(|pos| [pos[0], pos[1]])
        .collect();

    if outer_ring.is_empty() {
        debug!("[Loader] Skipping feature {}: empty outer ring", index);
        return None;
    }

    let mut properties = raw.properties.unwrap_or_default();
    let id = properties.get("id").and_then(Value::as_i64);
    let tags = match properties.remove("tags") {
        Some(Value::Object(tags)) => tags,
        _ => Map::new(),
    };

    Some(Building::new(id, tags, outer_ring))
}

// ============================================================================
// OSM conversion
// ============================================================================

/// Convert an Overpass API response (`out geom`) into building footprints.
///
/// Only `way` elements with a geometry are kept. Open rings are closed by
/// repeating the first vertex. A response without `elements` yields an
/// empty collection.
pub fn parse_osm_buildings(json: &str) -> Result<BuildingCollection> {
    let value: Value = serde_json::from_str(json)?;
    buildings_from_osm(value)
}

/// Convert an already-decoded Overpass response.
pub fn buildings_from_osm(value: Value) -> Result<BuildingCollection> {
    let elements = match value {
        Value::Object(mut obj) => match obj.remove("elements") {
            Some(Value::Array(elements)) => elements,
            None => Vec::new(),
            Some(_) => return Err(LoadError::NotAnOsmResponse),
        },
        _ => return Err(LoadError::NotAnOsmResponse),
    };

    let total = elements.len();
    let buildings: Vec<Building> = elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, element)| building_from_osm_element(index, element))
        .collect();

    info!(
        "[Loader] Converted {} of {} OSM elements to buildings",
        buildings.len(),
        total
    );

    Ok(BuildingCollection::new(buildings))
}

fn building_from_osm_element(index: usize, element: Value) -> Option<Building> {
    let raw: RawOsmElement = match serde_json::from_value(element) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("[Loader] Skipping OSM element {}: {}", index, e);
            return None;
        }
    };

    if raw.kind != "way" {
        debug!("[Loader] Skipping OSM element {}: {} element", index, raw.kind);
        return None;
    }

    let mut ring: Vec<[f64; 2]> = raw
        .geometry?
        .into_iter()
        .map(|node| [node.lon, node.lat])
        .collect();

    let (first, last) = (*ring.first()?, *ring.last()?);
    if first != last {
        ring.push(first);
    }

    Some(Building::new(raw.id, raw.tags, ring))
}

// ============================================================================
// Unit Tests
// ============================================================================
