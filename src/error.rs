//! Error types for loading interval, location and building sources.
//!
//! Only loading can fail. Every transformation downstream of the loader is
//! total over well-formed input and reports "nothing matched" as `None`.

use thiserror::Error;

/// Errors raised while fetching or decoding a data source.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("expected a JSON array at the top level, got {found}")]
    NotAnArray { found: &'static str },

    #[error("expected a GeoJSON FeatureCollection with a `features` array")]
    NotAFeatureCollection,

    #[error("record {index} could not be decoded: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid timestamp {value:?} in record {index}")]
    InvalidTimestamp { index: usize, value: String },

    #[error("coordinate ({latitude}, {longitude}) out of range in record {index}")]
    InvalidCoordinate {
        index: usize,
        latitude: f64,
        longitude: f64,
    },

    #[error("expected an Overpass response object with an `elements` array")]
    NotAnOsmResponse,

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "http")]
    #[error("HTTP {status} fetching {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[cfg(feature = "http")]
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[cfg(feature = "http")]
    #[error("invalid source URL {0:?}")]
    InvalidUrl(String),

    #[cfg(feature = "http")]
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Result type alias for loading operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Name of a JSON value's type, for error messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
