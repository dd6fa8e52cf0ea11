//! HTTP data source for the interval, location and building files.
//!
//! Each source is fetched with a single GET. A non-success status fails
//! immediately with [`LoadError::Status`]; there is no retry or backoff.

use crate::buildings::BuildingCollection;
use crate::error::{LoadError, Result};
use crate::loader::{parse_buildings, parse_intervals, parse_locations};
use crate::Interval;
use chrono::FixedOffset;
use log::{info, warn};
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// File names of the three sources, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    pub intervals: String,
    pub locations: String,
    pub buildings: String,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            intervals: "intervals.json".to_string(),
            locations: "locations.json".to_string(),
            buildings: "buildings_usc.geojson".to_string(),
        }
    }
}

/// Everything the map needs, loaded in one go.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub intervals: Vec<Interval>,
    pub locations: Vec<Value>,
    pub buildings: BuildingCollection,
}

/// Fetches sources from a static file server.
pub struct DataSource {
    client: Client,
    base_url: String,
    paths: SourcePaths,
}

impl DataSource {
    /// Create a data source rooted at `base_url` with the default file names.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_paths(base_url, SourcePaths::default())
    }

    pub fn with_paths(base_url: &str, paths: SourcePaths) -> Result<Self> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(LoadError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            paths,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn fetch_text(&self, path: &str) -> Result<String> {
        let url = self.url(path);
        let start = Instant::now();

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();

        if !status.is_success() {
            warn!("[DataSource] HTTP {} for {}", status, url);
            return Err(LoadError::Status { url, status });
        }

        let body = resp.text().await?;
        info!(
            "[DataSource] {} -> {:.1}KB in {:?}",
            url,
            body.len() as f64 / 1024.0,
            start.elapsed()
        );
        Ok(body)
    }

    /// Fetch and normalize intervals; naive timestamps are read in `tz`.
    pub async fn fetch_intervals(&self, tz: &FixedOffset) -> Result<Vec<Interval>> {
        let body = self.fetch_text(&self.paths.intervals).await?;
        parse_intervals(&body, tz)
    }

    /// Fetch location records, unmodified.
    pub async fn fetch_locations(&self) -> Result<Vec<Value>> {
        let body = self.fetch_text(&self.paths.locations).await?;
        parse_locations(&body)
    }

    pub async fn fetch_buildings(&self) -> Result<BuildingCollection> {
        let body = self.fetch_text(&self.paths.buildings).await?;
        parse_buildings(&body)
    }

    /// Fetch all three sources concurrently. The first failure wins.
    pub async fn fetch_all(&self, tz: &FixedOffset) -> Result<Dataset> {
        let (intervals, locations, buildings) = futures::try_join!(
            self.fetch_intervals(tz),
            self.fetch_locations(),
            self.fetch_buildings(),
        )?;

        Ok(Dataset {
            intervals,
            locations,
            buildings,
        })
    }
}

/// Synchronous wrapper: fetch everything on a private tokio runtime.
///
/// Must not be called from inside another tokio runtime.
pub fn fetch_all_blocking(base_url: &str, tz: &FixedOffset) -> Result<Dataset> {
    use tokio::runtime::Builder;

    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            warn!("[DataSource] Failed to create tokio runtime: {}", e);
            LoadError::Runtime(e)
        })?;

    let source = DataSource::new(base_url)?;
    rt.block_on(source.fetch_all(tz))
}
