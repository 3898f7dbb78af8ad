use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::RouteError;
use crate::geometry::Metric;


/// How the next frontier node is picked from the open set
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Smallest accumulated cost `g`, Dijkstra-like expansion order
    #[default]
    ByG,
    /// Smallest `f = g + h`, canonical A*
    ByF,
}


/// Tuning for one route search
///
/// ```toml
/// lat_tiles = 1
/// lon_tiles = 4
/// max_connections = 4096
/// selection = "by_g"
/// metric = "haversine"
/// deadline_ms = 30000
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Tiles along latitude per prefetch box
    pub lat_tiles: usize,
    /// Tiles along longitude per prefetch box
    /// More tiles mean smaller result sets per query but more concurrent queries.
    pub lon_tiles: usize,
    /// Upper bound on store queries in flight for one search
    pub max_connections: usize,
    pub selection: SelectionStrategy,
    /// Metric for edge costs and the heuristic
    pub metric: Metric,
    /// Abort the search after this many milliseconds
    pub deadline_ms: Option<u64>,
    /// Skip tiles that were already fetched during this search
    pub dedup_tiles: bool,
    /// Smallest prefetch half-width in degrees
    pub min_half_width: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            lat_tiles: 1,
            lon_tiles: 4,
            max_connections: 4096,
            selection: SelectionStrategy::ByG,
            metric: Metric::Haversine,
            deadline_ms: None,
            dedup_tiles: true,
            min_half_width: 0.0,
        }
    }
}

impl SearchConfig {

    pub fn from_toml_str(s: &str) -> Result<Self, RouteError> {
        let config: SearchConfig = toml::from_str(s)
            .map_err(|e| RouteError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RouteError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| RouteError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Tiles launched per prefetch box
    pub fn tiles_per_box(&self) -> usize {
        self.lat_tiles * self.lon_tiles
    }

    pub fn validate(&self) -> Result<(), RouteError> {
        if self.lat_tiles == 0 || self.lon_tiles == 0 {
            return Err(RouteError::InvalidConfig(format!(
                "tile counts must be positive, got {}x{}",
                self.lat_tiles, self.lon_tiles
            )));
        }
        if self.max_connections == 0 {
            return Err(RouteError::InvalidConfig("max_connections must be positive".to_string()));
        }
        if !self.min_half_width.is_finite() || self.min_half_width < 0.0 {
            return Err(RouteError::InvalidConfig(format!(
                "min_half_width must be a finite non-negative number, got {}",
                self.min_half_width
            )));
        }
        if self.deadline_ms == Some(0) {
            return Err(RouteError::InvalidConfig("deadline_ms must be positive".to_string()));
        }
        Ok(())
    }
}
