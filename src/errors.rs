use std::time::Duration;
use thiserror::Error;


/// Failures raised by a node store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("node store unavailable: {0}")]
    Unavailable(String), // Store could not be reached or refused the query
    #[error("no node found near ({lat}, {lon})")]
    NotFound { lat: f64, lon: f64 }, // Store holds no nodes at all
    #[error("failed to read graph: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse graph: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("kdtree error: {0}")]
    KdTree(String),
}

impl From<kdtree::ErrorKind> for StoreError {
    fn from(error: kdtree::ErrorKind) -> Self {
        StoreError::KdTree(error.to_string())
    }
}


/// Failures that abort a route search
/// "No route" is not an error, see `Route::not_found`
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("{failed_tiles} of {total_tiles} tile fetches failed: {source}")]
    Fetch {
        failed_tiles: usize,
        total_tiles: usize,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("tile fetch task failed: {0}")]
    TaskFailed(String), // Tile task panicked or was cancelled
    #[error("search exceeded deadline of {0:?}")]
    Timeout(Duration),
    #[error("invalid search configuration: {0}")]
    InvalidConfig(String),
}
