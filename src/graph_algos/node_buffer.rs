use std::sync::Arc;
use std::time::Instant;

use indexmap::map::Entry::Vacant;
use log::{debug, warn};
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::collections::FxIndexSet;
use crate::config::SearchConfig;
use crate::errors::{RouteError, StoreError};
use crate::geometry::BoundingBox;
use crate::store::{GeoNode, NodeId, NodeStore};
use super::{ScoredNode, ScoredNodeMap, SearchStats};


/// Margin added around every tile before querying the store
/// The store answers strictly-inside queries, so without it nodes lying on a
/// shared tile edge would be dropped by both tiles.
pub const TILE_EPSILON: f64 = 1e-9;


/// Lazily filled cache of scored nodes for one search
///
/// Regions are fetched from the store in tiles, each tile on its own task.
/// Tasks write into a shared map behind a reader/writer lock, and `populate`
/// only returns once every tile of the region has landed, so the search never
/// sees a half-filled region.
pub struct NodeBuffer<S: NodeStore> {
    store: Arc<S>,
    goal: Arc<GeoNode>,
    config: SearchConfig,
    nodes: Arc<RwLock<ScoredNodeMap>>,
    connections: Arc<Semaphore>, // bounds store queries in flight
    fetched_tiles: FxIndexSet<[u64; 4]>,
    stats: SearchStats,
}

impl<S: NodeStore> NodeBuffer<S> {

    pub fn new(store: Arc<S>, goal: Arc<GeoNode>, config: &SearchConfig) -> Self {
        let permits = config.max_connections.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            store,
            goal,
            config: config.clone(),
            nodes: Arc::new(RwLock::new(ScoredNodeMap::default())),
            connections: Arc::new(Semaphore::new(permits)),
            fetched_tiles: FxIndexSet::with_capacity_and_hasher(config.tiles_per_box(), Default::default()),
            stats: SearchStats::default(),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<ScoredNode> {
        self.nodes.read().get(&id).cloned()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.read().contains_key(&id)
    }

    /// Store a node, replacing any previous scores for the same id
    pub fn insert(&self, node: ScoredNode) {
        self.nodes.write().insert(node.id(), node);
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Fetch counters, `nodes_buffered` reflects the current size
    pub fn stats(&self) -> SearchStats {
        SearchStats { nodes_buffered: self.len(), ..self.stats.clone() }
    }

    /// Half-width of the prefetch box around `reference`
    /// The remaining distance to the goal in degrees: far from the goal, wide box.
    pub fn half_width(&self, reference: &GeoNode) -> f64 {
        reference.degrees_to(&self.goal).max(self.config.min_half_width)
    }

    /// Fetch every node in the box around `reference`
    /// Returns the number of nodes that were not buffered before.
    pub async fn populate(&mut self, reference: &GeoNode) -> Result<usize, RouteError> {
        let half_width = self.half_width(reference);
        self.populate_box(reference, half_width).await
    }

    /// Fetch every node in the box of +/- `half_width` around `center`
    pub async fn populate_box(&mut self, center: &GeoNode, half_width: f64) -> Result<usize, RouteError> {

        let region = BoundingBox::around(center.lat, center.lon, half_width);
        if region.is_empty() {
            debug!("skipping empty region around node {}", center.id);
            return Ok(0);
        }

        let started = Instant::now();
        self.stats.fetch_rounds += 1;

        let mut tasks: JoinSet<Result<usize, StoreError>> = JoinSet::new();
        for tile in region.tiles(self.config.lat_tiles, self.config.lon_tiles) {

            if self.config.dedup_tiles && !self.fetched_tiles.insert(tile.key()) {
                self.stats.tiles_skipped += 1;
                continue;
            }

            let store = Arc::clone(&self.store);
            let goal = Arc::clone(&self.goal);
            let nodes = Arc::clone(&self.nodes);
            let connections = Arc::clone(&self.connections);
            let metric = self.config.metric;

            tasks.spawn(async move {
                let _permit = connections
                    .acquire_owned()
                    .await
                    .map_err(|_| StoreError::Unavailable("connection pool closed".to_string()))?;

                let found = store.query_region(tile.padded(TILE_EPSILON)).await?;
                let fetched = found.len();

                // score outside the lock, the write section only inserts
                let scored: Vec<ScoredNode> = found
                    .into_iter()
                    .map(|node| ScoredNode::new(Arc::new(node), &goal, metric))
                    .collect();

                let mut inserted = 0;
                let mut buffer = nodes.write();
                for node in scored {
                    if let Vacant(e) = buffer.entry(node.id()) {
                        e.insert(node);
                        inserted += 1;
                    }
                }
                drop(buffer);

                debug!("tile {tile:?}: {fetched} nodes, {inserted} new");
                Ok(inserted)
            });
        }

        let launched = tasks.len();
        self.stats.tiles_fetched += launched;

        // barrier: every tile lands (or the whole region fails) before returning
        let mut inserted = 0;
        let mut failed = 0;
        let mut store_error: Option<StoreError> = None;
        let mut task_error: Option<String> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(count)) => inserted += count,
                Ok(Err(e)) => {
                    warn!("tile fetch around node {} failed: {e}", center.id);
                    failed += 1;
                    if store_error.is_none() {
                        store_error = Some(e);
                    }
                    tasks.abort_all();
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    failed += 1;
                    if task_error.is_none() {
                        task_error = Some(e.to_string());
                    }
                    tasks.abort_all();
                }
            }
        }

        let elapsed = started.elapsed();
        self.stats.fetch_time += elapsed;

        if let Some(message) = task_error {
            return Err(RouteError::TaskFailed(message));
        }
        if let Some(source) = store_error {
            return Err(RouteError::Fetch { failed_tiles: failed, total_tiles: launched, source });
        }

        debug!(
            "populated {launched} tiles around node {} (+/- {half_width:.6}) in {elapsed:?}: {inserted} new nodes",
            center.id
        );
        Ok(inserted)
    }
}
