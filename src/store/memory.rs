use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use kdtree::KdTree;
use kdtree::distance::squared_euclidean;
use serde::Deserialize;

use crate::collections::FxIndexMap;
use crate::errors::StoreError;
use crate::geometry::BoundingBox;
use super::{GeoNode, NodeId, NodeStore};


/// Graph file layout: `{"nodes": [{"id", "lat", "lon", "neighbors"}, ...]}`
#[derive(Deserialize)]
struct GraphFile {
    nodes: Vec<GeoNode>,
}


/// Node store holding the whole network in memory
/// Used for tests, demos and small extracts that fit in RAM.
pub struct MemoryNodeStore {
    nodes: FxIndexMap<NodeId, GeoNode>,
    tree: KdTree<f64, NodeId, [f64; 2]>, // (lat, lon) -> node id
    latency: Option<Duration>, // simulated round trip per query
    offline: AtomicBool,
    region_queries: AtomicUsize,
}

impl MemoryNodeStore {

    /// Build a store from a set of nodes, later duplicates replace earlier ones
    pub fn new<I>(nodes: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = GeoNode>,
    {
        let mut map: FxIndexMap<NodeId, GeoNode> = FxIndexMap::default();
        for node in nodes {
            map.insert(node.id, node);
        }

        let mut tree = KdTree::new(2);
        for node in map.values() {
            tree.add([node.lat, node.lon], node.id)?;
        }

        Ok(Self {
            nodes: map,
            tree,
            latency: None,
            offline: AtomicBool::new(false),
            region_queries: AtomicUsize::new(0),
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let graph: GraphFile = serde_json::from_str(json)?;
        Self::new(graph.nodes)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Delay every query by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// While offline every query fails with `StoreError::Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of region queries answered so far
    pub fn region_queries(&self) -> usize {
        self.region_queries.load(Ordering::SeqCst)
    }

    pub fn get(&self, id: NodeId) -> Option<&GeoNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    async fn round_trip(&self) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

impl NodeStore for MemoryNodeStore {

    async fn find_nearest_node(&self, lat: f64, lon: f64) -> Result<GeoNode, StoreError> {
        self.round_trip().await?;

        let nearest = self.tree.nearest(&[lat, lon], 1, &squared_euclidean)?;
        nearest
            .first()
            .and_then(|(_, id)| self.nodes.get(*id))
            .cloned()
            .ok_or(StoreError::NotFound { lat, lon })
    }

    async fn query_region(&self, region: BoundingBox) -> Result<Vec<GeoNode>, StoreError> {
        self.round_trip().await?;
        self.region_queries.fetch_add(1, Ordering::SeqCst);

        Ok(self
            .nodes
            .values()
            .filter(|node| region.contains_strict(node.lat, node.lon))
            .cloned()
            .collect())
    }
}
