mod memory;

pub use memory::MemoryNodeStore;

use std::future::Future;
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::geometry::{BoundingBox, Metric, euclidean};


/// Identity of a node in the road network
pub type NodeId = i64;


/// Road network node as served by a node store
/// Immutable once fetched
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoNode {
    pub id: NodeId,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, alias = "neighbours")]
    pub neighbors: Vec<NodeId>, // adjacency, in store order
}

impl GeoNode {

    pub fn new(id: NodeId, lat: f64, lon: f64, neighbors: Vec<NodeId>) -> Self {
        Self { id, lat, lon, neighbors }
    }

    /// Cost between two nodes under the given metric
    pub fn distance_to(&self, other: &GeoNode, metric: Metric) -> f64 {
        metric.distance(self.lat, self.lon, other.lat, other.lon)
    }

    /// Planar distance in degrees, used to size prefetch boxes
    pub fn degrees_to(&self, other: &GeoNode) -> f64 {
        euclidean(self.lat, self.lon, other.lat, other.lon)
    }
}


/// External source of road network nodes
///
/// Implementations are shared by every tile task of a search, so they must
/// tolerate many outstanding queries at once. The search bounds that number
/// with `SearchConfig::max_connections`.
pub trait NodeStore: Send + Sync + 'static {

    /// Closest known node to a coordinate
    fn find_nearest_node(&self, lat: f64, lon: f64) -> impl Future<Output = Result<GeoNode, StoreError>> + Send;

    /// All nodes strictly inside `region`, in no particular order
    fn query_region(&self, region: BoundingBox) -> impl Future<Output = Result<Vec<GeoNode>, StoreError>> + Send;
}
