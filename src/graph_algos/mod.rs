pub mod lazy_a_star;
pub mod node_buffer;
mod shortest_path;

use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;

pub(crate) use shortest_path::reconstruct;

use crate::collections::FxIndexMap;
use crate::geometry::Metric;
use crate::store::{GeoNode, NodeId};


/// Type alias for the search bookkeeping maps (open set, closed set, came-from)
/// Keyed by node identity, iterated in insertion order
pub type ScoredNodeMap = FxIndexMap<NodeId, ScoredNode>;


/// Node on the search graph
/// Invariant: f == g + h after every `rescore`
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredNode {
    pub node: Arc<GeoNode>,
    pub g: f64, // best known cost from the start
    pub h: f64, // distance to the goal, fixed at fetch time
    pub f: f64, // g + h
}

impl ScoredNode {

    /// Freshly fetched node: g = 0, h = distance to goal
    pub fn new(node: Arc<GeoNode>, goal: &GeoNode, metric: Metric) -> Self {
        let h = node.distance_to(goal, metric);
        Self { node, g: 0.0, h, f: h }
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    /// Copy of this node with a new g, h is kept as is
    pub fn rescore(&self, g: f64) -> Self {
        Self {
            node: Arc::clone(&self.node),
            g,
            h: self.h,
            f: self.h + g,
        }
    }
}


/// Counters collected while searching
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SearchStats {
    pub expanded: usize, // nodes moved to the closed set
    pub fetch_rounds: usize, // populate calls
    pub tiles_fetched: usize,
    pub tiles_skipped: usize, // tiles already covered earlier in the search
    pub nodes_buffered: usize,
    pub fetch_time: Duration,
}


/// Result of a search
/// A search that exhausts its frontier yields `cost == -1` and an empty path.
#[derive(Clone, Debug, Serialize)]
pub struct Route {
    pub cost: f64,
    pub path: Vec<GeoNode>, // start -> goal
    pub stats: SearchStats,
}

impl Route {

    pub const NO_ROUTE_COST: f64 = -1.0;

    pub fn not_found(stats: SearchStats) -> Self {
        Self { cost: Self::NO_ROUTE_COST, path: Vec::new(), stats }
    }

    pub fn is_found(&self) -> bool {
        !self.path.is_empty()
    }
}
