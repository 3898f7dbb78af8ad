//! Shortest route search over a road network that is fetched on demand.
//!
//! Nodes live in an external [`NodeStore`]. [`LazyAStar`] expands the search
//! frontier and, whenever it meets a node it has not seen, pulls the
//! surrounding region from the store in parallel tiles.

pub mod config;
pub mod errors;
pub mod geometry;
pub mod graph_algos;
pub mod store;
mod collections;

pub use config::{SearchConfig, SelectionStrategy};
pub use errors::{RouteError, StoreError};
pub use geometry::Metric;
pub use graph_algos::lazy_a_star::LazyAStar;
pub use graph_algos::node_buffer::NodeBuffer;
pub use graph_algos::{Route, ScoredNode, SearchStats};
pub use store::{GeoNode, MemoryNodeStore, NodeId, NodeStore};
