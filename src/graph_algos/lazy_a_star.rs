use crate::config::{SearchConfig, SelectionStrategy};
use crate::errors::RouteError;
use crate::geometry::BoundingBox;
use crate::store::{GeoNode, NodeId, NodeStore};
use super::node_buffer::NodeBuffer;
use super::{Route, ScoredNode, ScoredNodeMap, SearchStats, reconstruct};

use std::sync::Arc;
use std::time::Instant;
use log::{debug, info, warn};


/// Smallest half-width in degrees used when looking up a missing neighbor
const SEED_HALF_WIDTH: f64 = 1e-4;

/// Pick the next node to expand
/// Ties keep the node that was inserted into the open set first.
pub fn select_frontier(open_set: &ScoredNodeMap, strategy: SelectionStrategy) -> Option<&ScoredNode> {
    let score = |node: &ScoredNode| match strategy {
        SelectionStrategy::ByG => node.g,
        SelectionStrategy::ByF => node.f,
    };

    let mut best: Option<&ScoredNode> = None;
    for node in open_set.values() {
        if best.is_none_or(|b| score(node) < score(b)) {
            best = Some(node);
        }
    }
    best
}


/// Best-first route search over a node store that is read lazily
///
/// Nodes are pulled from the store region by region as the search reaches
/// them, see `NodeBuffer`. By default the frontier is ordered by g rather
/// than f (`SelectionStrategy::ByG`), so the expansion order is Dijkstra's
/// and h only feeds the reported f scores.
/// https://en.wikipedia.org/wiki/A*_search_algorithm
pub struct LazyAStar<S: NodeStore> {
    store: Arc<S>,
    config: SearchConfig,
}

impl<S: NodeStore> LazyAStar<S> {

    pub fn new(store: Arc<S>, config: SearchConfig) -> Result<Self, RouteError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Route between two coordinates, each snapped to its nearest network node
    pub async fn route(&self, from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> Result<Route, RouteError> {
        let start = self.store.find_nearest_node(from_lat, from_lon).await?;
        let goal = self.store.find_nearest_node(to_lat, to_lon).await?;
        debug!("snapped ({from_lat}, {from_lon}) to node {}, ({to_lat}, {to_lon}) to node {}", start.id, goal.id);
        self.search(start, goal).await
    }

    /// Cheapest route from `start` to `goal`
    /// Exhausting the frontier is not an error: the route then has cost -1 and no path.
    /// Store failures and an exceeded deadline abort the search, in-flight fetches included.
    pub async fn search(&self, start: GeoNode, goal: GeoNode) -> Result<Route, RouteError> {
        match self.config.deadline() {
            Some(deadline) => tokio::time::timeout(deadline, self.run(start, goal))
                .await
                .map_err(|_| {
                    warn!("route search gave up after {deadline:?}");
                    RouteError::Timeout(deadline)
                })?,
            None => self.run(start, goal).await,
        }
    }

    async fn run(&self, start: GeoNode, goal: GeoNode) -> Result<Route, RouteError> {

        let started = Instant::now();
        let metric = self.config.metric;

        // start and goal coincide: nothing to fetch
        if start.id == goal.id {
            return Ok(Route { cost: 0.0, path: vec![start], stats: SearchStats::default() });
        }

        info!("searching route from node {} to node {}", start.id, goal.id);
        let start = Arc::new(start);
        let goal = Arc::new(goal);

        // Nodes discovered but not expanded, in discovery order
        let mut open_set = ScoredNodeMap::default();
        // Expanded nodes, never reopened
        let mut closed_set = ScoredNodeMap::default();
        // node id -> node it was reached from on the cheapest known path
        let mut came_from = ScoredNodeMap::default();

        let mut buffer = NodeBuffer::new(Arc::clone(&self.store), Arc::clone(&goal), &self.config);
        buffer.populate(&start).await?;
        if buffer.is_empty() {
            debug!("nothing buffered around start node {}, neighbors are fetched on demand", start.id);
        }

        let start_node = ScoredNode::new(Arc::clone(&start), &goal, metric).rescore(0.0);
        buffer.insert(start_node.clone());
        open_set.insert(start_node.id(), start_node);

        let mut expanded = 0;

        while let Some(current) = select_frontier(&open_set, self.config.selection).cloned() {

            // Check if we've reached the goal
            if current.id() == goal.id {
                let (cost, path) = reconstruct(&came_from, &current);
                let stats = SearchStats { expanded, ..buffer.stats() };
                info!(
                    "route found: cost {cost:.3}, {} nodes, {expanded} expanded, {} fetch rounds ({} tiles, {} skipped), {:?} fetching, {:?} total",
                    path.len(),
                    stats.fetch_rounds,
                    stats.tiles_fetched,
                    stats.tiles_skipped,
                    stats.fetch_time,
                    started.elapsed()
                );
                return Ok(Route { cost, path, stats });
            }

            open_set.shift_remove(&current.id());
            closed_set.insert(current.id(), current.clone());
            expanded += 1;

            // loop over neighbors
            for &neighbor_id in &current.node.neighbors {

                let Some(neighbor) = self.lookup(&mut buffer, &current.node, neighbor_id).await? else {
                    warn!("node {} links to node {neighbor_id} which the store did not return, skipping", current.id());
                    continue;
                };

                if closed_set.contains_key(&neighbor_id) {
                    continue;
                }

                // new cost to reach this node = edge cost + node cost
                let tentative = current.g + current.node.distance_to(&neighbor.node, metric);

                let known = open_set.get(&neighbor_id).map(|n| n.g);
                if known.is_none_or(|g| tentative < g) {
                    came_from.insert(neighbor_id, current.clone());
                    let rescored = neighbor.rescore(tentative);
                    buffer.insert(rescored.clone());
                    // an existing entry keeps its position, so tie-breaks stay stable
                    open_set.insert(neighbor_id, rescored);
                }
            }
        }

        let stats = SearchStats { expanded, ..buffer.stats() };
        info!(
            "no route from node {} to node {}: {expanded} nodes expanded, {} fetch rounds, {:?} total",
            start.id,
            goal.id,
            stats.fetch_rounds,
            started.elapsed()
        );
        Ok(Route::not_found(stats))
    }

    /// Buffered node for `id`, fetching the region around `at` on a miss
    /// The box is centred on the node being expanded, not on the neighbor whose
    /// position is still unknown. While the neighbor is missing the box is
    /// doubled until it covers the whole coordinate domain; only then is the
    /// neighbor reported absent.
    async fn lookup(&self, buffer: &mut NodeBuffer<S>, at: &GeoNode, id: NodeId) -> Result<Option<ScoredNode>, RouteError> {
        if let Some(node) = buffer.get(id) {
            return Ok(Some(node));
        }

        // `at` may share the goal's coordinates, which gives a zero-width box
        let mut half_width = buffer.half_width(at).max(SEED_HALF_WIDTH);
        loop {
            buffer.populate_box(at, half_width).await?;
            if let Some(node) = buffer.get(id) {
                return Ok(Some(node));
            }

            let region = BoundingBox::around(at.lat, at.lon, half_width);
            if region.covers(&BoundingBox::WORLD) || !half_width.is_finite() {
                return Ok(None);
            }
            half_width *= 2.0;
            debug!("node {id} not found around node {}, widening box to +/- {half_width:.6}", at.id);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::geometry::Metric;
    use crate::store::MemoryNodeStore;
    use std::time::Duration;

    fn euclidean_config() -> SearchConfig {
        SearchConfig { metric: Metric::Euclidean, ..SearchConfig::default() }
    }

    fn planner(nodes: Vec<GeoNode>, config: SearchConfig) -> (Arc<MemoryNodeStore>, LazyAStar<MemoryNodeStore>) {
        let store = Arc::new(MemoryNodeStore::new(nodes).unwrap());
        let planner = LazyAStar::new(Arc::clone(&store), config).unwrap();
        (store, planner)
    }

    fn ids(route: &Route) -> Vec<NodeId> {
        route.path.iter().map(|n| n.id).collect()
    }

    // S(0,0) reaches T(3,0) through A(0,1) first, and more cheaply through B(2,0) later
    fn detour_graph() -> Vec<GeoNode> {
        vec![
            GeoNode::new(1, 0.0, 0.0, vec![2, 3]),
            GeoNode::new(2, 0.0, 1.0, vec![1, 4]),
            GeoNode::new(3, 2.0, 0.0, vec![1, 4]),
            GeoNode::new(4, 3.0, 0.0, vec![2, 3]),
        ]
    }

    #[tokio::test]
    async fn test_search_picks_cheaper_predecessor() {
        let (store, planner) = planner(detour_graph(), euclidean_config());
        let start = store.get(1).unwrap().clone();
        let goal = store.get(4).unwrap().clone();

        let route = planner.search(start, goal).await.unwrap();

        assert!(route.is_found());
        assert_eq!(ids(&route), vec![1, 3, 4]);
        assert!((route.cost - 3.0).abs() < 1e-9);
        assert_eq!(route.stats.expanded, 3);
    }

    #[tokio::test]
    async fn test_search_same_start_and_goal() {
        let (store, planner) = planner(detour_graph(), euclidean_config());
        let node = store.get(2).unwrap().clone();

        let route = planner.search(node.clone(), node.clone()).await.unwrap();

        assert_eq!(route.cost, 0.0);
        assert_eq!(route.path, vec![node]);
        assert_eq!(store.region_queries(), 0);
    }

    #[tokio::test]
    async fn test_search_unreachable_goal() {
        let mut nodes = detour_graph();
        nodes.push(GeoNode::new(9, 1.0, 1.0, vec![]));
        let (store, planner) = planner(nodes, euclidean_config());

        let route = planner
            .search(store.get(1).unwrap().clone(), store.get(9).unwrap().clone())
            .await
            .unwrap();

        assert_eq!(route.cost, Route::NO_ROUTE_COST);
        assert!(route.path.is_empty());
        assert_eq!(route.stats.expanded, 4);
    }

    #[tokio::test]
    async fn test_search_skips_dangling_neighbor() {
        let nodes = vec![
            GeoNode::new(1, 0.0, 0.0, vec![42, 2]), // 42 does not exist
            GeoNode::new(2, 0.0, 1.0, vec![1, 3]),
            GeoNode::new(3, 0.0, 2.0, vec![2]),
        ];
        let (store, planner) = planner(nodes, euclidean_config());

        let route = planner
            .search(store.get(1).unwrap().clone(), store.get(3).unwrap().clone())
            .await
            .unwrap();

        assert_eq!(ids(&route), vec![1, 2, 3]);
        assert!((route.cost - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_search_widens_box_for_far_neighbor() {
        // node 3 lies outside the box sized by the distance from node 2 to the goal
        let nodes = vec![
            GeoNode::new(1, 0.0, 0.0, vec![2]),
            GeoNode::new(2, 0.0, 4.0, vec![1, 3]),
            GeoNode::new(3, 0.0, 7.0, vec![2, 4]),
            GeoNode::new(4, 0.0, 5.0, vec![3]),
        ];
        let (store, planner) = planner(nodes, euclidean_config());

        let route = planner
            .search(store.get(1).unwrap().clone(), store.get(4).unwrap().clone())
            .await
            .unwrap();

        assert_eq!(ids(&route), vec![1, 2, 3, 4]);
        assert!((route.cost - 9.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_search_follows_long_edge_near_goal() {
        // A sits 0.1 from the goal, so its box is tiny, but its only road runs out to B
        let nodes = vec![
            GeoNode::new(1, 0.0, 0.0, vec![2]),
            GeoNode::new(2, 0.0, 0.9, vec![1, 3]),
            GeoNode::new(3, 0.0, 5.0, vec![2, 4]),
            GeoNode::new(4, 0.0, 1.0, vec![3]),
        ];
        let (store, planner) = planner(nodes, euclidean_config());

        let route = planner
            .search(store.get(1).unwrap().clone(), store.get(4).unwrap().clone())
            .await
            .unwrap();

        assert_eq!(ids(&route), vec![1, 2, 3, 4]);
        assert!((route.cost - 9.0).abs() < 1e-9, "cost {}", route.cost);
    }

    #[tokio::test]
    async fn test_search_through_node_on_goal_coordinates() {
        // an overpass: two distinct nodes at the same position
        let nodes = vec![
            GeoNode::new(1, 0.0, 0.0, vec![2]),
            GeoNode::new(2, 0.0, 0.0, vec![1]),
        ];
        let (store, planner) = planner(nodes, euclidean_config());

        let route = planner
            .search(store.get(1).unwrap().clone(), store.get(2).unwrap().clone())
            .await
            .unwrap();

        assert_eq!(ids(&route), vec![1, 2]);
        assert_eq!(route.cost, 0.0);
    }

    #[tokio::test]
    async fn test_search_leaves_goal_coordinates_for_far_neighbor() {
        // node 2 shares the goal's position and only leads away to node 3
        let nodes = vec![
            GeoNode::new(1, 0.0, -1.0, vec![2]),
            GeoNode::new(2, 0.0, 0.0, vec![1, 3]),
            GeoNode::new(3, 0.0, 30.0, vec![2, 4]),
            GeoNode::new(4, 0.0, 0.0, vec![3]),
        ];
        let (store, planner) = planner(nodes, euclidean_config());

        let route = planner
            .search(store.get(1).unwrap().clone(), store.get(4).unwrap().clone())
            .await
            .unwrap();

        assert_eq!(ids(&route), vec![1, 2, 3, 4]);
        assert!((route.cost - 61.0).abs() < 1e-9, "cost {}", route.cost);
    }

    #[tokio::test]
    async fn test_missing_neighbor_searched_up_to_whole_domain() {
        let nodes = vec![
            GeoNode::new(1, 0.0, 0.0, vec![42, 2]), // 42 does not exist
            GeoNode::new(2, 0.0, 1.0, vec![1]),
        ];
        let (store, planner) = planner(nodes, euclidean_config());

        let route = planner
            .search(store.get(1).unwrap().clone(), store.get(2).unwrap().clone())
            .await
            .unwrap();

        assert_eq!(ids(&route), vec![1, 2]);
        // the last box tried spans the whole coordinate domain
        assert!(route.stats.fetch_rounds >= 2);
        let widest = 2f64.powi(route.stats.fetch_rounds as i32 - 2);
        assert!(BoundingBox::around(0.0, 0.0, widest).covers(&BoundingBox::WORLD), "widest box +/- {widest}");
    }

    #[tokio::test]
    async fn test_route_snaps_coordinates() {
        let (_, planner) = planner(detour_graph(), euclidean_config());

        let route = planner.route(0.1, -0.1, 3.2, 0.1).await.unwrap();

        assert_eq!(ids(&route), vec![1, 3, 4]);
    }

    #[tokio::test]
    async fn test_store_outage_aborts_search() {
        let (store, planner) = planner(detour_graph(), euclidean_config());
        let start = store.get(1).unwrap().clone();
        let goal = store.get(4).unwrap().clone();
        store.set_offline(true);

        let result = planner.search(start, goal).await;
        assert!(matches!(
            result,
            Err(RouteError::Fetch { source: StoreError::Unavailable(_), .. })
        ));
    }

    #[tokio::test]
    async fn test_deadline_aborts_slow_search() {
        let store = Arc::new(
            MemoryNodeStore::new(detour_graph())
                .unwrap()
                .with_latency(Duration::from_millis(500)),
        );
        let config = SearchConfig { deadline_ms: Some(50), ..euclidean_config() };
        let planner = LazyAStar::new(Arc::clone(&store), config).unwrap();

        let start = store.get(1).unwrap().clone();
        let goal = store.get(4).unwrap().clone();
        let result = planner.search(start, goal).await;

        assert!(matches!(result, Err(RouteError::Timeout(d)) if d == Duration::from_millis(50)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let store = Arc::new(MemoryNodeStore::new(detour_graph()).unwrap());
        let config = SearchConfig { lon_tiles: 0, ..SearchConfig::default() };
        assert!(matches!(LazyAStar::new(store, config), Err(RouteError::InvalidConfig(_))));
    }

    #[test]
    fn test_select_frontier_ties_and_strategies() {
        let goal = GeoNode::new(0, 0.0, 10.0, vec![]);
        let scored = |id, lon: f64, g| {
            ScoredNode::new(Arc::new(GeoNode::new(id, 0.0, lon, vec![])), &goal, Metric::Euclidean).rescore(g)
        };

        let mut open_set = ScoredNodeMap::default();
        open_set.insert(5, scored(5, 0.0, 2.0)); // f = 12
        open_set.insert(3, scored(3, 9.0, 2.0)); // f = 3
        open_set.insert(7, scored(7, 8.0, 4.0)); // f = 6

        // equal g: first inserted wins
        assert_eq!(select_frontier(&open_set, SelectionStrategy::ByG).unwrap().id(), 5);
        assert_eq!(select_frontier(&open_set, SelectionStrategy::ByF).unwrap().id(), 3);

        assert!(select_frontier(&ScoredNodeMap::default(), SelectionStrategy::ByG).is_none());
    }

    #[tokio::test]
    async fn test_search_by_f_finds_valid_route() {
        let config = SearchConfig { selection: SelectionStrategy::ByF, ..euclidean_config() };
        let (store, planner) = planner(detour_graph(), config);

        let route = planner
            .search(store.get(1).unwrap().clone(), store.get(4).unwrap().clone())
            .await
            .unwrap();

        assert_eq!(ids(&route), vec![1, 3, 4]);
        assert!((route.cost - 3.0).abs() < 1e-9);
    }
}
