use super::{ScoredNode, ScoredNodeMap};
use crate::store::GeoNode;

/// Construct the path from the start node to `terminal`
/// Follows came-from links backwards until a node without predecessor is reached.
/// Returns the terminal node's g as the total cost together with the ordered
/// path from start to terminal.
pub(crate) fn reconstruct(came_from: &ScoredNodeMap, terminal: &ScoredNode) -> (f64, Vec<GeoNode>) {

    let mut path = vec![terminal.node.as_ref().clone()];
    let mut current = terminal.id();

    // Trace back from terminal to start
    // every link points at a node closed earlier, so the walk terminates
    while let Some(previous) = came_from.get(&current) {
        path.push(previous.node.as_ref().clone());
        current = previous.id();
    }

    // The path is in reverse order, so reverse it
    path.reverse();

    (terminal.g, path)
}
