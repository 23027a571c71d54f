//! Pure graph algorithms over the registry's association edges.
//!
//! [`AssociationGraph`] is a read-only view built from the binary directed
//! edges (`source -> target`). Hyperedges are undirected and N-ary, so they
//! take no part in traversal; [`edges_between`] still matches them when both
//! queried uuids are members. All traversals carry visited-set guards and
//! terminate on cyclic and disconnected graphs.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use uuid::Uuid;

use crate::{model::Association, registry::Registry};

/// A read-only graph view over a registry's binary association edges.
///
/// Node weights are entity uuids, edge weights are association uuids. The
/// view is a snapshot: rebuild it after mutating the registry.
#[derive(Debug)]
pub struct AssociationGraph {
    graph: DiGraph<Uuid, Uuid>,
    node_indices: HashMap<Uuid, NodeIndex>,
}

impl AssociationGraph {
    /// Builds the view from the registry's current state.
    pub fn from_registry(registry: &Registry) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();

        for entity in registry.entities() {
            let idx = graph.add_node(entity.uuid);
            node_indices.insert(entity.uuid, idx);
        }
        for association in registry.associations() {
            if let Some((source, target)) = association.binary_endpoints()
                && let (Some(&source_idx), Some(&target_idx)) =
                    (node_indices.get(&source), node_indices.get(&target))
            {
                graph.add_edge(source_idx, target_idx, association.uuid);
            }
        }

        Self {
            graph,
            node_indices,
        }
    }

    /// Tests whether the connected component containing `root` is a tree
    /// under undirected connectivity.
    ///
    /// Any cycle, convergent path (two distinct routes reaching the same
    /// node), parallel edge or self-loop makes the component not a tree.
    pub fn is_tree(&self, root: Uuid) -> bool {
        let Some(&start) = self.node_indices.get(&root) else {
            return false;
        };

        // Undirected BFS to collect the component.
        let mut component = HashSet::new();
        let mut queue = VecDeque::new();
        component.insert(start);
        queue.push_back(start);
        while let Some(node) = queue.pop_front() {
            for neighbor in self.graph.neighbors_undirected(node) {
                if component.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }

        // A connected component is a tree iff it has exactly n - 1 edges.
        // Parallel edges, self-loops and diamonds all push the count past
        // that.
        let edge_count = self
            .graph
            .edge_indices()
            .filter(|&edge| {
                self.graph
                    .edge_endpoints(edge)
                    .is_some_and(|(a, b)| component.contains(&a) && component.contains(&b))
            })
            .count();

        edge_count == component.len() - 1
    }

    /// Entities reachable via one outgoing edge from `node`, in edge order,
    /// without duplicates.
    pub fn children_of(&self, node: Uuid) -> Vec<Uuid> {
        let Some(&idx) = self.node_indices.get(&node) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        self.graph
            .neighbors(idx)
            .filter_map(|neighbor| {
                let uuid = self.graph[neighbor];
                seen.insert(uuid).then_some(uuid)
            })
            .collect()
    }

    /// The full set of uuids reachable from `node` along outgoing edges.
    pub fn successor_set(&self, node: Uuid, include_self: bool) -> HashSet<Uuid> {
        let Some(&start) = self.node_indices.get(&node) else {
            return HashSet::new();
        };

        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for neighbor in self.graph.neighbors(current) {
                if visited.insert(self.graph[neighbor]) {
                    stack.push(neighbor);
                }
            }
        }

        if include_self {
            visited.insert(node);
        } else {
            visited.remove(&node);
        }
        visited
    }
}

/// All associations connecting `a` and `b`, in either orientation.
///
/// Binary edges match when their endpoint pair is `{a, b}`; hyperedges
/// match when both uuids are members.
pub fn edges_between(registry: &Registry, a: Uuid, b: Uuid) -> Vec<&Association> {
    registry
        .associations()
        .filter(|association| match association.binary_endpoints() {
            Some((source, target)) => {
                (source == a && target == b) || (source == b && target == a)
            }
            None => association.references(a) && association.references(b),
        })
        .collect()
}
