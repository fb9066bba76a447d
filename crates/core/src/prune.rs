//! Path network pruning.
//!
//! Two passes reduce the raw Voronoi skeleton to a routable network:
//!
//! 1. **Structural**: drop edges narrower than the minimum pathwidth, keep the
//!    largest connected component and remove short dead ends.
//! 2. **Service**: keep, for every machine, the network node closest to it,
//!    and remove longer spurs that lead nowhere useful.
//!
//! Both passes share [`prune_along_path`], an iterative walk from degree-1
//! nodes towards a set of terminal nodes.

use std::collections::HashSet;

use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::graph::{NodeId, PathGraph};

/// Parameters of [`GraphPruner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PruneParams {
    /// Edges below this pathwidth are removed.
    pub min_pathwidth: f64,
    /// Structural dead-end threshold.
    pub min_dead_end_length: f64,
    /// Service dead-end threshold.
    pub service_dead_end_length: f64,
}

impl PruneParams {
    /// Parameters with the service threshold at `factor` times the structural one.
    pub fn new(min_pathwidth: f64, min_dead_end_length: f64, factor: f64) -> Self {
        Self {
            min_pathwidth,
            min_dead_end_length,
            service_dead_end_length: min_dead_end_length * factor,
        }
    }
}

/// Counters describing one pruning run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// Edges removed for being too narrow.
    pub narrow_edges: usize,
    /// Nodes dropped with smaller components.
    pub fragment_nodes: usize,
    /// Nodes removed as short dead ends.
    pub dead_end_nodes: usize,
    /// Endpoints kept because a machine depends on them.
    pub protected_nodes: usize,
    /// Nodes removed as unused spurs.
    pub spur_nodes: usize,
}

/// Prunes a raw path graph.
#[derive(Debug, Clone, Copy)]
pub struct GraphPruner {
    params: PruneParams,
}

impl GraphPruner {
    /// Creates a pruner.
    pub fn new(params: PruneParams) -> Self {
        Self { params }
    }

    /// Runs both passes on a copy of `raw`.
    ///
    /// `anchors` are representative interior points of the obstacles that
    /// must stay reachable.
    pub fn prune(&self, raw: &PathGraph, anchors: &[(f64, f64)]) -> (PathGraph, PruneStats) {
        let mut graph = raw.clone();
        let mut stats = PruneStats::default();

        // Stage A
        stats.narrow_edges = graph.remove_edges_where(|e| e.pathwidth < self.params.min_pathwidth);
        stats.fragment_nodes = graph.retain_largest_component();
        graph.relabel();

        if graph.edge_count() == 0 {
            log::debug!("pruning left no edges");
            return (graph, stats);
        }

        let crossroads: HashSet<NodeId> = graph.crossroads().into_iter().collect();
        let stubs = prune_along_path(
            &graph,
            &graph.endpoints(),
            &crossroads,
            self.params.min_dead_end_length,
        );
        stats.dead_end_nodes = stubs.len();
        graph.remove_nodes(stubs);
        graph.relabel();

        // Stage B
        let protected = nearest_candidates(&graph, anchors);
        stats.protected_nodes = protected.len();
        let unprotected: Vec<NodeId> = graph
            .endpoints()
            .into_iter()
            .filter(|n| !protected.contains(n))
            .collect();
        let crossroads: HashSet<NodeId> = graph.crossroads().into_iter().collect();
        let spurs = prune_along_path(
            &graph,
            &unprotected,
            &crossroads,
            self.params.service_dead_end_length,
        );
        stats.spur_nodes = spurs.len();
        graph.remove_nodes(spurs);
        graph.relabel();

        log::debug!(
            "pruned path graph to {} nodes / {} edges ({:?})",
            graph.node_count(),
            graph.edge_count(),
            stats
        );

        (graph, stats)
    }
}

/// For every anchor, the nearest node among endpoints and crossroads.
fn nearest_candidates(graph: &PathGraph, anchors: &[(f64, f64)]) -> HashSet<NodeId> {
    let candidates: Vec<GeomWithData<[f64; 2], NodeId>> = graph
        .nodes()
        .filter(|(_, n)| n.degree() == 1 || n.degree() >= 3)
        .map(|(id, n)| GeomWithData::new([n.position.0, n.position.1], id))
        .collect();
    if candidates.is_empty() {
        return HashSet::new();
    }

    let tree = RTree::bulk_load(candidates);
    anchors
        .iter()
        .filter_map(|a| tree.nearest_neighbor(&[a.0, a.1]).map(|entry| entry.data))
        .collect()
}

/// Walks from each start towards `ends` and collects short dead ends.
///
/// From a degree-1 start the walk follows the only unvisited edge through
/// degree-2 nodes, summing edge weights. It stops at the first node that is
/// in `ends` or has degree 3 or more; that terminal node is kept. If the
/// accumulated length is below `threshold`, every other traversed node is
/// returned for removal.
///
/// Starts that are themselves in `ends` or do not have degree 1 are
/// skipped. A walk that reaches another degree-1 node (an isolated chain)
/// removes nothing. Degrees are read from `graph` as given; callers remove
/// the returned nodes afterwards.
pub fn prune_along_path(
    graph: &PathGraph,
    starts: &[NodeId],
    ends: &HashSet<NodeId>,
    threshold: f64,
) -> Vec<NodeId> {
    let mut doomed: Vec<NodeId> = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::new();

    for &start in starts {
        if ends.contains(&start) || graph.degree(start) != 1 {
            continue;
        }

        let mut trail = vec![start];
        let mut visited: HashSet<NodeId> = HashSet::from([start]);
        let mut length = 0.0;
        let mut current = start;
        let mut terminated = false;

        loop {
            let Some(node) = graph.node(current) else {
                break;
            };
            let next = node.edges().iter().find_map(|&e| {
                let edge = graph.edge(e)?;
                let other = edge.opposite(current)?;
                (!visited.contains(&other)).then_some((other, edge.weight))
            });
            let Some((other, weight)) = next else {
                break;
            };

            length += weight;
            if ends.contains(&other) || graph.degree(other) >= 3 {
                terminated = true;
                break;
            }
            if graph.degree(other) != 2 {
                break;
            }

            visited.insert(other);
            trail.push(other);
            current = other;
        }

        if terminated && length < threshold {
            for n in trail {
                if seen.insert(n) {
                    doomed.push(n);
                }
            }
        }
    }

    doomed
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plus-shaped graph with arms of the given lengths, made of unit steps.
    fn cross(arms: [usize; 4]) -> (PathGraph, NodeId) {
        let mut g = PathGraph::new(1e-6);
        let center = g.add_node((0.0, 0.0), 2.0);
        let dirs = [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)];
        for (steps, dir) in arms.iter().zip(dirs) {
            let mut prev = center;
            for i in 1..=*steps {
                let n = g.add_node((dir.0 * i as f64, dir.1 * i as f64), 2.0);
                g.connect(prev, n, 2.0).unwrap();
                prev = n;
            }
        }
        g.relabel();
        (g, center)
    }

    #[test]
    fn test_along_path_removes_short_stub() {
        let (g, center) = cross([1, 5, 5, 5]);
        let ends: HashSet<NodeId> = HashSet::from([center]);
        let doomed = prune_along_path(&g, &g.endpoints(), &ends, 2.0);

        assert_eq!(doomed.len(), 1);
        assert_eq!(g.node(doomed[0]).unwrap().position, (1.0, 0.0));
        assert!(!doomed.contains(&center));
    }

    #[test]
    fn test_along_path_skips_starts_in_ends() {
        let (g, center) = cross([1, 5, 5, 5]);
        let stub = g.find_node((1.0, 0.0)).unwrap();
        let ends: HashSet<NodeId> = HashSet::from([center, stub]);
        assert!(prune_along_path(&g, &[stub], &ends, 10.0).is_empty());
    }

    #[test]
    fn test_along_path_isolated_chain_kept() {
        let mut g = PathGraph::new(1e-6);
        let a = g.add_node((0.0, 0.0), 1.0);
        let b = g.add_node((1.0, 0.0), 1.0);
        g.connect(a, b, 1.0).unwrap();

        assert!(prune_along_path(&g, &[a, b], &HashSet::new(), 100.0).is_empty());
    }

    #[test]
    fn test_along_path_stops_at_unlisted_branch() {
        // A branch not listed in ends still terminates the walk
        let (g, center) = cross([2, 5, 5, 5]);
        let tip = g.find_node((2.0, 0.0)).unwrap();
        let doomed = prune_along_path(&g, &[tip], &HashSet::new(), 3.0);
        assert_eq!(doomed.len(), 2);
        assert!(!doomed.contains(&center));
    }

    #[test]
    fn test_zero_thresholds_are_noop() {
        let (g, _) = cross([3, 4, 2, 6]);
        let pruner = GraphPruner::new(PruneParams::new(0.0, 0.0, 10.0));
        let (pruned, stats) = pruner.prune(&g, &[]);

        assert_eq!(pruned.node_count(), g.node_count());
        assert_eq!(pruned.edge_count(), g.edge_count());
        assert_eq!(stats, PruneStats::default());
    }

    #[test]
    fn test_narrow_edges_and_fragments() {
        let (mut g, center) = cross([3, 3, 3, 3]);
        // Narrow the first step of the east arm: the rest becomes a fragment
        let east = g.find_node((1.0, 0.0)).unwrap();
        let e = g.edge_between(center, east).unwrap();
        g.remove_edge(e);
        g.connect(center, east, 0.1).unwrap();

        let pruner = GraphPruner::new(PruneParams::new(1.0, 0.0, 10.0));
        let (pruned, stats) = pruner.prune(&g, &[]);

        assert_eq!(stats.narrow_edges, 1);
        assert_eq!(stats.fragment_nodes, 3);
        assert_eq!(pruned.node_count(), 10);
    }

    #[test]
    fn test_service_pass_keeps_anchored_arm() {
        let (g, _) = cross([3, 3, 3, 3]);
        let pruner = GraphPruner::new(PruneParams::new(0.0, 1.0, 10.0));
        // Only the machine north of the cross needs access
        let (pruned, stats) = pruner.prune(&g, &[(0.0, 4.0)]);

        assert_eq!(stats.protected_nodes, 1);
        assert!(pruned.find_node((0.0, 3.0)).is_some());
        assert!(pruned.find_node((3.0, 0.0)).is_none());
        assert!(pruned.find_node((-3.0, 0.0)).is_none());
        assert!(pruned.find_node((0.0, -3.0)).is_none());
        assert!(pruned.find_node((0.0, 0.0)).is_some());
    }

    #[test]
    fn test_empty_after_stage_a() {
        let (g, _) = cross([2, 2, 2, 2]);
        let pruner = GraphPruner::new(PruneParams::new(10.0, 1.0, 10.0));
        let (pruned, _) = pruner.prune(&g, &[(0.0, 0.0)]);
        assert_eq!(pruned.edge_count(), 0);
    }
}
