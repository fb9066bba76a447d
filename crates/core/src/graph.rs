//! Arena-backed path graph.
//!
//! Nodes and edges live in [`slotmap::SlotMap`]s, so handles stay valid while
//! other entities are removed during pruning and contraction. Node identity
//! is a quantized coordinate ([`GridKey`]): coincident Voronoi vertices from
//! different edges resolve to the same node.
//!
//! Parallel edges are allowed (two corridors joining the same pair of
//! crossroads around an obstacle); self-loops are not.

use std::collections::{HashMap, HashSet, VecDeque};

use slotmap::{new_key_type, SlotMap};

use crate::robust::GridKey;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

new_key_type! {
    /// Handle of a node in a [`PathGraph`].
    pub struct NodeId;

    /// Handle of an edge in a [`PathGraph`].
    pub struct EdgeId;
}

/// Structural role of a node, derived from its degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NodeKind {
    /// No incident edges.
    #[default]
    Isolated,
    /// Degree 1.
    Endpoint,
    /// Degree 2.
    Passage,
    /// Degree 3 or more.
    Crossroad,
}

impl NodeKind {
    /// Classifies a node by its degree.
    pub fn from_degree(degree: usize) -> Self {
        match degree {
            0 => NodeKind::Isolated,
            1 => NodeKind::Endpoint,
            2 => NodeKind::Passage,
            _ => NodeKind::Crossroad,
        }
    }
}

/// Traffic capacity of a path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PathKind {
    /// Too narrow for passing traffic.
    #[default]
    OneWay,
    /// Wide enough for traffic in both directions.
    TwoWay,
}

/// A node of the path network.
#[derive(Debug, Clone)]
pub struct PathNode {
    /// Location in layout coordinates.
    pub position: (f64, f64),
    /// Clearance radius at this point.
    pub pathwidth: f64,
    /// Role derived from degree; refreshed by [`PathGraph::relabel`].
    pub kind: NodeKind,
    edges: Vec<EdgeId>,
}

impl PathNode {
    /// Number of incident edges.
    pub fn degree(&self) -> usize {
        self.edges.len()
    }

    /// Incident edge handles.
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }
}

/// An edge of the path network.
#[derive(Debug, Clone)]
pub struct PathEdge {
    /// First endpoint; `polyline` starts here.
    pub source: NodeId,
    /// Second endpoint; `polyline` ends here.
    pub target: NodeId,
    /// Length along the polyline.
    pub weight: f64,
    /// Narrowest clearance along the edge.
    pub pathwidth: f64,
    /// Widest clearance along the edge.
    pub max_pathwidth: f64,
    /// Ordered positions from `source` to `target`, both included.
    pub polyline: Vec<(f64, f64)>,
    /// Angle in degrees at each interior polyline vertex (180 = straight).
    pub turn_angles: Vec<f64>,
    /// One- or two-way classification.
    pub kind: PathKind,
}

impl PathEdge {
    /// Returns the endpoint opposite to `node`, if `node` is an endpoint.
    pub fn opposite(&self, node: NodeId) -> Option<NodeId> {
        if self.source == node {
            Some(self.target)
        } else if self.target == node {
            Some(self.source)
        } else {
            None
        }
    }

    /// Polyline oriented to start at `node`.
    pub fn polyline_from(&self, node: NodeId) -> Vec<(f64, f64)> {
        if self.target == node && self.source != node {
            self.polyline.iter().rev().copied().collect()
        } else {
            self.polyline.clone()
        }
    }
}

/// Undirected path graph with typed handles.
#[derive(Debug, Clone)]
pub struct PathGraph {
    nodes: SlotMap<NodeId, PathNode>,
    edges: SlotMap<EdgeId, PathEdge>,
    lookup: HashMap<GridKey, NodeId>,
    tolerance: f64,
}

impl PathGraph {
    /// Creates an empty graph merging nodes closer than `tolerance`.
    pub fn new(tolerance: f64) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            lookup: HashMap::new(),
            tolerance,
        }
    }

    /// Node merge tolerance.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by handle.
    pub fn node(&self, id: NodeId) -> Option<&PathNode> {
        self.nodes.get(id)
    }

    /// Edge by handle.
    pub fn edge(&self, id: EdgeId) -> Option<&PathEdge> {
        self.edges.get(id)
    }

    /// Iterates nodes in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &PathNode)> {
        self.nodes.iter()
    }

    /// Iterates edges in arena order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &PathEdge)> {
        self.edges.iter()
    }

    /// Mutable edge iteration, for attribute updates.
    pub fn edges_mut(&mut self) -> impl Iterator<Item = (EdgeId, &mut PathEdge)> {
        self.edges.iter_mut()
    }

    /// Degree of a node (0 for unknown handles).
    pub fn degree(&self, id: NodeId) -> usize {
        self.nodes.get(id).map_or(0, PathNode::degree)
    }

    /// Node at a position, within the merge tolerance.
    pub fn find_node(&self, position: (f64, f64)) -> Option<NodeId> {
        self.lookup
            .get(&GridKey::new(position, self.tolerance))
            .copied()
    }

    /// Neighbours of a node, one entry per incident edge.
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        node.edges
            .iter()
            .filter_map(|&e| self.edges.get(e).and_then(|edge| edge.opposite(id)))
            .collect()
    }

    /// Some edge joining `a` and `b`.
    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        let node = self.nodes.get(a)?;
        node.edges.iter().copied().find(|&e| {
            self.edges
                .get(e)
                .is_some_and(|edge| edge.opposite(a) == Some(b))
        })
    }

    /// Sum of edge weights.
    pub fn total_weight(&self) -> f64 {
        self.edges.values().map(|e| e.weight).sum()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Adds a node, or returns the existing node at that position.
    ///
    /// An existing node keeps its recorded pathwidth.
    pub fn add_node(&mut self, position: (f64, f64), pathwidth: f64) -> NodeId {
        let key = GridKey::new(position, self.tolerance);
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }
        let id = self.nodes.insert(PathNode {
            position,
            pathwidth,
            kind: NodeKind::Isolated,
            edges: Vec::new(),
        });
        self.lookup.insert(key, id);
        id
    }

    /// Joins two nodes with a straight segment.
    ///
    /// If the nodes are already adjacent, the existing edge is updated
    /// instead of adding a parallel one.
    pub fn connect(&mut self, a: NodeId, b: NodeId, pathwidth: f64) -> Result<EdgeId> {
        let (pa, pb) = match (self.nodes.get(a), self.nodes.get(b)) {
            (Some(na), Some(nb)) => (na.position, nb.position),
            _ => return Err(Error::Internal("edge endpoint not in graph".into())),
        };
        let weight = distance(pa, pb);

        if let Some(existing) = self.edge_between(a, b) {
            if let Some(edge) = self.edges.get_mut(existing) {
                edge.weight = weight;
                edge.pathwidth = pathwidth;
                edge.max_pathwidth = pathwidth;
            }
            return Ok(existing);
        }

        self.insert_edge(PathEdge {
            source: a,
            target: b,
            weight,
            pathwidth,
            max_pathwidth: pathwidth,
            polyline: vec![pa, pb],
            turn_angles: Vec::new(),
            kind: PathKind::OneWay,
        })
    }

    /// Inserts a fully specified edge. Parallel edges are allowed.
    pub fn insert_edge(&mut self, edge: PathEdge) -> Result<EdgeId> {
        if edge.source == edge.target {
            return Err(Error::Internal("self-loop edges are not allowed".into()));
        }
        if !self.nodes.contains_key(edge.source) || !self.nodes.contains_key(edge.target) {
            return Err(Error::Internal("edge endpoint not in graph".into()));
        }
        let (source, target) = (edge.source, edge.target);
        let id = self.edges.insert(edge);
        if let Some(node) = self.nodes.get_mut(source) {
            node.edges.push(id);
        }
        if let Some(node) = self.nodes.get_mut(target) {
            node.edges.push(id);
        }
        Ok(id)
    }

    /// Removes an edge, returning it.
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<PathEdge> {
        let edge = self.edges.remove(id)?;
        for endpoint in [edge.source, edge.target] {
            if let Some(node) = self.nodes.get_mut(endpoint) {
                node.edges.retain(|&e| e != id);
            }
        }
        Some(edge)
    }

    /// Removes a node and all its incident edges.
    pub fn remove_node(&mut self, id: NodeId) -> Option<PathNode> {
        let incident = self.nodes.get(id)?.edges.clone();
        for e in incident {
            self.remove_edge(e);
        }
        let node = self.nodes.remove(id)?;
        self.lookup
            .remove(&GridKey::new(node.position, self.tolerance));
        Some(node)
    }

    /// Removes every node of the set.
    pub fn remove_nodes(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        for id in ids {
            self.remove_node(id);
        }
    }

    /// Removes every edge matching the predicate; returns how many.
    pub fn remove_edges_where(&mut self, mut predicate: impl FnMut(&PathEdge) -> bool) -> usize {
        let doomed: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|(_, e)| predicate(e))
            .map(|(id, _)| id)
            .collect();
        let count = doomed.len();
        for id in doomed {
            self.remove_edge(id);
        }
        count
    }

    /// Refreshes every node's [`NodeKind`] from its degree.
    pub fn relabel(&mut self) {
        for node in self.nodes.values_mut() {
            node.kind = NodeKind::from_degree(node.edges.len());
        }
    }

    /// Sets the one-/two-way classification of every edge.
    pub fn classify_paths(&mut self, two_way_pathwidth: f64) {
        for edge in self.edges.values_mut() {
            edge.kind = if edge.pathwidth >= two_way_pathwidth {
                PathKind::TwoWay
            } else {
                PathKind::OneWay
            };
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Nodes of degree 1, in arena order.
    pub fn endpoints(&self) -> Vec<NodeId> {
        self.nodes_with_degree(|d| d == 1)
    }

    /// Nodes of degree 3 or more, in arena order.
    pub fn crossroads(&self) -> Vec<NodeId> {
        self.nodes_with_degree(|d| d >= 3)
    }

    fn nodes_with_degree(&self, predicate: impl Fn(usize) -> bool) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| predicate(n.degree()))
            .map(|(id, _)| id)
            .collect()
    }

    /// Connected components, each listed in BFS order.
    ///
    /// Components are ordered by their first node in arena order.
    pub fn connected_components(&self) -> Vec<Vec<NodeId>> {
        let mut visited: HashSet<NodeId> = HashSet::with_capacity(self.nodes.len());
        let mut components = Vec::new();

        for start in self.nodes.keys() {
            if !visited.insert(start) {
                continue;
            }

            let mut component = Vec::new();
            let mut queue = VecDeque::new();
            queue.push_back(start);

            while let Some(node) = queue.pop_front() {
                component.push(node);
                for neighbor in self.neighbors(node) {
                    if visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }

            components.push(component);
        }

        components
    }

    /// Keeps only the largest component by node count.
    ///
    /// Ties go to the component found first. Returns the number of removed
    /// nodes.
    pub fn retain_largest_component(&mut self) -> usize {
        let components = self.connected_components();
        let Some(largest) = components
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.len().cmp(&b.len()).then(ib.cmp(ia)))
            .map(|(i, _)| i)
        else {
            return 0;
        };

        let mut removed = 0;
        for (i, component) in components.into_iter().enumerate() {
            if i == largest {
                continue;
            }
            removed += component.len();
            self.remove_nodes(component);
        }
        removed
    }
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn path(points: &[(f64, f64)]) -> (PathGraph, Vec<NodeId>) {
        let mut g = PathGraph::new(1e-6);
        let ids: Vec<NodeId> = points.iter().map(|&p| g.add_node(p, 1.0)).collect();
        for w in ids.windows(2) {
            g.connect(w[0], w[1], 1.0).unwrap();
        }
        (g, ids)
    }

    #[test]
    fn test_coincident_nodes_merge() {
        let mut g = PathGraph::new(1e-6);
        let a = g.add_node((1.0, 1.0), 2.0);
        let b = g.add_node((1.0 + 1e-9, 1.0), 5.0);
        assert_eq!(a, b);
        assert_eq!(g.node_count(), 1);
        assert_relative_eq!(g.node(a).unwrap().pathwidth, 2.0);
        assert_eq!(g.find_node((1.0, 1.0)), Some(a));
    }

    #[test]
    fn test_connect_is_simple() {
        let mut g = PathGraph::new(1e-6);
        let a = g.add_node((0.0, 0.0), 1.0);
        let b = g.add_node((3.0, 4.0), 1.0);
        let e1 = g.connect(a, b, 1.0).unwrap();
        let e2 = g.connect(b, a, 0.5).unwrap();
        assert_eq!(e1, e2);
        assert_eq!(g.edge_count(), 1);
        assert_relative_eq!(g.edge(e1).unwrap().weight, 5.0);
        assert_relative_eq!(g.edge(e1).unwrap().pathwidth, 0.5);
        assert!(g.connect(a, a, 1.0).is_err());
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let (mut g, ids) = path(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        g.remove_node(ids[1]);
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.degree(ids[0]), 0);
        assert!(g.find_node((1.0, 0.0)).is_none());
    }

    #[test]
    fn test_components_and_largest() {
        let (mut g, _) = path(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        let x = g.add_node((10.0, 10.0), 1.0);
        let y = g.add_node((11.0, 10.0), 1.0);
        g.connect(x, y, 1.0).unwrap();

        assert_eq!(g.connected_components().len(), 2);
        assert_eq!(g.retain_largest_component(), 2);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn test_labels() {
        // Star with three arms
        let mut g = PathGraph::new(1e-6);
        let c = g.add_node((0.0, 0.0), 1.0);
        for p in [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0)] {
            let n = g.add_node(p, 1.0);
            g.connect(c, n, 1.0).unwrap();
        }
        g.relabel();

        assert_eq!(g.node(c).unwrap().kind, NodeKind::Crossroad);
        assert_eq!(g.crossroads(), vec![c]);
        assert_eq!(g.endpoints().len(), 3);
    }

    #[test]
    fn test_polyline_orientation() {
        let (g, ids) = path(&[(0.0, 0.0), (2.0, 0.0)]);
        let (_, edge) = g.edges().next().unwrap();
        assert_eq!(edge.polyline_from(ids[1]), vec![(2.0, 0.0), (0.0, 0.0)]);
        assert_eq!(edge.polyline_from(ids[0]), vec![(0.0, 0.0), (2.0, 0.0)]);
    }

    #[test]
    fn test_classify_paths() {
        let mut g = PathGraph::new(1e-6);
        let a = g.add_node((0.0, 0.0), 4.0);
        let b = g.add_node((1.0, 0.0), 4.0);
        let c = g.add_node((2.0, 0.0), 1.0);
        let wide = g.connect(a, b, 4.0).unwrap();
        let narrow = g.connect(b, c, 1.0).unwrap();
        g.classify_paths(3.0);
        assert_eq!(g.edge(wide).unwrap().kind, PathKind::TwoWay);
        assert_eq!(g.edge(narrow).unwrap().kind, PathKind::OneWay);
    }
}
