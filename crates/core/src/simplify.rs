//! Degree-2 chain contraction.

use crate::graph::{EdgeId, NodeId, PathEdge, PathGraph};
use crate::Result;

/// Contracts chains of degree-2 nodes into polyline edges.
///
/// After contraction only endpoints, crossroads and nodes whose two edges
/// lead to the same neighbour remain. Every edge records the turn angle at
/// each interior vertex of its polyline.
#[derive(Debug, Clone, Copy)]
pub struct GraphSimplifier {
    two_way_pathwidth: f64,
}

impl Default for GraphSimplifier {
    fn default() -> Self {
        Self {
            two_way_pathwidth: 3.0,
        }
    }
}

impl GraphSimplifier {
    /// Creates a simplifier with the default two-way width.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pathwidth from which simplified edges are two-way.
    pub fn with_two_way_pathwidth(mut self, width: f64) -> Self {
        self.two_way_pathwidth = width;
        self
    }

    /// Returns the simplified copy of `graph`.
    pub fn simplify(&self, graph: &PathGraph) -> Result<PathGraph> {
        let mut g = graph.clone();

        loop {
            let candidates: Vec<NodeId> = g
                .nodes()
                .filter(|(_, n)| n.degree() == 2)
                .map(|(id, _)| id)
                .collect();

            let mut contracted = 0;
            for v in candidates {
                if let Some((e1, e2)) = contractible(&g, v) {
                    contract(&mut g, v, e1, e2)?;
                    contracted += 1;
                }
            }
            if contracted == 0 {
                break;
            }
        }

        for (_, edge) in g.edges_mut() {
            edge.turn_angles = polyline_turn_angles(&edge.polyline);
        }
        g.relabel();
        g.classify_paths(self.two_way_pathwidth);

        log::debug!(
            "simplified path graph to {} nodes / {} edges",
            g.node_count(),
            g.edge_count()
        );
        Ok(g)
    }
}

/// The two edges of `v` if it sits between two distinct neighbours.
fn contractible(g: &PathGraph, v: NodeId) -> Option<(EdgeId, EdgeId)> {
    let node = g.node(v)?;
    let [e1, e2] = node.edges() else {
        return None;
    };
    let a = g.edge(*e1)?.opposite(v)?;
    let b = g.edge(*e2)?.opposite(v)?;
    (a != b).then_some((*e1, *e2))
}

fn contract(g: &mut PathGraph, v: NodeId, e1: EdgeId, e2: EdgeId) -> Result<()> {
    let (Some(first), Some(second)) = (g.remove_edge(e1), g.remove_edge(e2)) else {
        return Err(crate::Error::Internal(
            "contraction edge vanished".into(),
        ));
    };
    let (Some(a), Some(b)) = (first.opposite(v), second.opposite(v)) else {
        return Err(crate::Error::Internal(
            "contraction edge not incident to node".into(),
        ));
    };

    let mut polyline = first.polyline_from(a);
    polyline.extend(second.polyline_from(v).into_iter().skip(1));

    g.remove_node(v);
    g.insert_edge(PathEdge {
        source: a,
        target: b,
        weight: first.weight + second.weight,
        pathwidth: first.pathwidth.min(second.pathwidth),
        max_pathwidth: first.max_pathwidth.max(second.max_pathwidth),
        polyline,
        turn_angles: Vec::new(),
        kind: first.kind,
    })?;
    Ok(())
}

/// Angle in degrees between the directions to `prev` and to `next`.
///
/// 180 means straight through, 0 a full reversal. `None` when either
/// segment has zero length.
pub fn turn_angle(prev: (f64, f64), at: (f64, f64), next: (f64, f64)) -> Option<f64> {
    let u = (prev.0 - at.0, prev.1 - at.1);
    let w = (next.0 - at.0, next.1 - at.1);
    if (u.0 == 0.0 && u.1 == 0.0) || (w.0 == 0.0 && w.1 == 0.0) {
        return None;
    }
    let cross = u.0 * w.1 - u.1 * w.0;
    let dot = u.0 * w.0 + u.1 * w.1;
    Some(cross.abs().atan2(dot).to_degrees())
}

/// Turn angles at every interior vertex of a polyline.
pub fn polyline_turn_angles(polyline: &[(f64, f64)]) -> Vec<f64> {
    polyline
        .windows(3)
        .filter_map(|w| turn_angle(w[0], w[1], w[2]))
        .collect()
}

/// Turn angles of all edges that deviate from straight by more than
/// `tolerance_deg`.
pub fn bend_angles(graph: &PathGraph, tolerance_deg: f64) -> Vec<f64> {
    graph
        .edges()
        .flat_map(|(_, e)| e.turn_angles.iter().copied())
        .filter(|a| 180.0 - a > tolerance_deg)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn chain(points: &[(f64, f64)], widths: &[f64]) -> PathGraph {
        let mut g = PathGraph::new(1e-6);
        let ids: Vec<NodeId> = points.iter().map(|&p| g.add_node(p, 1.0)).collect();
        for (w, width) in ids.windows(2).zip(widths) {
            g.connect(w[0], w[1], *width).unwrap();
        }
        g
    }

    #[test]
    fn test_chain_contracts_to_single_edge() {
        let points = [(0.0, 0.0), (1.0, 0.0), (3.0, 0.0), (3.0, 2.0), (6.0, 6.0)];
        let g = chain(&points, &[2.0, 1.5, 4.0, 3.0]);
        let raw_weight = g.total_weight();

        let s = GraphSimplifier::new().simplify(&g).unwrap();
        assert_eq!(s.node_count(), 2);
        assert_eq!(s.edge_count(), 1);

        let (_, edge) = s.edges().next().unwrap();
        assert_relative_eq!(edge.weight, raw_weight, epsilon = 1e-12);
        assert_relative_eq!(edge.pathwidth, 1.5);
        assert_relative_eq!(edge.max_pathwidth, 4.0);
        assert_eq!(edge.polyline.len(), points.len());

        let start = edge.polyline[0];
        let ordered: Vec<_> = if start == points[0] {
            points.to_vec()
        } else {
            points.iter().rev().copied().collect()
        };
        assert_eq!(edge.polyline, ordered);
    }

    #[test]
    fn test_idempotent() {
        let g = chain(
            &[(0.0, 0.0), (1.0, 0.0), (2.0, 1.0), (3.0, 1.0)],
            &[1.0, 1.0, 1.0],
        );
        let once = GraphSimplifier::new().simplify(&g).unwrap();
        let twice = GraphSimplifier::new().simplify(&once).unwrap();

        assert_eq!(once.node_count(), twice.node_count());
        assert_eq!(once.edge_count(), twice.edge_count());
        let w1: Vec<f64> = once.edges().map(|(_, e)| e.weight).collect();
        let w2: Vec<f64> = twice.edges().map(|(_, e)| e.weight).collect();
        assert_eq!(w1, w2);
        let p1: Vec<_> = once.edges().map(|(_, e)| e.polyline.clone()).collect();
        let p2: Vec<_> = twice.edges().map(|(_, e)| e.polyline.clone()).collect();
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_loop_around_obstacle_keeps_both_corridors() {
        // Two crossroads joined by a north and a south corridor, each with a tail
        let mut g = PathGraph::new(1e-6);
        let w = g.add_node((0.0, 0.0), 1.0);
        let e = g.add_node((4.0, 0.0), 1.0);
        let n1 = g.add_node((0.0, 2.0), 1.0);
        let n2 = g.add_node((4.0, 2.0), 1.0);
        let s1 = g.add_node((0.0, -2.0), 1.0);
        let s2 = g.add_node((4.0, -2.0), 1.0);
        let wt = g.add_node((-2.0, 0.0), 1.0);
        let et = g.add_node((6.0, 0.0), 1.0);
        for (a, b) in [(w, n1), (n1, n2), (n2, e), (w, s1), (s1, s2), (s2, e), (wt, w), (e, et)] {
            g.connect(a, b, 1.0).unwrap();
        }

        let s = GraphSimplifier::new().simplify(&g).unwrap();
        assert_eq!(s.node_count(), 4);
        assert_eq!(s.edge_count(), 4);
        let corridors: Vec<f64> = s
            .edges()
            .filter(|(_, edge)| edge.polyline.len() == 4)
            .map(|(_, edge)| edge.weight)
            .collect();
        assert_eq!(corridors.len(), 2);
        for weight in corridors {
            assert_relative_eq!(weight, 8.0);
        }
    }

    #[test]
    fn test_ring_stops_before_self_loop() {
        let mut g = PathGraph::new(1e-6);
        let ids: Vec<NodeId> = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
            .iter()
            .map(|&p| g.add_node(p, 1.0))
            .collect();
        for i in 0..4 {
            g.connect(ids[i], ids[(i + 1) % 4], 1.0).unwrap();
        }

        let s = GraphSimplifier::new().simplify(&g).unwrap();
        assert_eq!(s.node_count(), 2);
        assert_eq!(s.edge_count(), 2);
        assert_relative_eq!(s.total_weight(), 4.0);
    }

    #[test]
    fn test_turn_angles() {
        assert_relative_eq!(
            turn_angle((0.0, 0.0), (1.0, 0.0), (2.0, 0.0)).unwrap(),
            180.0
        );
        assert_relative_eq!(
            turn_angle((0.0, 0.0), (1.0, 0.0), (1.0, 1.0)).unwrap(),
            90.0
        );
        assert!(turn_angle((1.0, 0.0), (1.0, 0.0), (2.0, 0.0)).is_none());

        let g = chain(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0)], &[1.0; 3]);
        let s = GraphSimplifier::new().simplify(&g).unwrap();
        let (_, edge) = s.edges().next().unwrap();
        assert_eq!(edge.turn_angles.len(), 2);
        let bends = bend_angles(&s, 1.0);
        assert_eq!(bends.len(), 1);
        assert_relative_eq!(bends[0], 90.0);
    }
}
