//! Used-space, path and free-space polygons.

use factory_layout_core::{distance, EngineConfig, PathGraph};
use geo::{BooleanOps, ConvexHull, Coord, LineString, MultiPoint, MultiPolygon, Point, Polygon};
use rstar::RTree;

use crate::geometry::{Machine, Wall};
use crate::overlay::{buffer_polylines, split_largest, union_polygons};
use crate::sampler::sample_rings;

/// Machine clusters and their hulls.
#[derive(Debug, Clone, Default)]
pub struct UsedSpace {
    /// Convex hull per cluster, indexed by cluster id.
    pub hulls: Vec<Polygon<f64>>,
    /// Cluster id per machine, in registry order.
    pub groups: Vec<usize>,
}

/// Derived space polygons of one layout.
#[derive(Debug, Clone)]
pub struct SpacePolygons {
    /// Machine clusters and hulls.
    pub used_space: UsedSpace,
    /// Union of the ribbons around the simplified network.
    pub path_polygon: MultiPolygon<f64>,
    /// Free fragments other than the reserved region.
    pub free_space: MultiPolygon<f64>,
    /// Largest free region, kept for growth.
    pub reserved_space: Option<Polygon<f64>>,
    /// Raw-network ribbons not covered by the path polygon.
    pub free_space_routes: MultiPolygon<f64>,
}

/// Disjoint-set forest with path halving.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Computes [`SpacePolygons`].
#[derive(Debug, Clone, Copy)]
pub struct SpaceAnalyzer {
    cluster_threshold: f64,
    buffer_segments: usize,
    snap_tolerance: f64,
    wall_snap_spacing: f64,
}

impl Default for SpaceAnalyzer {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl SpaceAnalyzer {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            cluster_threshold: config.cluster_threshold,
            buffer_segments: config.buffer_segments,
            snap_tolerance: config.snap_tolerance,
            wall_snap_spacing: config.wall_snap_spacing,
        }
    }

    /// Single-linkage clustering of machine centroids.
    ///
    /// Cluster ids follow the order of each cluster's first machine and are
    /// written back to the machines. With fewer than two machines every
    /// machine is its own group and no hulls are built.
    pub fn used_space(&self, machines: &mut [Machine]) -> UsedSpace {
        let n = machines.len();
        if n < 2 {
            for (i, m) in machines.iter_mut().enumerate() {
                m.set_group(Some(i));
            }
            return UsedSpace {
                hulls: Vec::new(),
                groups: (0..n).collect(),
            };
        }

        let centers: Vec<Option<(f64, f64)>> = machines
            .iter()
            .map(|m| m.center().map(|c| (c.x(), c.y())))
            .collect();
        let mut sets = UnionFind::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                if let (Some(a), Some(b)) = (centers[i], centers[j]) {
                    if distance(a, b) <= self.cluster_threshold {
                        sets.union(i, j);
                    }
                }
            }
        }

        let mut root_ids: Vec<Option<usize>> = vec![None; n];
        let mut members: Vec<Vec<Point<f64>>> = Vec::new();
        let mut groups = Vec::with_capacity(n);
        for (i, machine) in machines.iter_mut().enumerate() {
            let root = sets.find(i);
            let group = match root_ids[root] {
                Some(g) => g,
                None => {
                    root_ids[root] = Some(members.len());
                    members.push(Vec::new());
                    members.len() - 1
                }
            };
            members[group].extend(
                machine
                    .shape()
                    .parts()
                    .iter()
                    .flat_map(|p| p.exterior().points()),
            );
            machine.set_group(Some(group));
            groups.push(group);
        }

        let hulls = members
            .into_iter()
            .map(|points| MultiPoint::new(points).convex_hull())
            .collect::<Vec<_>>();
        log::debug!("used space: {} machines in {} clusters", n, hulls.len());
        UsedSpace { hulls, groups }
    }

    /// Ribbons of radius pathwidth / 2 around the simplified edges, snapped
    /// to nearby wall samples.
    pub fn path_polygon(&self, simplified: &PathGraph, walls: &[Wall]) -> MultiPolygon<f64> {
        let ribbons = buffer_polylines(
            simplified
                .edges()
                .map(|(_, e)| (e.polyline.as_slice(), e.pathwidth / 2.0)),
            self.buffer_segments,
        );
        let snaps = sample_rings(
            walls.iter().flat_map(|w| w.shape().parts()),
            self.wall_snap_spacing,
        );
        if snaps.is_empty() || !(self.snap_tolerance > 0.0) {
            return ribbons;
        }
        let tree = RTree::bulk_load(snaps.iter().map(|c| [c.x, c.y]).collect::<Vec<_>>());
        let snap = |c: &Coord<f64>| -> Coord<f64> {
            match tree.nearest_neighbor(&[c.x, c.y]) {
                Some(s) if distance((s[0], s[1]), (c.x, c.y)) <= self.snap_tolerance => {
                    Coord { x: s[0], y: s[1] }
                }
                _ => *c,
            }
        };
        let snap_ring =
            |ring: &LineString<f64>| -> LineString<f64> { ring.coords().map(|c| snap(c)).collect() };

        MultiPolygon::new(
            ribbons
                .0
                .iter()
                .map(|p| {
                    Polygon::new(
                        snap_ring(p.exterior()),
                        p.interiors().iter().map(|r| snap_ring(r)).collect(),
                    )
                })
                .collect(),
        )
    }

    /// Walkable area minus the path polygon and the used-space hulls.
    ///
    /// Returns the remaining fragments and the largest region.
    pub fn free_space(
        &self,
        walkable: &MultiPolygon<f64>,
        path: &MultiPolygon<f64>,
        used: &UsedSpace,
    ) -> (MultiPolygon<f64>, Option<Polygon<f64>>) {
        let hulls = union_polygons(&used.hulls);
        split_largest(walkable.difference(path).difference(&hulls))
    }

    /// Ribbons around the raw network not covered by the path polygon.
    pub fn free_space_routes(&self, raw: &PathGraph, path: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        buffer_polylines(
            raw.edges()
                .map(|(_, e)| (e.polyline.as_slice(), e.pathwidth / 2.0)),
            self.buffer_segments,
        )
        .difference(path)
    }

    /// Runs every stage.
    pub fn analyze(
        &self,
        machines: &mut [Machine],
        walls: &[Wall],
        walkable: &MultiPolygon<f64>,
        raw: &PathGraph,
        simplified: &PathGraph,
    ) -> SpacePolygons {
        let used_space = self.used_space(machines);
        let path_polygon = self.path_polygon(simplified, walls);
        let (free_space, reserved_space) = self.free_space(walkable, &path_polygon, &used_space);
        let free_space_routes = self.free_space_routes(raw, &path_polygon);
        SpacePolygons {
            used_space,
            path_polygon,
            free_space,
            reserved_space,
            free_space_routes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Shape;
    use approx::assert_relative_eq;
    use geo::{Area, Rect};

    fn machine(id: &str, x: f64, y: f64, w: f64, h: f64) -> Machine {
        Machine::new(id, Shape::rectangle(x, y, w, h)).unwrap()
    }

    #[test]
    fn test_clusters_by_centroid_distance() {
        let mut machines = vec![
            machine("A", 0.0, 0.0, 2.0, 2.0),
            machine("B", 20.0, 0.0, 2.0, 2.0),
            machine("C", 1.5, 0.0, 2.0, 2.0),
        ];
        let used = SpaceAnalyzer::default().used_space(&mut machines);
        assert_eq!(used.groups, vec![0, 1, 0]);
        assert_eq!(machines[2].group(), Some(0));
        assert_eq!(used.hulls.len(), 2);
        // Hull of A and C spans 3.5 x 2
        assert_relative_eq!(used.hulls[0].unsigned_area(), 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_single_machine_has_no_hull() {
        let mut machines = vec![machine("A", 0.0, 0.0, 2.0, 2.0)];
        let used = SpaceAnalyzer::default().used_space(&mut machines);
        assert!(used.hulls.is_empty());
        assert_eq!(machines[0].group(), Some(0));
    }

    #[test]
    fn test_path_polygon_of_corridor() {
        let mut graph = PathGraph::new(1e-6);
        let a = graph.add_node((0.0, 5.0), 2.0);
        let b = graph.add_node((10.0, 5.0), 2.0);
        graph.connect(a, b, 2.0).unwrap();

        let analyzer = SpaceAnalyzer::from_config(&EngineConfig::default().with_buffer_segments(64));
        let path = analyzer.path_polygon(&graph, &[]);
        // 10 x 2 band plus a unit disc
        assert_relative_eq!(path.unsigned_area(), 20.0 + std::f64::consts::PI, epsilon = 0.05);

        let walkable = MultiPolygon::new(vec![Rect::new((0.0, 0.0), (10.0, 10.0)).to_polygon()]);
        let (rest, reserved) = analyzer.free_space(&walkable, &path, &UsedSpace::default());
        let total = rest.unsigned_area() + reserved.map(|p| p.unsigned_area()).unwrap_or(0.0);
        assert_relative_eq!(total, 100.0 - 20.0, epsilon = 1e-6);
        assert_eq!(rest.0.len(), 1);

        assert!(analyzer.free_space_routes(&graph, &path).unsigned_area() < 1e-6);
    }

    #[test]
    fn test_snaps_to_wall_samples() {
        let mut graph = PathGraph::new(1e-6);
        let a = graph.add_node((0.0, 0.0), 2.0);
        let b = graph.add_node((10.0, 0.0), 2.0);
        graph.connect(a, b, 2.0).unwrap();
        let wall = Wall::new("W", Shape::rectangle(0.0, 1.05, 10.0, 1.0)).unwrap();

        let path = SpaceAnalyzer::default().path_polygon(&graph, &[wall]);
        let on_wall = path
            .0
            .iter()
            .flat_map(|p| p.exterior().coords())
            .filter(|c| (c.y - 1.05).abs() < 1e-12)
            .count();
        assert!(on_wall > 0);
    }
}
