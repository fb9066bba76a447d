//! Voronoi skeleton of the walkable floor.
//!
//! The Voronoi diagram of boundary samples approximates the medial axis of
//! the free space. Its finite edges are classified against the obstacles:
//! edges clear of every obstacle and inside the factory become the raw path
//! graph, edges touching an obstacle or the outline are split and kept only
//! as clearance segments.

use std::collections::HashSet;

use factory_layout_core::robust::segment_split_params;
use factory_layout_core::{distance, EngineConfig, Error, GridKey, PathGraph, Result};
use geo::{BooleanOps, BoundingRect, Coord, Intersects, Line, MultiPolygon, Polygon, Rect};
use spade::{DelaunayTriangulation, Point2, Triangulation};

use crate::geometry::BoundingArea;
use crate::spatial_index::SiteIndex;

/// Output of [`VoronoiNetworkBuilder::build`].
#[derive(Debug, Clone)]
pub struct VoronoiNetwork {
    /// Unpruned route graph.
    pub raw: PathGraph,
    /// Pieces of obstacle-touching edges that stay in free space.
    pub clearance_segments: Vec<Line<f64>>,
    /// Bounding area minus obstacles.
    pub walkable: MultiPolygon<f64>,
    /// Number of distinct generator sites.
    pub site_count: usize,
}

/// An obstacle part with its bounding box and boundary segments.
struct Obstacle<'a> {
    rect: Rect<f64>,
    polygon: &'a Polygon<f64>,
    segments: Vec<((f64, f64), (f64, f64))>,
}

impl<'a> Obstacle<'a> {
    fn new(polygon: &'a Polygon<f64>) -> Option<Self> {
        let rect = polygon.bounding_rect()?;
        let segments = std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .flat_map(|ring| ring.lines())
            .map(|l| ((l.start.x, l.start.y), (l.end.x, l.end.y)))
            .collect();
        Some(Self {
            rect,
            polygon,
            segments,
        })
    }

    fn near(&self, a: (f64, f64), b: (f64, f64)) -> bool {
        let (min, max) = (self.rect.min(), self.rect.max());
        a.0.max(b.0) >= min.x && a.0.min(b.0) <= max.x && a.1.max(b.1) >= min.y && a.1.min(b.1) <= max.y
    }

    fn covers(&self, p: (f64, f64)) -> bool {
        self.near(p, p) && self.polygon.intersects(&Coord { x: p.0, y: p.1 })
    }
}

/// Builds the raw path graph from boundary samples.
#[derive(Debug, Clone, Copy)]
pub struct VoronoiNetworkBuilder {
    tolerance: f64,
    max_sites: usize,
    cache_capacity: usize,
}

impl Default for VoronoiNetworkBuilder {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl VoronoiNetworkBuilder {
    /// Creates a builder from the engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            tolerance: config.node_tolerance,
            max_sites: config.max_sites,
            cache_capacity: config.clearance_cache_capacity,
        }
    }

    /// Builds the skeleton.
    ///
    /// Fails with [`Error::NetworkBuild`] when the sites are too few, too
    /// many, non-finite, or rejected by the triangulation.
    pub fn build(
        &self,
        bounding: &BoundingArea,
        obstacles: &MultiPolygon<f64>,
        samples: &[Coord<f64>],
    ) -> Result<VoronoiNetwork> {
        let walkable = MultiPolygon::new(vec![bounding.polygon().clone()]).difference(obstacles);

        let sites = self.distinct_sites(samples)?;
        let site_count = sites.len();
        let triangulation: DelaunayTriangulation<Point2<f64>> =
            DelaunayTriangulation::bulk_load(sites.iter().map(|p| Point2::new(p.0, p.1)).collect())
                .map_err(|e| Error::NetworkBuild(format!("triangulation failed: {:?}", e)))?;

        let parts: Vec<Obstacle> = obstacles.0.iter().filter_map(Obstacle::new).collect();

        let mut routes: Vec<((f64, f64), (f64, f64))> = Vec::new();
        let mut clearance_segments: Vec<Line<f64>> = Vec::new();

        for edge in triangulation.undirected_voronoi_edges() {
            let [from, to] = edge.vertices();
            let (Some(p), Some(q)) = (from.position(), to.position()) else {
                continue;
            };
            let (a, b) = ((p.x, p.y), (q.x, q.y));
            if distance(a, b) <= self.tolerance {
                continue;
            }

            let inside_a = bounding.covers(Coord { x: a.0, y: a.1 });
            let inside_b = bounding.covers(Coord { x: b.0, y: b.1 });
            let crosses = bounding.crossed_by(a, b);
            if !inside_a && !inside_b && !crosses {
                continue;
            }

            let line = Line::new(Coord { x: a.0, y: a.1 }, Coord { x: b.0, y: b.1 });
            let touches_obstacle = parts
                .iter()
                .any(|o| o.near(a, b) && line.intersects(o.polygon));

            if touches_obstacle || !inside_a || !inside_b || crosses {
                clearance_segments.extend(split_outside(a, b, &parts, bounding));
            } else {
                routes.push((a, b));
            }
        }

        let mut site_index = SiteIndex::new(
            self.clearance_sites(&sites, &walkable),
            self.tolerance,
            self.cache_capacity,
        );
        let mut raw = PathGraph::new(self.tolerance);
        for (a, b) in routes {
            let na = raw.add_node(a, site_index.clearance(a));
            let nb = raw.add_node(b, site_index.clearance(b));
            if na == nb {
                continue;
            }
            let width = match (raw.node(na), raw.node(nb)) {
                (Some(x), Some(y)) => x.pathwidth.min(y.pathwidth),
                _ => continue,
            };
            raw.connect(na, nb, width)?;
        }
        raw.relabel();

        log::debug!(
            "voronoi network: {} sites, {} nodes, {} edges, {} clearance segments, {}/{} memo hits/entries",
            site_count,
            raw.node_count(),
            raw.edge_count(),
            clearance_segments.len(),
            site_index.cache().hits(),
            site_index.cache().len()
        );

        Ok(VoronoiNetwork {
            raw,
            clearance_segments,
            walkable,
            site_count,
        })
    }

    fn distinct_sites(&self, samples: &[Coord<f64>]) -> Result<Vec<(f64, f64)>> {
        if samples.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(Error::NetworkBuild("non-finite generator site".into()));
        }
        let mut seen: HashSet<GridKey> = HashSet::with_capacity(samples.len());
        let sites: Vec<(f64, f64)> = samples
            .iter()
            .map(|c| (c.x, c.y))
            .filter(|&p| seen.insert(GridKey::new(p, self.tolerance)))
            .collect();

        if sites.len() < 3 {
            return Err(Error::NetworkBuild(format!(
                "need at least 3 distinct sites, got {}",
                sites.len()
            )));
        }
        if sites.len() > self.max_sites {
            return Err(Error::NetworkBuild(format!(
                "{} sites exceed the limit of {}",
                sites.len(),
                self.max_sites
            )));
        }
        Ok(sites)
    }

    /// Boundary samples plus the vertices of the walkable exterior rings.
    fn clearance_sites(&self, sites: &[(f64, f64)], walkable: &MultiPolygon<f64>) -> Vec<[f64; 2]> {
        sites
            .iter()
            .map(|p| [p.0, p.1])
            .chain(
                walkable
                    .0
                    .iter()
                    .flat_map(|poly| poly.exterior().coords().map(|c| [c.x, c.y])),
            )
            .collect()
    }
}

/// Pieces of `a-b` outside every obstacle and inside the bounding area.
fn split_outside(
    a: (f64, f64),
    b: (f64, f64),
    obstacles: &[Obstacle],
    bounding: &BoundingArea,
) -> Vec<Line<f64>> {
    let mut params = vec![0.0, 1.0];
    for o in obstacles.iter().filter(|o| o.near(a, b)) {
        for &(s, t) in &o.segments {
            params.extend(segment_split_params(a, b, s, t));
        }
    }
    for &(s, t) in bounding.segments() {
        params.extend(segment_split_params(a, b, s, t));
    }
    params.sort_by(f64::total_cmp);
    params.dedup_by(|x, y| (*x - *y).abs() < 1e-12);

    let at = |t: f64| (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t);
    params
        .windows(2)
        .filter_map(|w| {
            let mid = at(0.5 * (w[0] + w[1]));
            let blocked = obstacles.iter().any(|o| o.covers(mid));
            let outside = !bounding.covers(Coord { x: mid.0, y: mid.1 });
            if blocked || outside {
                return None;
            }
            let (p, q) = (at(w[0]), at(w[1]));
            Some(Line::new(Coord { x: p.0, y: p.1 }, Coord { x: q.0, y: q.1 }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::BoundarySampler;
    use approx::assert_relative_eq;
    use geo::Area;

    fn build(obstacles: Vec<Polygon<f64>>, spacing: f64) -> Result<VoronoiNetwork> {
        let bounds = BoundingArea::rectangle(20.0, 10.0)?;
        let obstacles = MultiPolygon::new(obstacles);
        let samples = BoundarySampler::new(spacing).sample(bounds.polygon(), &obstacles)?;
        VoronoiNetworkBuilder::default().build(&bounds, &obstacles, &samples)
    }

    #[test]
    fn test_empty_room_skeleton() {
        let network = build(Vec::new(), 1.0).unwrap();
        assert!(network.raw.edge_count() > 0);
        assert_relative_eq!(network.walkable.unsigned_area(), 200.0, epsilon = 1e-6);

        // The medial axis of a 20 x 10 room runs along y = 5
        let (_, widest) = network
            .raw
            .nodes()
            .max_by(|(_, a), (_, b)| a.pathwidth.total_cmp(&b.pathwidth))
            .unwrap();
        assert!(widest.pathwidth < 5.2);
        assert!(widest.pathwidth > 4.0);

        for (_, node) in network.raw.nodes() {
            let (x, y) = node.position;
            assert!((0.0..=20.0).contains(&x) && (0.0..=10.0).contains(&y));
        }
    }

    #[test]
    fn test_route_edges_avoid_obstacles() {
        let block = geo::Rect::new((8.0, 3.0), (12.0, 7.0)).to_polygon();
        let network = build(vec![block.clone()], 0.5).unwrap();
        assert!(network.raw.edge_count() > 0);

        for (_, edge) in network.raw.edges() {
            let line = Line::new(
                Coord::from(edge.polyline[0]),
                Coord::from(edge.polyline[1]),
            );
            assert!(!line.intersects(&block));
            assert!(edge.pathwidth > 0.0);
        }
        for segment in &network.clearance_segments {
            let mid = segment.start + (segment.end - segment.start) * 0.5;
            assert!(!geo::Contains::contains(&block, &mid));
        }
    }

    #[test]
    fn test_edge_pathwidth_is_bottleneck() {
        let network = build(Vec::new(), 1.0).unwrap();
        for (_, edge) in network.raw.edges() {
            let a = network.raw.node(edge.source).unwrap().pathwidth;
            let b = network.raw.node(edge.target).unwrap().pathwidth;
            assert_relative_eq!(edge.pathwidth, a.min(b));
            assert_relative_eq!(
                edge.weight,
                distance(edge.polyline[0], edge.polyline[1]),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_degenerate_sites_fail() {
        let bounds = BoundingArea::rectangle(10.0, 10.0).unwrap();
        let obstacles = MultiPolygon::new(vec![]);
        let builder = VoronoiNetworkBuilder::default();

        let two = [Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 0.0 }];
        assert!(matches!(
            builder.build(&bounds, &obstacles, &two),
            Err(Error::NetworkBuild(_))
        ));

        let nan = [
            Coord { x: 0.0, y: 0.0 },
            Coord { x: f64::NAN, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
        ];
        assert!(builder.build(&bounds, &obstacles, &nan).is_err());

        let limited = VoronoiNetworkBuilder::from_config(&EngineConfig {
            max_sites: 3,
            ..EngineConfig::default()
        });
        let samples = BoundarySampler::new(1.0)
            .sample(bounds.polygon(), &obstacles)
            .unwrap();
        assert!(limited.build(&bounds, &obstacles, &samples).is_err());
    }
}
