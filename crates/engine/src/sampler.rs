//! Arc-length sampling of boundaries.

use factory_layout_core::{Error, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};

/// Points every `spacing` along a ring, starting at its first vertex.
pub fn sample_ring(ring: &LineString<f64>, spacing: f64, out: &mut Vec<Coord<f64>>) {
    if !(spacing > 0.0) {
        return;
    }
    let mut offset = 0.0;
    for line in ring.lines() {
        let dx = line.end.x - line.start.x;
        let dy = line.end.y - line.start.y;
        let len = dx.hypot(dy);
        if len == 0.0 {
            continue;
        }
        while offset < len {
            let t = offset / len;
            out.push(Coord {
                x: line.start.x + dx * t,
                y: line.start.y + dy * t,
            });
            offset += spacing;
        }
        offset -= len;
    }
}

/// Samples every ring of every polygon.
pub fn sample_rings<'a>(
    polygons: impl IntoIterator<Item = &'a Polygon<f64>>,
    spacing: f64,
) -> Vec<Coord<f64>> {
    let mut out = Vec::new();
    for polygon in polygons {
        sample_ring(polygon.exterior(), spacing, &mut out);
        for hole in polygon.interiors() {
            sample_ring(hole, spacing, &mut out);
        }
    }
    out
}

/// Arc length of a closed ring.
pub fn ring_length(ring: &LineString<f64>) -> f64 {
    ring.lines()
        .map(|l| (l.end.x - l.start.x).hypot(l.end.y - l.start.y))
        .sum()
}

/// Voronoi generator sites along the factory outline and the obstacle union.
#[derive(Debug, Clone, Copy)]
pub struct BoundarySampler {
    spacing: f64,
    max_sites: Option<usize>,
}

impl BoundarySampler {
    /// Creates a sampler with the given arc-length spacing.
    pub fn new(spacing: f64) -> Self {
        Self {
            spacing,
            max_sites: None,
        }
    }

    /// Refuses to sample when the rings would yield more than `max_sites` points.
    pub fn with_limit(mut self, max_sites: usize) -> Self {
        self.max_sites = Some(max_sites);
        self
    }

    /// Upper bound on the number of points [`sample`](Self::sample) emits.
    pub fn estimate(&self, bounding: &Polygon<f64>, obstacles: &MultiPolygon<f64>) -> f64 {
        if !(self.spacing > 0.0) {
            return 0.0;
        }
        std::iter::once(bounding)
            .chain(obstacles)
            .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
            .map(|ring| (ring_length(ring) / self.spacing).ceil())
            .sum()
    }

    /// Samples the bounding polygon and the union of obstacles.
    ///
    /// Empty geometry or a non-positive spacing yields no points. Fails with
    /// [`Error::NetworkBuild`] before allocating when the limit would be exceeded.
    pub fn sample(
        &self,
        bounding: &Polygon<f64>,
        obstacles: &MultiPolygon<f64>,
    ) -> Result<Vec<Coord<f64>>> {
        if let Some(limit) = self.max_sites {
            let estimate = self.estimate(bounding, obstacles);
            if !(estimate <= limit as f64) {
                return Err(Error::NetworkBuild(format!(
                    "spacing {} yields about {} sites, limit is {}",
                    self.spacing, estimate, limit
                )));
            }
        }
        let mut sites = sample_rings(std::iter::once(bounding), self.spacing);
        sites.extend(sample_rings(obstacles, self.spacing));
        log::debug!("sampled {} boundary sites", sites.len());
        Ok(sites)
    }
}
