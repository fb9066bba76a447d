//! Collision and boundary-violation detection.
//!
//! Pairs are pre-filtered with the R*-tree in [`crate::spatial_index`] and
//! then intersected exactly. Candidate pairs are visited in registry order so
//! the result is identical to an exhaustive pairwise scan.
//!
//! Exact intersection is O(n²) in the worst case (every box overlapping);
//! that is the scaling limit for large machine counts.

use geo::{Area, MultiPolygon};

use crate::geometry::{BoundingArea, Machine, Shape, Wall};
use crate::spatial_index::{SpatialEntry2D, SpatialIndex2D};

/// What collided with what.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    /// Two machines overlap.
    MachineMachine,
    /// A machine overlaps a wall.
    MachineWall,
}

/// A positive-area overlap between two entities.
#[derive(Debug, Clone)]
pub struct Collision {
    /// Kind of the pair.
    pub kind: CollisionKind,
    /// First participant (machine, or the wall for machine-wall pairs).
    pub first: String,
    /// Second participant (always a machine).
    pub second: String,
    /// Overlap region.
    pub region: MultiPolygon<f64>,
}

impl Collision {
    /// Returns true if `id` is one of the two participants.
    pub fn involves(&self, id: &str) -> bool {
        self.first == id || self.second == id
    }

    /// Area of the overlap.
    pub fn area(&self) -> f64 {
        self.region.unsigned_area()
    }
}

/// Result of one collision pass.
#[derive(Debug, Clone, Default)]
pub struct CollisionReport {
    /// Machine-machine overlaps.
    pub machine_collisions: Vec<Collision>,
    /// Machine-wall overlaps.
    pub wall_collisions: Vec<Collision>,
    /// Machines that only touch or miss the bounding area.
    pub outsiders: Vec<String>,
    /// Whether any overlap involves the most recently moved machine.
    pub after_last_update: bool,
}

impl CollisionReport {
    /// Returns true if nothing overlaps and nothing is outside.
    pub fn is_clear(&self) -> bool {
        self.machine_collisions.is_empty()
            && self.wall_collisions.is_empty()
            && self.outsiders.is_empty()
    }
}

/// Detects overlaps between machines, walls and the bounding area.
#[derive(Debug, Clone, Copy)]
pub struct CollisionDetector {
    min_area: f64,
}

impl Default for CollisionDetector {
    fn default() -> Self {
        Self { min_area: 1e-9 }
    }
}

impl CollisionDetector {
    /// Creates a detector; overlaps of at most `min_area` count as contact.
    pub fn new(min_area: f64) -> Self {
        Self { min_area }
    }

    /// Runs a full collision pass.
    pub fn detect(
        &self,
        machines: &[Machine],
        walls: &[Wall],
        bounding: &BoundingArea,
        last_updated: Option<&str>,
    ) -> CollisionReport {
        let index = SpatialIndex2D::with_entries(
            machines
                .iter()
                .enumerate()
                .filter_map(|(i, m)| SpatialEntry2D::from_shape(i, m.shape()))
                .collect(),
        );

        let mut report = CollisionReport::default();

        for (i, j) in index.overlapping_pairs() {
            let (a, b) = (&machines[i], &machines[j]);
            if let Some(region) = self.overlap(a.shape(), b.shape()) {
                report.machine_collisions.push(Collision {
                    kind: CollisionKind::MachineMachine,
                    first: a.id().to_string(),
                    second: b.id().to_string(),
                    region,
                });
            }
        }

        for wall in walls {
            let Some(aabb) = wall.shape().aabb() else {
                continue;
            };
            for i in index.candidates(aabb) {
                let machine = &machines[i];
                if let Some(region) = self.overlap(wall.shape(), machine.shape()) {
                    report.wall_collisions.push(Collision {
                        kind: CollisionKind::MachineWall,
                        first: wall.id().to_string(),
                        second: machine.id().to_string(),
                        region,
                    });
                }
            }
        }

        report.outsiders = machines
            .iter()
            .filter(|m| bounding.overlap_area(m.shape()) <= self.min_area)
            .map(|m| m.id().to_string())
            .collect();

        report.after_last_update = last_updated.is_some_and(|id| {
            report
                .machine_collisions
                .iter()
                .chain(&report.wall_collisions)
                .any(|c| c.involves(id))
        });

        log::debug!(
            "collisions: {} machine, {} wall, {} outside",
            report.machine_collisions.len(),
            report.wall_collisions.len(),
            report.outsiders.len()
        );

        report
    }

    fn overlap(&self, a: &Shape, b: &Shape) -> Option<MultiPolygon<f64>> {
        if !a.aabb_overlaps(b) {
            return None;
        }
        let region = a.intersection(b);
        (region.unsigned_area() > self.min_area).then_some(region)
    }
}
