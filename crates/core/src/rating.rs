//! Layout rating.
//!
//! The formulas are empirically tuned; they sit behind [`ScoringPolicy`] so
//! a search loop can swap them without touching geometry code.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cost contribution of one aggregated material-flow edge.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlowCost {
    /// Summed intensity divided by the largest summed intensity.
    pub intensity_norm: f64,
    /// Centre distance divided by the larger side of the factory.
    pub distance_norm: f64,
}

impl FlowCost {
    /// Normalized distance times normalized intensity.
    pub fn cost(&self) -> f64 {
        self.distance_norm * self.intensity_norm
    }
}

/// Scoring formulas of the rating.
pub trait ScoringPolicy: Send + Sync {
    /// Material-flow rating in `[0, 1]`.
    fn material_flow(&self, flows: &[FlowCost]) -> f64;

    /// Collision rating; 1 means collision free.
    fn collision(&self, machine_collisions: usize, wall_collisions: usize) -> f64;

    /// Route-continuity rating from bend angles (degrees, 180 = straight).
    fn route_continuity(&self, bend_angles: &[f64], simplified_edges: usize) -> f64;

    /// Path-width uniformity from per-edge `(min, max)` pathwidths.
    fn path_width_uniformity(&self, widths: &[(f64, f64)]) -> f64;

    /// Composite score handed to the search loop.
    fn composite(&self, material_flow: f64, collision: f64) -> f64;
}

/// Default scoring.
///
/// * material flow: `max(0, 1 - (Σ cost)² / Σ intensity)`
/// * collision: `1 - 0.5 · machine - 0.5 · wall`
/// * composite: `material_flow³` when collision free, `-1` otherwise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TunedScoring {
    /// Penalty per machine-machine collision.
    pub machine_penalty: f64,
    /// Penalty per machine-wall collision.
    pub wall_penalty: f64,
    /// Exponent applied to material flow in the composite.
    pub flow_exponent: i32,
    /// Composite of any layout with a collision.
    pub collision_floor: f64,
}

impl Default for TunedScoring {
    fn default() -> Self {
        Self {
            machine_penalty: 0.5,
            wall_penalty: 0.5,
            flow_exponent: 3,
            collision_floor: -1.0,
        }
    }
}

impl ScoringPolicy for TunedScoring {
    fn material_flow(&self, flows: &[FlowCost]) -> f64 {
        let intensity: f64 = flows.iter().map(|f| f.intensity_norm).sum();
        if flows.is_empty() || intensity <= 0.0 {
            return 0.0;
        }
        let cost: f64 = flows.iter().map(FlowCost::cost).sum();
        (1.0 - cost * cost / intensity).max(0.0)
    }

    fn collision(&self, machine_collisions: usize, wall_collisions: usize) -> f64 {
        1.0 - self.machine_penalty * machine_collisions as f64
            - self.wall_penalty * wall_collisions as f64
    }

    fn route_continuity(&self, bend_angles: &[f64], simplified_edges: usize) -> f64 {
        let n = bend_angles.len();
        if n == 0 {
            return 1.0;
        }
        let density = (n as f64 / simplified_edges.max(1) as f64).max(1.0);
        let blend = 1.0 / n as f64;

        let total: f64 = bend_angles
            .iter()
            .map(|angle| {
                let v = (angle / 180.0).powi(2) / density;
                (1.0 - blend) * v + blend
            })
            .sum();
        total / n as f64
    }

    fn path_width_uniformity(&self, widths: &[(f64, f64)]) -> f64 {
        if widths.is_empty() {
            return 0.0;
        }
        let total: f64 = widths
            .iter()
            .map(|&(min, max)| if max > 0.0 { min / max } else { 0.0 })
            .sum();
        total / widths.len() as f64
    }

    fn composite(&self, material_flow: f64, collision: f64) -> f64 {
        if collision == 1.0 {
            material_flow.powi(self.flow_exponent)
        } else {
            self.collision_floor
        }
    }
}

/// Outcome of the path network stage.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NetworkStatus {
    /// Network built and non-empty.
    Built,
    /// Pruning removed every edge.
    Empty,
    /// Voronoi construction failed; carries the reason.
    Failed(String),
    /// Path analysis disabled.
    #[default]
    Skipped,
}

impl NetworkStatus {
    /// Returns true for a usable network.
    pub fn is_built(&self) -> bool {
        matches!(self, NetworkStatus::Built)
    }
}

/// Immutable rating of one layout.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rating {
    /// Material-flow rating in `[0, 1]`.
    pub material_flow: f64,
    /// Collision rating; 1 when collision free.
    pub collision: f64,
    /// Route-continuity rating in `[0, 1]`.
    pub route_continuity: f64,
    /// Mean min/max pathwidth ratio of simplified edges.
    pub path_width_uniformity: f64,
    /// Composite score.
    pub composite: f64,
    /// Number of machine-machine collisions.
    pub machine_collisions: usize,
    /// Number of machine-wall collisions.
    pub wall_collisions: usize,
    /// Number of machines outside the bounding area.
    pub outsiders: usize,
    /// State of the path network used for the route metrics.
    pub network: NetworkStatus,
    /// Episode finished (update budget exhausted).
    pub done: bool,
}
