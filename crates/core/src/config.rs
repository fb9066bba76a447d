//! Engine configuration.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tunable constants of the evaluation pipeline.
///
/// Lengths are in layout units (typically metres).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Arc-length distance between Voronoi generator sites on boundaries.
    pub boundary_spacing: f64,

    /// Edges narrower than this are removed before routing.
    pub min_pathwidth: f64,

    /// Dead ends shorter than this are removed in the structural pass.
    pub min_dead_end_length: f64,

    /// Multiplier on `min_dead_end_length` for the service pass.
    pub service_dead_end_factor: f64,

    /// Coordinates closer than this map to the same graph node.
    pub node_tolerance: f64,

    /// Intersections with smaller area are treated as mere contact.
    pub min_collision_area: f64,

    /// Linkage distance for grouping machines into used space.
    pub cluster_threshold: f64,

    /// Vertex count of the discs used when buffering path polylines.
    pub buffer_segments: usize,

    /// Path polygon vertices within this distance of a wall sample snap to it.
    pub snap_tolerance: f64,

    /// Sampling distance along wall boundaries for snapping.
    pub wall_snap_spacing: f64,

    /// Minimum pathwidth of an edge for two-way traffic.
    pub two_way_pathwidth: f64,

    /// Turns closer than this to straight (degrees) are not bends.
    pub bend_tolerance_deg: f64,

    /// Update calls with a skip value at or above this are no-ops.
    pub skip_threshold: f64,

    /// Upper bound on Voronoi generator sites.
    pub max_sites: usize,

    /// Capacity of the nearest-site memo.
    pub clearance_cache_capacity: usize,

    /// Whether `evaluate` builds the path network.
    pub analyze_paths: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            boundary_spacing: 2.0,
            min_pathwidth: 1.0,
            min_dead_end_length: 2.0,
            service_dead_end_factor: 10.0,
            node_tolerance: 1e-6,
            min_collision_area: 1e-9,
            cluster_threshold: 2.0,
            buffer_segments: 16,
            snap_tolerance: 0.1,
            wall_snap_spacing: 1.0,
            two_way_pathwidth: 3.0,
            bend_tolerance_deg: 1.0,
            skip_threshold: 0.8,
            max_sites: 200_000,
            clearance_cache_capacity: 4096,
            analyze_paths: true,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the boundary sampling distance.
    pub fn with_boundary_spacing(mut self, spacing: f64) -> Self {
        self.boundary_spacing = spacing;
        self
    }

    /// Sets the minimum routable pathwidth.
    pub fn with_min_pathwidth(mut self, width: f64) -> Self {
        self.min_pathwidth = width;
        self
    }

    /// Sets the structural dead-end threshold.
    pub fn with_min_dead_end_length(mut self, length: f64) -> Self {
        self.min_dead_end_length = length;
        self
    }

    /// Sets the service-pass multiplier.
    pub fn with_service_dead_end_factor(mut self, factor: f64) -> Self {
        self.service_dead_end_factor = factor;
        self
    }

    /// Sets the node merge tolerance.
    pub fn with_node_tolerance(mut self, tolerance: f64) -> Self {
        self.node_tolerance = tolerance;
        self
    }

    /// Sets the used-space clustering distance.
    pub fn with_cluster_threshold(mut self, threshold: f64) -> Self {
        self.cluster_threshold = threshold;
        self
    }

    /// Sets the disc resolution for path ribbons.
    pub fn with_buffer_segments(mut self, segments: usize) -> Self {
        self.buffer_segments = segments;
        self
    }

    /// Sets the pathwidth from which an edge counts as two-way.
    pub fn with_two_way_pathwidth(mut self, width: f64) -> Self {
        self.two_way_pathwidth = width;
        self
    }

    /// Sets the straightness tolerance for bends, in degrees.
    pub fn with_bend_tolerance_deg(mut self, degrees: f64) -> Self {
        self.bend_tolerance_deg = degrees;
        self
    }

    /// Sets the skip threshold of `update`.
    pub fn with_skip_threshold(mut self, threshold: f64) -> Self {
        self.skip_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Enables or disables path network analysis during evaluation.
    pub fn with_path_analysis(mut self, enabled: bool) -> Self {
        self.analyze_paths = enabled;
        self
    }

    /// Threshold of the service pruning pass.
    pub fn service_dead_end_length(&self) -> f64 {
        self.min_dead_end_length * self.service_dead_end_factor
    }

    /// Checks that every value is in its domain.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("min_pathwidth", self.min_pathwidth),
            ("min_dead_end_length", self.min_dead_end_length),
            ("service_dead_end_factor", self.service_dead_end_factor),
            ("min_collision_area", self.min_collision_area),
            ("cluster_threshold", self.cluster_threshold),
            ("snap_tolerance", self.snap_tolerance),
            ("two_way_pathwidth", self.two_way_pathwidth),
            ("bend_tolerance_deg", self.bend_tolerance_deg),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }

        let positive = [
            ("boundary_spacing", self.boundary_spacing),
            ("node_tolerance", self.node_tolerance),
            ("wall_snap_spacing", self.wall_snap_spacing),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidInput(format!(
                    "{} must be finite and positive, got {}",
                    name, value
                )));
            }
        }

        if self.buffer_segments < 4 {
            return Err(Error::InvalidInput(
                "buffer_segments must be at least 4".into(),
            ));
        }
        if self.max_sites < 3 {
            return Err(Error::InvalidInput("max_sites must be at least 3".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.service_dead_end_length(), 20.0);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_min_pathwidth(0.5)
            .with_min_dead_end_length(3.0)
            .with_service_dead_end_factor(5.0)
            .with_skip_threshold(1.5);

        assert_relative_eq!(config.min_pathwidth, 0.5);
        assert_relative_eq!(config.service_dead_end_length(), 15.0);
        assert_relative_eq!(config.skip_threshold, 1.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = EngineConfig::new().with_boundary_spacing(0.0);
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));

        let config = EngineConfig::new().with_min_pathwidth(f64::NAN);
        assert!(config.validate().is_err());

        let config = EngineConfig::new().with_buffer_segments(2);
        assert!(config.validate().is_err());
    }
}
