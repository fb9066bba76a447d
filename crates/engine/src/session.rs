//! Layout session: registry, mutation API and evaluation pipeline.
//!
//! A [`LayoutSession`] owns one layout and everything derived from it.
//! Derived data (path network, space polygons) is computed on demand and
//! dropped whenever a machine moves.

use std::collections::HashSet;
use std::f64::consts::PI;

use factory_layout_core::{
    bend_angles, EngineConfig, Error, GraphPruner, GraphSimplifier, NetworkStatus, PathGraph,
    PruneParams, PruneStats, Rating, Result, ScoringPolicy, TunedScoring,
};
use geo::{Line, MultiPolygon, Polygon, Rect};
use rand::prelude::*;

use crate::collision::{CollisionDetector, CollisionReport};
use crate::geometry::{BoundingArea, Machine, Shape, Wall};
use crate::material_flow::{FlowEntry, MaterialFlow, MaterialFlowEdge};
use crate::overlay::union_polygons;
use crate::sampler::BoundarySampler;
use crate::space::{SpaceAnalyzer, SpacePolygons};
use crate::voronoi::VoronoiNetworkBuilder;

// ============================================================================
// Inputs
// ============================================================================

/// Machine record supplied by an import collaborator.
#[derive(Debug, Clone)]
pub struct MachineInput {
    /// Unique machine id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Footprint in its base orientation.
    pub polygon: Polygon<f64>,
}

/// Wall record supplied by an import collaborator.
#[derive(Debug, Clone)]
pub struct WallInput {
    /// Wall id.
    pub id: String,
    /// Fixed footprint.
    pub polygon: Polygon<f64>,
}

/// A validated layout ready to be evaluated.
#[derive(Debug, Clone)]
pub struct FactoryLayout {
    /// Factory outline.
    pub bounding: BoundingArea,
    /// Movable machines in registry order.
    pub machines: Vec<Machine>,
    /// Fixed obstacles.
    pub walls: Vec<Wall>,
    /// Material-flow table, validated when the session is created.
    pub flows: Vec<FlowEntry>,
}

impl FactoryLayout {
    /// Validates raw records.
    pub fn from_inputs(
        bounding: Polygon<f64>,
        machines: Vec<MachineInput>,
        walls: Vec<WallInput>,
        flows: Vec<FlowEntry>,
    ) -> Result<Self> {
        let bounding = BoundingArea::new(bounding)?;
        let machines = machines
            .into_iter()
            .map(|m| Machine::new(m.id, m.polygon).map(|machine| machine.with_name(m.name)))
            .collect::<Result<Vec<_>>>()?;
        let walls = walls
            .into_iter()
            .map(|w| Wall::new(w.id, w.polygon))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            bounding,
            machines,
            walls,
            flows,
        })
    }
}

// ============================================================================
// Path Network
// ============================================================================

/// All stages of the path network of one layout.
#[derive(Debug, Clone)]
pub struct PathNetwork {
    /// Outcome of the last build.
    pub status: NetworkStatus,
    /// Voronoi route graph before pruning.
    pub raw: PathGraph,
    /// Raw graph after pathwidth and dead-end pruning.
    pub pruned: PathGraph,
    /// Pruned graph with degree-2 chains collapsed.
    pub simplified: PathGraph,
    /// Free-space pieces of obstacle-touching Voronoi edges.
    pub clearance_segments: Vec<Line<f64>>,
    /// Bounding area minus obstacles; empty when the build failed.
    pub walkable: MultiPolygon<f64>,
    /// Removal counts per pruning stage.
    pub prune_stats: PruneStats,
}

impl PathNetwork {
    fn without_graph(status: NetworkStatus, tolerance: f64) -> Self {
        Self {
            status,
            raw: PathGraph::new(tolerance),
            pruned: PathGraph::new(tolerance),
            simplified: PathGraph::new(tolerance),
            clearance_segments: Vec::new(),
            walkable: MultiPolygon::new(Vec::new()),
            prune_stats: PruneStats::default(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Result of a single-machine update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The machine was moved.
    Applied,
    /// The skip probability reached the threshold; nothing changed.
    Skipped,
}

/// Valid origin range for a footprint of size `extent` inside `bounds`.
///
/// `None` if the footprint is larger than the bounds.
fn placement_range(extent: (f64, f64), bounds: Rect<f64>) -> Option<([f64; 2], [f64; 2])> {
    let (min, max) = (bounds.min(), bounds.max());
    let max_x = max.x - extent.0;
    let max_y = max.y - extent.1;
    if max_x < min.x || max_y < min.y {
        return None;
    }
    Some(([min.x, min.y], [max_x, max_y]))
}

/// Maps `v` in `[-1, 1]` linearly onto `[lo, hi]`, clamping first.
fn denormalize(v: f64, lo: f64, hi: f64) -> f64 {
    lo + (v.clamp(-1.0, 1.0) + 1.0) / 2.0 * (hi - lo)
}

/// One evaluated layout with its derived caches.
pub struct LayoutSession {
    config: EngineConfig,
    bounding: BoundingArea,
    machines: Vec<Machine>,
    walls: Vec<Wall>,
    flow: MaterialFlow,
    scoring: Box<dyn ScoringPolicy>,
    rng: StdRng,
    updates: usize,
    last_updated: Option<String>,
    collisions: CollisionReport,
    network: Option<PathNetwork>,
    space: Option<SpacePolygons>,
}

impl LayoutSession {
    /// Creates a session over validated geometry.
    ///
    /// Fails on an invalid config, duplicate machine ids or a flow table
    /// naming unknown machines.
    pub fn new(
        bounding: BoundingArea,
        machines: Vec<Machine>,
        walls: Vec<Wall>,
        flows: Vec<FlowEntry>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let mut seen = HashSet::new();
        for machine in &machines {
            if !seen.insert(machine.id()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate machine id '{}'",
                    machine.id()
                )));
            }
        }
        let flow = MaterialFlow::new(flows, &machines)?;
        let collisions = CollisionDetector::new(config.min_collision_area).detect(
            &machines,
            &walls,
            &bounding,
            None,
        );

        log::info!(
            "layout session: {} machines, {} walls, {} flow entries on {:.1} x {:.1}",
            machines.len(),
            walls.len(),
            flow.entries().len(),
            bounding.width(),
            bounding.height()
        );

        Ok(Self {
            config,
            bounding,
            machines,
            walls,
            flow,
            scoring: Box::new(TunedScoring::default()),
            rng: StdRng::seed_from_u64(0),
            updates: 0,
            last_updated: None,
            collisions,
            network: None,
            space: None,
        })
    }

    /// Creates a session from a [`FactoryLayout`].
    pub fn from_layout(layout: FactoryLayout, config: EngineConfig) -> Result<Self> {
        Self::new(
            layout.bounding,
            layout.machines,
            layout.walls,
            layout.flows,
            config,
        )
    }

    /// Replaces the scoring formulas.
    pub fn with_scoring(mut self, scoring: Box<dyn ScoringPolicy>) -> Self {
        self.scoring = scoring;
        self
    }

    /// Reseeds the session RNG.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Engine parameters.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Factory outline.
    pub fn bounding(&self) -> &BoundingArea {
        &self.bounding
    }

    /// Machines in registry order.
    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    /// Fixed walls.
    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Machine ids in registry order.
    pub fn machine_ids(&self) -> Vec<&str> {
        self.machines.iter().map(Machine::id).collect()
    }

    /// Looks up a machine.
    pub fn machine(&self, id: &str) -> Option<&Machine> {
        self.machines.iter().find(|m| m.id() == id)
    }

    /// Number of single-machine updates so far, skipped ones included.
    pub fn update_count(&self) -> usize {
        self.updates
    }

    /// True once the update budget of the episode is spent.
    pub fn is_done(&self) -> bool {
        self.updates > self.machines.len() + 1
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Moves one machine using normalized coordinates.
    ///
    /// `x` and `y` in `[-1, 1]` span the positions that keep the rotated
    /// bounding box inside the factory; `rotation` in `[-1, 1]` spans
    /// `[0, 2π]`, `None` keeps the current angle. The call counts towards the
    /// episode even when skipped or rejected.
    pub fn update(
        &mut self,
        id: &str,
        x: f64,
        y: f64,
        rotation: Option<f64>,
        skip: f64,
    ) -> Result<UpdateOutcome> {
        self.updates += 1;
        if skip >= self.config.skip_threshold {
            return Ok(UpdateOutcome::Skipped);
        }
        if !x.is_finite() || !y.is_finite() || !skip.is_finite() || rotation.is_some_and(|r| !r.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "non-finite update for '{}': x={}, y={}, rotation={:?}",
                id, x, y, rotation
            )));
        }

        let index = self.index_of(id)?;
        let mut machine = self.machines[index].clone();
        let rotation = rotation.map_or(machine.rotation(), |r| denormalize(r, 0.0, 2.0 * PI));
        self.place_normalized(&mut machine, x, y, rotation)?;

        self.machines[index] = machine;
        self.last_updated = Some(id.to_string());
        self.refresh();
        Ok(UpdateOutcome::Applied)
    }

    /// Places every machine at a random position and rotation.
    ///
    /// Draws from the session RNG and does not count as an update. Nothing
    /// moves if any machine cannot fit.
    pub fn randomize_positions(&mut self) -> Result<()> {
        let mut placed = self.machines.clone();
        for machine in &mut placed {
            let x = self.rng.gen_range(-1.0..=1.0);
            let y = self.rng.gen_range(-1.0..=1.0);
            let rotation = self.rng.gen_range(0.0..2.0 * PI);
            self.place_normalized(machine, x, y, rotation)?;
        }
        self.machines = placed;
        self.last_updated = None;
        self.refresh();
        Ok(())
    }

    /// Places machines at absolute origins and rotations (radians).
    ///
    /// Either all placements apply or none does.
    pub fn set_positions(&mut self, positions: &[(&str, f64, f64, f64)]) -> Result<()> {
        let mut placed = self.machines.clone();
        for &(id, x, y, rotation) in positions {
            let index = self.index_of(id)?;
            placed[index].place((x, y), rotation)?;
        }
        self.machines = placed;
        self.last_updated = None;
        self.refresh();
        Ok(())
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.machines
            .iter()
            .position(|m| m.id() == id)
            .ok_or_else(|| Error::UnknownMachine(id.to_string()))
    }

    fn place_normalized(&self, machine: &mut Machine, x: f64, y: f64, rotation: f64) -> Result<()> {
        let extent = machine
            .extent_at(rotation)
            .ok_or_else(|| Error::InvalidGeometry(format!("'{}' has no extent", machine.id())))?;
        let (min, max) = placement_range(extent, self.bounding.rect()).ok_or_else(|| {
            Error::InvalidGeometry(format!(
                "'{}' ({:.2} x {:.2}) does not fit the factory",
                machine.id(),
                extent.0,
                extent.1
            ))
        })?;
        let origin = (denormalize(x, min[0], max[0]), denormalize(y, min[1], max[1]));
        machine.place(origin, rotation)
    }

    fn refresh(&mut self) {
        self.collisions = CollisionDetector::new(self.config.min_collision_area).detect(
            &self.machines,
            &self.walls,
            &self.bounding,
            self.last_updated.as_deref(),
        );
        self.network = None;
        self.space = None;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Collision state of the current layout.
    pub fn collisions(&self) -> &CollisionReport {
        &self.collisions
    }

    /// Aggregated material flow measured on the current layout.
    pub fn material_flow(&self) -> Vec<MaterialFlowEdge> {
        self.flow.edges(&self.machines, &self.bounding)
    }

    /// Path network of the current layout, built on first access.
    pub fn path_network(&mut self) -> &PathNetwork {
        let network = match self.network.take() {
            Some(network) => network,
            None => self.build_network(),
        };
        self.network.insert(network)
    }

    /// Space polygons, or `None` when the path network could not be built.
    pub fn space_polygons(&mut self) -> Option<&SpacePolygons> {
        if self.space.is_none() {
            self.path_network();
            let network = self.network.as_ref()?;
            if matches!(network.status, NetworkStatus::Failed(_)) {
                return None;
            }
            let analysis = SpaceAnalyzer::from_config(&self.config).analyze(
                &mut self.machines,
                &self.walls,
                &network.walkable,
                &network.raw,
                &network.simplified,
            );
            self.space = Some(analysis);
        }
        self.space.as_ref()
    }

    /// Rates the current layout.
    pub fn evaluate(&mut self) -> Rating {
        let costs = self.flow.costs(&self.machines, &self.bounding);
        let material_flow = self.scoring.material_flow(&costs);
        let collision = self.scoring.collision(
            self.collisions.machine_collisions.len(),
            self.collisions.wall_collisions.len(),
        );

        let (route_continuity, path_width_uniformity, network) = if self.config.analyze_paths {
            let bend_tolerance = self.config.bend_tolerance_deg;
            self.path_network();
            match &self.network {
                Some(net) if net.status.is_built() => {
                    let bends = bend_angles(&net.simplified, bend_tolerance);
                    let widths: Vec<(f64, f64)> = net
                        .simplified
                        .edges()
                        .map(|(_, e)| (e.pathwidth, e.max_pathwidth))
                        .collect();
                    (
                        self.scoring
                            .route_continuity(&bends, net.simplified.edge_count()),
                        self.scoring.path_width_uniformity(&widths),
                        net.status.clone(),
                    )
                }
                Some(net) => (0.0, 0.0, net.status.clone()),
                None => (0.0, 0.0, NetworkStatus::Skipped),
            }
        } else {
            (0.0, 0.0, NetworkStatus::Skipped)
        };

        let rating = Rating {
            material_flow,
            collision,
            route_continuity,
            path_width_uniformity,
            composite: self.scoring.composite(material_flow, collision),
            machine_collisions: self.collisions.machine_collisions.len(),
            wall_collisions: self.collisions.wall_collisions.len(),
            outsiders: self.collisions.outsiders.len(),
            network,
            done: self.is_done(),
        };
        log::debug!(
            "rating: composite {:.4}, material flow {:.4}, collision {:.2}",
            rating.composite,
            rating.material_flow,
            rating.collision
        );
        rating
    }

    fn build_network(&self) -> PathNetwork {
        let tolerance = self.config.node_tolerance;
        let obstacles = union_polygons(
            self.machines
                .iter()
                .map(Machine::shape)
                .chain(self.walls.iter().map(Wall::shape))
                .flat_map(Shape::parts),
        );
        let voronoi = match BoundarySampler::new(self.config.boundary_spacing)
            .with_limit(self.config.max_sites)
            .sample(self.bounding.polygon(), &obstacles)
            .and_then(|samples| {
                VoronoiNetworkBuilder::from_config(&self.config).build(
                    &self.bounding,
                    &obstacles,
                    &samples,
                )
            }) {
            Ok(voronoi) => voronoi,
            Err(e) => {
                log::warn!("path network unavailable: {}", e);
                return PathNetwork::without_graph(NetworkStatus::Failed(e.to_string()), tolerance);
            }
        };

        let anchors: Vec<(f64, f64)> = self
            .machines
            .iter()
            .filter_map(|m| m.shape().interior_point().map(|p| (p.x(), p.y())))
            .collect();
        let pruner = GraphPruner::new(PruneParams::new(
            self.config.min_pathwidth,
            self.config.min_dead_end_length,
            self.config.service_dead_end_factor,
        ));
        let (pruned, prune_stats) = pruner.prune(&voronoi.raw, &anchors);

        let simplified = match GraphSimplifier::new()
            .with_two_way_pathwidth(self.config.two_way_pathwidth)
            .simplify(&pruned)
        {
            Ok(graph) => graph,
            Err(e) => {
                log::warn!("path simplification failed: {}", e);
                return PathNetwork {
                    status: NetworkStatus::Failed(e.to_string()),
                    raw: voronoi.raw,
                    pruned,
                    simplified: PathGraph::new(tolerance),
                    clearance_segments: voronoi.clearance_segments,
                    walkable: voronoi.walkable,
                    prune_stats,
                };
            }
        };

        let status = if simplified.edge_count() == 0 {
            NetworkStatus::Empty
        } else {
            NetworkStatus::Built
        };
        PathNetwork {
            status,
            raw: voronoi.raw,
            pruned,
            simplified,
            clearance_segments: voronoi.clearance_segments,
            walkable: voronoi.walkable,
            prune_stats,
        }
    }
}
