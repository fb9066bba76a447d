//! # Factory Layout Engine
//!
//! Geometric analysis and rating of factory floor-plan layouts.
//!
//! Given machines, walls and a bounding area this crate detects collisions,
//! derives a walkable path network from the Voronoi skeleton of the free
//! floor, prunes and simplifies it, computes used/free space polygons and
//! rates the layout.
//!
//! ## Features
//!
//! - Polygon footprints with holes, single or multi-part
//! - R*-tree broad phase for collision detection
//! - Voronoi path network with pathwidth per node and edge
//! - Used-space clustering and free-space extraction
//! - Pluggable scoring through [`ScoringPolicy`]
//! - Seeded synthetic layouts
//!
//! ## Quick Start
//!
//! ```rust
//! use factory_layout_engine::{
//!     BoundingArea, EngineConfig, FlowEntry, LayoutSession, Machine, Shape,
//! };
//!
//! let bounds = BoundingArea::rectangle(100.0, 100.0).unwrap();
//! let machines = vec![
//!     Machine::new("M_0", Shape::rectangle(0.0, 0.0, 10.0, 10.0)).unwrap(),
//!     Machine::new("M_1", Shape::rectangle(50.0, 50.0, 10.0, 10.0)).unwrap(),
//! ];
//! let flows = vec![FlowEntry::new("M_0", "M_1", 1.0)];
//!
//! let mut session =
//!     LayoutSession::new(bounds, machines, Vec::new(), flows, EngineConfig::default()).unwrap();
//! session.update("M_1", 0.0, 0.0, None, 0.0).unwrap();
//!
//! let rating = session.evaluate();
//! println!("composite {:.3}, material flow {:.3}", rating.composite, rating.material_flow);
//! ```
//!
//! ## Synthetic Layouts
//!
//! ```rust
//! use factory_layout_engine::FactoryCreator;
//!
//! let mut creator = FactoryCreator::new(320.0, 180.0, 42).with_rect_count(10);
//! let machines = creator.create_machines().unwrap();
//! let flows = creator.random_material_flow(&machines, 20);
//! assert!(machines.len() >= 2 && flows.len() == 20);
//! ```

pub mod collision;
pub mod creation;
pub mod geometry;
pub mod material_flow;
pub mod overlay;
pub mod sampler;
pub mod session;
pub mod space;
pub mod spatial_index;
pub mod voronoi;

// Re-exports
pub use collision::{Collision, CollisionDetector, CollisionKind, CollisionReport};
pub use creation::FactoryCreator;
pub use factory_layout_core::{
    EngineConfig, Error, NetworkStatus, PathGraph, PathKind, Rating, Result, ScoringPolicy,
    TunedScoring,
};
pub use geometry::{BoundingArea, Machine, Shape, Wall};
pub use material_flow::{FlowEntry, MaterialFlow, MaterialFlowEdge};
pub use sampler::BoundarySampler;
pub use session::{
    FactoryLayout, LayoutSession, MachineInput, PathNetwork, UpdateOutcome, WallInput,
};
pub use space::{SpaceAnalyzer, SpacePolygons, UsedSpace};
pub use spatial_index::{SpatialEntry2D, SpatialIndex2D};
pub use voronoi::{VoronoiNetwork, VoronoiNetworkBuilder};
