//! # Factory Layout Core
//!
//! Geometry-agnostic building blocks of the factory layout evaluation engine.
//!
//! ## Core Components
//!
//! - **Path graph**: [`PathGraph`], an arena graph with typed [`NodeId`] /
//!   [`EdgeId`] handles and quantized node identity
//! - **Pruning**: [`GraphPruner`] and the [`prune_along_path`] primitive
//! - **Simplification**: [`GraphSimplifier`], degree-2 chain contraction
//! - **Scoring**: [`ScoringPolicy`] with the tuned default [`TunedScoring`]
//! - **Predicates**: robust orientation and segment tests in [`robust`]
//!
//! ## Configuration
//!
//! ```rust
//! use factory_layout_core::EngineConfig;
//!
//! let config = EngineConfig::new()
//!     .with_boundary_spacing(1.0)
//!     .with_min_pathwidth(0.8)
//!     .with_min_dead_end_length(2.5);
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod config;
pub mod error;
pub mod graph;
pub mod prune;
pub mod rating;
pub mod robust;
pub mod simplify;

// Re-exports
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use graph::{distance, EdgeId, NodeId, NodeKind, PathEdge, PathGraph, PathKind, PathNode};
pub use prune::{prune_along_path, GraphPruner, PruneParams, PruneStats};
pub use rating::{FlowCost, NetworkStatus, Rating, ScoringPolicy, TunedScoring};
pub use crate::robust::GridKey;
pub use simplify::{bend_angles, polyline_turn_angles, turn_angle, GraphSimplifier};
