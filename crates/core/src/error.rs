//! Error types for layout evaluation.

use thiserror::Error;

/// Errors raised while ingesting, mutating or analyzing a layout.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A polygon is degenerate, self-intersecting or cannot be placed.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The bounding area of the factory is unusable.
    #[error("invalid boundary: {0}")]
    InvalidBoundary(String),

    /// A caller-supplied argument is out of its domain.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An id does not name a machine of the layout.
    #[error("unknown machine: {0}")]
    UnknownMachine(String),

    /// The Voronoi skeleton could not be constructed for the given sites.
    #[error("path network construction failed: {0}")]
    NetworkBuild(String),

    /// Internal invariant violated.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = Error::UnknownMachine("M_7".into());
        assert_eq!(err.to_string(), "unknown machine: M_7");

        let err = Error::NetworkBuild("fewer than 3 sites".into());
        assert!(err.to_string().contains("fewer than 3 sites"));
    }
}
