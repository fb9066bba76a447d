//! Robust geometric predicates.
//!
//! Orientation tests use Shewchuk's adaptive precision arithmetic from the
//! `robust` crate, so segment crossing and ring simplicity checks stay
//! correct for nearly collinear input such as Voronoi vertices sitting on
//! obstacle edges.
//!
//! ## Example
//!
//! ```rust
//! use factory_layout_core::robust::{orient2d, segments_cross, Orientation};
//!
//! assert_eq!(orient2d((0.0, 0.0), (1.0, 0.0), (0.5, 1.0)), Orientation::CounterClockwise);
//! assert!(segments_cross((0.0, 0.0), (2.0, 2.0), (0.0, 2.0), (2.0, 0.0)));
//! ```

use robust::{orient2d as robust_orient2d, Coord};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Result of an orientation test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Left turn.
    CounterClockwise,
    /// Right turn.
    Clockwise,
    /// On the same line.
    Collinear,
}

impl Orientation {
    /// Returns true if the points are collinear.
    #[inline]
    pub fn is_collinear(self) -> bool {
        matches!(self, Orientation::Collinear)
    }
}

// ============================================================================
// Core Predicates
// ============================================================================

/// Orientation of `pc` relative to the directed line `pa -> pb`.
#[inline]
pub fn orient2d(pa: (f64, f64), pb: (f64, f64), pc: (f64, f64)) -> Orientation {
    let result = robust_orient2d(
        Coord { x: pa.0, y: pa.1 },
        Coord { x: pb.0, y: pb.1 },
        Coord { x: pc.0, y: pc.1 },
    );

    if result > 0.0 {
        Orientation::CounterClockwise
    } else if result < 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::Collinear
    }
}

const FILTER_EPSILON: f64 = 1e-12;

/// Orientation test with a floating-point filter.
///
/// Clear cases are decided by a plain cross product; only near-degenerate
/// triples fall back to exact arithmetic.
#[inline]
pub fn orient2d_filtered(pa: (f64, f64), pb: (f64, f64), pc: (f64, f64)) -> Orientation {
    let acx = pa.0 - pc.0;
    let bcx = pb.0 - pc.0;
    let acy = pa.1 - pc.1;
    let bcy = pb.1 - pc.1;

    let det = acx * bcy - acy * bcx;
    let det_sum = (acx * bcy).abs() + (acy * bcx).abs();

    if det.abs() > FILTER_EPSILON * det_sum {
        return if det > 0.0 {
            Orientation::CounterClockwise
        } else {
            Orientation::Clockwise
        };
    }

    orient2d(pa, pb, pc)
}

// ============================================================================
// Segment Predicates
// ============================================================================

#[inline]
fn on_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> bool {
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

/// Returns true if segments `a1-a2` and `b1-b2` share at least one point.
pub fn segments_intersect(
    a1: (f64, f64),
    a2: (f64, f64),
    b1: (f64, f64),
    b2: (f64, f64),
) -> bool {
    let o1 = orient2d_filtered(a1, a2, b1);
    let o2 = orient2d_filtered(a1, a2, b2);
    let o3 = orient2d_filtered(b1, b2, a1);
    let o4 = orient2d_filtered(b1, b2, a2);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1.is_collinear() && on_segment(b1, a1, a2))
        || (o2.is_collinear() && on_segment(b2, a1, a2))
        || (o3.is_collinear() && on_segment(a1, b1, b2))
        || (o4.is_collinear() && on_segment(a2, b1, b2))
}

/// Returns true if the segments cross at a single point interior to both.
///
/// Touching at an endpoint and collinear overlap do not count.
pub fn segments_cross(a1: (f64, f64), a2: (f64, f64), b1: (f64, f64), b2: (f64, f64)) -> bool {
    let o1 = orient2d_filtered(a1, a2, b1);
    let o2 = orient2d_filtered(a1, a2, b2);
    let o3 = orient2d_filtered(b1, b2, a1);
    let o4 = orient2d_filtered(b1, b2, a2);

    !o1.is_collinear()
        && !o2.is_collinear()
        && !o3.is_collinear()
        && !o4.is_collinear()
        && o1 != o2
        && o3 != o4
}

/// Parameter `t` along `a1 -> a2` where it meets segment `b1-b2`.
///
/// Returns `None` for parallel or disjoint segments. Collinear overlaps
/// report the parameters of the overlapping endpoints instead, through
/// [`segment_split_params`].
pub fn segment_intersection_param(
    a1: (f64, f64),
    a2: (f64, f64),
    b1: (f64, f64),
    b2: (f64, f64),
) -> Option<f64> {
    if !segments_intersect(a1, a2, b1, b2) {
        return None;
    }

    let rx = a2.0 - a1.0;
    let ry = a2.1 - a1.1;
    let sx = b2.0 - b1.0;
    let sy = b2.1 - b1.1;
    let denom = rx * sy - ry * sx;
    if denom.abs() < f64::EPSILON * (rx.abs() + ry.abs()) * (sx.abs() + sy.abs()) {
        return None;
    }

    let t = ((b1.0 - a1.0) * sy - (b1.1 - a1.1) * sx) / denom;
    Some(t.clamp(0.0, 1.0))
}

/// All parameters along `a1 -> a2` at which it meets `b1-b2`.
///
/// Handles the collinear case by projecting the other segment's endpoints.
pub fn segment_split_params(
    a1: (f64, f64),
    a2: (f64, f64),
    b1: (f64, f64),
    b2: (f64, f64),
) -> Vec<f64> {
    if let Some(t) = segment_intersection_param(a1, a2, b1, b2) {
        return vec![t];
    }
    if !segments_intersect(a1, a2, b1, b2) {
        return Vec::new();
    }

    let dx = a2.0 - a1.0;
    let dy = a2.1 - a1.1;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return Vec::new();
    }
    [b1, b2]
        .iter()
        .map(|p| ((p.0 - a1.0) * dx + (p.1 - a1.1) * dy) / len_sq)
        .filter(|t| (0.0..=1.0).contains(t))
        .collect()
}

// ============================================================================
// Ring Predicates
// ============================================================================

/// Signed area of a ring (positive if counter-clockwise).
///
/// Accepts rings with or without the closing vertex.
pub fn signed_area(ring: &[(f64, f64)]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }

    // Kahan summation
    let mut sum = 0.0;
    let mut c = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        let term = ring[i].0 * ring[j].1 - ring[j].0 * ring[i].1;
        let y = term - c;
        let t = sum + y;
        c = (t - sum) - y;
        sum = t;
    }

    sum / 2.0
}

/// Returns true if no two non-adjacent edges of the ring intersect.
///
/// The ring may be given open or closed (first vertex repeated at the end).
pub fn ring_is_simple(ring: &[(f64, f64)]) -> bool {
    let mut points: Vec<(f64, f64)> = ring.to_vec();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points.dedup();
    let n = points.len();
    if n < 3 {
        return false;
    }

    for i in 0..n {
        let a1 = points[i];
        let a2 = points[(i + 1) % n];
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            let b1 = points[j];
            let b2 = points[(j + 1) % n];
            if adjacent {
                // Adjacent edges may only share their common vertex.
                let (shared, p, q) = if j == i + 1 { (a2, a1, b2) } else { (a1, a2, b1) };
                if orient2d(p, shared, q).is_collinear()
                    && (on_segment(q, p, shared) || on_segment(p, shared, q))
                {
                    return false;
                }
                continue;
            }
            if segments_intersect(a1, a2, b1, b2) {
                return false;
            }
        }
    }

    true
}

// ============================================================================
// Coordinate Quantization
// ============================================================================

/// Integer grid cell of a coordinate, used as a hashable point identity.
///
/// Two coordinates that round to the same cell of side `resolution` share a
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridKey {
    /// Cell column.
    pub x: i64,
    /// Cell row.
    pub y: i64,
}

impl GridKey {
    /// Quantizes a point onto a grid of the given resolution.
    #[inline]
    pub fn new(point: (f64, f64), resolution: f64) -> Self {
        Self {
            x: (point.0 / resolution).round() as i64,
            y: (point.1 / resolution).round() as i64,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_orient2d_basic() {
        let a = (0.0, 0.0);
        let b = (1.0, 0.0);
        let c = (0.5, 1.0);

        assert_eq!(orient2d(a, b, c), Orientation::CounterClockwise);
        assert_eq!(orient2d(a, c, b), Orientation::Clockwise);
        assert_eq!(orient2d(a, b, (2.0, 0.0)), Orientation::Collinear);
        assert_eq!(orient2d_filtered(a, b, c), Orientation::CounterClockwise);
    }

    #[test]
    fn test_segments_cross_vs_touch() {
        // X shape
        assert!(segments_cross((0.0, 0.0), (2.0, 2.0), (0.0, 2.0), (2.0, 0.0)));
        // T junction touches but does not cross
        assert!(!segments_cross((0.0, 0.0), (2.0, 0.0), (1.0, 0.0), (1.0, 1.0)));
        assert!(segments_intersect((0.0, 0.0), (2.0, 0.0), (1.0, 0.0), (1.0, 1.0)));
        // Disjoint
        assert!(!segments_intersect((0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)));
    }

    #[test]
    fn test_intersection_param() {
        let t = segment_intersection_param((0.0, 0.0), (4.0, 0.0), (1.0, -1.0), (1.0, 1.0));
        assert_relative_eq!(t.unwrap_or(-1.0), 0.25);

        // Collinear overlap falls back to projected endpoints
        let params = segment_split_params((0.0, 0.0), (4.0, 0.0), (1.0, 0.0), (3.0, 0.0));
        assert_eq!(params.len(), 2);
        assert_relative_eq!(params[0], 0.25);
        assert_relative_eq!(params[1], 0.75);
    }

    #[test]
    fn test_signed_area() {
        let ccw = [(0.0, 0.0), (2.0, 0.0), (2.0, 3.0), (0.0, 3.0)];
        assert_relative_eq!(signed_area(&ccw), 6.0);

        let cw: Vec<_> = ccw.iter().rev().copied().collect();
        assert_relative_eq!(signed_area(&cw), -6.0);
    }

    #[test]
    fn test_ring_is_simple() {
        let square = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)];
        assert!(ring_is_simple(&square));

        let bowtie = [(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0)];
        assert!(!ring_is_simple(&bowtie));

        let degenerate = [(0.0, 0.0), (1.0, 0.0)];
        assert!(!ring_is_simple(&degenerate));
    }

    #[test]
    fn test_grid_key_merges_close_points() {
        let a = GridKey::new((1.0, 2.0), 1e-6);
        let b = GridKey::new((1.0 + 1e-9, 2.0 - 1e-9), 1e-6);
        let c = GridKey::new((1.0 + 1e-3, 2.0), 1e-6);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
