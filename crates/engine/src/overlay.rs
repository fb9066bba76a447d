//! Polygon union and polyline buffering.
//!
//! Unions go through `i_overlay` in a single pass: every ring is fed as a
//! subject contour (exteriors counter-clockwise, holes clockwise) and the
//! non-zero fill rule yields the union. Polyline ribbons are built as
//! segment rectangles plus vertex discs and unioned the same way.

use std::f64::consts::PI;

use factory_layout_core::robust::signed_area;
use geo::{Area, LineString, MultiPolygon, Polygon};
use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;

type Contour = Vec<[f64; 2]>;

fn oriented_contour(ring: &LineString<f64>, ccw: bool) -> Option<Contour> {
    let mut points: Vec<(f64, f64)> = ring.coords().map(|c| (c.x, c.y)).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() < 3 {
        return None;
    }
    let area = signed_area(&points);
    if area == 0.0 {
        return None;
    }
    if (area > 0.0) != ccw {
        points.reverse();
    }
    Some(points.into_iter().map(|(x, y)| [x, y]).collect())
}

fn polygon_contours(polygon: &Polygon<f64>, out: &mut Vec<Contour>) {
    if let Some(exterior) = oriented_contour(polygon.exterior(), true) {
        out.push(exterior);
        out.extend(
            polygon
                .interiors()
                .iter()
                .filter_map(|hole| oriented_contour(hole, false)),
        );
    }
}

fn contours_to_multi(shapes: Vec<Vec<Contour>>) -> MultiPolygon<f64> {
    let polygons = shapes
        .into_iter()
        .filter_map(|shape| {
            let mut rings = shape
                .into_iter()
                .filter(|contour| contour.len() >= 3)
                .map(LineString::from);
            let exterior = rings.next()?;
            Some(Polygon::new(exterior, rings.collect()))
        })
        .filter(|p| p.unsigned_area() > 0.0)
        .collect();
    MultiPolygon::new(polygons)
}

/// Union of arbitrarily overlapping polygons.
pub fn union_polygons<'a>(polygons: impl IntoIterator<Item = &'a Polygon<f64>>) -> MultiPolygon<f64> {
    let mut subject: Vec<Contour> = Vec::new();
    for polygon in polygons {
        polygon_contours(polygon, &mut subject);
    }
    union_contours(subject)
}

fn union_contours(subject: Vec<Contour>) -> MultiPolygon<f64> {
    if subject.is_empty() {
        return MultiPolygon::new(Vec::new());
    }
    let clip: Vec<Contour> = Vec::new();
    let shapes = subject.overlay(&clip, OverlayRule::Union, FillRule::NonZero);
    contours_to_multi(shapes)
}

// ============================================================================
// Ribbons
// ============================================================================

/// Regular polygon approximating a disc, counter-clockwise.
pub fn disc(center: (f64, f64), radius: f64, segments: usize) -> Contour {
    let n = segments.max(4);
    (0..n)
        .map(|i| {
            let a = 2.0 * PI * i as f64 / n as f64;
            [center.0 + radius * a.cos(), center.1 + radius * a.sin()]
        })
        .collect()
}

/// Counter-clockwise rectangle of half-width `radius` around a segment.
fn segment_band(a: (f64, f64), b: (f64, f64), radius: f64) -> Option<Contour> {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len = dx.hypot(dy);
    if len == 0.0 {
        return None;
    }
    let (nx, ny) = (-dy / len * radius, dx / len * radius);
    Some(vec![
        [a.0 - nx, a.1 - ny],
        [b.0 - nx, b.1 - ny],
        [b.0 + nx, b.1 + ny],
        [a.0 + nx, a.1 + ny],
    ])
}

fn ribbon_contours(polyline: &[(f64, f64)], radius: f64, segments: usize, out: &mut Vec<Contour>) {
    if !(radius > 0.0) || polyline.is_empty() {
        return;
    }
    for &p in polyline {
        out.push(disc(p, radius, segments));
    }
    for w in polyline.windows(2) {
        if let Some(band) = segment_band(w[0], w[1], radius) {
            out.push(band);
        }
    }
}

/// Union of round-joined ribbons, one per `(polyline, radius)`.
///
/// Non-positive radii contribute nothing.
pub fn buffer_polylines<'a>(
    lines: impl IntoIterator<Item = (&'a [(f64, f64)], f64)>,
    segments: usize,
) -> MultiPolygon<f64> {
    let mut subject: Vec<Contour> = Vec::new();
    for (polyline, radius) in lines {
        ribbon_contours(polyline, radius, segments, &mut subject);
    }
    union_contours(subject)
}

/// The part with the largest area, and the remaining parts.
pub fn split_largest(multi: MultiPolygon<f64>) -> (MultiPolygon<f64>, Option<Polygon<f64>>) {
    let mut parts = multi.0;
    let largest = parts
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.unsigned_area().total_cmp(&b.unsigned_area()))
        .map(|(i, _)| i);
    match largest {
        Some(i) => {
            let reserved = parts.remove(i);
            (MultiPolygon::new(parts), Some(reserved))
        }
        None => (MultiPolygon::new(parts), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::Rect;

    #[test]
    fn test_union_of_overlapping_squares() {
        let a = Rect::new((0.0, 0.0), (2.0, 2.0)).to_polygon();
        let b = Rect::new((1.0, 1.0), (3.0, 3.0)).to_polygon();
        let c = Rect::new((10.0, 10.0), (11.0, 11.0)).to_polygon();

        let union = union_polygons([&a, &b, &c]);
        assert_eq!(union.0.len(), 2);
        assert_relative_eq!(union.unsigned_area(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_union_keeps_holes() {
        let frame = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]),
            vec![LineString::from(vec![
                (1.0, 1.0),
                (3.0, 1.0),
                (3.0, 3.0),
                (1.0, 3.0),
            ])],
        );
        let union = union_polygons([&frame]);
        assert_relative_eq!(union.unsigned_area(), 12.0, epsilon = 1e-9);
        assert!(union_polygons(std::iter::empty()).0.is_empty());
    }

    #[test]
    fn test_straight_ribbon_area() {
        let line = [(0.0, 0.0), (10.0, 0.0)];
        let ribbon = buffer_polylines([(&line[..], 1.0)], 64);
        // Rectangle 10 x 2 plus an almost full unit disc
        let expected = 20.0 + PI;
        assert_relative_eq!(ribbon.unsigned_area(), expected, epsilon = 0.05);
        assert_eq!(ribbon.0.len(), 1);

        let none = buffer_polylines([(&line[..], 0.0)], 16);
        assert!(none.0.is_empty());
    }

    #[test]
    fn test_split_largest() {
        let small = Rect::new((0.0, 0.0), (1.0, 1.0)).to_polygon();
        let big = Rect::new((5.0, 5.0), (9.0, 9.0)).to_polygon();
        let (rest, reserved) = split_largest(MultiPolygon::new(vec![small.clone(), big]));
        assert_eq!(rest.0, vec![small]);
        assert_relative_eq!(reserved.map(|p| p.unsigned_area()).unwrap_or(0.0), 16.0);

        let (rest, reserved) = split_largest(MultiPolygon::new(vec![]));
        assert!(rest.0.is_empty());
        assert!(reserved.is_none());
    }
}
