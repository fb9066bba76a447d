//! 2D layout geometry: shapes, machines, walls and the bounding area.

use factory_layout_core::robust::{ring_is_simple, segments_cross};
use factory_layout_core::{Error, Result};
use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Coord, InteriorPoint, Intersects, LineString,
    MultiPolygon, Point, Polygon, Rect, Rotate, Translate,
};

// ============================================================================
// Shape
// ============================================================================

/// Footprint of a layout entity: one polygon or several disjoint ones.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// A single polygon with optional holes.
    Single(Polygon<f64>),
    /// Several polygons.
    Multi(MultiPolygon<f64>),
}

impl From<Polygon<f64>> for Shape {
    fn from(polygon: Polygon<f64>) -> Self {
        Shape::Single(polygon)
    }
}

impl From<MultiPolygon<f64>> for Shape {
    fn from(multi: MultiPolygon<f64>) -> Self {
        Shape::Multi(multi)
    }
}

impl Shape {
    /// Axis-aligned rectangle with its min corner at `(x, y)`.
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Shape::Single(Rect::new((x, y), (x + width, y + height)).to_polygon())
    }

    /// Polygon from a vertex list (closing vertex optional).
    pub fn from_vertices(vertices: Vec<(f64, f64)>) -> Self {
        Shape::Single(Polygon::new(LineString::from(vertices), vec![]))
    }

    /// Component polygons.
    pub fn parts(&self) -> &[Polygon<f64>] {
        match self {
            Shape::Single(p) => std::slice::from_ref(p),
            Shape::Multi(m) => &m.0,
        }
    }

    /// Copy as a multi-polygon.
    pub fn to_multi(&self) -> MultiPolygon<f64> {
        match self {
            Shape::Single(p) => MultiPolygon::new(vec![p.clone()]),
            Shape::Multi(m) => m.clone(),
        }
    }

    /// Unsigned area.
    pub fn area(&self) -> f64 {
        match self {
            Shape::Single(p) => p.unsigned_area(),
            Shape::Multi(m) => m.unsigned_area(),
        }
    }

    /// Axis-aligned bounding box.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Shape::Single(p) => p.bounding_rect(),
            Shape::Multi(m) => m.bounding_rect(),
        }
    }

    /// Bounding box as `[min_x, min_y, max_x, max_y]`.
    pub fn aabb(&self) -> Option<[f64; 4]> {
        self.bounding_rect()
            .map(|r| [r.min().x, r.min().y, r.max().x, r.max().y])
    }

    /// Area-weighted centroid.
    pub fn centroid(&self) -> Option<Point<f64>> {
        match self {
            Shape::Single(p) => p.centroid(),
            Shape::Multi(m) => m.centroid(),
        }
    }

    /// A point guaranteed to lie inside the shape.
    pub fn interior_point(&self) -> Option<Point<f64>> {
        match self {
            Shape::Single(p) => p.interior_point(),
            Shape::Multi(m) => m.interior_point(),
        }
    }

    /// Rotated copy, `degrees` counter-clockwise about `pivot`.
    pub fn rotated(&self, degrees: f64, pivot: Point<f64>) -> Self {
        match self {
            Shape::Single(p) => Shape::Single(p.rotate_around_point(degrees, pivot)),
            Shape::Multi(m) => Shape::Multi(m.rotate_around_point(degrees, pivot)),
        }
    }

    /// Translated copy.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        match self {
            Shape::Single(p) => Shape::Single(p.translate(dx, dy)),
            Shape::Multi(m) => Shape::Multi(m.translate(dx, dy)),
        }
    }

    /// Positive-area overlap with another shape.
    pub fn intersection(&self, other: &Shape) -> MultiPolygon<f64> {
        match (self, other) {
            (Shape::Single(a), Shape::Single(b)) => a.intersection(b),
            (Shape::Multi(a), Shape::Multi(b)) => a.intersection(b),
            (Shape::Single(_), Shape::Multi(b)) => self.to_multi().intersection(b),
            (Shape::Multi(a), Shape::Single(_)) => a.intersection(&other.to_multi()),
        }
    }

    /// Returns true if the bounding boxes overlap or touch.
    pub fn aabb_overlaps(&self, other: &Shape) -> bool {
        match (self.aabb(), other.aabb()) {
            (Some(a), Some(b)) => a[0] <= b[2] && b[0] <= a[2] && a[1] <= b[3] && b[1] <= a[3],
            _ => false,
        }
    }

    /// Checks the shape is a valid set of simple polygons.
    pub fn validate(&self, label: &str) -> Result<()> {
        if self.parts().is_empty() {
            return Err(Error::InvalidGeometry(format!("'{}' has no polygons", label)));
        }
        for polygon in self.parts() {
            validate_polygon(polygon, label)?;
        }
        Ok(())
    }
}

fn ring_points(ring: &LineString<f64>) -> Vec<(f64, f64)> {
    ring.coords().map(|c| (c.x, c.y)).collect()
}

fn validate_polygon(polygon: &Polygon<f64>, label: &str) -> Result<()> {
    let exterior = ring_points(polygon.exterior());
    if exterior.iter().any(|p| !p.0.is_finite() || !p.1.is_finite()) {
        return Err(Error::InvalidGeometry(format!(
            "'{}' has non-finite coordinates",
            label
        )));
    }
    if !ring_is_simple(&exterior) {
        return Err(Error::InvalidGeometry(format!(
            "exterior of '{}' is degenerate or self-intersecting",
            label
        )));
    }
    if polygon.unsigned_area() <= 0.0 {
        return Err(Error::InvalidGeometry(format!("'{}' has zero area", label)));
    }

    let shell = Polygon::new(polygon.exterior().clone(), vec![]);
    for hole in polygon.interiors() {
        let points = ring_points(hole);
        if !ring_is_simple(&points) {
            return Err(Error::InvalidGeometry(format!(
                "hole of '{}' is degenerate or self-intersecting",
                label
            )));
        }
        if !hole.coords().all(|c| shell.intersects(c)) {
            return Err(Error::InvalidGeometry(format!(
                "hole of '{}' lies outside its exterior",
                label
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Machine
// ============================================================================

/// A movable obstacle of the layout.
#[derive(Debug, Clone)]
pub struct Machine {
    id: String,
    name: String,
    base: Shape,
    shape: Shape,
    origin: (f64, f64),
    rotation: f64,
    color: [f64; 3],
    group: Option<usize>,
}

impl Machine {
    /// Creates a machine at the position given by its shape.
    pub fn new(id: impl Into<String>, shape: impl Into<Shape>) -> Result<Self> {
        let id = id.into();
        let shape = shape.into();
        shape.validate(&id)?;
        let [min_x, min_y, _, _] = shape
            .aabb()
            .ok_or_else(|| Error::InvalidGeometry(format!("'{}' has no extent", id)))?;

        Ok(Self {
            name: id.clone(),
            id,
            base: shape.clone(),
            shape,
            origin: (min_x, min_y),
            rotation: 0.0,
            color: [0.5, 0.5, 0.5],
            group: None,
        })
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the render color.
    pub fn with_color(mut self, color: [f64; 3]) -> Self {
        self.color = color;
        self
    }

    /// Stable identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current footprint.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Min corner of the current bounding box.
    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    /// Current rotation in radians.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Render color.
    pub fn color(&self) -> [f64; 3] {
        self.color
    }

    /// Used-space cluster, once assigned.
    pub fn group(&self) -> Option<usize> {
        self.group
    }

    pub(crate) fn set_group(&mut self, group: Option<usize>) {
        self.group = group;
    }

    /// Geometric center (centroid) of the footprint.
    pub fn center(&self) -> Option<Point<f64>> {
        self.shape.centroid()
    }

    fn base_pivot(&self) -> Option<Point<f64>> {
        self.base.bounding_rect().map(|r| r.center().into())
    }

    /// Footprint at an absolute rotation, before translation.
    pub fn shape_at(&self, rotation: f64) -> Option<Shape> {
        let pivot = self.base_pivot()?;
        Some(self.base.rotated(rotation.to_degrees(), pivot))
    }

    /// Bounding box size at an absolute rotation.
    pub fn extent_at(&self, rotation: f64) -> Option<(f64, f64)> {
        let r = self.shape_at(rotation)?.bounding_rect()?;
        Some((r.width(), r.height()))
    }

    /// Rotates the base footprint to `rotation` and moves its bounding-box
    /// min corner to `origin`.
    pub fn place(&mut self, origin: (f64, f64), rotation: f64) -> Result<()> {
        if !origin.0.is_finite() || !origin.1.is_finite() || !rotation.is_finite() {
            return Err(Error::InvalidGeometry(format!(
                "non-finite placement for '{}'",
                self.id
            )));
        }
        let rotated = self
            .shape_at(rotation)
            .ok_or_else(|| Error::InvalidGeometry(format!("'{}' has no extent", self.id)))?;
        let [min_x, min_y, _, _] = rotated
            .aabb()
            .ok_or_else(|| Error::InvalidGeometry(format!("'{}' has no extent", self.id)))?;

        self.shape = rotated.translated(origin.0 - min_x, origin.1 - min_y);
        self.origin = origin;
        self.rotation = rotation;
        Ok(())
    }
}

// ============================================================================
// Wall
// ============================================================================

/// A fixed obstacle.
#[derive(Debug, Clone)]
pub struct Wall {
    id: String,
    shape: Shape,
}

impl Wall {
    /// Creates a wall.
    pub fn new(id: impl Into<String>, shape: impl Into<Shape>) -> Result<Self> {
        let id = id.into();
        let shape = shape.into();
        shape.validate(&id)?;
        Ok(Self { id, shape })
    }

    /// Stable identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Footprint.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

// ============================================================================
// BoundingArea
// ============================================================================

/// The usable floor of the factory, with precomputed boundary data.
#[derive(Debug, Clone)]
pub struct BoundingArea {
    polygon: Polygon<f64>,
    rect: Rect<f64>,
    area: f64,
    segments: Vec<((f64, f64), (f64, f64))>,
}

impl BoundingArea {
    /// Creates a bounding area from a polygon.
    pub fn new(polygon: Polygon<f64>) -> Result<Self> {
        validate_polygon(&polygon, "bounding area")
            .map_err(|e| Error::InvalidBoundary(e.to_string()))?;
        let rect = polygon
            .bounding_rect()
            .ok_or_else(|| Error::InvalidBoundary("bounding area has no extent".into()))?;

        let segments = std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .flat_map(|ring| ring.lines().map(|l| ((l.start.x, l.start.y), (l.end.x, l.end.y))))
            .collect();

        Ok(Self {
            area: polygon.unsigned_area(),
            polygon,
            rect,
            segments,
        })
    }

    /// Rectangle `[0, width] × [0, height]`.
    pub fn rectangle(width: f64, height: f64) -> Result<Self> {
        if !(width > 0.0 && height > 0.0) {
            return Err(Error::InvalidBoundary(format!(
                "factory extent must be positive, got {} x {}",
                width, height
            )));
        }
        Self::new(Rect::new((0.0, 0.0), (width, height)).to_polygon())
    }

    /// Outline polygon.
    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Bounding rectangle.
    pub fn rect(&self) -> Rect<f64> {
        self.rect
    }

    /// Width of the bounding rectangle.
    pub fn width(&self) -> f64 {
        self.rect.width()
    }

    /// Height of the bounding rectangle.
    pub fn height(&self) -> f64 {
        self.rect.height()
    }

    /// Floor area.
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Returns true if the point lies inside or on the boundary.
    pub fn covers(&self, point: Coord<f64>) -> bool {
        let r = self.rect;
        if point.x < r.min().x || point.x > r.max().x || point.y < r.min().y || point.y > r.max().y
        {
            return false;
        }
        self.polygon.intersects(&point)
    }

    /// Returns true if the segment crosses a boundary ring at an interior point.
    pub fn crossed_by(&self, a: (f64, f64), b: (f64, f64)) -> bool {
        self.segments
            .iter()
            .any(|&(s, t)| segments_cross(a, b, s, t))
    }

    /// Area of the part of `shape` inside the bounding area.
    pub fn overlap_area(&self, shape: &Shape) -> f64 {
        let bounds = Shape::Single(self.rect.to_polygon());
        if !bounds.aabb_overlaps(shape) {
            return 0.0;
        }
        match shape {
            Shape::Single(p) => self.polygon.intersection(p).unsigned_area(),
            Shape::Multi(m) => MultiPolygon::new(vec![self.polygon.clone()])
                .intersection(m)
                .unsigned_area(),
        }
    }

    /// Boundary segments of all rings.
    pub fn segments(&self) -> &[((f64, f64), (f64, f64))] {
        &self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_shape_area_and_bounds() {
        let rect = Shape::rectangle(1.0, 2.0, 10.0, 5.0);
        assert_relative_eq!(rect.area(), 50.0);
        assert_eq!(rect.aabb(), Some([1.0, 2.0, 11.0, 7.0]));
        assert_eq!(rect.parts().len(), 1);

        let multi = Shape::Multi(MultiPolygon::new(vec![
            Rect::new((0.0, 0.0), (1.0, 1.0)).to_polygon(),
            Rect::new((5.0, 5.0), (7.0, 7.0)).to_polygon(),
        ]));
        assert_relative_eq!(multi.area(), 5.0);
        assert_eq!(multi.parts().len(), 2);
        assert!(multi.validate("m").is_ok());
    }

    #[test]
    fn test_invalid_polygons_rejected() {
        let bowtie = Shape::from_vertices(vec![(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0)]);
        assert!(matches!(
            bowtie.validate("bowtie"),
            Err(Error::InvalidGeometry(_))
        ));

        let line = Shape::from_vertices(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert!(line.validate("line").is_err());

        let nan = Shape::from_vertices(vec![(0.0, 0.0), (f64::NAN, 0.0), (1.0, 1.0)]);
        assert!(nan.validate("nan").is_err());

        assert!(Machine::new("bad", bowtie).is_err());
    }

    #[test]
    fn test_hole_must_be_inside() {
        let outside_hole = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]),
            vec![LineString::from(vec![
                (5.0, 5.0),
                (6.0, 5.0),
                (6.0, 6.0),
                (5.0, 6.0),
            ])],
        );
        assert!(Shape::Single(outside_hole).validate("h").is_err());

        let good = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]),
            vec![LineString::from(vec![
                (1.0, 1.0),
                (2.0, 1.0),
                (2.0, 2.0),
                (1.0, 2.0),
            ])],
        );
        assert!(Shape::Single(good).validate("h").is_ok());
    }

    #[test]
    fn test_machine_place_absolute_rotation() {
        let mut m = Machine::new("M_0", Shape::rectangle(0.0, 0.0, 4.0, 2.0)).unwrap();
        assert_eq!(m.origin(), (0.0, 0.0));

        m.place((10.0, 20.0), std::f64::consts::FRAC_PI_2).unwrap();
        let aabb = m.shape().aabb().unwrap();
        assert_relative_eq!(aabb[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(aabb[1], 20.0, epsilon = 1e-9);
        assert_relative_eq!(aabb[2] - aabb[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(aabb[3] - aabb[1], 4.0, epsilon = 1e-9);

        // Rotation is absolute: returning to 0 restores the original extent
        m.place((0.0, 0.0), 0.0).unwrap();
        let (w, h) = m.extent_at(m.rotation()).unwrap();
        assert_relative_eq!(w, 4.0, epsilon = 1e-9);
        assert_relative_eq!(h, 2.0, epsilon = 1e-9);
        assert_relative_eq!(m.shape().area(), 8.0, epsilon = 1e-9);

        assert!(m.place((f64::NAN, 0.0), 0.0).is_err());
    }

    #[test]
    fn test_bounding_area_queries() {
        let bounds = BoundingArea::rectangle(100.0, 50.0).unwrap();
        assert_relative_eq!(bounds.width(), 100.0);
        assert_relative_eq!(bounds.height(), 50.0);
        assert!(bounds.covers(Coord { x: 0.0, y: 0.0 }));
        assert!(bounds.covers(Coord { x: 50.0, y: 25.0 }));
        assert!(!bounds.covers(Coord { x: 101.0, y: 25.0 }));

        assert!(bounds.crossed_by((50.0, 25.0), (150.0, 25.0)));
        assert!(!bounds.crossed_by((10.0, 10.0), (20.0, 20.0)));

        let inside = Shape::rectangle(0.0, 0.0, 10.0, 10.0);
        assert_relative_eq!(bounds.overlap_area(&inside), 100.0, epsilon = 1e-9);
        let outside = Shape::rectangle(200.0, 0.0, 10.0, 10.0);
        assert_relative_eq!(bounds.overlap_area(&outside), 0.0);

        assert!(BoundingArea::rectangle(0.0, 10.0).is_err());
    }
}
