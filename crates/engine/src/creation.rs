//! Seeded synthetic layouts.
//!
//! Generates random machine footprints and material-flow tables for
//! training and stress testing. Every draw comes from one [`StdRng`], so a
//! seed reproduces the layout exactly.

use factory_layout_core::{Error, Result};
use geo::{Area, MinimumRotatedRect, MultiPoint, Point, Polygon, Rect, Rotate};
use rand::prelude::*;

use crate::geometry::Machine;
use crate::material_flow::FlowEntry;
use crate::overlay::union_polygons;

/// Extra rectangles tried when the union collapses into a single part.
const MAX_EXTRA_ATTEMPTS: usize = 64;

/// Smallest accepted side of the shape limit.
const MIN_SHAPE_SIDE: f64 = 1e-6;

/// Generator for random factory layouts.
#[derive(Debug, Clone)]
pub struct FactoryCreator {
    width: f64,
    height: f64,
    max_shape: (f64, f64),
    rect_count: usize,
    polygon_count: usize,
    max_corners: usize,
    rng: StdRng,
}

impl FactoryCreator {
    /// Creates a generator for a `width` x `height` factory.
    pub fn new(width: f64, height: f64, seed: u64) -> Self {
        Self {
            width,
            height,
            max_shape: (width / 10.0, height / 10.0),
            rect_count: 20,
            polygon_count: 5,
            max_corners: 3,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Sets the largest footprint drawn.
    pub fn with_max_shape(mut self, width: f64, height: f64) -> Self {
        self.max_shape = (width, height);
        self
    }

    /// Sets the number of axis-aligned rectangles.
    pub fn with_rect_count(mut self, count: usize) -> Self {
        self.rect_count = count;
        self
    }

    /// Sets the number of rotated point-set rectangles.
    pub fn with_polygon_count(mut self, count: usize) -> Self {
        self.polygon_count = count;
        self
    }

    /// Sets the maximum number of extra corners per point set.
    pub fn with_max_corners(mut self, corners: usize) -> Self {
        self.max_corners = corners.max(2);
        self
    }

    /// Factory outline.
    pub fn bounds(&self) -> Rect<f64> {
        Rect::new((0.0, 0.0), (self.width, self.height))
    }

    /// Draws footprints, unions them and returns one machine per part.
    ///
    /// Machines are named `M_0`, `M_1`, ... in union order. At least two
    /// machines are returned.
    pub fn create_machines(&mut self) -> Result<Vec<Machine>> {
        let (max_w, max_h) = self.max_shape;
        if !(max_w >= MIN_SHAPE_SIDE && max_h >= MIN_SHAPE_SIDE)
            || max_w > self.width
            || max_h > self.height
        {
            return Err(Error::InvalidInput(format!(
                "shape limit {}x{} does not fit {}x{}",
                max_w, max_h, self.width, self.height
            )));
        }

        let mut polygons: Vec<Polygon<f64>> = Vec::new();
        for _ in 0..self.rect_count {
            let rect = self.random_rect(0.2);
            let quarter = self.rng.gen_range(0..4) as f64 * 90.0;
            polygons.push(rect.rotate_around_centroid(quarter));
        }

        let min_area = max_w * max_w * 0.05;
        for _ in 0..self.polygon_count {
            let x = self.rng.gen_range(0.0..=self.width - max_w);
            let y = self.rng.gen_range(0.0..=(self.height - max_w).max(0.0));
            let corners = self.rng.gen_range(2..=self.max_corners);
            let mut points = vec![Point::new(x, y)];
            for _ in 0..corners {
                points.push(Point::new(
                    x + self.rng.gen_range(max_w * 0.2..=max_w),
                    y + self.rng.gen_range(max_w * 0.2..=max_w),
                ));
            }
            let degrees = self.rng.gen_range(0.0..360.0);
            if let Some(rect) = MultiPoint::new(points).minimum_rotated_rect() {
                let rect = rect.rotate_around_centroid(degrees);
                if rect.unsigned_area() > min_area {
                    polygons.push(rect);
                }
            }
        }

        let mut union = union_polygons(&polygons);
        let mut attempts = 0;
        while union.0.len() < 2 && attempts < MAX_EXTRA_ATTEMPTS {
            polygons.push(self.random_rect(0.0));
            union = union_polygons(&polygons);
            attempts += 1;
        }

        let mut machines: Vec<Machine> = Vec::with_capacity(union.0.len());
        for part in union.0 {
            let id = format!("M_{}", machines.len());
            let color = [self.rng.gen(), self.rng.gen(), self.rng.gen()];
            match Machine::new(id.clone(), part) {
                Ok(m) => machines.push(m.with_name(id).with_color(color)),
                Err(e) => log::debug!("dropping synthetic part: {}", e),
            }
        }

        if machines.len() < 2 {
            return Err(Error::Internal(format!(
                "synthetic layout produced {} machines",
                machines.len()
            )));
        }
        log::debug!(
            "created {} machines from {} footprints",
            machines.len(),
            polygons.len()
        );
        Ok(machines)
    }

    /// Random flows between distinct machines with intensity in `(0, 1]`.
    ///
    /// Returns an empty table for fewer than two machines.
    pub fn random_material_flow(&mut self, machines: &[Machine], count: usize) -> Vec<FlowEntry> {
        if machines.len() < 2 {
            return Vec::new();
        }
        (0..count)
            .map(|_| {
                let source = self.rng.gen_range(0..machines.len());
                let mut sink = self.rng.gen_range(0..machines.len() - 1);
                if sink >= source {
                    sink += 1;
                }
                let intensity = 1.0 - self.rng.gen::<f64>();
                FlowEntry::new(machines[source].id(), machines[sink].id(), intensity)
            })
            .collect()
    }

    /// Axis-aligned rectangle with sides in `[min_fraction * max, max]`.
    fn random_rect(&mut self, min_fraction: f64) -> Polygon<f64> {
        let (max_w, max_h) = self.max_shape;
        let x = self.rng.gen_range(0.0..=self.width - max_w);
        let y = self.rng.gen_range(0.0..=self.height - max_h);
        let min_w = (max_w * min_fraction).max(f64::EPSILON).min(max_w);
        let min_h = (max_h * min_fraction).max(f64::EPSILON).min(max_h);
        let w = self.rng.gen_range(min_w..=max_w);
        let h = self.rng.gen_range(min_h..=max_h);
        Rect::new((x, y), (x + w, y + h)).to_polygon()
    }
}
