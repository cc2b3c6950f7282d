use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// A planar position in the grid's projected reference system.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point reached by travelling `distance` along `bearing_deg`
    /// (clockwise from north).
    pub fn offset(&self, bearing_deg: f64, distance: f64) -> Point {
        let bearing = bearing_deg.to_radians();
        Point {
            x: self.x + distance * bearing.sin(),
            y: self.y + distance * bearing.cos(),
        }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Axis-aligned, north-up affine mapping between world coordinates and
/// pixel indices.
///
/// `origin` is the outer corner of pixel (0, 0), i.e. the north-west corner
/// of the grid. `pixel_height` is negative: rows grow southwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Square north-up pixels of `cell_size`.
    pub fn north_up(origin_x: f64, origin_y: f64, cell_size: f64) -> Self {
        Self::new(origin_x, origin_y, cell_size, -cell_size)
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if !self.origin_x.is_finite() || !self.origin_y.is_finite() {
            return Err(GridError::InvalidOrigin(self.origin_x, self.origin_y));
        }
        if !(self.pixel_width.is_finite() && self.pixel_width > 0.0) {
            return Err(GridError::InvalidPixelWidth(self.pixel_width));
        }
        if !(self.pixel_height.is_finite() && self.pixel_height < 0.0) {
            return Err(GridError::InvalidPixelHeight(self.pixel_height));
        }
        Ok(())
    }

    /// Horizontal ground size of one pixel.
    pub fn pixel_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Row/column of the pixel containing `(x, y)`. Not bounds-checked: the
    /// result may be negative or past the last row/column. NaN input maps to
    /// `isize::MIN`, which no grid contains.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (isize, isize) {
        let col = ((x - self.origin_x) / self.pixel_width).floor();
        let row = ((y - self.origin_y) / self.pixel_height).floor();
        (to_index(row), to_index(col))
    }

    /// World coordinates of the centre of pixel `(row, col)`.
    pub fn pixel_to_world(&self, row: isize, col: isize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.origin_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }
}

/// Saturating float-to-index conversion; `as` alone would send NaN to 0.
fn to_index(v: f64) -> isize {
    if v.is_nan() { isize::MIN } else { v as isize }
}

/// Planar area of a ring via the shoelace formula. Positive regardless of
/// winding; a closing vertex equal to the first contributes nothing.
pub fn polygon_area(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let twice_area: f64 = ring
        .iter()
        .circular_tuple_windows()
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    twice_area.abs() / 2.0
}

/// Number of pairwise-distinct vertices, compared bit-exactly.
pub fn distinct_vertex_count(ring: &[Point]) -> usize {
    ring.iter()
        .map(|p| (p.x.to_bits(), p.y.to_bits()))
        .unique()
        .count()
}

/// Closed ring approximating a disk, `segments` edges long.
pub fn disk_ring(center: Point, radius: f64, segments: usize) -> Vec<Point> {
    let mut ring: Vec<Point> = (0..segments)
        .map(|k| center.offset(k as f64 * 360.0 / segments as f64, radius))
        .collect();
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    ring
}
