use crate::geo::Point;
use crate::physics::obstruction::ObstructionValidator;

/// Read-only, bounds-checked access to a height raster.
///
/// Implementations must be safe to share across worker threads; nothing in
/// the casting path mutates terrain.
pub trait TerrainProvider {
    /// Ground length of one pixel step.
    fn pixel_size(&self) -> f64;

    /// `(rows, cols)` of the underlying raster.
    fn dimensions(&self) -> (usize, usize);

    /// Pixel containing a world position; may fall outside the raster.
    fn world_to_pixel(&self, x: f64, y: f64) -> (isize, isize);

    /// Height at `(row, col)`, or `None` off-grid or on an unfilled cell.
    fn get_elevation(&self, row: isize, col: isize) -> Option<f64>;

    fn contains(&self, row: isize, col: isize) -> bool {
        let (rows, cols) = self.dimensions();
        row >= 0 && col >= 0 && (row as usize) < rows && (col as usize) < cols
    }

    fn elevation_at(&self, loc: Point) -> Option<f64> {
        let (row, col) = self.world_to_pixel(loc.x, loc.y);
        self.get_elevation(row, col)
    }
}

/// Result of marching one beam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeamHit {
    /// Confirmed obstruction at `distance` along the ground track.
    Obstructed { distance: f64, x: f64, y: f64 },
    /// Nothing confirmed within range.
    Clear,
}

impl BeamHit {
    pub fn distance(&self) -> Option<f64> {
        match self {
            BeamHit::Obstructed { distance, .. } => Some(*distance),
            BeamHit::Clear => None,
        }
    }
}

/// Marches a straight, upward-tilted beam over the terrain one pixel at a
/// time until the terrain rises to meet it.
#[derive(Clone, Copy, Debug, Default)]
pub struct BeamCaster {
    pub validator: ObstructionValidator,
}

impl BeamCaster {
    pub fn new(validator: ObstructionValidator) -> Self {
        Self { validator }
    }

    pub fn cast<T: TerrainProvider + ?Sized>(
        &self,
        terrain: &T,
        origin: Point,
        origin_elevation: f64,
        bearing_deg: f64,
        elevation_angle_deg: f64,
        max_distance: f64,
    ) -> BeamHit {
        // Exactly one pixel per step so no cell is skipped.
        let step_size = terrain.pixel_size();
        let steps = (max_distance / step_size).floor();
        if !(steps >= 1.0) {
            return BeamHit::Clear;
        }
        let steps = steps as usize;

        let (sin_b, cos_b) = bearing_deg.to_radians().sin_cos();
        let rise = elevation_angle_deg.to_radians().tan();

        for i in 1..=steps {
            let d = i as f64 * step_size;
            let x = origin.x + d * sin_b;
            let y = origin.y + d * cos_b;
            let beam_elevation = origin_elevation + d * rise;

            let (row, col) = terrain.world_to_pixel(x, y);
            // Off-grid samples are skipped; the beam keeps going past the gap.
            let Some(h_terr) = terrain.get_elevation(row, col) else {
                continue;
            };

            if beam_elevation <= h_terr
                && self.validator.validate(terrain, row, col, beam_elevation)
            {
                return BeamHit::Obstructed { distance: d, x, y };
            }
        }

        BeamHit::Clear
    }
}
