use itertools::iproduct;
use serde::{Deserialize, Serialize};

use crate::physics::los::TerrainProvider;

pub const DEFAULT_MIN_DEPTH: usize = 3;
pub const DEFAULT_SEARCH_RADIUS: usize = 3;

/// Confirms that a beam/terrain crossing is backed by a body with some
/// width, so that single-cell spikes and artefacts do not stop a beam.
///
/// The neighbourhood is a fixed pixel window of `2 * search_radius + 1`
/// cells per side, independent of the ground resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstructionValidator {
    /// Elevated cells required in the window.
    pub min_depth: usize,
    pub search_radius: usize,
}

impl Default for ObstructionValidator {
    fn default() -> Self {
        Self {
            min_depth: DEFAULT_MIN_DEPTH,
            search_radius: DEFAULT_SEARCH_RADIUS,
        }
    }
}

impl ObstructionValidator {
    pub fn new(min_depth: usize, search_radius: usize) -> Self {
        Self {
            min_depth,
            search_radius,
        }
    }

    /// In-grid cells around `(hit_row, hit_col)` at or above `beam_elevation`,
    /// the hit cell included. Off-grid neighbours are not counted.
    pub fn elevated_neighbours<T: TerrainProvider + ?Sized>(
        &self,
        terrain: &T,
        hit_row: isize,
        hit_col: isize,
        beam_elevation: f64,
    ) -> usize {
        let r = self.search_radius as isize;
        iproduct!(-r..=r, -r..=r)
            .filter_map(|(dr, dc)| terrain.get_elevation(hit_row + dr, hit_col + dc))
            .filter(|&h| h >= beam_elevation)
            .count()
    }

    pub fn validate<T: TerrainProvider + ?Sized>(
        &self,
        terrain: &T,
        hit_row: isize,
        hit_col: isize,
        beam_elevation: f64,
    ) -> bool {
        if !terrain.contains(hit_row, hit_col) {
            return false;
        }
        self.elevated_neighbours(terrain, hit_row, hit_col, beam_elevation) >= self.min_depth
    }
}
