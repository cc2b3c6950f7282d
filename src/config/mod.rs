use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::physics::los::BeamCaster;
use crate::physics::obstruction::{ObstructionValidator, DEFAULT_MIN_DEPTH, DEFAULT_SEARCH_RADIUS};
use crate::physics::viewshed::{FanParams, DEFAULT_FALLBACK_RADIUS, DEFAULT_RAY_COUNT};

pub const DEFAULT_ELEVATION_ANGLE_DEG: f64 = 5.0;
pub const DEFAULT_MAX_DISTANCE: f64 = 3000.0;

/// Parameters of one visibility analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Beam tilt above the local horizontal, degrees.
    pub elevation_angle_deg: f64,
    /// Analysis radius in grid length units.
    pub max_distance: f64,
    pub ray_count: usize,
    /// Elevated neighbour cells needed to confirm an obstruction.
    pub min_depth: usize,
    /// Half-width, in pixels, of the obstruction window.
    pub search_radius: usize,
    /// Radius of the disk substituted for degenerate rings.
    pub fallback_radius: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            elevation_angle_deg: DEFAULT_ELEVATION_ANGLE_DEG,
            max_distance: DEFAULT_MAX_DISTANCE,
            ray_count: DEFAULT_RAY_COUNT,
            min_depth: DEFAULT_MIN_DEPTH,
            search_radius: DEFAULT_SEARCH_RADIUS,
            fallback_radius: DEFAULT_FALLBACK_RADIUS,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let reader = std::io::BufReader::new(file);
        let config: AnalysisConfig = serde_json::from_reader(reader)
            .with_context(|| format!("Invalid analysis config {:?}", path))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let angle = self.elevation_angle_deg;
        if !(angle.is_finite() && angle > -90.0 && angle < 90.0) {
            return Err(ConfigError::InvalidElevationAngle(angle));
        }
        if !(self.max_distance.is_finite() && self.max_distance > 0.0) {
            return Err(ConfigError::InvalidMaxDistance(self.max_distance));
        }
        if self.ray_count == 0 {
            return Err(ConfigError::ZeroRayCount);
        }
        if !(self.fallback_radius.is_finite() && self.fallback_radius >= 0.0) {
            return Err(ConfigError::InvalidFallbackRadius(self.fallback_radius));
        }
        Ok(())
    }

    pub fn caster(&self) -> BeamCaster {
        BeamCaster::new(ObstructionValidator::new(self.min_depth, self.search_radius))
    }

    pub fn fan(&self) -> FanParams {
        FanParams {
            elevation_angle_deg: self.elevation_angle_deg,
            ray_count: self.ray_count,
            max_distance: self.max_distance,
            fallback_radius: self.fallback_radius,
        }
    }
}
