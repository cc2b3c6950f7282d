use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::{ConfigError, PointError};
use crate::geo::Point;
use crate::physics::los::TerrainProvider;
use crate::physics::viewshed::{build_visibility_polygon, VisibilityPolygon};

pub const SQ_METERS_PER_HECTARE: f64 = 10_000.0;

/// A candidate launch location with its resolved ground elevation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StagingPoint {
    /// 1-based position in the input sequence.
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub elevation: f64,
}

impl StagingPoint {
    pub fn location(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub staging: StagingPoint,
    pub elevation_angle_deg: f64,
    pub polygon: VisibilityPolygon,
    /// Planar ring area, squared length units.
    pub area: f64,
}

impl AnalysisResult {
    pub fn area_hectares(&self) -> f64 {
        self.area / SQ_METERS_PER_HECTARE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointFailure {
    pub id: u32,
    pub location: Point,
    pub error: PointError,
}

/// Ordered outcome of a batch: successes in input order, failures beside.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub results: Vec<AnalysisResult>,
    pub failures: Vec<PointFailure>,
}

impl BatchReport {
    pub fn total_area(&self) -> f64 {
        self.results.iter().map(|r| r.area).sum()
    }

    pub fn mean_area(&self) -> Option<f64> {
        if self.results.is_empty() {
            None
        } else {
            Some(self.total_area() / self.results.len() as f64)
        }
    }
}

/// Ground elevation under `loc`, distinguishing off-grid from unfilled cells.
/// Non-finite coordinates are off-grid.
pub fn resolve_elevation<T: TerrainProvider + ?Sized>(
    terrain: &T,
    loc: Point,
) -> Result<f64, PointError> {
    if !loc.x.is_finite() || !loc.y.is_finite() {
        return Err(PointError::OutOfBounds { x: loc.x, y: loc.y });
    }
    let (row, col) = terrain.world_to_pixel(loc.x, loc.y);
    if !terrain.contains(row, col) {
        return Err(PointError::OutOfBounds { x: loc.x, y: loc.y });
    }
    terrain
        .get_elevation(row, col)
        .ok_or(PointError::InvalidElevation { x: loc.x, y: loc.y })
}

/// Analyzes one staging point. `id` is supplied by the caller.
pub fn analyze_staging_point<T: TerrainProvider + ?Sized>(
    terrain: &T,
    id: u32,
    loc: Point,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, PointError> {
    let elevation = resolve_elevation(terrain, loc)?;
    let staging = StagingPoint {
        id,
        x: loc.x,
        y: loc.y,
        elevation,
    };

    debug!(
        "Creating {} deg visibility polygon for staging area ID {}",
        config.elevation_angle_deg, id
    );
    let polygon =
        build_visibility_polygon(terrain, &config.caster(), loc, elevation, &config.fan());
    let area = polygon.area();

    Ok(AnalysisResult {
        staging,
        elevation_angle_deg: config.elevation_angle_deg,
        polygon,
        area,
    })
}

/// Runs every staging point through the polygon builder.
///
/// IDs are `1..=N` by input position whatever the outcome. Points run in
/// parallel; results are collected by index so order never depends on
/// completion order. `progress`, when given, is bumped once per point.
pub fn analyze_staging_points<T: TerrainProvider + Sync + ?Sized>(
    terrain: &T,
    points: &[Point],
    config: &AnalysisConfig,
    progress: Option<Arc<AtomicU32>>,
) -> Result<BatchReport, ConfigError> {
    config.validate()?;
    info!(
        "Starting visibility analysis of {} staging areas at {} deg",
        points.len(),
        config.elevation_angle_deg
    );

    let outcomes: Vec<(u32, Point, Result<AnalysisResult, PointError>)> = points
        .par_iter()
        .enumerate()
        .map(|(idx, &loc)| {
            let id = idx as u32 + 1;
            let outcome = analyze_staging_point(terrain, id, loc, config);
            if let Some(p) = &progress {
                p.fetch_add(1, Ordering::Relaxed);
            }
            (id, loc, outcome)
        })
        .collect();

    let mut report = BatchReport::default();
    for (id, location, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                info!(
                    "Staging ID {}: ({:.1}, {:.1}) - visibility area: {:.1} ha",
                    id,
                    location.x,
                    location.y,
                    result.area_hectares()
                );
                report.results.push(result);
            }
            Err(error) => {
                warn!("Error analyzing staging area ID {}: {}", id, error);
                report.failures.push(PointFailure { id, location, error });
            }
        }
    }

    info!(
        "Analyzed {} staging areas, {} failed",
        report.results.len(),
        report.failures.len()
    );
    Ok(report)
}
