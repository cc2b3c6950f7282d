//! Staging visibility CLI
//!
//! Loads a DSM and a set of staging points, builds one visibility polygon
//! per point and exports the two linked layers.

use std::path::PathBuf;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use staging_visibility::config::AnalysisConfig;
use staging_visibility::coverage::{analyze_staging_points, SQ_METERS_PER_HECTARE};
use staging_visibility::io::{export_results, load_staging_points_from_csv};
use staging_visibility::terrain::{FillStatus, TerrainLoader};

/// Visibility polygons for candidate staging locations over a DSM
#[derive(Parser, Debug)]
#[command(name = "staging-visibility")]
#[command(about = "Compute fixed-elevation-angle visibility polygons for staging points")]
struct Args {
    /// DSM raster in ESRI ASCII grid format (.asc)
    #[arg(long)]
    dsm: PathBuf,

    /// CSV file with x,y columns in the DSM's reference system
    #[arg(long)]
    points: PathBuf,

    /// JSON analysis config; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Beam elevation angle in degrees
    #[arg(long)]
    elevation_angle: Option<f64>,

    /// Analysis radius in grid units
    #[arg(long)]
    max_distance: Option<f64>,

    /// Number of beams per staging point
    #[arg(long)]
    ray_count: Option<usize>,

    /// Elevated neighbour cells required to confirm an obstruction. The
    /// window they are counted in is set by --search-radius, not by this.
    #[arg(long)]
    min_depth: Option<usize>,

    /// Half-width in pixels of the window checked around a candidate hit
    #[arg(long)]
    search_radius: Option<usize>,

    /// Output directory for the exported layers
    #[arg(long, default_value = "visibility_output")]
    out_dir: PathBuf,
}

impl Args {
    fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(v) = self.elevation_angle {
            config.elevation_angle_deg = v;
        }
        if let Some(v) = self.max_distance {
            config.max_distance = v;
        }
        if let Some(v) = self.ray_count {
            config.ray_count = v;
        }
        if let Some(v) = self.min_depth {
            config.min_depth = v;
        }
        if let Some(v) = self.search_radius {
            config.search_radius = v;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = args.analysis_config()?;
    config.validate().context("Invalid analysis config")?;

    let grid = TerrainLoader::new(args.dsm.clone()).load()?;
    if grid.fill_status() == FillStatus::NoValidCells {
        tracing::warn!("DSM holds no valid cells; every staging point will fail");
    }
    let points = load_staging_points_from_csv(&args.points)?;

    let progress = Arc::new(AtomicU32::new(0));
    let started = Instant::now();
    let report = analyze_staging_points(&grid, &points, &config, Some(progress.clone()))?;
    tracing::info!(
        "Processed {} staging areas in {:.2?}",
        progress.load(std::sync::atomic::Ordering::Relaxed),
        started.elapsed()
    );

    if report.results.is_empty() {
        tracing::warn!("No valid visibility polygons to export");
    } else {
        export_results(&report.results, config.max_distance, grid.crs(), &args.out_dir)?;
    }

    tracing::info!("ANALYSIS SUMMARY");
    for result in &report.results {
        tracing::info!(
            "Staging ID {:2}: ({:.1}, {:.1}) - Visibility area: {:.1} ha{}",
            result.staging.id,
            result.staging.x,
            result.staging.y,
            result.area_hectares(),
            if result.polygon.fallback { " (fallback disk)" } else { "" }
        );
    }
    for failure in &report.failures {
        tracing::info!("Staging ID {:2}: skipped ({})", failure.id, failure.error);
    }
    tracing::info!(
        "Total visibility area: {:.1} hectares",
        report.total_area() / SQ_METERS_PER_HECTARE
    );
    if let Some(mean) = report.mean_area() {
        tracing::info!(
            "Average area per staging point: {:.1} hectares",
            mean / SQ_METERS_PER_HECTARE
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_defaults() {
        let args = Args::parse_from([
            "staging-visibility",
            "--dsm",
            "dsm.asc",
            "--points",
            "points.csv",
            "--min-depth",
            "5",
            "--search-radius",
            "4",
            "--ray-count",
            "72",
        ]);
        let config = args.analysis_config().unwrap();
        assert_eq!(config.min_depth, 5);
        assert_eq!(config.search_radius, 4);
        assert_eq!(config.ray_count, 72);
        assert_eq!(config.max_distance, AnalysisConfig::default().max_distance);
    }

    #[test]
    fn search_radius_defaults_when_flag_absent() {
        let args = Args::parse_from(["staging-visibility", "--dsm", "a.asc", "--points", "b.csv"]);
        let config = args.analysis_config().unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }
}
