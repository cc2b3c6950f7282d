use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::coverage::AnalysisResult;
use crate::geo::Point;

pub const STAGING_LAYER: &str = "staging_points.csv";
pub const ZONES_LAYER: &str = "visibility_zones.geojson";

#[derive(Debug, Deserialize)]
struct StagingRecord {
    x: f64,
    y: f64,
}

/// Staging coordinates from a CSV file with `x` and `y` columns, in file
/// order. Other columns are ignored.
pub fn load_staging_points_from_csv(path: &Path) -> Result<Vec<Point>> {
    info!("Loading staging points from: {}", path.display());
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("Failed to open {:?}", path))?;
    let points = reader
        .deserialize::<StagingRecord>()
        .enumerate()
        .map(|(i, rec)| -> Result<Point> {
            let rec = rec.with_context(|| format!("Bad staging record {} in {:?}", i + 1, path))?;
            Ok(Point::new(rec.x, rec.y))
        })
        .collect::<Result<Vec<_>>>()?;
    info!("Loaded {} staging points", points.len());
    Ok(points)
}

#[derive(Debug, Serialize)]
struct StagingRow {
    staging_id: u32,
    staging_x: f64,
    staging_y: f64,
    staging_elev: f64,
    elevation_angle: f64,
}

/// Staging-point layer: one row per analyzed point, keyed by `staging_id`.
pub fn write_staging_points_csv<W: Write>(results: &[AnalysisResult], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in results {
        wtr.serialize(StagingRow {
            staging_id: r.staging.id,
            staging_x: r.staging.x,
            staging_y: r.staging.y,
            staging_elev: r.staging.elevation,
            elevation_angle: r.elevation_angle_deg,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Visibility-zone layer as a GeoJSON FeatureCollection, linked to the
/// staging layer through the `staging_id` property.
pub fn visibility_zones_geojson(
    results: &[AnalysisResult],
    max_distance: f64,
    crs: Option<&str>,
) -> serde_json::Value {
    let features: Vec<serde_json::Value> = results
        .iter()
        .map(|r| {
            let ring: Vec<[f64; 2]> = r.polygon.vertices.iter().map(|p| [p.x, p.y]).collect();
            json!({
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": [ring] },
                "properties": {
                    "staging_id": r.staging.id,
                    "staging_x": r.staging.x,
                    "staging_y": r.staging.y,
                    "staging_elev": r.staging.elevation,
                    "elevation_angle": r.elevation_angle_deg,
                    "visibility_area_ha": r.area_hectares(),
                    "max_distance_m": max_distance,
                    "fallback": r.polygon.fallback,
                },
            })
        })
        .collect();

    let mut collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    if let Some(crs) = crs {
        collection["crs"] = json!(crs);
    }
    collection
}

/// Writes both linked layers into `dir`.
pub fn export_results(
    results: &[AnalysisResult],
    max_distance: f64,
    crs: Option<&str>,
    dir: &Path,
) -> Result<()> {
    info!("Exporting results to: {}", dir.display());
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;

    let staging_path = dir.join(STAGING_LAYER);
    let file = File::create(&staging_path)
        .with_context(|| format!("Failed to create {:?}", staging_path))?;
    write_staging_points_csv(results, BufWriter::new(file))?;

    let zones_path = dir.join(ZONES_LAYER);
    let file = File::create(&zones_path)
        .with_context(|| format!("Failed to create {:?}", zones_path))?;
    let mut writer = BufWriter::new(file);
    let zones = visibility_zones_geojson(results, max_distance, crs);
    serde_json::to_writer_pretty(&mut writer, &zones)?;
    writer.flush()?;

    info!(
        "Exported {} staging points and visibility zones, linked by staging_id",
        results.len()
    );
    Ok(())
}
