use staging_visibility::config::AnalysisConfig;
use staging_visibility::coverage::{analyze_staging_points, SQ_METERS_PER_HECTARE};
use staging_visibility::geo::{GeoTransform, Point};
use staging_visibility::physics::los::TerrainProvider;
use staging_visibility::terrain::ElevationGrid;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // 4 km square, 2 m pixels, an east-west ridge 1.5 km north of centre.
    let size = 2000;
    let data = (0..size * size)
        .map(|i| {
            let row = i / size;
            if (220..250).contains(&row) { 180.0 } else { 5.0 }
        })
        .collect();
    let transform = GeoTransform::north_up(0.0, 4000.0, 2.0);
    let grid = ElevationGrid::new(size, size, data, transform, None, None)?;

    let points = vec![
        Point::new(2000.0, 2000.0),
        Point::new(1000.0, 500.0),
        Point::new(-20.0, 2000.0), // off the grid
    ];
    for p in &points {
        println!("Ground altitude at ({:.0}, {:.0}): {:?}", p.x, p.y, grid.elevation_at(*p));
    }

    let report = analyze_staging_points(&grid, &points, &AnalysisConfig::default(), None)?;
    for r in &report.results {
        let north = r.polygon.vertices[0];
        println!(
            "Staging {}: area {:.1} ha, northern boundary at {:.0} m",
            r.staging.id,
            r.area / SQ_METERS_PER_HECTARE,
            north.y - r.staging.y
        );
    }
    for f in &report.failures {
        println!("Staging {}: {}", f.id, f.error);
    }
    Ok(())
}
