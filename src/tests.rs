use crate::config::AnalysisConfig;
use crate::coverage::{analyze_staging_points, resolve_elevation};
use crate::error::PointError;
use crate::geo::{GeoTransform, Point};
use crate::physics::los::{BeamCaster, BeamHit, TerrainProvider};
use crate::physics::obstruction::ObstructionValidator;
use crate::physics::viewshed::{build_visibility_polygon, FanParams, FALLBACK_DISK_SEGMENTS};
use crate::terrain::{ElevationGrid, FillStatus};

use proptest::prelude::*;

/// Analytic terrain on a unit-less pixel lattice.
struct MockTerrain {
    rows: usize,
    cols: usize,
    pixel_size: f64,
    height: fn(isize, isize) -> f64,
}

impl TerrainProvider for MockTerrain {
    fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn world_to_pixel(&self, x: f64, y: f64) -> (isize, isize) {
        // Origin at the north-west corner, y grows north.
        let col = (x / self.pixel_size).floor() as isize;
        let row = ((self.rows as f64 * self.pixel_size - y) / self.pixel_size).floor() as isize;
        (row, col)
    }

    fn get_elevation(&self, row: isize, col: isize) -> Option<f64> {
        if self.contains(row, col) { Some((self.height)(row, col)) } else { None }
    }
}

fn hills(row: isize, col: isize) -> f64 {
    40.0 * ((row as f64) / 9.0).sin() * ((col as f64) / 13.0).cos() + 40.0
}

fn grid_from(
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    f: impl Fn(usize, usize) -> f32,
) -> ElevationGrid {
    let data = (0..rows * cols).map(|i| f(i / cols, i % cols)).collect();
    ElevationGrid::new(rows, cols, data, transform, None, None).unwrap()
}

fn caster() -> BeamCaster {
    BeamCaster::default()
}

#[test]
fn test_flat_terrain_every_beam_unobstructed() {
    let transform = GeoTransform::north_up(-1000.0, 1001.0, 1.0);
    let grid = ElevationGrid::flat(2001, 2001, 0.0, transform).unwrap();
    let origin = Point::new(0.5, 0.5);
    let params = FanParams {
        elevation_angle_deg: 5.0,
        ray_count: 360,
        max_distance: 1000.0,
        ..FanParams::default()
    };

    let polygon = build_visibility_polygon(&grid, &caster(), origin, 0.0, &params);

    assert!(!polygon.fallback);
    assert!(polygon.is_closed());
    assert_eq!(polygon.vertices.len(), 361);
    for v in &polygon.vertices {
        assert!((origin.distance_to(*v) - 1000.0).abs() < 1e-6);
    }
    let circle = std::f64::consts::PI * 1000.0 * 1000.0;
    assert!((polygon.area() - circle).abs() / circle < 1e-3);
}

#[test]
fn test_ridge_to_the_north_stops_the_beam() {
    // Ridge 50 units deep, 100 tall, rows 30..80 <=> y in (1120, 1170].
    let grid = grid_from(1210, 500, GeoTransform::north_up(-250.0, 1200.0, 1.0), |r, c| {
        if (30..80).contains(&r) && (50..450).contains(&c) { 100.0 } else { 0.0 }
    });
    let origin = Point::new(0.5, 0.5);
    let elevation = resolve_elevation(&grid, origin).unwrap();
    assert_eq!(elevation, 0.0);

    let hit = caster().cast(&grid, origin, elevation, 0.0, 5.0, 3000.0);
    let BeamHit::Obstructed { distance, x, y } = hit else {
        panic!("expected the ridge to obstruct the beam, got {hit:?}");
    };
    let far_edge = 1170.0 - origin.y;
    assert!(distance > 0.0 && distance < far_edge);
    assert!(distance * 5f64.to_radians().tan() <= 100.0);
    assert!((x - 0.5).abs() < 1e-9);
    assert!((y - (0.5 + distance)).abs() < 1e-9);
}

#[test]
fn test_single_cell_spike_is_rejected() {
    // Spike at row 99 / col 10 sits 200 units north of the staging point.
    let spike = grid_from(300, 21, GeoTransform::north_up(0.0, 300.0, 1.0), |r, c| {
        if r == 99 && c == 10 { 500.0 } else { 0.0 }
    });
    let origin = Point::new(10.5, 0.5);
    assert_eq!(caster().cast(&spike, origin, 0.0, 0.0, 5.0, 290.0), BeamHit::Clear);

    // The same height spread over a 3x3 block is a real obstacle.
    let block = grid_from(300, 21, GeoTransform::north_up(0.0, 300.0, 1.0), |r, c| {
        if (98..=100).contains(&r) && (9..=11).contains(&c) { 500.0 } else { 0.0 }
    });
    let hit = caster().cast(&block, origin, 0.0, 0.0, 5.0, 290.0);
    assert_eq!(hit.distance(), Some(199.0));
}

#[test]
fn test_spike_then_ridge_reports_farther_hit() {
    let grid = grid_from(300, 21, GeoTransform::north_up(0.0, 300.0, 1.0), |r, c| {
        if r == 199 && c == 10 {
            500.0
        } else if r < 60 {
            400.0
        } else {
            0.0
        }
    });
    let origin = Point::new(10.5, 0.5);
    let hit = caster().cast(&grid, origin, 0.0, 0.0, 5.0, 290.0);
    let distance = hit.distance().expect("ridge should be confirmed");
    assert!(distance > 100.0);
}

#[test]
fn test_off_grid_gap_is_tunnelled() {
    // Terrain only north of a 50-row hole: the beam starts off-grid and
    // still finds the wall beyond it.
    let grid = grid_from(100, 21, GeoTransform::north_up(0.0, 200.0, 1.0), |r, _| {
        if r < 40 { 300.0 } else { 0.0 }
    });
    let origin = Point::new(10.5, 50.5);
    assert_eq!(grid.world_to_pixel(origin.x, origin.y).0, 149);
    let hit = caster().cast(&grid, origin, 0.0, 0.0, 5.0, 200.0);
    assert_eq!(hit.distance(), Some(110.0));
}

#[test]
fn test_degenerate_fan_uses_fallback_disk() {
    let grid = ElevationGrid::flat(50, 50, 0.0, GeoTransform::north_up(0.0, 50.0, 1.0)).unwrap();
    let origin = Point::new(25.0, 25.0);
    let params = FanParams {
        ray_count: 2,
        max_distance: 10.0,
        ..FanParams::default()
    };
    let polygon = build_visibility_polygon(&grid, &caster(), origin, 0.0, &params);
    assert!(polygon.fallback);
    assert!(polygon.is_closed());
    assert_eq!(polygon.vertices.len(), FALLBACK_DISK_SEGMENTS + 1);
    let disk = std::f64::consts::PI * 50.0 * 50.0;
    assert!((polygon.area() - disk).abs() / disk < 0.01);
}

#[test]
fn test_batch_skips_out_of_bounds_and_keeps_order() {
    let grid = ElevationGrid::flat(50, 50, 10.0, GeoTransform::north_up(0.0, 50.0, 1.0)).unwrap();
    let points = vec![
        Point::new(10.0, 10.0),
        Point::new(-100.0, 5.0),
        Point::new(20.0, 20.0),
        Point::new(30.0, 40.0),
    ];
    let config = AnalysisConfig {
        max_distance: 20.0,
        ray_count: 36,
        ..AnalysisConfig::default()
    };

    let report = analyze_staging_points(&grid, &points, &config, None).unwrap();

    let ids: Vec<u32> = report.results.iter().map(|r| r.staging.id).collect();
    assert_eq!(ids, vec![1, 3, 4]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, 2);
    assert_eq!(report.failures[0].error, PointError::OutOfBounds { x: -100.0, y: 5.0 });
    for r in &report.results {
        assert_eq!(r.staging.elevation, 10.0);
        assert_eq!(r.elevation_angle_deg, 5.0);
        assert_eq!(r.polygon.vertices.len(), 37);
        assert_eq!(r.area, r.polygon.area());
    }
    assert!((report.total_area() - 3.0 * report.results[0].area).abs() < 1e-6);
}

#[test]
fn test_batch_fails_non_finite_points() {
    // Origin at (0, 0) so a NaN cast to index 0 would land inside the grid.
    let grid = ElevationGrid::flat(20, 20, 10.0, GeoTransform::north_up(0.0, 0.0, 1.0)).unwrap();
    let points = vec![
        Point::new(5.0, -5.0),
        Point::new(f64::NAN, f64::NAN),
        Point::new(f64::INFINITY, -5.0),
        Point::new(0.5, f64::NAN),
        Point::new(15.0, -15.0),
    ];
    let config = AnalysisConfig {
        max_distance: 5.0,
        ray_count: 8,
        ..AnalysisConfig::default()
    };

    let report = analyze_staging_points(&grid, &points, &config, None).unwrap();

    let ids: Vec<u32> = report.results.iter().map(|r| r.staging.id).collect();
    assert_eq!(ids, vec![1, 5]);
    let failed: Vec<u32> = report.failures.iter().map(|f| f.id).collect();
    assert_eq!(failed, vec![2, 3, 4]);
    for failure in &report.failures {
        assert!(matches!(failure.error, PointError::OutOfBounds { .. }));
    }
    assert!(report.total_area().is_finite());
}

#[test]
fn test_resolve_elevation_rejects_non_finite_coordinates() {
    let grid = ElevationGrid::flat(4, 4, 2.0, GeoTransform::north_up(0.0, 0.0, 1.0)).unwrap();
    assert_eq!(resolve_elevation(&grid, Point::new(0.5, -0.5)), Ok(2.0));
    assert!(matches!(
        resolve_elevation(&grid, Point::new(f64::NAN, -0.5)),
        Err(PointError::OutOfBounds { .. })
    ));
    assert_eq!(
        resolve_elevation(&grid, Point::new(0.5, f64::NEG_INFINITY)),
        Err(PointError::OutOfBounds { x: 0.5, y: f64::NEG_INFINITY })
    );
}

#[test]
fn test_unfillable_grid_fails_points_with_invalid_elevation() {
    let transform = GeoTransform::north_up(0.0, 4.0, 1.0);
    let grid = ElevationGrid::new(4, 4, vec![-9999.0; 16], transform, Some(-9999.0), None).unwrap();
    assert_eq!(grid.fill_status(), FillStatus::NoValidCells);

    let points = [Point::new(1.5, 1.5)];
    let report = analyze_staging_points(&grid, &points, &AnalysisConfig::default(), None).unwrap();
    assert!(report.results.is_empty());
    assert_eq!(report.failures[0].error, PointError::InvalidElevation { x: 1.5, y: 1.5 });
    assert_eq!(report.mean_area(), None);
}

#[test]
fn test_batch_rejects_invalid_config_before_casting() {
    let grid = ElevationGrid::flat(4, 4, 0.0, GeoTransform::north_up(0.0, 4.0, 1.0)).unwrap();
    let config = AnalysisConfig {
        max_distance: -1.0,
        ..AnalysisConfig::default()
    };
    assert!(analyze_staging_points(&grid, &[Point::new(1.0, 1.0)], &config, None).is_err());
}

#[test]
fn test_progress_counts_every_point() {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    let grid = ElevationGrid::flat(30, 30, 0.0, GeoTransform::north_up(0.0, 30.0, 1.0)).unwrap();
    let points: Vec<Point> = (0..12).map(|i| Point::new(i as f64 * 5.0, 15.0)).collect();
    let config = AnalysisConfig {
        max_distance: 5.0,
        ray_count: 8,
        ..AnalysisConfig::default()
    };
    let progress = Arc::new(AtomicU32::new(0));
    let report = analyze_staging_points(&grid, &points, &config, Some(progress.clone())).unwrap();

    assert_eq!(progress.load(Ordering::Relaxed), 12);
    // x = 30.0 and beyond fall off the 30-column grid.
    let ids: Vec<u32> = report.results.iter().map(|r| r.staging.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    assert!(report.failures.iter().all(|f| f.id > 6));
}

#[test]
fn test_cast_is_deterministic() {
    let terrain = MockTerrain { rows: 400, cols: 400, pixel_size: 2.0, height: hills };
    let origin = Point::new(400.0, 400.0);
    for bearing in [0.0, 37.5, 181.0, 299.9] {
        let a = caster().cast(&terrain, origin, 20.0, bearing, 3.0, 700.0);
        let b = caster().cast(&terrain, origin, 20.0, bearing, 3.0, 700.0);
        assert_eq!(a, b);
    }
}

proptest! {
    #[test]
    fn cast_distance_is_bounded_pixel_multiple(
        bearing in 0.0f64..360.0,
        max_distance in 0.0f64..600.0,
        angle in 0.0f64..15.0,
    ) {
        let terrain = MockTerrain { rows: 400, cols: 400, pixel_size: 2.5, height: hills };
        let origin = Point::new(500.0, 500.0);
        let hit = caster().cast(&terrain, origin, 10.0, bearing, angle, max_distance);
        if let BeamHit::Obstructed { distance, .. } = hit {
            prop_assert!(distance > 0.0 && distance <= max_distance);
            let steps = distance / terrain.pixel_size();
            prop_assert!((steps - steps.round()).abs() < 1e-9);
            prop_assert!(steps.round() >= 1.0);
        }
    }

    #[test]
    fn pixel_round_trip_within_one_pixel(
        x in -5000.0f64..5000.0,
        y in -5000.0f64..5000.0,
    ) {
        let t = GeoTransform::new(-1234.5, 987.25, 2.0, -3.0);
        let (row, col) = t.world_to_pixel(x, y);
        let (wx, wy) = t.pixel_to_world(row, col);
        prop_assert!((wx - x).abs() <= t.pixel_width.abs());
        prop_assert!((wy - y).abs() <= t.pixel_height.abs());
    }

    #[test]
    fn stricter_min_depth_never_confirms_more(
        row in -5isize..70,
        col in -5isize..70,
        beam in 0.0f64..90.0,
        lo in 0usize..20,
        extra in 0usize..20,
    ) {
        let terrain = MockTerrain { rows: 64, cols: 64, pixel_size: 1.0, height: hills };
        let loose = ObstructionValidator::new(lo, 3);
        let strict = ObstructionValidator::new(lo + extra, 3);
        if strict.validate(&terrain, row, col, beam) {
            prop_assert!(loose.validate(&terrain, row, col, beam));
        }
    }
}

#[test]
fn test_validator_counts_only_in_grid_neighbours() {
    let terrain = MockTerrain { rows: 10, cols: 10, pixel_size: 1.0, height: |_, _| 5.0 };
    let v = ObstructionValidator::default();
    // Corner cell: only a 4x4 quarter of the 7x7 window is on the grid.
    assert_eq!(v.elevated_neighbours(&terrain, 0, 0, 5.0), 16);
    assert_eq!(v.elevated_neighbours(&terrain, 5, 5, 5.0), 49);
    assert_eq!(v.elevated_neighbours(&terrain, 5, 5, 5.1), 0);
    assert!(!v.validate(&terrain, -1, 0, 0.0));
    assert!(!ObstructionValidator::new(17, 3).validate(&terrain, 0, 0, 5.0));
}

#[test]
fn test_export_layers_are_linked_by_staging_id() {
    use crate::io::{export_results, load_staging_points_from_csv, STAGING_LAYER, ZONES_LAYER};

    let dir = tempfile::tempdir().unwrap();
    let points_path = dir.path().join("points.csv");
    std::fs::write(&points_path, "name,x,y\na,10.0,10.0\nb,-50.0,0.0\nc,30.5,20.5\n").unwrap();
    let points = load_staging_points_from_csv(&points_path).unwrap();
    assert_eq!(
        points,
        vec![Point::new(10.0, 10.0), Point::new(-50.0, 0.0), Point::new(30.5, 20.5)]
    );

    let grid = ElevationGrid::flat(40, 40, 3.0, GeoTransform::north_up(0.0, 40.0, 1.0)).unwrap();
    let config = AnalysisConfig {
        max_distance: 8.0,
        ray_count: 12,
        ..AnalysisConfig::default()
    };
    let report = analyze_staging_points(&grid, &points, &config, None).unwrap();
    let out = dir.path().join("out");
    export_results(&report.results, config.max_distance, Some("EPSG:32633"), &out).unwrap();

    let mut rdr = csv::Reader::from_path(out.join(STAGING_LAYER)).unwrap();
    let ids: Vec<u32> = rdr
        .records()
        .map(|rec| rec.unwrap()[0].parse().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 3]);

    let zones: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join(ZONES_LAYER)).unwrap()).unwrap();
    assert_eq!(zones["crs"], "EPSG:32633");
    let features = zones["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[1]["properties"]["staging_id"], 3);
    assert_eq!(features[0]["geometry"]["coordinates"][0].as_array().unwrap().len(), 13);
}
