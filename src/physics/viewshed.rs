use serde::Serialize;
use tracing::debug;

use crate::config::{DEFAULT_ELEVATION_ANGLE_DEG, DEFAULT_MAX_DISTANCE};
use crate::geo::{disk_ring, distinct_vertex_count, polygon_area, Point};
use crate::physics::los::{BeamCaster, BeamHit, TerrainProvider};

pub const DEFAULT_RAY_COUNT: usize = 360;
pub const DEFAULT_FALLBACK_RADIUS: f64 = 50.0;
/// Edges of the fallback disk ring.
pub const FALLBACK_DISK_SEGMENTS: usize = 64;

/// Closed boundary of the ground area a beam fan can see from one
/// staging point at one elevation angle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibilityPolygon {
    pub elevation_angle_deg: f64,
    /// Closed ring: the last vertex repeats the first.
    pub vertices: Vec<Point>,
    /// True when too few distinct vertices came back and the ring is the
    /// fixed-radius disk around the staging point instead.
    pub fallback: bool,
}

impl VisibilityPolygon {
    /// Planar area in squared length units of the grid's reference system.
    pub fn area(&self) -> f64 {
        polygon_area(&self.vertices)
    }

    pub fn is_closed(&self) -> bool {
        self.vertices.len() > 1 && self.vertices.first() == self.vertices.last()
    }
}

/// Fan parameters for [`build_visibility_polygon`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FanParams {
    pub elevation_angle_deg: f64,
    pub ray_count: usize,
    pub max_distance: f64,
    pub fallback_radius: f64,
}

impl Default for FanParams {
    fn default() -> Self {
        Self {
            elevation_angle_deg: DEFAULT_ELEVATION_ANGLE_DEG,
            ray_count: DEFAULT_RAY_COUNT,
            max_distance: DEFAULT_MAX_DISTANCE,
            fallback_radius: DEFAULT_FALLBACK_RADIUS,
        }
    }
}

/// Casts `ray_count` evenly spaced beams around `origin` and joins the
/// boundary points into a closed ring.
///
/// A bearing without a confirmed obstruction contributes the point at
/// `max_distance` along it: visibility is bounded by the analysis radius.
pub fn build_visibility_polygon<T: TerrainProvider + ?Sized>(
    terrain: &T,
    caster: &BeamCaster,
    origin: Point,
    origin_elevation: f64,
    params: &FanParams,
) -> VisibilityPolygon {
    let mut vertices = Vec::with_capacity(params.ray_count + 1);
    let mut obstructed = 0usize;

    for k in 0..params.ray_count {
        let bearing = k as f64 * (360.0 / params.ray_count as f64);
        let hit = caster.cast(
            terrain,
            origin,
            origin_elevation,
            bearing,
            params.elevation_angle_deg,
            params.max_distance,
        );
        match hit {
            BeamHit::Obstructed { x, y, .. } => {
                obstructed += 1;
                vertices.push(Point::new(x, y));
            }
            BeamHit::Clear => vertices.push(origin.offset(bearing, params.max_distance)),
        }
    }

    if let (Some(&first), Some(&last)) = (vertices.first(), vertices.last()) {
        if first != last {
            vertices.push(first);
        }
    }

    if distinct_vertex_count(&vertices) < 3 {
        debug!(
            "Degenerate visibility ring ({} vertices) at ({:.1}, {:.1}); using {} radius disk",
            vertices.len(),
            origin.x,
            origin.y,
            params.fallback_radius
        );
        return VisibilityPolygon {
            elevation_angle_deg: params.elevation_angle_deg,
            vertices: disk_ring(origin, params.fallback_radius, FALLBACK_DISK_SEGMENTS),
            fallback: true,
        };
    }

    debug!(
        "{} of {} beams obstructed around ({:.1}, {:.1})",
        obstructed, params.ray_count, origin.x, origin.y
    );

    VisibilityPolygon {
        elevation_angle_deg: params.elevation_angle_deg,
        vertices,
        fallback: false,
    }
}
