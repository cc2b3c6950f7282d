//! Error types for grid construction, configuration and per-point analysis.

use thiserror::Error;

/// Malformed grid-level input. Fatal: no casting happens on a grid that
/// failed to build.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("elevation grid is empty ({rows} rows x {cols} cols)")]
    Empty { rows: usize, cols: usize },

    #[error("grid data holds {actual} samples, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("grid of {rows} x {cols} cells overflows the address space")]
    TooLarge { rows: usize, cols: usize },

    #[error("invalid pixel width {0}: must be finite and positive")]
    InvalidPixelWidth(f64),

    /// North-up grids carry a negative pixel height.
    #[error("invalid pixel height {0}: must be finite and negative (north-up)")]
    InvalidPixelHeight(f64),

    #[error("invalid transform origin ({0}, {1})")]
    InvalidOrigin(f64, f64),
}

/// Rejected analysis parameters. Fatal, checked before the batch starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("elevation angle {0} deg must lie strictly between -90 and 90")]
    InvalidElevationAngle(f64),

    #[error("max distance {0} must be finite and positive")]
    InvalidMaxDistance(f64),

    #[error("ray count must be at least 1")]
    ZeroRayCount,

    #[error("fallback radius {0} must be finite and non-negative")]
    InvalidFallbackRadius(f64),
}

/// Failure of a single staging point. The batch records it and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PointError {
    #[error("staging point ({x}, {y}) lies outside the elevation grid")]
    OutOfBounds { x: f64, y: f64 },

    #[error("no valid elevation at staging point ({x}, {y})")]
    InvalidElevation { x: f64, y: f64 },
}
