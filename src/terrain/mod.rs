pub mod fill;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::error::GridError;
use crate::geo::GeoTransform;
use crate::physics::los::TerrainProvider;

/// Outcome of no-data gap filling at grid construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    /// No sentinel cells were present.
    Clean,
    /// This many sentinel cells were replaced by their nearest valid neighbour.
    Filled(usize),
    /// Every cell was a sentinel; the grid was left as-is.
    NoValidCells,
}

/// Immutable height raster with its affine transform.
///
/// Built once; no-data cells are filled during construction so that
/// samplers never observe the sentinel (unless [`FillStatus::NoValidCells`]).
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    rows: usize,
    cols: usize,
    data: Vec<f32>, // Row-major, north row first
    transform: GeoTransform,
    nodata: Option<f32>,
    crs: Option<String>,
    fill_status: FillStatus,
}

impl ElevationGrid {
    pub fn new(
        rows: usize,
        cols: usize,
        data: Vec<f32>,
        transform: GeoTransform,
        nodata: Option<f32>,
        crs: Option<String>,
    ) -> Result<Self, GridError> {
        if rows == 0 || cols == 0 {
            return Err(GridError::Empty { rows, cols });
        }
        let expected = cell_count(rows, cols)?;
        if data.len() != expected {
            return Err(GridError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        transform.validate()?;

        let mut grid = Self {
            rows,
            cols,
            data,
            transform,
            nodata,
            crs,
            fill_status: FillStatus::Clean,
        };
        grid.fill_status = grid.fill_nodata();
        Ok(grid)
    }

    /// Flat grid of constant height, mostly useful for tests and benches.
    pub fn flat(
        rows: usize,
        cols: usize,
        height: f32,
        transform: GeoTransform,
    ) -> Result<Self, GridError> {
        let cells = cell_count(rows, cols)?;
        Self::new(rows, cols, vec![height; cells], transform, None, None)
    }

    fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || self.nodata == Some(value)
    }

    fn fill_nodata(&mut self) -> FillStatus {
        let valid: Vec<bool> = self.data.iter().map(|&v| !self.is_nodata(v)).collect();
        let missing = valid.iter().filter(|&&v| !v).count();
        if missing == 0 {
            return FillStatus::Clean;
        }

        info!("Filling {} nodata cells...", missing);
        match fill::nearest_valid_indices(&valid, self.rows, self.cols) {
            Some(nearest) => {
                let filled: Vec<f32> = nearest.iter().map(|&src| self.data[src]).collect();
                self.data = filled;
                FillStatus::Filled(missing)
            }
            None => {
                warn!(
                    "Elevation grid has no valid cells ({} x {}); leaving nodata in place",
                    self.rows, self.cols
                );
                FillStatus::NoValidCells
            }
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    /// Opaque reference-system tag carried through from the source.
    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    pub fn fill_status(&self) -> FillStatus {
        self.fill_status
    }

    pub fn pixel_to_world(&self, row: isize, col: isize) -> (f64, f64) {
        self.transform.pixel_to_world(row, col)
    }

    #[inline(always)]
    fn height(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }
}

fn cell_count(rows: usize, cols: usize) -> Result<usize, GridError> {
    rows.checked_mul(cols).ok_or(GridError::TooLarge { rows, cols })
}

impl TerrainProvider for ElevationGrid {
    fn pixel_size(&self) -> f64 {
        self.transform.pixel_size()
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn world_to_pixel(&self, x: f64, y: f64) -> (isize, isize) {
        self.transform.world_to_pixel(x, y)
    }

    fn get_elevation(&self, row: isize, col: isize) -> Option<f64> {
        if !self.contains(row, col) {
            return None;
        }
        let h = self.height(row as usize, col as usize);
        if self.is_nodata(h) { None } else { Some(h as f64) }
    }
}

/// Reads ESRI ASCII grid (`.asc`) rasters.
///
/// A sibling `.prj` file, when present, becomes the grid's reference-system
/// tag verbatim.
pub struct TerrainLoader {
    pub path: PathBuf,
}

impl TerrainLoader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Result<ElevationGrid> {
        info!("Loading DSM from: {}", self.path.display());
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to open {:?}", self.path))?;
        let crs = read_prj(&self.path);
        let grid = parse_ascii_grid(&text, crs)
            .with_context(|| format!("Failed to parse ASCII grid {:?}", self.path))?;

        info!("DSM shape: {} x {}", grid.rows(), grid.cols());
        info!("DSM resolution: {:.2}", grid.pixel_size());
        debug!("DSM transform: {:?}", grid.transform());
        if let Some(crs) = grid.crs() {
            info!("DSM CRS: {}", crs);
        }
        Ok(grid)
    }
}

/// Reference-system tag from the sibling `.prj`. A missing file is normal;
/// one that exists but can't be read is logged and ignored.
fn read_prj(path: &Path) -> Option<String> {
    let prj = path.with_extension("prj");
    if !prj.exists() {
        return None;
    }
    match fs::read_to_string(&prj) {
        Ok(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Err(e) => {
            warn!("Ignoring unreadable projection file {:?}: {}", prj, e);
            None
        }
    }
}

#[derive(Default)]
struct AsciiHeader {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, bool)>, // (value, is_center)
    yll: Option<(f64, bool)>,
    cellsize: Option<f64>,
    nodata: Option<f32>,
}

/// Parses the text of an ESRI ASCII grid into an [`ElevationGrid`].
pub fn parse_ascii_grid(text: &str, crs: Option<String>) -> Result<ElevationGrid> {
    let mut header = AsciiHeader::default();
    let mut tokens = text.split_whitespace().peekable();

    while let Some(&key) = tokens.peek() {
        if key.parse::<f64>().is_ok() {
            break;
        }
        tokens.next();
        let value = tokens
            .next()
            .with_context(|| format!("Missing value for header key {key}"))?;
        match key.to_ascii_lowercase().as_str() {
            "ncols" => header.ncols = Some(value.parse()?),
            "nrows" => header.nrows = Some(value.parse()?),
            "xllcorner" => header.xll = Some((value.parse()?, false)),
            "xllcenter" => header.xll = Some((value.parse()?, true)),
            "yllcorner" => header.yll = Some((value.parse()?, false)),
            "yllcenter" => header.yll = Some((value.parse()?, true)),
            "cellsize" => header.cellsize = Some(value.parse()?),
            "nodata_value" => header.nodata = Some(value.parse()?),
            other => anyhow::bail!("Unknown ASCII grid header key: {}", other),
        }
    }

    let ncols = header.ncols.context("ASCII grid header lacks ncols")?;
    let nrows = header.nrows.context("ASCII grid header lacks nrows")?;
    let cellsize = header.cellsize.context("ASCII grid header lacks cellsize")?;
    let (xll, x_center) = header.xll.context("ASCII grid header lacks xllcorner/xllcenter")?;
    let (yll, y_center) = header.yll.context("ASCII grid header lacks yllcorner/yllcenter")?;

    let west = if x_center { xll - cellsize / 2.0 } else { xll };
    let south = if y_center { yll - cellsize / 2.0 } else { yll };
    let north = south + nrows as f64 * cellsize;

    let data = tokens
        .map(|t| t.parse::<f32>().with_context(|| format!("Invalid height sample {t:?}")))
        .collect::<Result<Vec<f32>>>()?;

    let grid = ElevationGrid::new(
        nrows,
        ncols,
        data,
        GeoTransform::north_up(west, north, cellsize),
        header.nodata,
        crs,
    )?;
    Ok(grid)
}
