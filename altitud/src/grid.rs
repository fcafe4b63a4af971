//! Regular elevation lattices and enclosing-cell lookup.
//!
//! This module provides [`ElevationGrid`], an immutable lattice of altitude
//! samples with a fixed latitude step and a fixed longitude step. Every loader
//! funnels its records through the same validation pass, so a grid that
//! exists always satisfies the lattice invariants:
//!
//! - at least two distinct latitudes and two distinct longitudes;
//! - consecutive latitudes (and longitudes) are evenly spaced;
//! - no coordinate pair appears twice;
//! - every position on the outer boundary has a record (interior positions
//!   may be omitted and are then treated as no-data);
//! - altitudes are finite.

use std::path::Path;

use crate::error::{AltitudeError, Result};

/// Positions closer than this to a lattice line (in index units) snap onto it.
const SNAP_TOLERANCE: f64 = 1e-9;

/// Relative tolerance when comparing consecutive axis spacings.
const SPACING_TOLERANCE: f64 = 1e-6;

/// A single altitude sample. `altitude` is `None` when the sample has no data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Altitude in meters, or `None` for a gap.
    pub altitude: Option<f64>,
}

impl SamplePoint {
    /// Create a sample with a known altitude.
    pub fn new(lat: f64, lon: f64, altitude: f64) -> Self {
        Self {
            lat,
            lon,
            altitude: Some(altitude),
        }
    }

    /// Create a sample explicitly flagged as having no data.
    pub fn no_data(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            altitude: None,
        }
    }
}

/// A geographic bounding box in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum latitude (southern boundary).
    pub min_lat: f64,
    /// Minimum longitude (western boundary).
    pub min_lon: f64,
    /// Maximum latitude (northern boundary).
    pub max_lat: f64,
    /// Maximum longitude (eastern boundary).
    pub max_lon: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Check whether a coordinate lies inside the box (edges included).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// The four samples enclosing a query, plus the query's offsets inside them.
///
/// Corner names follow the grid orientation: `south_west` is `(lat0, lon0)`
/// and `north_east` is `(lat1, lon1)`. `tx` runs west to east and `ty` south to
/// north, both in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub south_west: SamplePoint,
    pub south_east: SamplePoint,
    pub north_west: SamplePoint,
    pub north_east: SamplePoint,
    /// Fractional longitude offset `(lon - lon0) / (lon1 - lon0)`.
    pub tx: f64,
    /// Fractional latitude offset `(lat - lat0) / (lat1 - lat0)`.
    pub ty: f64,
}

impl Cell {
    /// Corners paired with their `(tx, ty)` position in the unit cell.
    pub fn corners(&self) -> [(SamplePoint, f64, f64); 4] {
        [
            (self.south_west, 0.0, 0.0),
            (self.south_east, 1.0, 0.0),
            (self.north_west, 0.0, 1.0),
            (self.north_east, 1.0, 1.0),
        ]
    }

    /// Number of corners carrying no data.
    pub fn missing_corners(&self) -> usize {
        self.corners()
            .iter()
            .filter(|(p, _, _)| p.altitude.is_none())
            .count()
    }

    /// The corner the query sits on, if it matches one exactly.
    pub fn exact_corner(&self) -> Option<SamplePoint> {
        let on_edge = |t: f64| t == 0.0 || t == 1.0;
        if !on_edge(self.tx) || !on_edge(self.ty) {
            return None;
        }
        self.corners()
            .into_iter()
            .find(|&(_, cx, cy)| cx == self.tx && cy == self.ty)
            .map(|(p, _, _)| p)
    }
}

/// Summary figures about a loaded grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSummary {
    /// Number of distinct latitudes.
    pub rows: usize,
    /// Number of distinct longitudes.
    pub cols: usize,
    /// Area covered by the lattice.
    pub extent: BoundingBox,
    /// Latitude spacing in degrees.
    pub lat_step: f64,
    /// Longitude spacing in degrees.
    pub lon_step: f64,
    /// Number of lattice positions without data.
    pub missing: usize,
    /// Lowest altitude in meters, `None` if every sample is a gap.
    pub min_altitude: Option<f64>,
    /// Highest altitude in meters, `None` if every sample is a gap.
    pub max_altitude: Option<f64>,
}

/// An immutable, validated lattice of altitude samples.
///
/// Row 0 is the southernmost latitude and column 0 the westernmost longitude.
///
/// # Example
///
/// ```
/// use altitud::{ElevationGrid, SamplePoint};
///
/// let grid = ElevationGrid::from_samples(vec![
///     SamplePoint::new(0.0, 0.0, 10.0),
///     SamplePoint::new(0.0, 1.0, 20.0),
///     SamplePoint::new(1.0, 0.0, 30.0),
///     SamplePoint::new(1.0, 1.0, 40.0),
/// ])
/// .unwrap();
///
/// let cell = grid.lookup_cell(0.25, 0.75).unwrap();
/// assert_eq!(cell.south_west.altitude, Some(10.0));
/// assert_eq!(cell.tx, 0.75);
/// ```
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    /// Distinct latitudes, ascending.
    lats: Vec<f64>,
    /// Distinct longitudes, ascending.
    lons: Vec<f64>,
    lat_step: f64,
    lon_step: f64,
    /// Row-major altitudes, `NaN` marks a gap.
    altitudes: Vec<f64>,
    missing: usize,
    min_altitude: Option<f64>,
    max_altitude: Option<f64>,
}

impl ElevationGrid {
    /// Build a grid from individual samples, validating every lattice invariant.
    ///
    /// # Errors
    ///
    /// Returns [`AltitudeError::DatasetMalformed`] if the samples are empty,
    /// unevenly spaced, duplicated, out of geographic range, leave a hole on
    /// the boundary, or carry a non-finite altitude.
    pub fn from_samples<I>(samples: I) -> Result<Self>
    where
        I: IntoIterator<Item = SamplePoint>,
    {
        let samples: Vec<SamplePoint> = samples.into_iter().collect();
        if samples.is_empty() {
            return Err(AltitudeError::malformed("dataset contains no samples"));
        }

        for s in &samples {
            if !(-90.0..=90.0).contains(&s.lat) || !(-180.0..=180.0).contains(&s.lon) {
                return Err(AltitudeError::malformed(format!(
                    "sample coordinate out of range: lat={}, lon={}",
                    s.lat, s.lon
                )));
            }
            if let Some(alt) = s.altitude {
                if !alt.is_finite() {
                    return Err(AltitudeError::malformed(format!(
                        "non-finite altitude at lat={}, lon={}",
                        s.lat, s.lon
                    )));
                }
            }
        }

        let lats = distinct_sorted(samples.iter().map(|s| s.lat));
        let lons = distinct_sorted(samples.iter().map(|s| s.lon));
        let lat_step = regular_step(&lats, "latitude")?;
        let lon_step = regular_step(&lons, "longitude")?;

        let rows = lats.len();
        let cols = lons.len();
        let mut altitudes = vec![f64::NAN; rows * cols];
        let mut seen = vec![false; rows * cols];

        for s in &samples {
            // Both searches succeed: the axes were built from these samples.
            let row = axis_index(&lats, s.lat);
            let col = axis_index(&lons, s.lon);
            let idx = row * cols + col;
            if seen[idx] {
                return Err(AltitudeError::malformed(format!(
                    "duplicate sample at lat={}, lon={}",
                    s.lat, s.lon
                )));
            }
            seen[idx] = true;
            altitudes[idx] = s.altitude.unwrap_or(f64::NAN);
        }

        for row in 0..rows {
            for col in 0..cols {
                let on_boundary = row == 0 || col == 0 || row == rows - 1 || col == cols - 1;
                if on_boundary && !seen[row * cols + col] {
                    return Err(AltitudeError::malformed(format!(
                        "missing boundary sample at lat={}, lon={}",
                        lats[row], lons[col]
                    )));
                }
            }
        }

        Ok(Self::assemble(lats, lons, lat_step, lon_step, altitudes))
    }

    /// Build a grid from a dense raster whose southwest sample is at
    /// `(origin_lat, origin_lon)`. `altitudes` is row-major, south to north,
    /// with `None` marking gaps.
    pub fn from_raster(
        origin_lat: f64,
        origin_lon: f64,
        lat_step: f64,
        lon_step: f64,
        cols: usize,
        altitudes: Vec<Option<f64>>,
    ) -> Result<Self> {
        if let Some(idx) = altitudes
            .iter()
            .position(|a| a.is_some_and(|v| !v.is_finite()))
        {
            return Err(AltitudeError::malformed(format!(
                "non-finite altitude at raster index {}",
                idx
            )));
        }
        let raw = altitudes
            .into_iter()
            .map(|a| a.unwrap_or(f64::NAN))
            .collect();
        Self::from_dense(origin_lat, origin_lon, lat_step, lon_step, cols, raw)
    }

    /// Same as [`Self::from_raster`] with gaps already encoded as `NaN`.
    pub(crate) fn from_dense(
        origin_lat: f64,
        origin_lon: f64,
        lat_step: f64,
        lon_step: f64,
        cols: usize,
        altitudes: Vec<f64>,
    ) -> Result<Self> {
        if cols < 2 || altitudes.len() % cols != 0 || altitudes.len() / cols < 2 {
            return Err(AltitudeError::malformed(format!(
                "raster of {} samples cannot form a lattice {} columns wide",
                altitudes.len(),
                cols
            )));
        }
        if !(lat_step > 0.0 && lon_step > 0.0 && lat_step.is_finite() && lon_step.is_finite()) {
            return Err(AltitudeError::malformed(format!(
                "raster steps must be positive: lat_step={}, lon_step={}",
                lat_step, lon_step
            )));
        }
        if altitudes.iter().any(|a| a.is_infinite()) {
            return Err(AltitudeError::malformed("raster contains infinite altitudes"));
        }

        let rows = altitudes.len() / cols;
        let lats: Vec<f64> = (0..rows).map(|i| origin_lat + i as f64 * lat_step).collect();
        let lons: Vec<f64> = (0..cols).map(|i| origin_lon + i as f64 * lon_step).collect();

        let extent_ok = (-90.0..=90.0).contains(&lats[0])
            && (-90.0..=90.0).contains(&lats[rows - 1])
            && (-180.0..=180.0).contains(&lons[0])
            && (-180.0..=180.0).contains(&lons[cols - 1]);
        if !extent_ok {
            return Err(AltitudeError::malformed(format!(
                "raster extends outside valid coordinates: lat {}..{}, lon {}..{}",
                lats[0],
                lats[rows - 1],
                lons[0],
                lons[cols - 1]
            )));
        }

        Ok(Self::assemble(lats, lons, lat_step, lon_step, altitudes))
    }

    /// Load a grid from a file, choosing the format from its name.
    ///
    /// | Extension | Format |
    /// |-----------|--------|
    /// | `.hgt` | SRTM tile, memory-mapped |
    /// | `.hgt.zip` | SRTM tile inside a zip archive |
    /// | `.csv`, `.xyz`, `.txt` | `lat,lon,altitude` text lattice |
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, or
    /// [`AltitudeError::DatasetMalformed`] if the format is unknown or the
    /// contents break the lattice invariants.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".hgt.zip") {
            crate::hgt::load_zip(path)
        } else if name.ends_with(".hgt") {
            crate::hgt::load(path)
        } else if name.ends_with(".csv") || name.ends_with(".xyz") || name.ends_with(".txt") {
            let file = std::fs::File::open(path)?;
            Self::from_csv_reader(std::io::BufReader::new(file))
        } else {
            Err(AltitudeError::malformed(format!(
                "unrecognised dataset format: {}",
                path.display()
            )))
        }
    }

    fn assemble(
        lats: Vec<f64>,
        lons: Vec<f64>,
        lat_step: f64,
        lon_step: f64,
        altitudes: Vec<f64>,
    ) -> Self {
        let mut missing = 0;
        let mut min_altitude: Option<f64> = None;
        let mut max_altitude: Option<f64> = None;
        for &a in &altitudes {
            if a.is_nan() {
                missing += 1;
            } else {
                min_altitude = Some(min_altitude.map_or(a, |m| m.min(a)));
                max_altitude = Some(max_altitude.map_or(a, |m| m.max(a)));
            }
        }

        Self {
            lats,
            lons,
            lat_step,
            lon_step,
            altitudes,
            missing,
            min_altitude,
            max_altitude,
        }
    }

    /// Returns the four samples enclosing `(lat, lon)` and the query's offsets
    /// inside them.
    ///
    /// A query on an interior grid line belongs to the lower-indexed of the
    /// two adjacent cells, so it is reported with an offset of exactly `1.0`.
    ///
    /// # Errors
    ///
    /// Returns [`AltitudeError::OutOfBounds`] if the coordinate lies outside
    /// the grid extent or is not a number.
    pub fn lookup_cell(&self, lat: f64, lon: f64) -> Result<Cell> {
        let (row, ty) = locate(&self.lats, self.lat_step, lat)
            .ok_or(AltitudeError::OutOfBounds { lat, lon })?;
        let (col, tx) = locate(&self.lons, self.lon_step, lon)
            .ok_or(AltitudeError::OutOfBounds { lat, lon })?;

        Ok(Cell {
            south_west: self.point(row, col),
            south_east: self.point(row, col + 1),
            north_west: self.point(row + 1, col),
            north_east: self.point(row + 1, col + 1),
            tx,
            ty,
        })
    }

    /// Check whether a coordinate lies inside the covered extent.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        locate(&self.lats, self.lat_step, lat).is_some()
            && locate(&self.lons, self.lon_step, lon).is_some()
    }

    /// Returns the sample at a row/column index, or `None` past the edges.
    pub fn sample(&self, row: usize, col: usize) -> Option<SamplePoint> {
        (row < self.rows() && col < self.cols()).then(|| self.point(row, col))
    }

    /// Iterate over every lattice position, row by row from the south.
    pub fn samples(&self) -> impl Iterator<Item = SamplePoint> + '_ {
        (0..self.rows()).flat_map(move |row| (0..self.cols()).map(move |col| self.point(row, col)))
    }

    fn point(&self, row: usize, col: usize) -> SamplePoint {
        let a = self.altitudes[row * self.cols() + col];
        SamplePoint {
            lat: self.lats[row],
            lon: self.lons[col],
            altitude: (!a.is_nan()).then_some(a),
        }
    }

    /// Number of distinct latitudes.
    pub fn rows(&self) -> usize {
        self.lats.len()
    }

    /// Number of distinct longitudes.
    pub fn cols(&self) -> usize {
        self.lons.len()
    }

    /// Latitude spacing in degrees.
    pub fn lat_step(&self) -> f64 {
        self.lat_step
    }

    /// Longitude spacing in degrees.
    pub fn lon_step(&self) -> f64 {
        self.lon_step
    }

    /// Area covered by the lattice.
    pub fn extent(&self) -> BoundingBox {
        BoundingBox::new(
            self.lats[0],
            self.lons[0],
            self.lats[self.rows() - 1],
            self.lons[self.cols() - 1],
        )
    }

    /// Summary figures: size, extent, spacing, gaps and altitude range.
    pub fn summary(&self) -> GridSummary {
        GridSummary {
            rows: self.rows(),
            cols: self.cols(),
            extent: self.extent(),
            lat_step: self.lat_step,
            lon_step: self.lon_step,
            missing: self.missing,
            min_altitude: self.min_altitude,
            max_altitude: self.max_altitude,
        }
    }
}

fn distinct_sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    // Adding 0.0 folds -0.0 into 0.0 so total ordering agrees with equality.
    let mut v: Vec<f64> = values.map(|x| x + 0.0).collect();
    v.sort_by(f64::total_cmp);
    v.dedup();
    v
}

fn regular_step(axis: &[f64], name: &str) -> Result<f64> {
    if axis.len() < 2 {
        return Err(AltitudeError::malformed(format!(
            "need at least 2 distinct {} values, found {}",
            name,
            axis.len()
        )));
    }
    let step = (axis[axis.len() - 1] - axis[0]) / (axis.len() - 1) as f64;
    for pair in axis.windows(2) {
        let gap = pair[1] - pair[0];
        if (gap - step).abs() > step * SPACING_TOLERANCE {
            return Err(AltitudeError::malformed(format!(
                "irregular {} spacing between {} and {} (expected step {})",
                name, pair[0], pair[1], step
            )));
        }
    }
    Ok(step)
}

fn axis_index(axis: &[f64], value: f64) -> usize {
    let value = value + 0.0;
    axis.binary_search_by(|x| x.total_cmp(&value))
        .unwrap_or_else(|insert| insert.min(axis.len() - 1))
}

/// Map a coordinate onto an axis, returning the lower index of the enclosing
/// interval and the fractional offset inside it.
fn locate(axis: &[f64], step: f64, value: f64) -> Option<(usize, f64)> {
    let last = axis.len() - 1;
    let tolerance = SNAP_TOLERANCE * step;
    if !(value >= axis[0] - tolerance && value <= axis[last] + tolerance) {
        return None;
    }

    // Spacing is only regular within tolerance; settle the interval on the
    // stored axis values.
    let guess = ((value - axis[0]) / step).floor().clamp(0.0, (last - 1) as f64);
    let mut idx = guess as usize;
    while idx > 0 && value < axis[idx] - tolerance {
        idx -= 1;
    }
    while idx + 1 < last && value > axis[idx + 1] + tolerance {
        idx += 1;
    }

    if (value - axis[idx]).abs() <= tolerance {
        return Some(if idx == 0 { (0, 0.0) } else { (idx - 1, 1.0) });
    }
    if (value - axis[idx + 1]).abs() <= tolerance {
        return Some((idx, 1.0));
    }
    let t = (value - axis[idx]) / (axis[idx + 1] - axis[idx]);
    Some((idx, t.clamp(0.0, 1.0)))
}
