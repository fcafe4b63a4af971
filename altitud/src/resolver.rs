//! Altitude resolution with interpolation and gap filling.
//!
//! [`AltitudeResolver`] answers "what is the altitude here?" for arbitrary
//! coordinates inside the current grid of an [`ElevationStore`]:
//!
//! 1. The enclosing cell is looked up; outside the grid the answer is
//!    [`AltitudeError::OutOfBounds`].
//! 2. A query sitting exactly on a sample with data returns that sample,
//!    flagged as not interpolated.
//! 3. With one corner missing, the other three are blended by inverse
//!    distance weighting. With two or more missing the answer is
//!    [`AltitudeError::InsufficientData`].
//! 4. Otherwise the four corners are blended bilinearly.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{AltitudeError, Result};
use crate::grid::{Cell, ElevationGrid};
use crate::store::ElevationStore;

/// Squared cell-space distance below which a query counts as sitting on a corner.
const CORNER_EPSILON: f64 = 1e-18;

/// How a resolved altitude was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimate {
    /// The query matched a sample exactly.
    Exact,
    /// Bilinear blend of four corners.
    Bilinear,
    /// Inverse-distance blend of three corners around a single gap.
    GapFilled,
}

impl Estimate {
    /// Lower-case name used in logs and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Estimate::Exact => "exact",
            Estimate::Bilinear => "bilinear",
            Estimate::GapFilled => "gap_filled",
        }
    }
}

/// A successfully resolved altitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// Altitude in meters.
    pub altitude: f64,
    /// `false` only when the query matched a sample exactly.
    pub interpolated: bool,
    /// Method used to produce the value.
    pub estimate: Estimate,
}

impl Resolution {
    fn new(altitude: f64, estimate: Estimate) -> Self {
        Self {
            altitude,
            interpolated: estimate != Estimate::Exact,
            estimate,
        }
    }
}

/// Resolve `(lat, lon)` against a grid without touching any shared state.
///
/// # Example
///
/// ```
/// use altitud::{resolve_in, ElevationGrid, SamplePoint};
///
/// let grid = ElevationGrid::from_samples(vec![
///     SamplePoint::new(0.0, 0.0, 10.0),
///     SamplePoint::new(0.0, 1.0, 20.0),
///     SamplePoint::new(1.0, 0.0, 30.0),
///     SamplePoint::new(1.0, 1.0, 40.0),
/// ])
/// .unwrap();
///
/// let r = resolve_in(&grid, 0.5, 0.5).unwrap();
/// assert_eq!(r.altitude, 25.0);
/// assert!(r.interpolated);
/// ```
///
/// # Errors
///
/// [`AltitudeError::OutOfBounds`] outside the grid, or
/// [`AltitudeError::InsufficientData`] when two or more corners are gaps.
pub fn resolve_in(grid: &ElevationGrid, lat: f64, lon: f64) -> Result<Resolution> {
    let cell = grid.lookup_cell(lat, lon)?;
    resolve_cell(&cell, lat, lon)
}

fn resolve_cell(cell: &Cell, lat: f64, lon: f64) -> Result<Resolution> {
    if let Some(altitude) = cell.exact_corner().and_then(|p| p.altitude) {
        return Ok(Resolution::new(altitude, Estimate::Exact));
    }

    match cell.missing_corners() {
        0 => Ok(Resolution::new(bilinear(cell), Estimate::Bilinear)),
        1 => Ok(Resolution::new(inverse_distance(cell), Estimate::GapFilled)),
        missing => Err(AltitudeError::InsufficientData { lat, lon, missing }),
    }
}

/// Bilinear blend; every corner must carry data.
fn bilinear(cell: &Cell) -> f64 {
    let (tx, ty) = (cell.tx, cell.ty);
    let a00 = cell.south_west.altitude.unwrap_or_default();
    let a10 = cell.south_east.altitude.unwrap_or_default();
    let a01 = cell.north_west.altitude.unwrap_or_default();
    let a11 = cell.north_east.altitude.unwrap_or_default();

    a00 * (1.0 - tx) * (1.0 - ty) + a10 * tx * (1.0 - ty) + a01 * (1.0 - tx) * ty + a11 * tx * ty
}

/// Inverse-distance-squared blend of the corners that carry data, measured
/// in unit-cell coordinates.
fn inverse_distance(cell: &Cell) -> f64 {
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for (point, cx, cy) in cell.corners() {
        let Some(altitude) = point.altitude else {
            continue;
        };
        let d2 = (cell.tx - cx).powi(2) + (cell.ty - cy).powi(2);
        if d2 < CORNER_EPSILON {
            return altitude;
        }
        let w = 1.0 / d2;
        weighted += w * altitude;
        total_weight += w;
    }
    weighted / total_weight
}

/// Counters describing how queries have been answered.
#[derive(Debug, Clone, Default)]
pub struct ResolverStats {
    /// Queries answered from an exact sample.
    pub exact: u64,
    /// Queries answered by bilinear interpolation.
    pub bilinear: u64,
    /// Queries answered by gap filling.
    pub gap_filled: u64,
    /// Queries outside the grid.
    pub out_of_bounds: u64,
    /// Queries refused because of missing corners.
    pub insufficient_data: u64,
}

impl ResolverStats {
    /// Total number of queries seen.
    pub fn total(&self) -> u64 {
        self.exact + self.bilinear + self.gap_filled + self.out_of_bounds + self.insufficient_data
    }

    /// Fraction of queries that produced an altitude (0.0 to 1.0).
    ///
    /// Returns 0.0 if no queries have been made.
    pub fn resolved_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.exact + self.bilinear + self.gap_filled) as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    exact: AtomicU64,
    bilinear: AtomicU64,
    gap_filled: AtomicU64,
    out_of_bounds: AtomicU64,
    insufficient_data: AtomicU64,
}

impl Counters {
    fn record(&self, result: &Result<Resolution>) {
        let counter = match result {
            Ok(r) => match r.estimate {
                Estimate::Exact => &self.exact,
                Estimate::Bilinear => &self.bilinear,
                Estimate::GapFilled => &self.gap_filled,
            },
            Err(AltitudeError::OutOfBounds { .. }) => &self.out_of_bounds,
            Err(AltitudeError::InsufficientData { .. }) => &self.insufficient_data,
            Err(_) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Resolves altitudes against the grid held by an [`ElevationStore`].
///
/// The resolver is `Send + Sync`; share it behind an `Arc` and call
/// [`Self::resolve`] from any number of threads.
///
/// # Example
///
/// ```ignore
/// use altitud::AltitudeResolver;
///
/// let resolver = AltitudeResolver::builder("/data/N40W004.hgt").build()?;
/// let r = resolver.resolve(40.4168, -3.7038)?;
/// println!("{:.1}m ({})", r.altitude, r.estimate.as_str());
/// ```
#[derive(Debug)]
pub struct AltitudeResolver {
    store: Arc<ElevationStore>,
    counters: Counters,
}

impl AltitudeResolver {
    /// Create a resolver over a shared store.
    pub fn new(store: Arc<ElevationStore>) -> Self {
        Self {
            store,
            counters: Counters::default(),
        }
    }

    /// Create a resolver serving a single in-memory grid.
    pub fn from_grid(grid: ElevationGrid) -> Self {
        Self::new(Arc::new(ElevationStore::new(grid)))
    }

    /// Create a builder that loads the dataset at `path`.
    pub fn builder<P: AsRef<Path>>(path: P) -> AltitudeResolverBuilder {
        AltitudeResolverBuilder::new(path)
    }

    /// Resolve the altitude at `(lat, lon)`.
    ///
    /// # Errors
    ///
    /// [`AltitudeError::OutOfBounds`] outside the grid, or
    /// [`AltitudeError::InsufficientData`] when two or more corners are gaps.
    pub fn resolve(&self, lat: f64, lon: f64) -> Result<Resolution> {
        let grid = self.store.snapshot();
        let result = resolve_in(&grid, lat, lon);
        self.counters.record(&result);
        result
    }

    /// Resolve many coordinates against one snapshot of the grid.
    ///
    /// Results are returned in input order, one per `(lat, lon)` pair. A
    /// reload that lands mid-batch does not affect it.
    pub fn resolve_batch(&self, coords: &[(f64, f64)]) -> Vec<Result<Resolution>> {
        let grid = self.store.snapshot();
        coords
            .iter()
            .map(|&(lat, lon)| {
                let result = resolve_in(&grid, lat, lon);
                self.counters.record(&result);
                result
            })
            .collect()
    }

    /// The store this resolver reads from.
    pub fn store(&self) -> &Arc<ElevationStore> {
        &self.store
    }

    /// Reload the store's dataset. See [`ElevationStore::reload`].
    pub fn reload(&self) -> Result<u64> {
        self.store.reload()
    }

    /// Snapshot of the resolution counters.
    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            exact: self.counters.exact.load(Ordering::Relaxed),
            bilinear: self.counters.bilinear.load(Ordering::Relaxed),
            gap_filled: self.counters.gap_filled.load(Ordering::Relaxed),
            out_of_bounds: self.counters.out_of_bounds.load(Ordering::Relaxed),
            insufficient_data: self.counters.insufficient_data.load(Ordering::Relaxed),
        }
    }
}

/// Builder for creating an [`AltitudeResolver`] from a dataset file.
///
/// # Example
///
/// ```ignore
/// use altitud::AltitudeResolverBuilder;
///
/// let resolver = AltitudeResolverBuilder::from_env()?.build()?;
/// ```
#[derive(Debug, Clone)]
pub struct AltitudeResolverBuilder {
    dataset: PathBuf,
}

impl AltitudeResolverBuilder {
    /// Create a new builder for the dataset at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            dataset: path.as_ref().to_path_buf(),
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `ALTITUD_DATASET` | Dataset file (`.csv`, `.xyz`, `.txt`, `.hgt`, `.hgt.zip`) | Required |
    ///
    /// # Errors
    ///
    /// Returns an error if `ALTITUD_DATASET` is not set.
    pub fn from_env() -> Result<Self> {
        let dataset = std::env::var("ALTITUD_DATASET").map_err(|_| {
            AltitudeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "ALTITUD_DATASET environment variable not set",
            ))
        })?;
        Ok(Self::new(dataset))
    }

    /// Set the dataset path.
    ///
    /// Overrides the path set in the constructor or from environment.
    pub fn dataset<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.dataset = path.as_ref().to_path_buf();
        self
    }

    /// Load the dataset and build the [`AltitudeResolver`].
    ///
    /// # Errors
    ///
    /// Returns the loader's error if the dataset cannot be read or is malformed.
    pub fn build(self) -> Result<AltitudeResolver> {
        let store = ElevationStore::open(&self.dataset)?;
        Ok(AltitudeResolver::new(Arc::new(store)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::SamplePoint;
    use std::fs;
    use tempfile::TempDir;

    fn square() -> ElevationGrid {
        ElevationGrid::from_samples(vec![
            SamplePoint::new(0.0, 0.0, 10.0),
            SamplePoint::new(0.0, 1.0, 20.0),
            SamplePoint::new(1.0, 0.0, 30.0),
            SamplePoint::new(1.0, 1.0, 40.0),
        ])
        .unwrap()
    }

    /// 4×5 lattice at 0.25° × 0.5° with a bumpy but deterministic surface.
    fn terrain() -> ElevationGrid {
        let mut samples = Vec::new();
        for row in 0..4 {
            for col in 0..5 {
                let altitude = 600.0 + 37.0 * row as f64 - 11.0 * col as f64 + ((row * col) % 3) as f64 * 9.5;
                samples.push(SamplePoint::new(
                    39.5 + row as f64 * 0.25,
                    -4.0 + col as f64 * 0.5,
                    altitude,
                ));
            }
        }
        ElevationGrid::from_samples(samples).unwrap()
    }

    fn square_with_gaps(gaps: &[(f64, f64)]) -> ElevationGrid {
        let grid = square();
        let samples = grid.samples().map(|s| {
            if gaps.contains(&(s.lat, s.lon)) {
                SamplePoint::no_data(s.lat, s.lon)
            } else {
                s
            }
        });
        ElevationGrid::from_samples(samples.collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_centre_of_square() {
        let r = resolve_in(&square(), 0.5, 0.5).unwrap();
        assert_eq!(r.altitude, 25.0);
        assert!(r.interpolated);
        assert_eq!(r.estimate, Estimate::Bilinear);
    }

    #[test]
    fn test_bilinear_formula() {
        // tx = 0.25 (lon), ty = 0.75 (lat)
        let r = resolve_in(&square(), 0.75, 0.25).unwrap();
        let expected =
            10.0 * 0.75 * 0.25 + 20.0 * 0.25 * 0.25 + 30.0 * 0.75 * 0.75 + 40.0 * 0.25 * 0.75;
        assert!((r.altitude - expected).abs() < 1e-12);
    }

    #[test]
    fn test_exact_samples_round_trip() {
        let grid = terrain();
        for sample in grid.samples() {
            let r = resolve_in(&grid, sample.lat, sample.lon).unwrap();
            assert_eq!(Some(r.altitude), sample.altitude);
            assert!(!r.interpolated);
            assert_eq!(r.estimate, Estimate::Exact);
        }
    }

    #[test]
    fn test_interior_values_bounded_by_corners() {
        let grid = terrain();
        let extent = grid.extent();
        for i in 1..40 {
            for j in 1..40 {
                let lat = extent.min_lat + (extent.max_lat - extent.min_lat) * i as f64 / 40.0;
                let lon = extent.min_lon + (extent.max_lon - extent.min_lon) * j as f64 / 40.0;
                let cell = grid.lookup_cell(lat, lon).unwrap();
                let corners: Vec<f64> = cell
                    .corners()
                    .iter()
                    .filter_map(|(p, _, _)| p.altitude)
                    .collect();
                let lo = corners.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = corners.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

                let r = resolve_in(&grid, lat, lon).unwrap();
                assert!(
                    r.altitude >= lo - 1e-9 && r.altitude <= hi + 1e-9,
                    "{} outside [{}, {}] at ({}, {})",
                    r.altitude,
                    lo,
                    hi,
                    lat,
                    lon
                );
            }
        }
    }

    #[test]
    fn test_out_of_bounds_never_numeric() {
        let grid = terrain();
        for (lat, lon) in [
            (39.4, -3.0),
            (40.3, -3.0),
            (39.8, -4.1),
            (39.8, -1.9),
            (-90.0, 180.0),
            (f64::NAN, -3.0),
        ] {
            match resolve_in(&grid, lat, lon) {
                Err(AltitudeError::OutOfBounds { .. }) => {}
                other => panic!("expected OutOfBounds at ({lat}, {lon}), got {other:?}"),
            }
        }
    }

    #[test]
    fn test_single_gap_is_filled() {
        let grid = square_with_gaps(&[(1.0, 1.0)]);
        let r = resolve_in(&grid, 0.5, 0.5).unwrap();
        assert_eq!(r.estimate, Estimate::GapFilled);
        assert!(r.interpolated);
        // Equidistant from the three remaining corners.
        assert!((r.altitude - 20.0).abs() < 1e-12);

        // Near a corner the blend leans towards it.
        let r = resolve_in(&grid, 0.05, 0.05).unwrap();
        assert!(r.altitude.is_finite());
        assert!(r.altitude < 15.0);
    }

    #[test]
    fn test_query_on_missing_sample_is_gap_filled() {
        let grid = square_with_gaps(&[(0.0, 0.0)]);
        let r = resolve_in(&grid, 0.0, 0.0).unwrap();
        assert_eq!(r.estimate, Estimate::GapFilled);
        // Weights 1, 1, 1/2 for (0,1), (1,0), (1,1).
        let expected = (20.0 + 30.0 + 0.5 * 40.0) / 2.5;
        assert!((r.altitude - expected).abs() < 1e-12);
    }

    #[test]
    fn test_exact_sample_beside_gaps() {
        let grid = square_with_gaps(&[(0.0, 0.0), (1.0, 1.0)]);
        let r = resolve_in(&grid, 0.0, 1.0).unwrap();
        assert_eq!(r.altitude, 20.0);
        assert_eq!(r.estimate, Estimate::Exact);
    }

    #[test]
    fn test_two_gaps_insufficient() {
        let grid = square_with_gaps(&[(0.0, 0.0), (1.0, 1.0)]);
        match resolve_in(&grid, 0.5, 0.5) {
            Err(AltitudeError::InsufficientData { missing, .. }) => assert_eq!(missing, 2),
            other => panic!("expected InsufficientData, got {other:?}"),
        }

        let grid = square_with_gaps(&[(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)]);
        assert!(matches!(
            resolve_in(&grid, 0.5, 0.5),
            Err(AltitudeError::InsufficientData { missing: 4, .. })
        ));
    }

    #[test]
    fn test_resolver_stats() {
        let resolver = AltitudeResolver::from_grid(square_with_gaps(&[(1.0, 1.0)]));
        assert_eq!(resolver.stats().total(), 0);
        assert_eq!(resolver.stats().resolved_rate(), 0.0);

        resolver.resolve(0.0, 0.0).unwrap();
        resolver.resolve(0.5, 0.5).unwrap();
        assert!(resolver.resolve(5.0, 5.0).is_err());

        let stats = resolver.stats();
        assert_eq!(stats.exact, 1);
        assert_eq!(stats.gap_filled, 1);
        assert_eq!(stats.out_of_bounds, 1);
        assert_eq!(stats.total(), 3);
        assert!((stats.resolved_rate() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_resolve_batch_keeps_order() {
        let resolver = AltitudeResolver::from_grid(square());
        let results = resolver.resolve_batch(&[(0.5, 0.5), (2.0, 2.0), (1.0, 1.0)]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().altitude, 25.0);
        assert!(matches!(results[1], Err(AltitudeError::OutOfBounds { .. })));
        assert_eq!(results[2].as_ref().unwrap().altitude, 40.0);
        assert_eq!(resolver.stats().total(), 3);
    }

    #[test]
    fn test_resolver_sees_replaced_grid() {
        let resolver = AltitudeResolver::from_grid(square());
        assert_eq!(resolver.resolve(0.5, 0.5).unwrap().altitude, 25.0);

        let grid = square();
        let shifted = grid.samples().map(|s| SamplePoint {
            altitude: s.altitude.map(|a| a + 100.0),
            ..s
        });
        resolver
            .store()
            .replace(ElevationGrid::from_samples(shifted.collect::<Vec<_>>()).unwrap());
        assert_eq!(resolver.resolve(0.5, 0.5).unwrap().altitude, 125.0);
    }

    #[test]
    fn test_builder_and_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("square.csv");
        fs::write(&path, "lat,lon,altitude\n0,0,10\n0,1,20\n1,0,30\n1,1,40\n").unwrap();

        let resolver = AltitudeResolver::builder("/nonexistent.csv")
            .dataset(&path)
            .build()
            .unwrap();
        assert_eq!(resolver.resolve(0.5, 0.5).unwrap().altitude, 25.0);

        std::env::remove_var("ALTITUD_DATASET");
        assert!(AltitudeResolverBuilder::from_env().is_err());

        std::env::set_var("ALTITUD_DATASET", &path);
        let resolver = AltitudeResolverBuilder::from_env().unwrap().build().unwrap();
        assert_eq!(resolver.store().source(), Some(path.as_path()));
        std::env::remove_var("ALTITUD_DATASET");
    }

    #[test]
    fn test_builder_missing_file() {
        let err = AltitudeResolver::builder("/nonexistent/grid.csv")
            .build()
            .unwrap_err();
        assert!(matches!(err, AltitudeError::Io(_)));
    }

    #[test]
    fn test_estimate_names() {
        assert_eq!(Estimate::Exact.as_str(), "exact");
        assert_eq!(Estimate::Bilinear.as_str(), "bilinear");
        assert_eq!(Estimate::GapFilled.as_str(), "gap_filled");
    }
}
