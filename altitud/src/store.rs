//! Shared, swappable ownership of the current elevation grid.
//!
//! [`ElevationStore`] hands out `Arc` snapshots of an immutable
//! [`ElevationGrid`]. Readers load the current `Arc` without taking a lock;
//! a reload builds the replacement grid first and swaps it in as a single
//! pointer store, so in-flight queries keep seeing the grid they started with.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::{AltitudeError, Result};
use crate::grid::{Cell, ElevationGrid, GridSummary};

/// A grid together with the generation it was installed as.
#[derive(Debug)]
struct Installed {
    grid: Arc<ElevationGrid>,
    generation: u64,
}

/// Owner of the current elevation grid.
///
/// # Example
///
/// ```ignore
/// use altitud::ElevationStore;
///
/// let store = ElevationStore::open("/data/madrid.csv")?;
/// let cell = store.lookup_cell(40.41, -3.70)?;
///
/// // Later, after the file has been updated on disk:
/// let generation = store.reload()?;
/// ```
#[derive(Debug)]
pub struct ElevationStore {
    /// Grid and generation are swapped together, so readers never pair a
    /// grid with another grid's generation.
    current: ArcSwap<Installed>,
    /// File the grid was loaded from, if any; used by [`Self::reload`].
    source: Option<PathBuf>,
}

impl ElevationStore {
    /// Create a store serving an already validated grid.
    pub fn new(grid: ElevationGrid) -> Self {
        Self::with_source(grid, None)
    }

    /// Load a grid from `path` and remember the path for later reloads.
    ///
    /// # Errors
    ///
    /// Fails with the loader's error; a store is never created around a
    /// malformed dataset.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let grid = ElevationGrid::from_path(path)?;
        Ok(Self::with_source(grid, Some(path.to_path_buf())))
    }

    fn with_source(grid: ElevationGrid, source: Option<PathBuf>) -> Self {
        Self {
            current: ArcSwap::from_pointee(Installed {
                grid: Arc::new(grid),
                generation: 1,
            }),
            source,
        }
    }

    /// Returns the grid currently being served.
    pub fn snapshot(&self) -> Arc<ElevationGrid> {
        Arc::clone(&self.current.load().grid)
    }

    /// Returns the grid currently being served and its generation, read
    /// together.
    pub fn versioned_snapshot(&self) -> (Arc<ElevationGrid>, u64) {
        let installed = self.current.load();
        (Arc::clone(&installed.grid), installed.generation)
    }

    /// Install a new grid and return the one it replaced.
    ///
    /// Snapshots taken before the call stay valid and unchanged.
    pub fn replace(&self, grid: ElevationGrid) -> Arc<ElevationGrid> {
        self.install(grid).0
    }

    /// Swap in `grid` and return the previous grid and the new generation.
    ///
    /// Concurrent installs each get a distinct generation.
    fn install(&self, grid: ElevationGrid) -> (Arc<ElevationGrid>, u64) {
        let grid = Arc::new(grid);
        let previous = self.current.rcu(|current| Installed {
            grid: Arc::clone(&grid),
            generation: current.generation + 1,
        });
        (Arc::clone(&previous.grid), previous.generation + 1)
    }

    /// Re-read the dataset from the path the store was opened with.
    ///
    /// Returns the generation of the grid this call installed. On failure
    /// the current grid keeps serving and the loader's error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`AltitudeError::DatasetMalformed`] if the store was created
    /// from an in-memory grid, or any error raised while loading the file.
    pub fn reload(&self) -> Result<u64> {
        let path = self.source.as_ref().ok_or_else(|| {
            AltitudeError::malformed("store has no source file to reload from")
        })?;
        let grid = ElevationGrid::from_path(path)?;
        Ok(self.install(grid).1)
    }

    /// Enclosing cell of `(lat, lon)` in the current grid.
    ///
    /// # Errors
    ///
    /// Returns [`AltitudeError::OutOfBounds`] outside the grid extent.
    pub fn lookup_cell(&self, lat: f64, lon: f64) -> Result<Cell> {
        self.snapshot().lookup_cell(lat, lon)
    }

    /// Summary of the current grid.
    pub fn summary(&self) -> GridSummary {
        self.snapshot().summary()
    }

    /// Number of grids installed so far (1 after construction).
    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    /// Path the store reloads from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}
