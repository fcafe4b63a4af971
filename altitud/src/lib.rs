//! # Altitud - altitude resolution library
//!
//! Resolves the altitude of arbitrary coordinates from a regular grid of
//! elevation samples, interpolating between samples and filling small gaps.
//!
//! ## Features
//!
//! - **Validated**: datasets are checked once at load time (regular spacing,
//!   no duplicates, complete boundary) and never mutated afterwards
//! - **Concurrent**: any number of threads resolve against shared `Arc`
//!   snapshots; reloads swap the grid atomically
//! - **Honest**: every answer says whether it is an exact sample, a bilinear
//!   blend or a gap fill, and misses are typed errors rather than sentinels
//!
//! ## Quick Start
//!
//! ```ignore
//! use altitud::AltitudeResolver;
//!
//! let resolver = AltitudeResolver::builder("/data/N40W004.hgt").build()?;
//! let r = resolver.resolve(40.4168, -3.7038)?;
//! println!("Altitude: {:.1}m (interpolated: {})", r.altitude, r.interpolated);
//! ```
//!
//! ## Dataset Formats
//!
//! - **Text** (`.csv`, `.xyz`, `.txt`): `lat,lon,altitude` records, see [`text`]
//! - **SRTM** (`.hgt`, `.hgt.zip`): 1201² or 3601² big-endian tiles, see [`hgt`]
//!
//! ## Resolution Rules
//!
//! | Situation | Result |
//! |-----------|--------|
//! | Outside the grid | [`AltitudeError::OutOfBounds`] |
//! | Exactly on a sample with data | that sample, `interpolated = false` |
//! | All four cell corners present | bilinear interpolation |
//! | One corner missing | inverse-distance blend of the other three |
//! | Two or more corners missing | [`AltitudeError::InsufficientData`] |

pub mod error;
#[cfg(feature = "geojson")]
pub mod geojson;
pub mod grid;
pub mod hgt;
pub mod resolver;
pub mod store;
pub mod text;

// Re-export main types at crate root for convenience
pub use error::{AltitudeError, Result};
pub use grid::{BoundingBox, Cell, ElevationGrid, GridSummary, SamplePoint};
pub use resolver::{
    resolve_in, AltitudeResolver, AltitudeResolverBuilder, Estimate, Resolution, ResolverStats,
};
pub use store::ElevationStore;
