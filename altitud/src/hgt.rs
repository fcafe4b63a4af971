//! SRTM `.hgt` tiles as elevation grids.
//!
//! SRTM files contain elevation data in a simple binary format:
//!
//! - **SRTM1**: 3601×3601 samples, 1 arc-second (~30m) resolution
//! - **SRTM3**: 1201×1201 samples, 3 arc-second (~90m) resolution
//!
//! Each sample is a 16-bit big-endian signed integer in meters, stored row by
//! row from the north edge. The value -32768 marks a void, which becomes a
//! no-data sample in the resulting [`ElevationGrid`].
//!
//! Tiles are named after their southwest corner: `{N|S}{lat}{E|W}{lon}.hgt`,
//! e.g. `N35E138.hgt` covers 35°N..36°N, 138°E..139°E.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{AltitudeError, Result};
use crate::grid::ElevationGrid;

/// File size for SRTM1 (1 arc-second, ~30m resolution): 3601 × 3601 × 2 bytes
const SRTM1_SIZE: usize = 3601 * 3601 * 2; // 25,934,402 bytes

/// File size for SRTM3 (3 arc-second, ~90m resolution): 1201 × 1201 × 2 bytes
const SRTM3_SIZE: usize = 1201 * 1201 * 2; // 2,884,802 bytes

/// Value indicating no data (void) in SRTM files
pub const VOID_VALUE: i16 = -32768;

/// Resolution type of an SRTM tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrtmResolution {
    /// SRTM1: 1 arc-second (~30m) resolution
    Srtm1,
    /// SRTM3: 3 arc-second (~90m) resolution
    Srtm3,
}

impl SrtmResolution {
    /// Detect the resolution from a raw tile length in bytes.
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            SRTM1_SIZE => Some(SrtmResolution::Srtm1),
            SRTM3_SIZE => Some(SrtmResolution::Srtm3),
            _ => None,
        }
    }

    /// Returns the number of samples per row/column for this resolution.
    pub fn samples(&self) -> usize {
        match self {
            SrtmResolution::Srtm1 => 3601,
            SrtmResolution::Srtm3 => 1201,
        }
    }
}

/// Parse an SRTM filename to extract the base coordinates.
///
/// Accepts a bare name or a path, with or without the `.hgt` / `.hgt.zip`
/// extension. Returns the (latitude, longitude) of the southwest corner, or
/// `None` if the name does not follow the convention.
///
/// # Examples
///
/// ```
/// use altitud::hgt::filename_to_lat_lon;
///
/// assert_eq!(filename_to_lat_lon("N35E138.hgt"), Some((35, 138)));
/// assert_eq!(filename_to_lat_lon("S12W077.hgt.zip"), Some((-12, -77)));
/// assert_eq!(filename_to_lat_lon("/path/to/N00E000.hgt"), Some((0, 0)));
/// assert_eq!(filename_to_lat_lon("invalid"), None);
/// ```
pub fn filename_to_lat_lon(filename: &str) -> Option<(i32, i32)> {
    let name = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);
    let name = strip_suffix_ignore_case(name, ".zip");
    let name = strip_suffix_ignore_case(name, ".hgt");

    // Must be exactly 7 ASCII characters: N00E000
    if name.len() != 7 || !name.is_ascii() {
        return None;
    }
    let bytes = name.as_bytes();

    let lat_sign = match bytes[0] {
        b'N' | b'n' => 1,
        b'S' | b's' => -1,
        _ => return None,
    };
    let lat: i32 = name[1..3].parse().ok()?;

    let lon_sign = match bytes[3] {
        b'E' | b'e' => 1,
        b'W' | b'w' => -1,
        _ => return None,
    };
    let lon: i32 = name[4..7].parse().ok()?;

    Some((lat * lat_sign, lon * lon_sign))
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> &'a str {
    match name.len().checked_sub(suffix.len()) {
        Some(split)
            if name.is_char_boundary(split) && name[split..].eq_ignore_ascii_case(suffix) =>
        {
            &name[..split]
        }
        _ => name,
    }
}

/// Decode raw tile bytes whose southwest corner is `(base_lat, base_lon)`.
///
/// # Errors
///
/// Returns [`AltitudeError::DatasetMalformed`] if the length matches neither
/// SRTM1 nor SRTM3.
pub fn decode(data: &[u8], base_lat: i32, base_lon: i32) -> Result<ElevationGrid> {
    let resolution = SrtmResolution::from_len(data.len()).ok_or_else(|| {
        AltitudeError::malformed(format!(
            "invalid tile size: {} bytes (expected {} for SRTM1 or {} for SRTM3)",
            data.len(),
            SRTM1_SIZE,
            SRTM3_SIZE
        ))
    })?;
    let samples = resolution.samples();
    let step = 1.0 / (samples - 1) as f64;

    // The file runs north to south; the grid wants south to north.
    let mut altitudes = Vec::with_capacity(samples * samples);
    for row in (0..samples).rev() {
        let line = &data[row * samples * 2..(row + 1) * samples * 2];
        altitudes.extend(line.chunks_exact(2).map(|b| {
            match i16::from_be_bytes([b[0], b[1]]) {
                VOID_VALUE => f64::NAN,
                v => f64::from(v),
            }
        }));
    }

    ElevationGrid::from_dense(
        f64::from(base_lat),
        f64::from(base_lon),
        step,
        step,
        samples,
        altitudes,
    )
}

/// Load a `.hgt` tile through a read-only memory map.
pub(crate) fn load(path: &Path) -> Result<ElevationGrid> {
    let (base_lat, base_lon) = base_from_path(path)?;
    let file = File::open(path)?;

    // SAFETY: Memory mapping is safe as long as the file is not modified
    // while mapped. We open the file read-only and drop the mapping once the
    // samples are decoded.
    let mmap = unsafe { Mmap::map(&file)? };
    decode(&mmap, base_lat, base_lon)
}

/// Load the first `.hgt` entry of a zip archive.
pub(crate) fn load_zip(path: &Path) -> Result<ElevationGrid> {
    let (base_lat, base_lon) = base_from_path(path)?;
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| AltitudeError::malformed(format!("{}: {}", path.display(), e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| AltitudeError::malformed(format!("{}: {}", path.display(), e)))?;
        if entry.name().to_lowercase().ends_with(".hgt") {
            // The declared size is checked before allocating, and the read is
            // capped in case the header lies.
            let size = usize::try_from(entry.size()).unwrap_or(usize::MAX);
            if SrtmResolution::from_len(size).is_none() {
                return Err(AltitudeError::malformed(format!(
                    "invalid tile size: {} bytes in {}",
                    entry.size(),
                    path.display()
                )));
            }
            let mut data = Vec::with_capacity(size);
            entry
                .by_ref()
                .take(SRTM1_SIZE as u64 + 1)
                .read_to_end(&mut data)?;
            return decode(&data, base_lat, base_lon);
        }
    }

    Err(AltitudeError::malformed(format!(
        "no .hgt file found in {}",
        path.display()
    )))
}

fn base_from_path(path: &Path) -> Result<(i32, i32)> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    filename_to_lat_lon(&name).ok_or_else(|| {
        AltitudeError::malformed(format!(
            "cannot derive tile corner from file name: {}",
            path.display()
        ))
    })
}
