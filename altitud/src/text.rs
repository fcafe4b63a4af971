//! Text lattice datasets.
//!
//! A text dataset is a CSV file with one sample per line:
//!
//! ```text
//! lat,lon,altitude
//! 40.00,-3.70,655.0
//! 40.00,-3.69,nodata
//! ```
//!
//! Column names may also be `latitude`, `longitude`/`lng` and
//! `elevation`/`alt`. An empty altitude or one of `nodata`, `null`, `void`,
//! `nan` (any case) marks a sample without data. Lines starting with `#` are
//! ignored.

use std::io::Read;

use serde::Deserialize;

use crate::error::{AltitudeError, Result};
use crate::grid::{ElevationGrid, SamplePoint};

const NO_DATA_MARKERS: [&str; 4] = ["nodata", "null", "void", "nan"];

#[derive(Debug, Deserialize)]
struct SampleRecord {
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude", alias = "lng")]
    lon: f64,
    #[serde(alias = "elevation", alias = "alt", default)]
    altitude: Option<String>,
}

impl ElevationGrid {
    /// Read a `lat,lon,altitude` CSV lattice and validate it into a grid.
    ///
    /// # Errors
    ///
    /// Returns [`AltitudeError::DatasetMalformed`] for unreadable records or
    /// altitudes, and for any lattice invariant the samples break.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut samples = Vec::new();
        for record in csv_reader.deserialize::<SampleRecord>() {
            let record = record.map_err(|e| {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                AltitudeError::malformed(format!("unreadable record on line {}: {}", line, e))
            })?;
            let altitude = parse_altitude(record.altitude.as_deref()).ok_or_else(|| {
                AltitudeError::malformed(format!(
                    "invalid altitude {:?} at lat={}, lon={}",
                    record.altitude.unwrap_or_default(),
                    record.lat,
                    record.lon
                ))
            })?;
            samples.push(SamplePoint {
                lat: record.lat,
                lon: record.lon,
                altitude,
            });
        }

        Self::from_samples(samples)
    }
}

/// `Some(None)` for a no-data marker, `Some(Some(v))` for a number, `None`
/// when the field is neither.
fn parse_altitude(field: Option<&str>) -> Option<Option<f64>> {
    let field = field.unwrap_or("").trim();
    if field.is_empty()
        || NO_DATA_MARKERS
            .iter()
            .any(|m| field.eq_ignore_ascii_case(m))
    {
        return Some(None);
    }
    field.parse::<f64>().ok().filter(|v| v.is_finite()).map(Some)
}
