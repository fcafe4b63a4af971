//! Error types for the Altitud library.

use thiserror::Error;

/// Errors that can occur when loading datasets or resolving altitudes.
#[derive(Error, Debug)]
pub enum AltitudeError {
    /// IO error when reading a dataset.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The dataset violates the grid invariants and cannot be served.
    #[error("Dataset malformed: {reason}")]
    DatasetMalformed { reason: String },

    /// The query lies outside the extent covered by the grid.
    #[error("Coordinates out of bounds: lat={lat}, lon={lon}")]
    OutOfBounds { lat: f64, lon: f64 },

    /// Too many corners of the enclosing cell carry no data.
    #[error("Insufficient data at lat={lat}, lon={lon}: {missing} of 4 cell corners have no data")]
    InsufficientData { lat: f64, lon: f64, missing: usize },

    /// A GeoJSON position could not be read as a coordinate.
    #[error("Invalid geometry: {reason}")]
    InvalidGeometry { reason: String },
}

impl AltitudeError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        AltitudeError::DatasetMalformed {
            reason: reason.into(),
        }
    }

    /// Returns `true` for per-query misses that callers surface as "no altitude here".
    pub fn is_query_miss(&self) -> bool {
        matches!(
            self,
            AltitudeError::OutOfBounds { .. } | AltitudeError::InsufficientData { .. }
        )
    }
}

/// Result type alias using [`AltitudeError`].
pub type Result<T> = std::result::Result<T, AltitudeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AltitudeError::malformed("duplicate sample at (1, 2)");
        assert!(err.to_string().contains("duplicate sample"));

        let err = AltitudeError::OutOfBounds {
            lat: 91.0,
            lon: 0.0,
        };
        assert!(err.to_string().contains("91"));
        assert!(err.to_string().contains("out of bounds"));

        let err = AltitudeError::InsufficientData {
            lat: 0.5,
            lon: 0.5,
            missing: 2,
        };
        assert!(err.to_string().contains("2 of 4"));
    }

    #[test]
    fn test_query_miss_classification() {
        assert!(AltitudeError::OutOfBounds { lat: 0.0, lon: 0.0 }.is_query_miss());
        assert!(AltitudeError::InsufficientData {
            lat: 0.0,
            lon: 0.0,
            missing: 3
        }
        .is_query_miss());
        assert!(!AltitudeError::malformed("x").is_query_miss());
    }
}
