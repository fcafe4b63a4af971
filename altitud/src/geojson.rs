//! GeoJSON altitude enrichment.
//!
//! Enable the `geojson` feature to use this module. Every position of a
//! geometry gets its altitude written as the Z coordinate:
//!
//! ```ignore
//! use altitud::AltitudeResolver;
//! use altitud::geojson::add_altitudes_to_geometry;
//! use geojson::Geometry;
//!
//! let resolver = AltitudeResolver::builder("/data/N40W004.hgt").build()?;
//!
//! let geometry: Geometry = r#"{"type": "Point", "coordinates": [-3.7038, 40.4168]}"#
//!     .parse()
//!     .unwrap();
//!
//! let enriched = add_altitudes_to_geometry(&resolver, geometry)?;
//! // Result: {"type": "Point", "coordinates": [-3.7038, 40.4168, 657.3]}
//! ```

use geojson::{Geometry, Value as GeoJsonValue};

use crate::error::{AltitudeError, Result};
use crate::AltitudeResolver;

/// Add altitudes to all positions in a GeoJSON geometry.
///
/// Positions are in GeoJSON order: `[longitude, latitude]` or
/// `[longitude, latitude, z]`; an existing Z value is overwritten. Every
/// geometry type is supported, including nested collections. A bounding box
/// or foreign members on the geometry are kept as they are.
///
/// # Errors
///
/// Fails on the first position that cannot be resolved:
/// - [`AltitudeError::OutOfBounds`] outside the grid
/// - [`AltitudeError::InsufficientData`] inside a gap
/// - [`AltitudeError::InvalidGeometry`] for a position with fewer than 2 elements
pub fn add_altitudes_to_geometry(
    resolver: &AltitudeResolver,
    mut geometry: Geometry,
) -> Result<Geometry> {
    geometry.value = match geometry.value {
        GeoJsonValue::Point(mut pos) => {
            add_altitude_to_position(resolver, &mut pos)?;
            GeoJsonValue::Point(pos)
        }
        GeoJsonValue::MultiPoint(mut positions) => {
            add_altitude_to_positions(resolver, &mut positions)?;
            GeoJsonValue::MultiPoint(positions)
        }
        GeoJsonValue::LineString(mut positions) => {
            add_altitude_to_positions(resolver, &mut positions)?;
            GeoJsonValue::LineString(positions)
        }
        GeoJsonValue::MultiLineString(mut lines) => {
            for line in &mut lines {
                add_altitude_to_positions(resolver, line)?;
            }
            GeoJsonValue::MultiLineString(lines)
        }
        GeoJsonValue::Polygon(mut rings) => {
            for ring in &mut rings {
                add_altitude_to_positions(resolver, ring)?;
            }
            GeoJsonValue::Polygon(rings)
        }
        GeoJsonValue::MultiPolygon(mut polygons) => {
            for ring in polygons.iter_mut().flatten() {
                add_altitude_to_positions(resolver, ring)?;
            }
            GeoJsonValue::MultiPolygon(polygons)
        }
        GeoJsonValue::GeometryCollection(geometries) => {
            let enriched: Result<Vec<_>> = geometries
                .into_iter()
                .map(|g| add_altitudes_to_geometry(resolver, g))
                .collect();
            GeoJsonValue::GeometryCollection(enriched?)
        }
    };

    Ok(geometry)
}

/// Write the altitude of a single `[lon, lat, ...]` position as its Z value.
///
/// # Errors
///
/// Returns [`AltitudeError::InvalidGeometry`] if the position has fewer than
/// 2 elements, or the resolver's error for the coordinate.
pub fn add_altitude_to_position(resolver: &AltitudeResolver, pos: &mut Vec<f64>) -> Result<()> {
    if pos.len() < 2 {
        return Err(AltitudeError::InvalidGeometry {
            reason: "position must have at least 2 elements (lon, lat)".to_string(),
        });
    }

    let (lon, lat) = (pos[0], pos[1]);
    let altitude = resolver.resolve(lat, lon)?.altitude;

    pos.truncate(2);
    pos.push(altitude);
    Ok(())
}

fn add_altitude_to_positions(resolver: &AltitudeResolver, positions: &mut [Vec<f64>]) -> Result<()> {
    for pos in positions {
        add_altitude_to_position(resolver, pos)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElevationGrid, SamplePoint};

    /// Unit square near Madrid, 10/20/30/40m at SW/SE/NW/NE.
    fn resolver() -> AltitudeResolver {
        AltitudeResolver::from_grid(
            ElevationGrid::from_samples(vec![
                SamplePoint::new(40.0, -4.0, 10.0),
                SamplePoint::new(40.0, -3.0, 20.0),
                SamplePoint::new(41.0, -4.0, 30.0),
                SamplePoint::new(41.0, -3.0, 40.0),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_add_altitude_to_position() {
        let resolver = resolver();
        let mut pos = vec![-3.5, 40.5];
        add_altitude_to_position(&resolver, &mut pos).unwrap();
        assert_eq!(pos, vec![-3.5, 40.5, 25.0]);
    }

    #[test]
    fn test_existing_z_is_overwritten() {
        let resolver = resolver();
        let mut pos = vec![-4.0, 40.0, 999.0, 1.0];
        add_altitude_to_position(&resolver, &mut pos).unwrap();
        assert_eq!(pos, vec![-4.0, 40.0, 10.0]);
    }

    #[test]
    fn test_short_position_rejected() {
        let resolver = resolver();
        let mut pos = vec![-3.5];
        let err = add_altitude_to_position(&resolver, &mut pos).unwrap_err();
        assert!(matches!(err, AltitudeError::InvalidGeometry { .. }));
    }

    #[test]
    fn test_point() {
        let geometry = Geometry::new(GeoJsonValue::Point(vec![-3.0, 41.0]));
        let result = add_altitudes_to_geometry(&resolver(), geometry).unwrap();
        match result.value {
            GeoJsonValue::Point(pos) => assert_eq!(pos[2], 40.0),
            other => panic!("Expected Point geometry, got {other:?}"),
        }
    }

    #[test]
    fn test_polygon_and_multipolygon() {
        let ring = vec![
            vec![-3.9, 40.1],
            vec![-3.1, 40.1],
            vec![-3.5, 40.9],
            vec![-3.9, 40.1],
        ];
        let geometry = Geometry::new(GeoJsonValue::MultiPolygon(vec![
            vec![ring.clone()],
            vec![ring],
        ]));
        let result = add_altitudes_to_geometry(&resolver(), geometry).unwrap();
        match result.value {
            GeoJsonValue::MultiPolygon(polygons) => {
                assert_eq!(polygons.len(), 2);
                for pos in polygons.iter().flatten().flatten() {
                    assert_eq!(pos.len(), 3);
                    assert!(pos[2] > 10.0 && pos[2] < 40.0);
                }
            }
            other => panic!("Expected MultiPolygon geometry, got {other:?}"),
        }
    }

    #[test]
    fn test_geometry_collection_and_bbox_kept() {
        let mut geometry = Geometry::new(GeoJsonValue::GeometryCollection(vec![
            Geometry::new(GeoJsonValue::Point(vec![-3.5, 40.5])),
            Geometry::new(GeoJsonValue::LineString(vec![
                vec![-4.0, 40.0],
                vec![-3.0, 41.0],
            ])),
        ]));
        geometry.bbox = Some(vec![-4.0, 40.0, -3.0, 41.0]);

        let result = add_altitudes_to_geometry(&resolver(), geometry).unwrap();
        assert_eq!(result.bbox, Some(vec![-4.0, 40.0, -3.0, 41.0]));
        match result.value {
            GeoJsonValue::GeometryCollection(geometries) => {
                assert_eq!(geometries.len(), 2);
                match &geometries[1].value {
                    GeoJsonValue::LineString(line) => {
                        assert_eq!(line[0][2], 10.0);
                        assert_eq!(line[1][2], 40.0);
                    }
                    other => panic!("Expected LineString, got {other:?}"),
                }
            }
            other => panic!("Expected GeometryCollection, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_bounds_position_fails_geometry() {
        let geometry = Geometry::new(GeoJsonValue::LineString(vec![
            vec![-3.5, 40.5],
            vec![10.0, 40.5],
        ]));
        let err = add_altitudes_to_geometry(&resolver(), geometry).unwrap_err();
        assert!(matches!(err, AltitudeError::OutOfBounds { .. }));
    }
}
