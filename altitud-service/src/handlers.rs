//! HTTP request handlers for the altitude service.

use altitud::{AltitudeError, GridSummary, Resolution};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use geojson::Geometry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::AppState;

/// Message returned when `/altitudes` is called without any location.
pub const NO_LOCATIONS_MESSAGE: &str = "Altitude Request should bring locations";

/// Query parameters for the single altitude endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AltitudeQuery {
    /// Latitude in decimal degrees (-90 to 90).
    pub lat: f64,
    /// Longitude in decimal degrees (-180 to 180).
    pub lon: f64,
}

/// Query parameters for the multi-location endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocationsQuery {
    /// `lat,lon` pairs separated by `|`, e.g. `40.41,-3.70|40.42,-3.71`.
    pub locations: Option<String>,
}

/// Successful altitude response.
#[derive(Debug, Serialize, ToSchema)]
pub struct AltitudeResponse {
    /// Altitude in meters.
    pub altitude: f64,
    /// Latitude queried.
    pub lat: f64,
    /// Longitude queried.
    pub lon: f64,
    /// `false` only when the query matched a sample exactly.
    pub interpolated: bool,
    /// How the value was obtained: `exact`, `bilinear` or `gap_filled`.
    pub estimate: String,
}

impl AltitudeResponse {
    fn new(lat: f64, lon: f64, resolution: Resolution) -> Self {
        Self {
            altitude: resolution.altitude,
            lat,
            lon,
            interpolated: resolution.interpolated,
            estimate: resolution.estimate.as_str().to_string(),
        }
    }
}

/// Outcome for one location of a multi-location request.
///
/// Either the altitude fields or `error`/`kind` are present.
#[derive(Debug, Serialize, ToSchema)]
pub struct LocationResult {
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpolated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl LocationResult {
    fn new(lat: f64, lon: f64, result: altitud::Result<Resolution>) -> Self {
        match result {
            Ok(r) => Self {
                lat,
                lon,
                altitude: Some(r.altitude),
                interpolated: Some(r.interpolated),
                estimate: Some(r.estimate.as_str().to_string()),
                error: None,
                kind: None,
            },
            Err(e) => Self {
                lat,
                lon,
                altitude: None,
                interpolated: None,
                estimate: None,
                kind: Some(error_kind(&e).to_string()),
                error: Some(e.to_string()),
            },
        }
    }
}

/// Multi-location response, one result per location in request order.
#[derive(Debug, Serialize, ToSchema)]
pub struct LocationsResponse {
    pub results: Vec<LocationResult>,
}

/// Error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
    /// Machine-readable error kind, e.g. `out_of_bounds`.
    pub kind: String,
}

/// Description of the grid being served.
#[derive(Debug, Serialize, ToSchema)]
pub struct GridResponse {
    pub rows: usize,
    pub cols: usize,
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
    pub lat_step: f64,
    pub lon_step: f64,
    /// Lattice positions without data.
    pub missing: usize,
    pub min_altitude: Option<f64>,
    pub max_altitude: Option<f64>,
}

impl From<GridSummary> for GridResponse {
    fn from(s: GridSummary) -> Self {
        Self {
            rows: s.rows,
            cols: s.cols,
            min_lat: s.extent.min_lat,
            min_lon: s.extent.min_lon,
            max_lat: s.extent.max_lat,
            max_lon: s.extent.max_lon,
            lat_step: s.lat_step,
            lon_step: s.lon_step,
            missing: s.missing,
            min_altitude: s.min_altitude,
            max_altitude: s.max_altitude,
        }
    }
}

/// Successful reload response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReloadResponse {
    /// Generation now being served.
    pub generation: u64,
    pub grid: GridResponse,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Resolution statistics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub total_queries: u64,
    pub exact: u64,
    pub bilinear: u64,
    pub gap_filled: u64,
    pub out_of_bounds: u64,
    pub insufficient_data: u64,
    /// Fraction of queries that produced an altitude (0.0 to 1.0).
    pub resolved_rate: f64,
    /// Number of grids installed since startup.
    pub generation: u64,
    pub grid: GridResponse,
}

/// Get the altitude at a coordinate.
#[utoipa::path(
    get,
    path = "/altitude",
    tag = "altitude",
    params(AltitudeQuery),
    responses(
        (status = 200, description = "Altitude resolved", body = AltitudeResponse),
        (status = 400, description = "Coordinates outside the valid ranges", body = ErrorResponse),
        (status = 404, description = "Outside the grid or not enough data around the point", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn get_altitude(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AltitudeQuery>,
) -> Response {
    tracing::debug!(lat = query.lat, lon = query.lon, "Altitude query");

    if let Err(message) = validate_coordinates(query.lat, query.lon) {
        return bad_request(message);
    }

    match state.resolver.resolve(query.lat, query.lon) {
        Ok(resolution) => {
            tracing::info!(
                lat = query.lat,
                lon = query.lon,
                altitude = resolution.altitude,
                estimate = resolution.estimate.as_str(),
                "Altitude found"
            );
            (
                StatusCode::OK,
                Json(AltitudeResponse::new(query.lat, query.lon, resolution)),
            )
                .into_response()
        }
        Err(e) => error_response(query.lat, query.lon, e),
    }
}

/// Get altitudes for several `lat,lon` locations at once.
///
/// Per-location failures are reported inline; the request itself only fails
/// when `locations` is missing, empty or malformed.
#[utoipa::path(
    get,
    path = "/altitudes",
    tag = "altitude",
    params(LocationsQuery),
    responses(
        (status = 200, description = "One result per location, in request order", body = LocationsResponse),
        (status = 400, description = "Missing or malformed locations", body = ErrorResponse)
    )
)]
pub async fn get_altitudes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LocationsQuery>,
) -> Response {
    let coords = match parse_locations(query.locations.as_deref().unwrap_or("")) {
        Ok(coords) => coords,
        Err(message) => return bad_request(message),
    };

    let results: Vec<LocationResult> = coords
        .iter()
        .zip(state.resolver.resolve_batch(&coords))
        .map(|(&(lat, lon), result)| LocationResult::new(lat, lon, result))
        .collect();

    tracing::info!(
        locations = results.len(),
        resolved = results.iter().filter(|r| r.altitude.is_some()).count(),
        "Altitudes resolved"
    );

    (StatusCode::OK, Json(LocationsResponse { results })).into_response()
}

/// Add altitudes to every position of a GeoJSON geometry.
#[utoipa::path(
    post,
    path = "/altitude",
    tag = "altitude",
    request_body(content = serde_json::Value, description = "GeoJSON geometry with [lon, lat] positions", content_type = "application/json"),
    responses(
        (status = 200, description = "Geometry with altitudes as Z values", body = serde_json::Value),
        (status = 400, description = "A position could not be resolved", body = ErrorResponse)
    )
)]
pub async fn post_altitude(
    State(state): State<Arc<AppState>>,
    Json(geometry): Json<Geometry>,
) -> Response {
    match altitud::geojson::add_altitudes_to_geometry(&state.resolver, geometry) {
        Ok(enriched) => (StatusCode::OK, Json(enriched)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "GeoJSON altitude query failed");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    kind: error_kind(&e).to_string(),
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Re-read the dataset and swap it in.
///
/// On failure the previous grid keeps serving.
#[utoipa::path(
    post,
    path = "/reload",
    tag = "system",
    responses(
        (status = 200, description = "New grid installed", body = ReloadResponse),
        (status = 500, description = "Reload failed, previous grid still serving", body = ErrorResponse)
    )
)]
pub async fn reload_dataset(State(state): State<Arc<AppState>>) -> Response {
    let task_state = Arc::clone(&state);
    let outcome = tokio::task::spawn_blocking(move || task_state.resolver.reload()).await;

    let error = match outcome {
        Ok(Ok(generation)) => {
            let grid = GridResponse::from(state.resolver.store().summary());
            tracing::info!(
                generation,
                rows = grid.rows,
                cols = grid.cols,
                missing = grid.missing,
                "Dataset reloaded"
            );
            return (StatusCode::OK, Json(ReloadResponse { generation, grid })).into_response();
        }
        Ok(Err(e)) => ErrorResponse {
            kind: error_kind(&e).to_string(),
            error: e.to_string(),
        },
        Err(e) => ErrorResponse {
            kind: "internal".to_string(),
            error: e.to_string(),
        },
    };

    tracing::error!(error = %error.error, "Dataset reload failed, keeping previous grid");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
}

/// Health check endpoint.
///
/// Returns service status and version.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get resolution statistics and a summary of the served grid.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "system",
    responses((status = 200, description = "Resolution counters", body = StatsResponse))
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let stats = state.resolver.stats();
    let (grid, generation) = state.resolver.store().versioned_snapshot();

    Json(StatsResponse {
        total_queries: stats.total(),
        exact: stats.exact,
        bilinear: stats.bilinear,
        gap_filled: stats.gap_filled,
        out_of_bounds: stats.out_of_bounds,
        insufficient_data: stats.insufficient_data,
        resolved_rate: stats.resolved_rate(),
        generation,
        grid: grid.summary().into(),
    })
}

/// Machine-readable name of an error, used as `kind` in responses.
pub fn error_kind(e: &AltitudeError) -> &'static str {
    match e {
        AltitudeError::Io(_) => "io",
        AltitudeError::DatasetMalformed { .. } => "dataset_malformed",
        AltitudeError::OutOfBounds { .. } => "out_of_bounds",
        AltitudeError::InsufficientData { .. } => "insufficient_data",
        AltitudeError::InvalidGeometry { .. } => "invalid_geometry",
    }
}

/// Parse `lat,lon|lat,lon|...` into coordinate pairs.
pub fn parse_locations(raw: &str) -> Result<Vec<(f64, f64)>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(NO_LOCATIONS_MESSAGE.to_string());
    }

    raw.split('|')
        .map(|location| {
            let mut parts = location.split(',').map(|p| p.trim().parse::<f64>());
            match (parts.next(), parts.next(), parts.next()) {
                (Some(Ok(lat)), Some(Ok(lon)), None) => {
                    validate_coordinates(lat, lon)?;
                    Ok((lat, lon))
                }
                _ => Err(format!(
                    "Invalid location {:?}, expected \"lat,lon\"",
                    location.trim()
                )),
            }
        })
        .collect()
}

fn validate_coordinates(lat: f64, lon: f64) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("Invalid latitude {}: must be within [-90, 90]", lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(format!("Invalid longitude {}: must be within [-180, 180]", lon));
    }
    Ok(())
}

fn bad_request(message: String) -> Response {
    tracing::warn!(error = %message, "Rejected altitude request");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message,
            kind: "invalid_request".to_string(),
        }),
    )
        .into_response()
}

/// Create an error response for a failed single-point query.
fn error_response(lat: f64, lon: f64, e: AltitudeError) -> Response {
    let status = if e.is_query_miss() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    tracing::warn!(lat = lat, lon = lon, error = %e, "Altitude query failed");

    (
        status,
        Json(ErrorResponse {
            kind: error_kind(&e).to_string(),
            error: e.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use altitud::{AltitudeResolver, ElevationGrid, SamplePoint};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> axum::Router {
        let grid = ElevationGrid::from_samples(vec![
            SamplePoint::new(0.0, 0.0, 10.0),
            SamplePoint::new(0.0, 1.0, 20.0),
            SamplePoint::new(1.0, 0.0, 30.0),
            SamplePoint::new(1.0, 1.0, 40.0),
        ])
        .unwrap();
        crate::router(Arc::new(AppState {
            resolver: AltitudeResolver::from_grid(grid),
        }))
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn test_parse_locations() {
        assert_eq!(
            parse_locations("40.41,-3.70 | 40.42,-3.71").unwrap(),
            vec![(40.41, -3.70), (40.42, -3.71)]
        );
        assert_eq!(
            parse_locations("  ").unwrap_err(),
            "Altitude Request should bring locations"
        );
        assert!(parse_locations("40.41").is_err());
        assert!(parse_locations("40.41,-3.70,5").is_err());
        assert!(parse_locations("40.41,-3.70|").is_err());
        assert!(parse_locations("north,-3.70").is_err());
        assert!(parse_locations("91,0").unwrap_err().contains("latitude"));
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(90.0, -180.0).is_ok());
        assert!(validate_coordinates(-90.1, 0.0).is_err());
        assert!(validate_coordinates(0.0, 180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            error_kind(&AltitudeError::OutOfBounds { lat: 0.0, lon: 0.0 }),
            "out_of_bounds"
        );
        assert_eq!(
            error_kind(&AltitudeError::InsufficientData {
                lat: 0.0,
                lon: 0.0,
                missing: 2
            }),
            "insufficient_data"
        );
    }

    #[test]
    fn test_location_result_serialize() {
        let miss = LocationResult::new(
            5.0,
            5.0,
            Err(AltitudeError::OutOfBounds { lat: 5.0, lon: 5.0 }),
        );
        let json = serde_json::to_value(&miss).unwrap();
        assert_eq!(json["kind"], "out_of_bounds");
        assert!(json.get("altitude").is_none());
    }

    #[tokio::test]
    async fn test_get_altitude_oneshot() {
        let (status, json) = get_json("/altitude?lat=0.5&lon=0.5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["altitude"], 25.0);
        assert_eq!(json["interpolated"], true);
        assert_eq!(json["estimate"], "bilinear");
    }

    #[tokio::test]
    async fn test_health_oneshot() {
        let (status, json) = get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
    }
}
