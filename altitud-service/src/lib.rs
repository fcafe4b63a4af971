//! Altitud Service Library
//!
//! HTTP handlers, OpenAPI document and router for the altitude service.
//! This library is used by both the altitud-service binary and integration tests.

pub mod handlers;

use std::sync::Arc;

use altitud::AltitudeResolver;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers.
pub struct AppState {
    /// Resolver over the served dataset.
    pub resolver: AltitudeResolver,
}

/// OpenAPI documentation for the altitude service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Altitud Service",
        version = "0.1.0",
        description = "REST API resolving altitudes from a regular elevation grid.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        handlers::get_altitude,
        handlers::get_altitudes,
        handlers::post_altitude,
        handlers::reload_dataset,
        handlers::health_check,
        handlers::get_stats,
    ),
    components(
        schemas(
            handlers::AltitudeResponse,
            handlers::LocationResult,
            handlers::LocationsResponse,
            handlers::ErrorResponse,
            handlers::GridResponse,
            handlers::ReloadResponse,
            handlers::HealthResponse,
            handlers::StatsResponse,
        )
    ),
    tags(
        (name = "altitude", description = "Altitude query endpoints"),
        (name = "system", description = "System, dataset and health endpoints")
    )
)]
pub struct ApiDoc;

/// Build the service router: API routes, Swagger UI at `/docs`, request
/// tracing and permissive CORS.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route(
            "/altitude",
            get(handlers::get_altitude).post(handlers::post_altitude),
        )
        .route("/altitudes", get(handlers::get_altitudes))
        .route("/reload", post(handlers::reload_dataset))
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// Re-export commonly used types for convenience
pub use handlers::{
    AltitudeQuery, AltitudeResponse, ErrorResponse, GridResponse, HealthResponse,
    LocationResult, LocationsQuery, LocationsResponse, ReloadResponse, StatsResponse,
};
