//! Altitud Service - HTTP microservice for altitude queries.
//!
//! Serves altitudes resolved from a single regular elevation grid.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ALTITUD_DATASET` | Dataset file (`.csv`, `.xyz`, `.txt`, `.hgt`, `.hgt.zip`) | Required |
//! | `ALTITUD_PORT` | HTTP server port | 8080 |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `GET /altitude?lat=X&lon=Y` - Altitude at a coordinate
//! - `GET /altitudes?locations=lat,lon|lat,lon` - Altitudes at several coordinates
//! - `POST /altitude` - Add altitudes to a GeoJSON geometry
//! - `POST /reload` - Re-read the dataset
//! - `GET /health` - Health check
//! - `GET /stats` - Resolution statistics
//! - `GET /docs` - OpenAPI documentation (Swagger UI)

use std::net::SocketAddr;
use std::sync::Arc;

use altitud::AltitudeResolverBuilder;
use altitud_service::{router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "altitud_service=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load port from environment (service-specific config)
    let port: u16 = std::env::var("ALTITUD_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    // The dataset is required: a service without a valid grid must not start.
    let resolver = AltitudeResolverBuilder::from_env()
        .and_then(|builder| builder.build())
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load dataset");
            e
        })?;

    let summary = resolver.store().summary();
    tracing::info!(
        dataset = ?resolver.store().source(),
        rows = summary.rows,
        cols = summary.cols,
        missing = summary.missing,
        port = port,
        "Starting altitud service"
    );

    let app = router(Arc::new(AppState { resolver }));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
