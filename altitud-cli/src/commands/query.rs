use altitud::AltitudeError;
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use super::load_resolver;

#[derive(Serialize)]
struct AltitudeResponse {
    lat: f64,
    lon: f64,
    altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interpolated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    estimate: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(dataset: Option<PathBuf>, lat: f64, lon: f64, json: bool) -> Result<()> {
    let resolver = load_resolver(dataset)?;

    let result = resolver.resolve(lat, lon);

    // Misses are answers, not failures; anything else aborts.
    if let Err(e) = &result {
        if !e.is_query_miss() {
            return Err(anyhow::anyhow!("Failed to resolve altitude: {}", e));
        }
    }

    if json {
        println!("{}", serde_json::to_string(&response(lat, lon, result))?);
    } else {
        match result {
            Ok(r) => println!("{:.2}", r.altitude),
            Err(e) => println!("void ({})", e),
        }
    }

    Ok(())
}

fn response(lat: f64, lon: f64, result: altitud::Result<altitud::Resolution>) -> AltitudeResponse {
    match result {
        Ok(r) => AltitudeResponse {
            lat,
            lon,
            altitude: Some(r.altitude),
            interpolated: Some(r.interpolated),
            estimate: Some(r.estimate.as_str()),
            error: None,
        },
        Err(e) => AltitudeResponse {
            lat,
            lon,
            altitude: None,
            interpolated: None,
            estimate: None,
            error: Some(error_message(&e)),
        },
    }
}

fn error_message(e: &AltitudeError) -> String {
    match e {
        AltitudeError::OutOfBounds { .. } => "out_of_bounds".to_string(),
        AltitudeError::InsufficientData { .. } => "insufficient_data".to_string(),
        other => other.to_string(),
    }
}
