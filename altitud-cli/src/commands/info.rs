use anyhow::Result;
use std::path::PathBuf;

use super::load_resolver;

pub fn run(dataset: Option<PathBuf>) -> Result<()> {
    let resolver = load_resolver(dataset)?;
    let store = resolver.store();
    let summary = store.summary();

    if let Some(path) = store.source() {
        println!("Dataset: {}", path.display());
        if let Ok(metadata) = std::fs::metadata(path) {
            println!("File size: {}", format_size(metadata.len()));
        }
    }
    println!();

    println!("Grid: {} rows x {} cols", summary.rows, summary.cols);
    println!(
        "Coverage: lat {} to {}, lon {} to {}",
        summary.extent.min_lat, summary.extent.max_lat, summary.extent.min_lon, summary.extent.max_lon
    );
    println!(
        "Spacing: {}° lat x {}° lon",
        summary.lat_step, summary.lon_step
    );
    println!();

    if let (Some(min), Some(max)) = (summary.min_altitude, summary.max_altitude) {
        println!("Min altitude: {:.2}m", min);
        println!("Max altitude: {:.2}m", max);
    }

    let total_samples = (summary.rows * summary.cols) as u64;
    if summary.missing > 0 {
        let missing_pct = (summary.missing as f64 / total_samples as f64) * 100.0;
        println!("No-data samples: {} ({:.1}%)", summary.missing, missing_pct);
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
