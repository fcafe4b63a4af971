use altitud::geojson::add_altitudes_to_geometry;
use altitud::AltitudeResolver;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::load_resolver;

/// Written in place of an altitude that could not be resolved.
const VOID: &str = "void";

pub fn run(
    dataset: Option<PathBuf>,
    input: PathBuf,
    output: Option<PathBuf>,
    lat_col: String,
    lon_col: String,
) -> Result<()> {
    let resolver = load_resolver(dataset)?;

    // Detect file format
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let output_path = match extension.as_str() {
        "csv" => {
            let output = output.unwrap_or_else(|| default_output(&input, "csv"));
            let summary = process_csv(&resolver, &input, &output, &lat_col, &lon_col)?;
            println!(
                "Resolved {} of {} rows",
                summary.resolved,
                summary.resolved + summary.void
            );
            output
        }
        "geojson" | "json" => {
            let output = output.unwrap_or_else(|| default_output(&input, "geojson"));
            let skipped = process_geojson(&resolver, &input, &output)?;
            if skipped > 0 {
                println!("{} features left without altitudes", skipped);
            }
            output
        }
        _ => bail!(
            "Unsupported file format: {}. Use .csv or .geojson",
            extension
        ),
    };

    println!("Output written to: {}", output_path.display());
    Ok(())
}

/// `<stem>_altitude.<ext>` next to the input.
fn default_output(input: &Path, ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_altitude.{}", stem, ext))
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CsvSummary {
    resolved: usize,
    void: usize,
}

/// Copy `input` to `output` with an `altitude` column appended.
fn process_csv(
    resolver: &AltitudeResolver,
    input: &Path,
    output: &Path,
    lat_col: &str,
    lon_col: &str,
) -> Result<CsvSummary> {
    let file = File::open(input).context("Failed to open input file")?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    // Find column indices
    let headers = reader.headers()?.clone();
    let lat_idx = headers
        .iter()
        .position(|h| h == lat_col)
        .with_context(|| format!("Column '{}' not found in CSV", lat_col))?;
    let lon_idx = headers
        .iter()
        .position(|h| h == lon_col)
        .with_context(|| format!("Column '{}' not found in CSV", lon_col))?;

    let records: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;

    let mut coords = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let lat: f64 = record
            .get(lat_idx)
            .context("Missing latitude")?
            .trim()
            .parse()
            .with_context(|| format!("Invalid latitude on row {}", i + 1))?;
        let lon: f64 = record
            .get(lon_idx)
            .context("Missing longitude")?
            .trim()
            .parse()
            .with_context(|| format!("Invalid longitude on row {}", i + 1))?;
        coords.push((lat, lon));
    }

    let pb = progress_bar(records.len() as u64)?;

    let output_file = File::create(output).context("Failed to create output file")?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(output_file));

    let mut new_headers: Vec<&str> = headers.iter().collect();
    new_headers.push("altitude");
    writer.write_record(&new_headers)?;

    let mut summary = CsvSummary::default();
    for (record, result) in records.iter().zip(resolver.resolve_batch(&coords)) {
        let altitude = match result {
            Ok(r) => {
                summary.resolved += 1;
                format!("{:.2}", r.altitude)
            }
            Err(_) => {
                summary.void += 1;
                VOID.to_string()
            }
        };

        let mut new_record: Vec<&str> = record.iter().collect();
        new_record.push(&altitude);
        writer.write_record(&new_record)?;

        pb.inc(1);
    }

    pb.finish_with_message("done");
    writer.flush()?;

    Ok(summary)
}

/// Write `input` to `output` with altitudes as Z values.
///
/// In a feature collection, a feature whose geometry cannot be fully resolved
/// is written unchanged and counted; the count is returned.
fn process_geojson(resolver: &AltitudeResolver, input: &Path, output: &Path) -> Result<usize> {
    let file = File::open(input).context("Failed to open input file")?;
    let reader = BufReader::new(file);

    let geojson: geojson::GeoJson =
        serde_json::from_reader(reader).context("Failed to parse GeoJSON")?;

    let mut skipped = 0;
    let result = match geojson {
        geojson::GeoJson::Geometry(geometry) => {
            let enriched = add_altitudes_to_geometry(resolver, geometry)
                .context("Failed to resolve geometry")?;
            geojson::GeoJson::Geometry(enriched)
        }
        geojson::GeoJson::Feature(mut feature) => {
            if let Some(geometry) = feature.geometry.take() {
                feature.geometry = Some(
                    add_altitudes_to_geometry(resolver, geometry)
                        .context("Failed to resolve feature geometry")?,
                );
            }
            geojson::GeoJson::Feature(feature)
        }
        geojson::GeoJson::FeatureCollection(mut fc) => {
            let pb = progress_bar(fc.features.len() as u64)?;

            for feature in &mut fc.features {
                if let Some(geometry) = feature.geometry.take() {
                    feature.geometry = match add_altitudes_to_geometry(resolver, geometry.clone()) {
                        Ok(enriched) => Some(enriched),
                        Err(e) => {
                            pb.println(format!("Skipping feature: {}", e));
                            skipped += 1;
                            Some(geometry)
                        }
                    };
                }
                pb.inc(1);
            }
            pb.finish_with_message("done");
            geojson::GeoJson::FeatureCollection(fc)
        }
    };

    let output_file = File::create(output).context("Failed to create output file")?;
    let mut writer = BufWriter::new(output_file);
    serde_json::to_writer_pretty(&mut writer, &result)?;
    writer.flush()?;

    Ok(skipped)
}
