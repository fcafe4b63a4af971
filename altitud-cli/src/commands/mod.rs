pub mod batch;
pub mod info;
pub mod query;

use altitud::{AltitudeResolver, AltitudeResolverBuilder};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Load the dataset given on the command line, or from `ALTITUD_DATASET`.
pub fn load_resolver(dataset: Option<PathBuf>) -> Result<AltitudeResolver> {
    let builder = match dataset {
        Some(path) => AltitudeResolverBuilder::new(path),
        None => AltitudeResolverBuilder::from_env().context(
            "ALTITUD_DATASET environment variable not set. Use --dataset or set ALTITUD_DATASET",
        )?,
    };

    builder.build().context("Failed to load dataset")
}
