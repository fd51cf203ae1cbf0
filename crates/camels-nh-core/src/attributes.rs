use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::config::ConvertConfig;
use crate::error::Result;

pub const ATTRIBUTES_FILE: &str = "camels_spat_attributes.csv";

#[derive(Debug, Clone)]
pub struct AttributesExport {
    pub destination: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

/// Re-writes `<source_root>/camels_spat_attributes.csv` into `dest_dir`,
/// creating the directory when needed.
pub fn export_attributes(config: &ConvertConfig, dest_dir: &Path) -> Result<AttributesExport> {
    let source = config.paths.source_root.join(ATTRIBUTES_FILE);
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(source.clone()))?
        .finish()?;

    fs::create_dir_all(dest_dir)?;
    let destination = dest_dir.join(ATTRIBUTES_FILE);
    let file = File::create(&destination)?;
    CsvWriter::new(file).include_header(true).finish(&mut df)?;

    info!(
        source = %source.display(),
        destination = %destination.display(),
        rows = df.height(),
        columns = df.width(),
        "exported basin attributes"
    );

    Ok(AttributesExport {
        destination,
        rows: df.height(),
        columns: df.width(),
    })
}
