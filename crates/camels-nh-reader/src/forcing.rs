use std::path::{Path, PathBuf};

use glob::Pattern;
use polars::prelude::*;
use tracing::{debug, warn};

use crate::errors::ReaderError;
use crate::formats::{drop_duplicate_keys, TIME_COLUMN};
use crate::registry::read_series_file;

/// File names carrying this marker are partial downloads and never loaded.
pub const TEMP_MARKER: &str = ".tmp";

/// One source's sub-daily series for a basin, concatenated across files.
#[derive(Debug, Clone)]
pub struct SourceSeries {
    pub source: String,
    pub frame: DataFrame,
    pub file_count: usize,
    pub duplicates_dropped: usize,
}

/// Lists the forcing files in `folder` whose name contains `source`, skipping
/// temporary files, in lexicographic file name order.
pub fn list_forcing_files(folder: &Path, source: &str) -> Result<Vec<PathBuf>, ReaderError> {
    if !folder.is_dir() {
        return Err(ReaderError::io(
            folder,
            std::io::Error::new(std::io::ErrorKind::NotFound, "forcing folder not found"),
        ));
    }

    let folder_str = folder.to_str().ok_or_else(|| ReaderError::Pattern {
        source_id: source.to_string(),
        message: format!("folder path {} is not valid UTF-8", folder.display()),
    })?;
    let pattern = format!(
        "{}/*{}*",
        Pattern::escape(folder_str),
        Pattern::escape(source)
    );

    let entries = glob::glob(&pattern).map_err(|err| ReaderError::Pattern {
        source_id: source.to_string(),
        message: err.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| {
            let path = err.path().to_path_buf();
            ReaderError::io(path, err.into_error())
        })?;
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if name.contains(TEMP_MARKER) {
            debug!(file = name, "skipping temporary forcing file");
            continue;
        }
        files.push(path);
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Loads every forcing file of `source` in `folder` into one time-ordered
/// series. `None` means the source has no files for this basin.
///
/// Files are stacked in file name order, stable-sorted on `time`, and repeated
/// timestamps (overlapping download batches) keep their first occurrence.
pub fn load_source(folder: &Path, source: &str) -> Result<Option<SourceSeries>, ReaderError> {
    let files = list_forcing_files(folder, source)?;
    debug!(
        source,
        folder = %folder.display(),
        files = files.len(),
        "listed forcing files"
    );

    if files.is_empty() {
        return Ok(None);
    }

    let stacked = stack_files(&files)?;
    let sorted = stacked
        .sort(
            [TIME_COLUMN],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .map_err(|err| ReaderError::polars(folder, err))?;
    let (frame, duplicates_dropped) =
        drop_duplicate_keys(&sorted, TIME_COLUMN).map_err(|err| ReaderError::polars(folder, err))?;

    if duplicates_dropped > 0 {
        warn!(
            source,
            folder = %folder.display(),
            duplicates_dropped,
            "dropped repeated timestamps across forcing files"
        );
    }

    Ok(Some(SourceSeries {
        source: source.to_string(),
        frame,
        file_count: files.len(),
        duplicates_dropped,
    }))
}

fn stack_files(files: &[PathBuf]) -> Result<DataFrame, ReaderError> {
    let mut iter = files.iter();
    let Some(first_path) = iter.next() else {
        return Ok(DataFrame::default());
    };

    let mut combined = read_series_file(first_path)?;
    let expected: Vec<String> = column_names(&combined);
    let mut expected_sorted = expected.clone();
    expected_sorted.sort();

    for path in iter {
        let frame = read_series_file(path)?;
        let found = column_names(&frame);
        let mut found_sorted = found.clone();
        found_sorted.sort();
        if found_sorted != expected_sorted {
            return Err(ReaderError::SchemaMismatch {
                path: path.clone(),
                expected,
                found,
            });
        }

        let aligned = frame
            .select(expected.iter().map(|name| name.as_str()))
            .map_err(|err| ReaderError::polars(path, err))?;
        combined
            .vstack_mut(&aligned)
            .map_err(|err| ReaderError::polars(path, err))?;
    }

    Ok(combined)
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names_str()
        .into_iter()
        .map(str::to_string)
        .collect()
}
