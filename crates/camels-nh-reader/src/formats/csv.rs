use std::path::Path;

use polars::prelude::*;

use super::common::{ensure_extension, normalize_frame};
use crate::errors::ReaderError;
use crate::registry::SeriesReader;

/// Comma separated files with a header row and a `time` column.
pub struct CsvSeriesReader;

impl SeriesReader for CsvSeriesReader {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn read(&self, path: &Path) -> Result<DataFrame, ReaderError> {
        ensure_extension(self.name(), path, &["csv"])?;

        // Scan every row for inference; forcing columns flip between integer
        // and float text deep into multi-year files.
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .map_err(|err| ReaderError::polars(path, err))?
            .finish()
            .map_err(|err| ReaderError::polars(path, err))?;

        normalize_frame(path, df)
    }
}
