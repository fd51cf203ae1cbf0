use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use super::common::{ensure_extension, normalize_frame};
use crate::errors::ReaderError;
use crate::registry::SeriesReader;

pub struct ParquetSeriesReader;

impl SeriesReader for ParquetSeriesReader {
    fn name(&self) -> &'static str {
        "parquet"
    }

    fn read(&self, path: &Path) -> Result<DataFrame, ReaderError> {
        ensure_extension(self.name(), path, &["parquet", "pq"])?;

        let file = File::open(path).map_err(|err| ReaderError::io(path, err))?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|err| ReaderError::polars(path, err))?;

        normalize_frame(path, df)
    }
}
