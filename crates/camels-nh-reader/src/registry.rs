use std::path::Path;

use polars::prelude::DataFrame;

use crate::errors::{ReaderAttempt, ReaderError};
use crate::formats::{CsvSeriesReader, ParquetSeriesReader};

/// A file format that can produce a normalised time series frame: a `time`
/// column of `Datetime(Microseconds)` followed by `Float64` variable columns.
pub trait SeriesReader {
    fn name(&self) -> &'static str;
    fn read(&self, path: &Path) -> Result<DataFrame, ReaderError>;
}

pub fn read_series_file(path: &Path) -> Result<DataFrame, ReaderError> {
    let csv = CsvSeriesReader;
    let parquet = ParquetSeriesReader;
    let readers: [&dyn SeriesReader; 2] = [&csv, &parquet];
    read_with_readers(path, &readers)
}

pub fn read_with_readers(
    path: &Path,
    readers: &[&dyn SeriesReader],
) -> Result<DataFrame, ReaderError> {
    let mut attempts = Vec::new();

    for reader in readers {
        match reader.read(path) {
            Ok(frame) => return Ok(frame),
            Err(ReaderError::FormatMismatch { reason, .. }) => {
                attempts.push(ReaderAttempt::new(reader.name(), reason));
            }
            Err(err) => return Err(err),
        }
    }

    Err(ReaderError::NoMatchingReader {
        path: path.to_path_buf(),
        attempts,
    })
}
