mod common;
mod csv;
mod parquet;

pub use self::csv::CsvSeriesReader;
pub use self::parquet::ParquetSeriesReader;
pub use common::{drop_duplicate_keys, HRU_COLUMN, TIME_COLUMN};

pub(crate) use common::{ensure_extension, normalize_frame};
