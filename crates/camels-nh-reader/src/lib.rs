pub mod errors;
pub mod forcing;
pub mod formats;
mod registry;
pub mod target;

pub use errors::{ReaderAttempt, ReaderError};
pub use forcing::{list_forcing_files, load_source, SourceSeries, TEMP_MARKER};
pub use formats::{drop_duplicate_keys, HRU_COLUMN, TIME_COLUMN};
pub use registry::{read_series_file, read_with_readers, SeriesReader};
pub use target::{find_target_file, load_target, TARGET_FILE_SUFFIX};

#[cfg(test)]
mod tests;
