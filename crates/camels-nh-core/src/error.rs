// crates/camels-nh-core/src/error.rs

use thiserror::Error;

use crate::basin::BasinError;
use crate::config::ConfigError;
use crate::merger::MergeError;
use crate::reducer::ReduceError;
use crate::unusable::UnusableError;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read input: {0}")]
    Reader(#[from] camels_nh_reader::ReaderError),

    #[error("Daily reduction failed: {0}")]
    Reduce(#[from] ReduceError),

    #[error("Merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("Basin catalogue error: {0}")]
    Basin(#[from] BasinError),

    #[error("Unusable basin table error: {0}")]
    Unusable(#[from] UnusableError),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker pool could not be built: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
