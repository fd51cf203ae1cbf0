use std::fmt;
use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ReaderAttempt {
    pub reader: &'static str,
    pub message: String,
}

impl ReaderAttempt {
    pub fn new(reader: &'static str, message: impl Into<String>) -> Self {
        Self {
            reader,
            message: message.into(),
        }
    }
}

impl fmt::Display for ReaderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reader, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("{reader} format mismatch for {path}: {reason}")]
    FormatMismatch {
        reader: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("polars could not read {path}: {source}")]
    Polars {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("{path} has no '{column}' column")]
    MissingTimeColumn { path: PathBuf, column: &'static str },

    #[error("{path} row {row_index} has an invalid timestamp: {message}")]
    InvalidTime {
        path: PathBuf,
        row_index: usize,
        message: String,
    },

    #[error("{path} column '{column}' is not numeric: {message}")]
    InvalidColumn {
        path: PathBuf,
        column: String,
        message: String,
    },

    #[error("{path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path} columns {found:?} do not match the first file's columns {expected:?}")]
    SchemaMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("invalid file pattern for source '{source_id}': {message}")]
    Pattern { source_id: String, message: String },

    #[error("no reader recognized {path}; attempts: {attempts:?}")]
    NoMatchingReader {
        path: PathBuf,
        attempts: Vec<ReaderAttempt>,
    },
}

impl ReaderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReaderError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn polars(path: impl Into<PathBuf>, source: PolarsError) -> Self {
        ReaderError::Polars {
            path: path.into(),
            source,
        }
    }
}
