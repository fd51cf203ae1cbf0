use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::UnusableConfig;

#[derive(Debug, Error)]
pub enum UnusableError {
    #[error("failed to read unusable basin table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("unusable basin table {path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },
}

/// Station identifiers that must never be converted, read once per run.
#[derive(Debug, Clone, Default)]
pub struct UnusableBasins {
    stations: BTreeSet<String>,
}

impl UnusableBasins {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads `path` and keeps the rows whose reason contains `config.reason_filter`
    /// (case-insensitive). Without a filter every row counts.
    pub fn load(path: &Path, config: &UnusableConfig) -> Result<Self, UnusableError> {
        let csv_err = |source| UnusableError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(csv_err)?;

        let headers = reader.headers().map_err(csv_err)?.clone();
        let column_index = |column: &str| {
            headers
                .iter()
                .position(|header| header.trim() == column)
                .ok_or_else(|| UnusableError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                })
        };
        let id_index = column_index(&config.id_column)?;
        let filter = config.reason_filter.as_ref().map(|f| f.to_lowercase());
        let reason_index = match filter {
            Some(_) => Some(column_index(&config.reason_column)?),
            None => None,
        };

        let mut stations = BTreeSet::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            let Some(station) = record.get(id_index).map(str::trim) else {
                continue;
            };
            if station.is_empty() {
                continue;
            }
            if let (Some(filter), Some(index)) = (&filter, reason_index) {
                let reason = record.get(index).unwrap_or("").to_lowercase();
                if !reason.contains(filter.as_str()) {
                    continue;
                }
            }
            stations.insert(station.to_string());
        }

        info!(
            table = %path.display(),
            count = stations.len(),
            "loaded unusable basins"
        );
        Ok(Self { stations })
    }

    pub fn contains(&self, station: &str) -> bool {
        self.stations.contains(station)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.stations.iter().map(String::as_str)
    }
}
