use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

const COUNTRY_LEN: usize = 3;

#[derive(Debug, Error)]
pub enum BasinError {
    #[error("'{0}' is not a <CTRY>_<station> basin folder name")]
    InvalidFolderName(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A basin folder `<CTRY>_<station>` under `basin_data/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BasinId {
    pub country: String,
    pub station: String,
}

impl BasinId {
    pub fn parse(folder_name: &str) -> Result<Self, BasinError> {
        let invalid = || BasinError::InvalidFolderName(folder_name.to_string());
        let (country, station) = folder_name.split_once('_').ok_or_else(invalid)?;
        if country.chars().count() != COUNTRY_LEN || station.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            country: country.to_string(),
            station: station.to_string(),
        })
    }

    pub fn folder_name(&self) -> String {
        format!("{}_{}", self.country, self.station)
    }
}

impl fmt::Display for BasinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.country, self.station)
    }
}

/// Sorted basin folders of `basin_data_dir`. Anything that is not a
/// `<CTRY>_<station>` directory is skipped.
pub fn discover_basins(basin_data_dir: &Path) -> Result<Vec<BasinId>, BasinError> {
    let io_err = |source| BasinError::Io {
        path: basin_data_dir.to_path_buf(),
        source,
    };

    let mut basins = Vec::new();
    for entry in std::fs::read_dir(basin_data_dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !entry.path().is_dir() {
            debug!(entry = %name, "skipping non-directory in basin_data");
            continue;
        }
        match BasinId::parse(&name) {
            Ok(basin) => basins.push(basin),
            Err(_) => debug!(entry = %name, "skipping folder without a basin name"),
        }
    }

    basins.sort();
    Ok(basins)
}

/// Station identifiers from an allow-list file, one `<CTRY>_<station>` per line.
pub fn read_allowlist(path: &Path) -> Result<HashSet<String>, BasinError> {
    let text = std::fs::read_to_string(path).map_err(|source| BasinError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match BasinId::parse(line) {
            Ok(basin) => basin.station,
            Err(_) => line.to_string(),
        })
        .collect())
}
