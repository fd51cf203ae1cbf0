use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::errors::ReaderError;
use crate::formats::TIME_COLUMN;
use crate::registry::read_series_file;

/// Appended to the basin folder name to form the observation file stem.
pub const TARGET_FILE_SUFFIX: &str = "_daily_flow_observations";

const TARGET_EXTENSIONS: [&str; 2] = ["csv", "parquet"];

/// Locates `<basin>_daily_flow_observations.{csv,parquet}` inside `folder`.
pub fn find_target_file(folder: &Path, basin_folder: &str) -> Result<PathBuf, ReaderError> {
    let stem = format!("{basin_folder}{TARGET_FILE_SUFFIX}");
    for extension in TARGET_EXTENSIONS {
        let candidate = folder.join(format!("{stem}.{extension}"));
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(ReaderError::io(
        folder.join(format!("{stem}.{}", TARGET_EXTENSIONS[0])),
        std::io::Error::new(std::io::ErrorKind::NotFound, "observation file not found"),
    ))
}

/// Reads a daily observation file and keeps `time` plus `target_vars`, in the
/// configured order.
pub fn load_target(path: &Path, target_vars: &[String]) -> Result<DataFrame, ReaderError> {
    let frame = read_series_file(path)?;

    for variable in target_vars {
        if frame.get_column_index(variable).is_none() {
            return Err(ReaderError::MissingColumn {
                path: path.to_path_buf(),
                column: variable.clone(),
            });
        }
    }

    let selection = std::iter::once(TIME_COLUMN).chain(target_vars.iter().map(String::as_str));
    frame
        .select(selection)
        .map_err(|err| ReaderError::polars(path, err))
}
