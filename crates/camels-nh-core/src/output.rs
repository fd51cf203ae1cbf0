use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::warn;

use crate::error::{ConvertError, Result};

/// Suffix of the scratch file a basin is written to before it is renamed into
/// place.
pub const PARTIAL_SUFFIX: &str = ".tmp";

pub fn output_path(group_dir: &Path, station: &str) -> PathBuf {
    group_dir.join(format!("{station}.csv"))
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Writes `df` as CSV with a header row. The file only appears at `path` once
/// it is complete; a failed write leaves nothing behind.
pub fn write_basin_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let partial = partial_path(path);
    let written = write_csv(df, &partial)
        .and_then(|()| fs::rename(&partial, path).map_err(ConvertError::from));

    if written.is_err() && partial.exists() {
        if let Err(err) = fs::remove_file(&partial) {
            warn!(path = %partial.display(), error = %err, "failed to remove partial output");
        }
    }
    written
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    CsvWriter::new(&mut writer)
        .include_header(true)
        .finish(df)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path(), "01AB001");
        let mut df = df!["date" => &["2010-01-01"], "q_obs" => &[1.5]].unwrap();

        write_basin_csv(&mut df, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().next(), Some("date,q_obs"));
        assert!(!partial_path(&path).exists());
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("01AB001.csv")
        );
    }

    #[test]
    fn failed_rename_removes_the_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path(), "01AB001");
        fs::create_dir_all(path.join("occupied")).unwrap();
        let mut df = df!["date" => &["2010-01-01"], "q_obs" => &[1.5]].unwrap();

        assert!(write_basin_csv(&mut df, &path).is_err());
        assert!(!partial_path(&path).exists());
        assert!(path.join("occupied").is_dir());
    }
}
