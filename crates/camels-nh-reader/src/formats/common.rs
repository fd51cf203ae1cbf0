use std::collections::HashSet;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;

use crate::errors::ReaderError;

pub const TIME_COLUMN: &str = "time";
pub const HRU_COLUMN: &str = "hru";

static TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

pub(crate) fn ensure_extension(
    reader: &'static str,
    path: &Path,
    accepted: &[&str],
) -> Result<(), ReaderError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension {
        Some(ext) if accepted.contains(&ext.as_str()) => Ok(()),
        Some(ext) => Err(ReaderError::FormatMismatch {
            reader,
            path: path.to_path_buf(),
            reason: format!("unsupported extension '{ext}'"),
        }),
        None => Err(ReaderError::FormatMismatch {
            reader,
            path: path.to_path_buf(),
            reason: "file has no extension".to_string(),
        }),
    }
}

/// Brings a freshly read frame into the shape every downstream stage expects:
/// `time` first as a naive microsecond datetime, the lumped `hru` coordinate
/// removed, and every other column cast to `Float64`.
pub(crate) fn normalize_frame(path: &Path, df: DataFrame) -> Result<DataFrame, ReaderError> {
    let time = df
        .column(TIME_COLUMN)
        .map_err(|_| ReaderError::MissingTimeColumn {
            path: path.to_path_buf(),
            column: TIME_COLUMN,
        })?;
    let time = normalize_time(path, time)?;

    let mut columns: Vec<Column> = Vec::with_capacity(df.width());
    columns.push(time.into());

    for column in df.get_columns() {
        let name = column.name().as_str();
        if name == TIME_COLUMN || name == HRU_COLUMN {
            continue;
        }
        let values = column
            .as_materialized_series()
            .strict_cast(&DataType::Float64)
            .map_err(|err| ReaderError::InvalidColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
                message: err.to_string(),
            })?;
        columns.push(nan_to_null(&values).map_err(|err| ReaderError::polars(path, err))?);
    }

    DataFrame::new(columns).map_err(|err| ReaderError::polars(path, err))
}

/// Missing samples arrive as NaN; as nulls they are skipped by the daily
/// aggregations.
fn nan_to_null(values: &Series) -> PolarsResult<Column> {
    let cleaned: Float64Chunked = values
        .f64()?
        .into_iter()
        .map(|value| value.filter(|v| !v.is_nan()))
        .collect();
    Ok(cleaned.with_name(values.name().clone()).into_series().into())
}

fn normalize_time(path: &Path, column: &Column) -> Result<Series, ReaderError> {
    let target = DataType::Datetime(TimeUnit::Microseconds, None);

    let series = match column.dtype() {
        DataType::String => {
            let values = column.str().map_err(|err| ReaderError::polars(path, err))?;
            let mut micros = Vec::with_capacity(values.len());
            for (row_index, value) in values.into_iter().enumerate() {
                let value = value.ok_or_else(|| ReaderError::InvalidTime {
                    path: path.to_path_buf(),
                    row_index,
                    message: "missing timestamp".to_string(),
                })?;
                micros.push(parse_timestamp(path, value, row_index)?);
            }
            Series::new(TIME_COLUMN.into(), micros)
                .cast(&target)
                .map_err(|err| ReaderError::polars(path, err))?
        }
        DataType::Datetime(_, _) | DataType::Date => column
            .as_materialized_series()
            .cast(&target)
            .map_err(|err| ReaderError::polars(path, err))?,
        other => {
            return Err(ReaderError::InvalidTime {
                path: path.to_path_buf(),
                row_index: 0,
                message: format!("unsupported time column type {other}"),
            })
        }
    };

    if series.null_count() > 0 {
        let nulls = series.is_null();
        let row_index = nulls.into_iter().position(|flag| flag == Some(true));
        return Err(ReaderError::InvalidTime {
            path: path.to_path_buf(),
            row_index: row_index.unwrap_or(0),
            message: "missing timestamp".to_string(),
        });
    }

    Ok(series)
}

pub(crate) fn parse_timestamp(
    path: &Path,
    value: &str,
    row_index: usize,
) -> Result<i64, ReaderError> {
    let trimmed = value.trim();
    for fmt in TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt.and_utc().timestamp_micros());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc().timestamp_micros());
    }
    Err(ReaderError::InvalidTime {
        path: path.to_path_buf(),
        row_index,
        message: format!("unrecognised timestamp '{trimmed}'"),
    })
}

/// Keeps the first row for every distinct value of `key` and drops the rest,
/// preserving row order. Returns the filtered frame and the number of rows
/// removed.
pub fn drop_duplicate_keys(df: &DataFrame, key: &str) -> PolarsResult<(DataFrame, usize)> {
    let keys = df.column(key)?.cast(&DataType::Int64)?;
    let keys = keys.i64()?;

    let mut seen: HashSet<Option<i64>> = HashSet::with_capacity(keys.len());
    let keep: Vec<bool> = keys.into_iter().map(|value| seen.insert(value)).collect();
    let dropped = keep.iter().filter(|flag| !**flag).count();

    if dropped == 0 {
        return Ok((df.clone(), 0));
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok((df.filter(&mask)?, dropped))
}
