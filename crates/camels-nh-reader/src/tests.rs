use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;

use crate::errors::ReaderError;
use crate::formats::{CsvSeriesReader, TIME_COLUMN};
use crate::registry::SeriesReader;
use crate::{find_target_file, list_forcing_files, load_source, load_target, read_series_file};

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(path)
}

fn forcing_folder() -> PathBuf {
    fixture("basin_data/CAN_01AB001/forcing")
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn micros(date: (i32, u32, u32), hour: u32) -> i64 {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_micros()
}

#[test]
fn lists_source_files_in_name_order_without_temporaries() {
    let files = list_forcing_files(&forcing_folder(), "ERA5").expect("listing failed");
    assert_eq!(
        file_names(&files),
        vec!["CAN_01AB001_ERA5_2010a.csv", "CAN_01AB001_ERA5_2010b.csv"]
    );
}

#[test]
fn source_match_is_a_substring_match() {
    let files = list_forcing_files(&forcing_folder(), "EM_EARTH").expect("listing failed");
    assert_eq!(file_names(&files), vec!["CAN_01AB001_EM_EARTH_2010.csv"]);

    let none = list_forcing_files(&forcing_folder(), "RDRS").expect("listing failed");
    assert!(none.is_empty());
}

#[test]
fn missing_forcing_folder_is_an_io_error() {
    let err = list_forcing_files(&fixture("basin_data/CAN_00XX000/forcing"), "ERA5")
        .expect_err("folder should be missing");
    assert!(matches!(err, ReaderError::Io { .. }), "unexpected error: {err}");
}

#[test]
fn csv_reader_normalises_time_and_drops_hru() {
    let df = read_series_file(&forcing_folder().join("CAN_01AB001_ERA5_2010a.csv"))
        .expect("read failed");

    assert_eq!(df.get_column_names_str(), vec![TIME_COLUMN, "mtpr", "t"]);
    assert_eq!(df.height(), 8);
    assert_eq!(
        df.column(TIME_COLUMN).unwrap().dtype(),
        &DataType::Datetime(TimeUnit::Microseconds, None)
    );
    assert_eq!(df.column("mtpr").unwrap().dtype(), &DataType::Float64);
}

#[test]
fn daily_files_parse_bare_dates() {
    let df = read_series_file(&forcing_folder().join("CAN_01AB001_EM_EARTH_2010.csv"))
        .expect("read failed");
    let times = df.column(TIME_COLUMN).unwrap().cast(&DataType::Int64).unwrap();
    assert_eq!(times.i64().unwrap().get(0), Some(micros((2010, 1, 1), 0)));
    assert_eq!(times.i64().unwrap().get(3), Some(micros((2010, 1, 4), 0)));
}

#[test]
fn load_source_concatenates_sorts_and_drops_overlap() {
    let series = load_source(&forcing_folder(), "ERA5")
        .expect("load failed")
        .expect("ERA5 files should exist");

    assert_eq!(series.source, "ERA5");
    assert_eq!(series.file_count, 2);
    assert_eq!(series.duplicates_dropped, 1);
    assert_eq!(series.frame.height(), 12);

    let times = series
        .frame
        .column(TIME_COLUMN)
        .unwrap()
        .cast(&DataType::Int64)
        .unwrap();
    let times: Vec<i64> = times.i64().unwrap().into_no_null_iter().collect();
    assert!(times.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(times.first().copied(), Some(micros((2010, 1, 1), 0)));
    assert_eq!(times.last().copied(), Some(micros((2010, 1, 3), 18)));
}

#[test]
fn load_source_without_files_is_none() {
    let loaded = load_source(&forcing_folder(), "RDRS").expect("listing should succeed");
    assert!(loaded.is_none());
}

#[test]
fn load_source_rejects_mismatched_columns() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("B_ERA5_1.csv"),
        "time,mtpr\n2010-01-01 00:00:00,1.0\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("B_ERA5_2.csv"),
        "time,mtpr,t\n2010-01-01 06:00:00,1.0,2.0\n",
    )
    .unwrap();

    let err = load_source(dir.path(), "ERA5").expect_err("schemas differ");
    match err {
        ReaderError::SchemaMismatch { path, .. } => {
            assert_eq!(path.file_name().unwrap(), "B_ERA5_2.csv");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn load_source_realigns_reordered_columns() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("B_ERA5_1.csv"),
        "time,mtpr,t\n2010-01-01 00:00:00,1.0,5.0\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("B_ERA5_2.csv"),
        "time,t,mtpr\n2010-01-01 06:00:00,6.0,2.0\n",
    )
    .unwrap();

    let series = load_source(dir.path(), "ERA5").unwrap().unwrap();
    let t: Vec<Option<f64>> = series
        .frame
        .column("t")
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(t, vec![Some(5.0), Some(6.0)]);
}

#[test]
fn malformed_values_name_the_file_and_column() {
    let err = read_series_file(&fixture("malformed.csv")).expect_err("should fail");
    match err {
        ReaderError::InvalidColumn { path, column, .. } => {
            assert_eq!(column, "mtpr");
            assert!(path.ends_with("malformed.csv"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_time_column_is_reported() {
    let err = read_series_file(&fixture("no_time.csv")).expect_err("should fail");
    assert!(matches!(err, ReaderError::MissingTimeColumn { .. }), "{err}");
}

#[test]
fn unknown_extensions_collect_every_attempt() {
    let err = read_series_file(Path::new("forcing.nc")).expect_err("no reader for netcdf");
    match err {
        ReaderError::NoMatchingReader { attempts, .. } => {
            let names: Vec<&str> = attempts.iter().map(|attempt| attempt.reader).collect();
            assert_eq!(names, vec!["csv", "parquet"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn csv_reader_declines_other_extensions() {
    let err = CsvSeriesReader
        .read(Path::new("forcing.parquet"))
        .expect_err("csv reader should decline");
    assert!(matches!(err, ReaderError::FormatMismatch { reader: "csv", .. }));
}

#[test]
fn parquet_files_round_trip_through_the_registry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("B_ERA5_2010.parquet");

    let mut df = df![
        "time" => &[micros((2010, 1, 1), 0), micros((2010, 1, 1), 12)],
        "mtpr" => &[1i64, 3],
    ]
    .unwrap()
    .lazy()
    .with_column(
        col("time")
            .cast(DataType::Datetime(TimeUnit::Microseconds, None))
            .cast(DataType::Datetime(TimeUnit::Nanoseconds, None)),
    )
    .collect()
    .unwrap();
    let file = fs::File::create(&path).unwrap();
    ParquetWriter::new(file).finish(&mut df).unwrap();

    let read = read_series_file(&path).expect("parquet read failed");
    assert_eq!(
        read.column(TIME_COLUMN).unwrap().dtype(),
        &DataType::Datetime(TimeUnit::Microseconds, None)
    );
    assert_eq!(read.column("mtpr").unwrap().dtype(), &DataType::Float64);
}

#[test]
fn target_file_is_found_and_restricted_to_target_vars() {
    let folder = fixture("basin_data/CAN_01AB001/observations");
    let path = find_target_file(&folder, "CAN_01AB001").expect("target file");
    let df = load_target(&path, &["q_obs".to_string()]).expect("target load");

    assert_eq!(df.get_column_names_str(), vec![TIME_COLUMN, "q_obs"]);
    assert_eq!(df.height(), 4);
}

#[test]
fn target_requires_every_configured_variable() {
    let folder = fixture("basin_data/CAN_01AB001/observations");
    let path = find_target_file(&folder, "CAN_01AB001").unwrap();
    let err = load_target(&path, &["q_obs".to_string(), "q_sim".to_string()])
        .expect_err("q_sim is absent");
    match err {
        ReaderError::MissingColumn { column, .. } => assert_eq!(column, "q_sim"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_target_file_is_an_io_error() {
    let folder = fixture("basin_data/CAN_01AB001/observations");
    let err = find_target_file(&folder, "CAN_09ZZ999").expect_err("no such basin");
    assert!(matches!(err, ReaderError::Io { .. }));
}
