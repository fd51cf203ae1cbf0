use std::collections::HashMap;

use polars::lazy::dsl::*;
use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use camels_nh_reader::{drop_duplicate_keys, TIME_COLUMN};

/// Key column of every merged table and of the written CSV.
pub const DATE_COLUMN: &str = "date";

const TARGET_SOURCE: &str = "target";

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
    #[error("no data source has files for this basin")]
    NoSources,
    #[error("{found} of {expected} configured data sources have files for this basin")]
    SourceCountMismatch { found: usize, expected: usize },
    #[error("column '{column}' is produced by both {first} and {second}")]
    ColumnCollision {
        column: String,
        first: String,
        second: String,
    },
}

/// One source's daily frame, keyed by the source identifier.
#[derive(Debug, Clone)]
pub struct DailySeries {
    pub source: String,
    pub frame: DataFrame,
}

/// Aligns the daily series of every populated source on one date axis.
///
/// When all configured sources are present they are outer-joined in configured
/// order, so no date of any source is lost. A single populated source is used
/// as is. The key column is renamed to [`DATE_COLUMN`].
pub fn merge_sources(
    daily_by_source: Vec<DailySeries>,
    configured_sources: &[String],
) -> Result<DataFrame, MergeError> {
    let found = daily_by_source.len();
    let expected = configured_sources.len();

    let mut ordered = daily_by_source;
    ordered.sort_by_key(|series| {
        configured_sources
            .iter()
            .position(|source| *source == series.source)
            .unwrap_or(usize::MAX)
    });

    check_collisions(
        ordered
            .iter()
            .map(|series| (series.source.as_str(), &series.frame)),
    )?;

    if found == 0 {
        return Err(MergeError::NoSources);
    }
    if found != 1 && found != expected {
        return Err(MergeError::SourceCountMismatch { found, expected });
    }

    let mut iter = ordered.into_iter();
    let Some(first) = iter.next() else {
        return Err(MergeError::NoSources);
    };
    if found == 1 && expected > 1 {
        warn!(
            source = %first.source,
            expected,
            "only one data source available, using it without a join"
        );
    }

    let merged = iter.fold(first.frame.lazy(), |acc, next| {
        acc.join(
            next.frame.lazy(),
            [col(TIME_COLUMN)],
            [col(TIME_COLUMN)],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
    });

    let merged = merged
        .rename([TIME_COLUMN], [DATE_COLUMN], true)
        .sort([DATE_COLUMN], SortMultipleOptions::default())
        .collect()?;

    debug!(sources = found, rows = merged.height(), "merged daily sources");
    Ok(merged)
}

/// Restricts `forcing` to the dates with a target observation and appends the
/// target columns. Repeated target dates keep their first row.
pub fn attach_target(forcing: &DataFrame, target: &DataFrame) -> Result<DataFrame, MergeError> {
    let target_vars: Vec<&str> = target
        .get_column_names_str()
        .into_iter()
        .filter(|name| *name != TIME_COLUMN)
        .collect();

    let forcing_vars = forcing
        .get_column_names_str()
        .into_iter()
        .filter(|name| *name != DATE_COLUMN);
    for name in forcing_vars {
        if target_vars.contains(&name) {
            return Err(MergeError::ColumnCollision {
                column: name.to_string(),
                first: "forcing".to_string(),
                second: TARGET_SOURCE.to_string(),
            });
        }
    }

    let mut target_exprs = vec![col(TIME_COLUMN).dt().date().alias(DATE_COLUMN)];
    target_exprs.extend(target_vars.iter().map(|name| col(*name)));
    let daily_target = target
        .clone()
        .lazy()
        .select(target_exprs)
        .sort(
            [DATE_COLUMN],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;

    let (daily_target, dropped) = drop_duplicate_keys(&daily_target, DATE_COLUMN)?;
    if dropped > 0 {
        warn!(dropped, "dropped repeated target dates");
    }

    let joined = forcing
        .clone()
        .lazy()
        .join(
            daily_target.lazy(),
            [col(DATE_COLUMN)],
            [col(DATE_COLUMN)],
            JoinArgs::new(JoinType::Inner),
        )
        .sort([DATE_COLUMN], SortMultipleOptions::default())
        .collect()?;

    Ok(joined)
}

fn check_collisions<'a>(
    frames: impl Iterator<Item = (&'a str, &'a DataFrame)>,
) -> Result<(), MergeError> {
    let mut owners: HashMap<String, &'a str> = HashMap::new();
    for (source, frame) in frames {
        for name in frame.get_column_names_str() {
            if name == TIME_COLUMN {
                continue;
            }
            if let Some(first) = owners.insert(name.to_string(), source) {
                return Err(MergeError::ColumnCollision {
                    column: name.to_string(),
                    first: first.to_string(),
                    second: source.to_string(),
                });
            }
        }
    }
    Ok(())
}
