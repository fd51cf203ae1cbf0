use std::collections::HashMap;

use chrono::TimeDelta;
use polars::lazy::dsl::*;
use polars::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::variables::{Aggregation, VariablePolicy};
use camels_nh_reader::TIME_COLUMN;

const MICROS_PER_DAY: i64 = 86_400_000_000;

#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
    #[error("'{TIME_COLUMN}' column has type {0}, expected a datetime")]
    InvalidTimeColumn(DataType),
}

/// Most frequent spacing between consecutive samples; ties go to the smaller
/// interval. `None` when there are fewer than two samples.
pub fn native_interval(series: &DataFrame) -> Result<Option<TimeDelta>, ReduceError> {
    let micros = time_micros(series)?;
    Ok(interval_mode(&micros).map(TimeDelta::microseconds))
}

fn time_micros(series: &DataFrame) -> Result<Vec<i64>, ReduceError> {
    let time = series.column(TIME_COLUMN)?;
    if !matches!(time.dtype(), DataType::Datetime(_, _) | DataType::Date) {
        return Err(ReduceError::InvalidTimeColumn(time.dtype().clone()));
    }
    let micros = time
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        .cast(&DataType::Int64)?;
    Ok(micros.i64()?.into_no_null_iter().collect())
}

fn interval_mode(micros: &[i64]) -> Option<i64> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for pair in micros.windows(2) {
        *counts.entry(pair[1] - pair[0]).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(delta_a, count_a), (delta_b, count_b)| {
            count_a.cmp(count_b).then_with(|| delta_b.cmp(delta_a))
        })
        .map(|(delta, _)| delta)
}

/// Reduces one source's sub-daily series to calendar days.
///
/// Sum variables are summed and mean variables averaged per day. A series
/// whose native interval is already one day passes mean variables through
/// untouched, keeping one row per sample. Temperature-like variables also get
/// per-day `_max`/`_min` companions. Variables the policy does not classify
/// are dropped. The `time` column of the result has dtype `Date`.
pub fn reduce_by_day(
    series: &DataFrame,
    policy: &VariablePolicy,
    source_tag: &str,
) -> Result<DataFrame, ReduceError> {
    let interval = interval_mode(&time_micros(series)?);
    let is_daily = interval == Some(MICROS_PER_DAY);

    let mut passthrough: Vec<Expr> = Vec::new();
    let mut grouped: Vec<Expr> = Vec::new();
    let mut order: Vec<String> = vec![TIME_COLUMN.to_string()];

    for name in series.get_column_names_str() {
        if name == TIME_COLUMN {
            continue;
        }
        let Some(aggregation) = policy.classify(name) else {
            debug!(variable = name, source = source_tag, "dropping unclassified variable");
            continue;
        };

        let output = policy.output_name(name, source_tag);
        match aggregation {
            Aggregation::Mean if is_daily => passthrough.push(col(name).alias(output.as_str())),
            Aggregation::Mean => grouped.push(col(name).mean().alias(output.as_str())),
            Aggregation::Sum => grouped.push(col(name).sum().alias(output.as_str())),
        }
        order.push(output);

        if policy.is_extreme(name) {
            let (max_name, min_name) = policy.companion_names(name, source_tag);
            grouped.push(col(name).max().alias(max_name.as_str()));
            grouped.push(col(name).min().alias(min_name.as_str()));
            order.push(max_name);
            order.push(min_name);
        }
    }

    debug!(
        source = source_tag,
        interval_micros = interval,
        is_daily,
        rows = series.height(),
        "reducing series to daily resolution"
    );

    let dated = series
        .clone()
        .lazy()
        .with_column(col(TIME_COLUMN).dt().date().alias(TIME_COLUMN));

    let daily_lf = if is_daily {
        let mut base_exprs = vec![col(TIME_COLUMN)];
        base_exprs.extend(passthrough);
        let base = dated.clone().select(base_exprs);
        if grouped.is_empty() {
            base
        } else {
            let per_day = dated.group_by_stable([col(TIME_COLUMN)]).agg(grouped);
            base.join(
                per_day,
                [col(TIME_COLUMN)],
                [col(TIME_COLUMN)],
                JoinArgs::new(JoinType::Left),
            )
        }
    } else {
        dated.group_by_stable([col(TIME_COLUMN)]).agg(grouped)
    };

    let selection: Vec<Expr> = order.iter().map(|name| col(name.as_str())).collect();
    let daily = daily_lf
        .sort(
            [TIME_COLUMN],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .select(selection)
        .collect()?;

    Ok(daily)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_mode_prefers_the_most_common_gap() {
        let hour = 3_600_000_000;
        let micros = [0, hour, 2 * hour, 3 * hour, 5 * hour];
        assert_eq!(interval_mode(&micros), Some(hour));
    }

    #[test]
    fn interval_mode_breaks_ties_towards_the_smaller_gap() {
        let micros = [0, 10, 30, 40, 60];
        assert_eq!(interval_mode(&micros), Some(10));
    }

    #[test]
    fn interval_mode_needs_two_samples() {
        assert_eq!(interval_mode(&[]), None);
        assert_eq!(interval_mode(&[42]), None);
    }
}
