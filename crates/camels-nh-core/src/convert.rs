use std::path::PathBuf;
use std::time::Instant;

use camels_nh_reader::{find_target_file, load_source, load_target};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::basin::BasinId;
use crate::config::ConvertConfig;
use crate::error::Result;
use crate::merger::{attach_target, merge_sources, DailySeries};
use crate::output::write_basin_csv;
use crate::reducer::reduce_by_day;
use crate::variables::VariablePolicy;

/// Everything one worker needs to convert one basin.
#[derive(Debug, Clone)]
pub struct BasinTask<'a> {
    pub basin: BasinId,
    pub output: PathBuf,
    pub config: &'a ConvertConfig,
    pub policy: &'a VariablePolicy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BasinOutcome {
    Converted { rows: usize, sources: Vec<String> },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BasinReport {
    pub basin: BasinId,
    pub output: PathBuf,
    #[serde(flatten)]
    pub outcome: BasinOutcome,
    pub elapsed_ms: u64,
}

impl BasinReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BasinOutcome::Converted { .. })
    }

    pub(crate) fn failed(basin: BasinId, output: PathBuf, error: String) -> Self {
        Self {
            basin,
            output,
            outcome: BasinOutcome::Failed { error },
            elapsed_ms: 0,
        }
    }
}

/// Loads, reduces, merges and writes one basin. Errors are captured in the
/// report and logged, never returned.
pub fn convert_basin(task: &BasinTask<'_>) -> BasinReport {
    let started = Instant::now();
    info!(basin = %task.basin, output = %task.output.display(), "converting basin");

    let outcome = match run_conversion(task) {
        Ok((rows, sources)) => {
            info!(basin = %task.basin, rows, sources = ?sources, "basin converted");
            BasinOutcome::Converted { rows, sources }
        }
        Err(err) => {
            warn!(basin = %task.basin, error = %err, "basin conversion failed");
            BasinOutcome::Failed {
                error: err.to_string(),
            }
        }
    };

    BasinReport {
        basin: task.basin.clone(),
        output: task.output.clone(),
        outcome,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

fn run_conversion(task: &BasinTask<'_>) -> Result<(usize, Vec<String>)> {
    let config = task.config;
    let folder_name = task.basin.folder_name();
    let basin_dir = config.basin_data_dir().join(&folder_name);
    let forcing_dir = basin_dir.join(&config.paths.forcing_subdir);

    let mut daily = Vec::with_capacity(config.dataset.data_sources.len());
    for source in &config.dataset.data_sources {
        let Some(series) = load_source(&forcing_dir, source)? else {
            debug!(basin = %task.basin, source = %source, "source not available for basin");
            continue;
        };
        let tag = source.to_lowercase();
        let frame = reduce_by_day(&series.frame, task.policy, &tag)?;
        daily.push(DailySeries {
            source: source.clone(),
            frame,
        });
    }
    let sources: Vec<String> = daily.iter().map(|series| series.source.clone()).collect();

    let forcing = merge_sources(daily, &config.dataset.data_sources)?;

    let target_dir = basin_dir.join(&config.paths.target_subdir);
    let target_path = find_target_file(&target_dir, &folder_name)?;
    let target = load_target(&target_path, &config.dataset.target_vars)?;

    let mut merged = attach_target(&forcing, &target)?;
    write_basin_csv(&mut merged, &task.output)?;

    Ok((merged.height(), sources))
}
