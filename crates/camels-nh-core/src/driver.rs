use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::basin::BasinId;
use crate::config::ConvertConfig;
use crate::convert::{convert_basin, BasinReport, BasinTask};
use crate::error::Result;
use crate::output::output_path;
use crate::unusable::UnusableBasins;
use crate::variables::VariablePolicy;

pub const WORKERS_ENV_VAR: &str = "SLURM_CPUS_PER_TASK";
pub const DEFAULT_WORKERS: usize = 32;

/// Per-invocation switches, separate from the dataset configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub parallel: bool,
    pub workers: Option<usize>,
    pub testing: bool,
    pub dry_run: bool,
    /// Restricts the run to these countries; empty means every configured one.
    pub countries: Vec<String>,
}

impl RunOptions {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_worker_count).max(1)
    }
}

pub fn default_worker_count() -> usize {
    std::env::var(WORKERS_ENV_VAR)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|count| *count > 0)
        .unwrap_or(DEFAULT_WORKERS)
}

pub fn group_folder(country: &str, source_count: usize, testing: bool) -> String {
    if testing {
        format!("CAMELS_spat_{country}_testing")
    } else {
        format!("CAMELS_spat_{country}_{source_count}sources")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BasinAction {
    Convert,
    SkipExisting,
    DeleteStale,
    SkipUnusable,
    SkipNotAllowed,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedBasin {
    pub basin: BasinId,
    pub output: PathBuf,
    pub action: BasinAction,
}

#[derive(Debug, Clone, Default)]
pub struct RunPlan {
    pub group_dirs: Vec<PathBuf>,
    pub basins: Vec<PlannedBasin>,
}

impl RunPlan {
    pub fn count(&self, action: BasinAction) -> usize {
        self.basins
            .iter()
            .filter(|planned| planned.action == action)
            .count()
    }
}

/// Decides what happens to every basin of the selected countries.
///
/// An existing output is never rewritten; it is deleted when its basin is
/// unusable. Basins without output are skipped when unusable or, with an
/// allow-list, when not listed.
pub fn plan_run(
    config: &ConvertConfig,
    run: &RunOptions,
    basins: &[BasinId],
    unusable: &UnusableBasins,
    allowlist: Option<&HashSet<String>>,
) -> RunPlan {
    let source_count = config.dataset.data_sources.len();
    let mut plan = RunPlan::default();

    let countries = config
        .dataset
        .countries
        .iter()
        .filter(|country| run.countries.is_empty() || run.countries.contains(country));

    for country in countries {
        let group_dir = config
            .paths
            .output_root
            .join(group_folder(country, source_count, run.testing));

        for basin in basins.iter().filter(|basin| &basin.country == country) {
            let output = output_path(&group_dir, &basin.station);
            let is_unusable = unusable.contains(&basin.station);
            let action = if output.exists() {
                if is_unusable {
                    BasinAction::DeleteStale
                } else {
                    BasinAction::SkipExisting
                }
            } else if is_unusable {
                BasinAction::SkipUnusable
            } else if allowlist.is_some_and(|allowed| !allowed.contains(&basin.station)) {
                BasinAction::SkipNotAllowed
            } else {
                BasinAction::Convert
            };

            plan.basins.push(PlannedBasin {
                basin: basin.clone(),
                output,
                action,
            });
        }

        plan.group_dirs.push(group_dir);
    }

    plan
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub planned: usize,
    pub converted: usize,
    pub failed: usize,
    pub skipped_existing: usize,
    pub deleted_stale: usize,
    pub skipped_unusable: usize,
    pub skipped_not_allowed: usize,
    pub elapsed_ms: u64,
    pub reports: Vec<BasinReport>,
    pub plan: Vec<PlannedBasin>,
}

/// Applies a plan: creates group folders, removes stale outputs and converts
/// the remaining basins, sequentially or on a pool of `run.worker_count()`
/// threads. A dry run only summarises the plan.
pub fn execute(plan: &RunPlan, config: &ConvertConfig, run: &RunOptions) -> Result<RunSummary> {
    let started = Instant::now();
    let mut summary = RunSummary {
        dry_run: run.dry_run,
        planned: plan.basins.len(),
        skipped_existing: plan.count(BasinAction::SkipExisting),
        deleted_stale: plan.count(BasinAction::DeleteStale),
        skipped_unusable: plan.count(BasinAction::SkipUnusable),
        skipped_not_allowed: plan.count(BasinAction::SkipNotAllowed),
        plan: plan.basins.clone(),
        ..RunSummary::default()
    };

    if run.dry_run {
        info!(
            planned = summary.planned,
            convert = plan.count(BasinAction::Convert),
            "dry run, no files touched"
        );
        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        return Ok(summary);
    }

    let mut created = BTreeSet::new();
    for dir in &plan.group_dirs {
        if created.insert(dir) && !dir.is_dir() {
            match fs::create_dir_all(dir) {
                Ok(()) => info!(dir = %dir.display(), "created group folder"),
                Err(err) => warn!(
                    dir = %dir.display(),
                    error = %err,
                    "failed to create group folder"
                ),
            }
        }
    }

    let mut deleted = 0;
    let mut action_failures = Vec::new();
    for planned in &plan.basins {
        match planned.action {
            BasinAction::DeleteStale => match fs::remove_file(&planned.output) {
                Ok(()) => {
                    deleted += 1;
                    warn!(
                        basin = %planned.basin,
                        output = %planned.output.display(),
                        "deleted output of unusable basin"
                    );
                }
                Err(err) => {
                    warn!(
                        basin = %planned.basin,
                        output = %planned.output.display(),
                        error = %err,
                        "failed to delete output of unusable basin"
                    );
                    action_failures.push(BasinReport::failed(
                        planned.basin.clone(),
                        planned.output.clone(),
                        format!("failed to delete stale output: {err}"),
                    ));
                }
            },
            BasinAction::SkipExisting => {
                info!(basin = %planned.basin, "output already exists, skipping");
            }
            BasinAction::SkipUnusable => {
                warn!(basin = %planned.basin, "skipping unusable basin");
            }
            BasinAction::SkipNotAllowed => {
                info!(basin = %planned.basin, "basin not in allow-list, skipping");
            }
            BasinAction::Convert => {}
        }
    }

    let policy = VariablePolicy::from_config(&config.dataset);
    let tasks: Vec<BasinTask<'_>> = plan
        .basins
        .iter()
        .filter(|planned| planned.action == BasinAction::Convert)
        .map(|planned| BasinTask {
            basin: planned.basin.clone(),
            output: planned.output.clone(),
            config,
            policy: &policy,
        })
        .collect();

    let reports: Vec<BasinReport> = if run.parallel && tasks.len() > 1 {
        let workers = run.worker_count();
        info!(workers, basins = tasks.len(), "converting basins in parallel");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("camels-nh-worker-{index}"))
            .build()?;
        pool.install(|| tasks.par_iter().map(run_task).collect())
    } else {
        info!(basins = tasks.len(), "converting basins sequentially");
        tasks.iter().map(run_task).collect()
    };

    summary.deleted_stale = deleted;
    summary.reports = action_failures;
    summary.reports.extend(reports);

    summary.converted = summary.reports.iter().filter(|r| r.is_success()).count();
    summary.failed = summary.reports.len() - summary.converted;
    summary.elapsed_ms = started.elapsed().as_millis() as u64;

    info!(
        converted = summary.converted,
        failed = summary.failed,
        skipped_existing = summary.skipped_existing,
        deleted_stale = summary.deleted_stale,
        skipped_unusable = summary.skipped_unusable,
        elapsed_ms = summary.elapsed_ms,
        "run finished"
    );
    Ok(summary)
}

fn run_task(task: &BasinTask<'_>) -> BasinReport {
    guarded(task.basin.clone(), task.output.clone(), || convert_basin(task))
}

/// Runs one conversion, turning a panic into a failed report.
fn guarded(
    basin: BasinId,
    output: PathBuf,
    convert: impl FnOnce() -> BasinReport,
) -> BasinReport {
    match panic::catch_unwind(AssertUnwindSafe(convert)) {
        Ok(report) => report,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(basin = %basin, panic = %message, "basin conversion panicked");
            BasinReport::failed(basin, output, format!("panicked: {message}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panicking_conversion_becomes_a_failed_report() {
        let basin = BasinId::parse("CAN_01AB001").unwrap();
        let report = guarded(basin.clone(), PathBuf::from("01AB001.csv"), || {
            panic!("{} exploded", "reducer")
        });

        assert_eq!(report.basin, basin);
        assert!(!report.is_success());
        match report.outcome {
            crate::convert::BasinOutcome::Failed { error } => {
                assert_eq!(error, "panicked: reducer exploded");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn group_folder_names() {
        assert_eq!(group_folder("CAN", 2, false), "CAMELS_spat_CAN_2sources");
        assert_eq!(group_folder("USA", 4, true), "CAMELS_spat_USA_testing");
    }

    #[test]
    fn explicit_workers_override_the_default() {
        let run = RunOptions {
            workers: Some(3),
            ..RunOptions::default()
        };
        assert_eq!(run.worker_count(), 3);

        let zero = RunOptions {
            workers: Some(0),
            ..RunOptions::default()
        };
        assert_eq!(zero.worker_count(), 1);
    }
}
