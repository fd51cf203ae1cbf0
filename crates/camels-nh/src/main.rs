// crates/camels-nh/src/main.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use camels_nh_core::attributes::export_attributes;
use camels_nh_core::basin::{discover_basins, read_allowlist};
use camels_nh_core::config::{ConvertConfig, CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};
use camels_nh_core::driver::{execute, plan_run, RunOptions};
use camels_nh_core::unusable::UnusableBasins;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod report;

/// Converts CAMELS-SPAT basin forcing and streamflow into daily CSVs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Human-readable log lines instead of JSON.
    #[arg(long, global = true)]
    plain_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert every selected basin into `<output_root>/<group>/<station>.csv`.
    Convert(ConvertArgs),
    /// Print the stations excluded by the unusable-basin table.
    ListUnusable(ConfigArgs),
    /// Copy the basin attribute table next to the converted data.
    ExportAttributes(ExportArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Config file (falls back to $CAMELS_NH_CONFIG, then ./camels_nh.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Convert basins on a worker pool.
    #[arg(long)]
    parallel: bool,

    /// Pool size (default: $SLURM_CPUS_PER_TASK, else 32).
    #[arg(long)]
    workers: Option<usize>,

    /// Write into `CAMELS_spat_<CTRY>_testing` group folders.
    #[arg(long)]
    testing: bool,

    /// Plan only; nothing is written or deleted.
    #[arg(long)]
    dry_run: bool,

    /// Restrict the run to these countries (repeatable).
    #[arg(long = "country")]
    countries: Vec<String>,

    /// Write the run summary as JSON.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Destination directory.
    #[arg(long)]
    dest: PathBuf,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.plain_logs);

    match cli.command {
        Command::Convert(args) => run_convert(args),
        Command::ListUnusable(args) => {
            let config = load_config(&args)?;
            let unusable = load_unusable(&config)?;
            println!("{}", report::unusable_table(&unusable));
            Ok(())
        }
        Command::ExportAttributes(args) => {
            let config = load_config(&args.config)?;
            let export = export_attributes(&config, &args.dest)
                .context("failed to export basin attributes")?;
            println!(
                "Exported {} rows to {}",
                export.rows,
                export.destination.display()
            );
            Ok(())
        }
    }
}

fn init_tracing(plain: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if plain {
        builder.init();
    } else {
        builder.json().init();
    }
}

fn config_path(args: &ConfigArgs) -> PathBuf {
    args.config
        .clone()
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn load_config(args: &ConfigArgs) -> Result<ConvertConfig> {
    let path = config_path(args);
    let config = ConvertConfig::load(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    info!(config = %path.display(), "configuration loaded");
    Ok(config)
}

fn load_unusable(config: &ConvertConfig) -> Result<UnusableBasins> {
    match (config.unusable_table_path(), config.unusable.as_ref()) {
        (Some(path), Some(settings)) => UnusableBasins::load(&path, settings)
            .with_context(|| format!("failed to load unusable basins from {}", path.display())),
        _ => {
            warn!("no unusable basin table configured");
            Ok(UnusableBasins::empty())
        }
    }
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let unusable = load_unusable(&config)?;
    let allowlist = match &config.selection.allowlist {
        Some(path) => Some(
            read_allowlist(path)
                .with_context(|| format!("failed to read allow-list {}", path.display()))?,
        ),
        None => None,
    };

    let basin_dir = config.basin_data_dir();
    let basins = discover_basins(&basin_dir)
        .with_context(|| format!("failed to list basins in {}", basin_dir.display()))?;
    info!(basins = basins.len(), unusable = unusable.len(), "basins discovered");

    let run = RunOptions {
        parallel: args.parallel,
        workers: args.workers,
        testing: args.testing,
        dry_run: args.dry_run,
        countries: args.countries,
    };

    let plan = plan_run(&config, &run, &basins, &unusable, allowlist.as_ref());
    let summary = execute(&plan, &config, &run).context("conversion run failed")?;

    println!("{}", report::summary_table(&summary));
    if let Some(path) = &args.report {
        write_report(path, &summary)?;
    }
    Ok(())
}

fn write_report(path: &Path, summary: &camels_nh_core::driver::RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("failed to serialize run summary")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report {}", path.display()))?;
    info!(report = %path.display(), "run report written");
    Ok(())
}
