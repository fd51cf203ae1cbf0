use comfy_table::Table;

use camels_nh_core::convert::BasinOutcome;
use camels_nh_core::driver::{BasinAction, RunSummary};
use camels_nh_core::unusable::UnusableBasins;

pub fn summary_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Outcome", "Basins"]);
    for (label, count) in outcome_rows(summary) {
        table.add_row(vec![label, count.to_string()]);
    }

    for report in &summary.reports {
        if let BasinOutcome::Failed { error } = &report.outcome {
            table.add_row(vec![format!("failed: {}", report.basin), error.clone()]);
        }
    }
    table
}

pub fn unusable_table(unusable: &UnusableBasins) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Station_id"]);
    for station in unusable.iter() {
        table.add_row(vec![station]);
    }
    table
}

/// Dry runs only report what would happen, so every row is labelled as planned.
fn outcome_rows(summary: &RunSummary) -> Vec<(String, usize)> {
    if summary.dry_run {
        let to_convert = summary
            .plan
            .iter()
            .filter(|planned| planned.action == BasinAction::Convert)
            .count();
        return vec![
            ("planned basins".to_string(), summary.planned),
            ("would convert".to_string(), to_convert),
            ("would skip (existing)".to_string(), summary.skipped_existing),
            ("would delete (unusable)".to_string(), summary.deleted_stale),
            ("would skip (unusable)".to_string(), summary.skipped_unusable),
            ("would skip (not allowed)".to_string(), summary.skipped_not_allowed),
        ];
    }

    vec![
        ("converted".to_string(), summary.converted),
        ("failed".to_string(), summary.failed),
        ("skipped (existing)".to_string(), summary.skipped_existing),
        ("deleted (unusable)".to_string(), summary.deleted_stale),
        ("skipped (unusable)".to_string(), summary.skipped_unusable),
        ("skipped (not allowed)".to_string(), summary.skipped_not_allowed),
    ]
}
