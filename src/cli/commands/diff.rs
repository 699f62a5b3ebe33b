//! `vaultsync diff` — preview the changes a sync would make.
//!
//! Usage:
//!   vaultsync diff policies.yaml live.json
//!   vaultsync diff policies.yaml live.json --report

use std::path::Path;

use console::style;

use crate::audit::{RunOutcome, RunRecorder};
use crate::cli::output;
use crate::cli::{document_path, settings, Cli};
use crate::config::Settings;
use crate::errors::Result;
use crate::policy::{document, ChangeReport, VaultRecord};
use crate::sync::{check_identity, compute_changes, ChangePlan};

/// Execute the `diff` command.
pub fn execute(cli: &Cli, desired: &str, live: &str, report: bool) -> Result<()> {
    let settings = settings(cli)?;
    let desired_path = document_path(desired)?;
    let live_path = document_path(live)?;

    let recorder = RunRecorder::start(
        &settings,
        "diff",
        Some(&document::fingerprint(&desired_path)?),
        Some(&document::fingerprint(&live_path)?),
    );

    let plan = match load_and_preview(&desired_path, &live_path) {
        Ok(plan) => plan,
        Err(e) => {
            recorder.abort(e.kind());
            return Err(e);
        }
    };
    let outcome = if plan.report.change_count == 0 {
        RunOutcome::NoChanges
    } else {
        RunOutcome::Previewed
    };
    recorder.finish(
        outcome,
        plan.report.change_count,
        plan.report.dropped_permission_count(),
    );

    print_plan(&plan);

    if let Err(e) = settings.limits().check_budget(plan.report.change_count) {
        output::warning(&e.to_string());
        output::tip("Raise --max-changes or split the update into smaller runs.");
    }

    if report && !plan.report.dropped_policies.is_empty() {
        let path = write_report(&settings, &plan.report)?;
        output::success(&format!("Wrote report to {}", path.display()));
    }

    Ok(())
}

fn load_and_preview(desired: &Path, live: &Path) -> Result<ChangePlan> {
    let desired = document::load(desired)?;
    let retrieved = document::load(live)?;
    preview(&desired, &retrieved)
}

/// Identity check plus change computation; nothing is contacted.
pub fn preview(desired: &[VaultRecord], retrieved: &[VaultRecord]) -> Result<ChangePlan> {
    check_identity(desired, retrieved)?;
    compute_changes(desired, retrieved)
}

/// Print the per-vault outcome of a plan.
pub fn print_plan(plan: &ChangePlan) {
    if plan.report.change_count == 0 {
        output::success("Desired state matches the live snapshot. Nothing to do.");
        return;
    }

    for vault in &plan.pending {
        println!(
            "  {} {} ({} policies)",
            style("~").yellow().bold(),
            vault.vault_name,
            vault.policies.len()
        );
    }
    println!();

    output::print_dropped_table(&plan.report);
    output::info(&output::summary_line(&plan.report));
}

/// Write the dropped-permission report into the state directory.
pub fn write_report(settings: &Settings, report: &ChangeReport) -> Result<std::path::PathBuf> {
    let cwd = std::env::current_dir()?;
    let path = settings.report_path(&cwd);
    save_report(&path, report)?;
    Ok(path)
}

fn save_report(path: &Path, report: &ChangeReport) -> Result<()> {
    let json = document::to_pretty_json(report)?;
    document::write_atomic(path, json.as_bytes())
}
