//! `vaultsync apply` — reconcile the live snapshot with the desired state.
//!
//! Usage:
//!   vaultsync apply policies.yaml live.json --identities directory.yaml
//!   vaultsync --max-changes 20 apply policies.yaml live.json --identities directory.yaml --force

use std::path::Path;

use dialoguer::Confirm;

use crate::audit::{RunOutcome, RunRecorder};
use crate::cli::commands::diff::{preview, print_plan, write_report};
use crate::cli::output;
use crate::cli::{document_path, settings, Cli};
use crate::config::Settings;
use crate::errors::{Result, VaultSyncError};
use crate::policy::{document, ChangeReport, VaultRecord};
use crate::sync::{
    reconcile, Diagnostic, DiagnosticLog, DiagnosticSink, SnapshotDirectory,
    StaticIdentityDirectory,
};

/// Prints every diagnostic as it happens and records it against the run.
struct TerminalSink<'a> {
    recorder: &'a RunRecorder,
    log: DiagnosticLog,
}

impl DiagnosticSink for TerminalSink<'_> {
    fn report(&mut self, diagnostic: Diagnostic) {
        let message = diagnostic.to_string();
        output::warning(&message);
        let principal = match &diagnostic {
            Diagnostic::IdentityResolution { principal, .. } => Some(principal.as_str()),
            _ => None,
        };
        self.recorder
            .event(diagnostic.vault(), diagnostic.kind(), principal, Some(&message));
        self.log.report(diagnostic);
    }

    fn vault_committed(&mut self, vault: &VaultRecord) {
        output::success(&format!(
            "Updated vault '{}' ({} policies)",
            vault.vault_name,
            vault.policies.len()
        ));
        self.recorder.event(
            &vault.vault_name,
            "commit",
            None,
            Some(&format!("{} policies", vault.policies.len())),
        );
        self.log.vault_committed(vault);
    }
}

/// Document paths of one apply run.
struct ApplyInputs<'a> {
    desired: &'a Path,
    live: &'a Path,
    identities: &'a Path,
    live_fingerprint: &'a str,
}

/// Execute the `apply` command.
pub fn execute(
    cli: &Cli,
    desired: &str,
    live: &str,
    identities: &str,
    force: bool,
    strict: bool,
) -> Result<()> {
    let settings = settings(cli)?;
    let desired_path = document_path(desired)?;
    let live_path = document_path(live)?;
    let identities_path = document_path(identities)?;

    let desired_fingerprint = document::fingerprint(&desired_path)?;
    let live_fingerprint = document::fingerprint(&live_path)?;
    let recorder = RunRecorder::start(
        &settings,
        "apply",
        Some(&desired_fingerprint),
        Some(&live_fingerprint),
    );

    let inputs = ApplyInputs {
        desired: &desired_path,
        live: &live_path,
        identities: &identities_path,
        live_fingerprint: &live_fingerprint,
    };
    let (report, log) = match run(&settings, &recorder, &inputs, force) {
        Ok(Some(applied)) => applied,
        Ok(None) => return Ok(()),
        Err(e) => {
            recorder.abort(e.kind());
            return Err(e);
        }
    };

    let outcome = if log.is_empty() {
        RunOutcome::Applied
    } else {
        RunOutcome::Partial
    };
    recorder.finish(
        outcome,
        report.change_count,
        report.dropped_permission_count(),
    );

    if !report.dropped_policies.is_empty() {
        let path = write_report(&settings, &report)?;
        output::info(&format!(
            "{} permission(s) revoked; report written to {}",
            report.dropped_permission_count(),
            path.display()
        ));
    }

    let failed = log.commit_failures();
    if strict && failed > 0 {
        return Err(VaultSyncError::ApplyIncomplete {
            failed,
            total: log.committed().len() + failed,
        });
    }

    if log.is_empty() {
        output::success(&format!("Applied {} change(s)", report.change_count));
    } else {
        output::warning(&format!(
            "Applied with {} problem(s); see the messages above",
            log.diagnostics().len()
        ));
    }

    Ok(())
}

/// Preview, confirm and reconcile. `None` when nothing was applied because
/// there was nothing to do or the prompt was declined; the run is already
/// finished in that case.
fn run(
    settings: &Settings,
    recorder: &RunRecorder,
    inputs: &ApplyInputs<'_>,
    force: bool,
) -> Result<Option<(ChangeReport, DiagnosticLog)>> {
    let limits = settings.limits();
    let desired = document::load(inputs.desired)?;
    let mut vault_directory = SnapshotDirectory::open(inputs.live)?;
    let identity_directory = StaticIdentityDirectory::load(inputs.identities)?;
    let retrieved = vault_directory.vaults().to_vec();

    // Preview first so the user confirms what will actually happen.
    let plan = preview(&desired, &retrieved)?;
    if plan.report.change_count == 0 {
        output::success("Desired state matches the live snapshot. Nothing to do.");
        recorder.finish(RunOutcome::NoChanges, 0, 0);
        return Ok(None);
    }
    print_plan(&plan);
    limits.check_budget(plan.report.change_count)?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Apply {} change(s) to {}?",
                plan.report.change_count,
                inputs.live.display()
            ))
            .default(false)
            .interact()
            .map_err(|e| VaultSyncError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            recorder.finish(
                RunOutcome::Cancelled,
                plan.report.change_count,
                plan.report.dropped_permission_count(),
            );
            return Ok(None);
        }

        // The snapshot must not have moved while we were waiting.
        if document::fingerprint(inputs.live)? != inputs.live_fingerprint {
            return Err(VaultSyncError::CommandFailed(format!(
                "{} changed since it was read, re-run the command",
                inputs.live.display()
            )));
        }
    }

    let mut sink = TerminalSink {
        recorder,
        log: DiagnosticLog::new(),
    };
    let report = reconcile(
        &desired,
        &retrieved,
        &mut vault_directory,
        &identity_directory,
        limits,
        &mut sink,
    )?;

    Ok(Some((report, sink.log)))
}
