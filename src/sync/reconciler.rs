//! The two-phase run: validate everything, then apply per vault.
//!
//! Phase one (identity check, change computation, budget) either passes
//! completely or aborts the run before any commit. Phase two works vault
//! by vault; problems there are reported to the [`DiagnosticSink`] and
//! never stop the remaining vaults.

use super::diagnostics::{Diagnostic, DiagnosticSink};
use super::differ::{check_identity, compute_changes, find_vault};
use super::directory::{Identity, IdentityDirectory, VaultDirectory};
use super::gate::{SafetyLimits, UserCheck};
use crate::errors::Result;
use crate::policy::{ChangeReport, PrincipalPolicy, PrincipalType, VaultRecord};

/// Reconcile desired vault state against retrieved state.
///
/// Returns the change report, whose `dropped_policies` lists every
/// permission the run revokes. Fatal errors are returned before anything
/// is committed.
pub fn reconcile(
    desired: &[VaultRecord],
    retrieved: &[VaultRecord],
    vault_directory: &mut dyn VaultDirectory,
    identity_directory: &dyn IdentityDirectory,
    limits: SafetyLimits,
    sink: &mut dyn DiagnosticSink,
) -> Result<ChangeReport> {
    check_identity(desired, retrieved)?;
    let plan = compute_changes(desired, retrieved)?;
    limits.check_budget(plan.report.change_count)?;

    if plan.report.change_count == 0 {
        tracing::info!("desired state matches retrieved state");
        return Ok(ChangeReport::default());
    }

    tracing::info!(
        changes = plan.report.change_count,
        vaults = plan.pending.len(),
        "applying changes"
    );

    for vault in &plan.pending {
        let current = find_vault(retrieved, &vault.vault_name);
        apply_vault(vault, current, vault_directory, identity_directory, limits, sink);
    }

    Ok(plan.report)
}

/// Gate, resolve and commit a single vault. Never fails the run.
///
/// A principal that fails to resolve keeps the policy it already has in
/// `current`, stored object id included. If it had none it is left out.
fn apply_vault(
    vault: &VaultRecord,
    current: Option<&VaultRecord>,
    vault_directory: &mut dyn VaultDirectory,
    identity_directory: &dyn IdentityDirectory,
    limits: SafetyLimits,
    sink: &mut dyn DiagnosticSink,
) {
    if !enough_users(vault, &vault.policies, limits, sink) {
        return;
    }

    let mut resolved = Vec::with_capacity(vault.policies.len());
    let mut skipped = false;
    for policy in &vault.policies {
        match resolve_principal(policy, identity_directory) {
            Ok(identity) => {
                let mut policy = policy.clone();
                policy.object_id = Some(identity.object_id);
                resolved.push(policy);
            }
            Err(reason) => {
                tracing::warn!(vault = %vault.vault_name, principal = %policy.label(), %reason, "principal skipped");
                sink.report(Diagnostic::IdentityResolution {
                    vault: vault.vault_name.clone(),
                    principal: policy.label().to_string(),
                    reason,
                });
                skipped = true;
                let existing = current.and_then(|c| c.find_policy(&policy.identity_key()));
                if let Some(existing) = existing {
                    resolved.push(existing.clone());
                }
            }
        }
    }

    // Unresolved users must not push the committed set below the minimum.
    if skipped && !enough_users(vault, &resolved, limits, sink) {
        return;
    }

    match vault_directory.commit(
        &vault.resource_group,
        &vault.vault_name,
        &resolved,
        &vault.tenant_id,
    ) {
        Ok(()) => {
            tracing::info!(vault = %vault.vault_name, policies = resolved.len(), "vault updated");
            sink.vault_committed(&VaultRecord {
                policies: resolved,
                ..vault.clone()
            });
        }
        Err(e) => {
            tracing::warn!(vault = %vault.vault_name, error = %e, "commit failed");
            sink.report(Diagnostic::Commit {
                vault: vault.vault_name.clone(),
                message: e.to_string(),
            });
        }
    }
}

fn enough_users(
    vault: &VaultRecord,
    policies: &[PrincipalPolicy],
    limits: SafetyLimits,
    sink: &mut dyn DiagnosticSink,
) -> bool {
    match limits.check_minimum_users(policies) {
        UserCheck::Sufficient => true,
        UserCheck::Insufficient { users, required } => {
            tracing::warn!(vault = %vault.vault_name, users, required, "too few users, vault skipped");
            sink.report(Diagnostic::InsufficientUsers {
                vault: vault.vault_name.clone(),
                users,
                required,
            });
            false
        }
    }
}

/// Look a policy's principal up in the directory.
///
/// Users and groups need an alias and a directory entry whose display name
/// matches. Applications and service principals are found by display name
/// and must not carry an alias. The error is a human-readable reason.
pub fn resolve_principal(
    policy: &PrincipalPolicy,
    directory: &dyn IdentityDirectory,
) -> std::result::Result<Identity, String> {
    let alias = policy.alias.trim();
    let display_name = policy.display_name.trim();

    let lookup = match policy.principal_type {
        PrincipalType::User | PrincipalType::Group => {
            if alias.is_empty() {
                return Err(format!(
                    "an alias is required for {} principals",
                    policy.principal_type
                ));
            }
            if policy.principal_type == PrincipalType::User {
                directory.resolve_user(alias)
            } else {
                directory.resolve_group(alias)
            }
        }
        PrincipalType::Application | PrincipalType::ServicePrincipal => {
            if !alias.is_empty() {
                return Err(format!(
                    "{} principals must not have an alias (found '{alias}')",
                    policy.principal_type
                ));
            }
            if policy.principal_type == PrincipalType::Application {
                directory.resolve_application(display_name)
            } else {
                directory.resolve_service_principal(display_name)
            }
        }
        PrincipalType::Unknown => return Err("principal type is unknown".to_string()),
    };

    let identity = lookup
        .map_err(|e| format!("directory lookup failed: {e}"))?
        .ok_or_else(|| format!("'{}' was not found in the directory", policy.label()))?;

    if !identity.display_name.trim().eq_ignore_ascii_case(display_name) {
        return Err(format!(
            "display name '{display_name}' does not match directory name '{}'",
            identity.display_name
        ));
    }

    Ok(identity)
}
