//! Desired-versus-retrieved comparison.
//!
//! Identity fields of a vault never change here; only its policies do.
//! [`compute_changes`] normalizes the policies of both sides through the
//! shorthand grammar before comparing, so `["read"]` and `["get", "list"]`
//! are the same grant wherever they appear.

use std::collections::HashSet;

use crate::errors::{Result, VaultSyncError};
use crate::policy::{grammar, ChangeReport, PermissionCategory, PrincipalPolicy, VaultRecord};

/// Output of [`compute_changes`]: the report plus the normalized desired
/// vaults that actually need an update.
#[derive(Debug, Clone, Default)]
pub struct ChangePlan {
    pub report: ChangeReport,
    pub pending: Vec<VaultRecord>,
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

pub(crate) fn find_vault<'a>(vaults: &'a [VaultRecord], name: &str) -> Option<&'a VaultRecord> {
    vaults.iter().find(|v| same_name(&v.vault_name, name))
}

/// Reject vaults that were added, removed, or had an identity field changed.
pub fn check_identity(desired: &[VaultRecord], retrieved: &[VaultRecord]) -> Result<()> {
    for vault in retrieved {
        if find_vault(desired, &vault.vault_name).is_none() {
            return Err(VaultSyncError::VaultRemoved {
                vault: vault.vault_name.clone(),
            });
        }
    }

    for vault in desired {
        let current = find_vault(retrieved, &vault.vault_name).ok_or_else(|| {
            VaultSyncError::VaultAdded {
                vault: vault.vault_name.clone(),
            }
        })?;
        check_vault_identity(vault, current)?;
    }

    Ok(())
}

fn check_vault_identity(desired: &VaultRecord, retrieved: &VaultRecord) -> Result<()> {
    let fields: [(&'static str, &str, &str); 4] = [
        (
            "resourceGroup",
            desired.resource_group.as_str(),
            retrieved.resource_group.as_str(),
        ),
        (
            "subscriptionId",
            desired.subscription_id.as_str(),
            retrieved.subscription_id.as_str(),
        ),
        ("location", desired.location.as_str(), retrieved.location.as_str()),
        ("tenantId", desired.tenant_id.as_str(), retrieved.tenant_id.as_str()),
    ];

    for (field, wanted, current) in fields {
        if wanted.trim() != current.trim() {
            return Err(VaultSyncError::IdentityDrift {
                vault: desired.vault_name.clone(),
                field,
                retrieved: current.trim().to_string(),
                desired: wanted.trim().to_string(),
            });
        }
    }
    Ok(())
}

/// Expand every permission list of a policy into base permissions.
pub fn normalize_policy(policy: &PrincipalPolicy, vault: &str) -> Result<PrincipalPolicy> {
    let mut normalized = policy.clone();
    for category in PermissionCategory::ALL {
        let expanded = grammar::expand(policy.permissions(category), category).map_err(|source| {
            VaultSyncError::Grammar {
                source,
                category,
                principal: policy.label().to_string(),
                vault: vault.to_string(),
            }
        })?;
        normalized.set_permissions(category, expanded);
    }
    Ok(normalized)
}

/// Normalize every policy of a vault and reject duplicate principals.
pub fn normalize_vault(vault: &VaultRecord) -> Result<VaultRecord> {
    let mut seen = HashSet::new();
    let mut policies = Vec::with_capacity(vault.policies.len());

    for policy in &vault.policies {
        let normalized = normalize_policy(policy, &vault.vault_name)?;
        if !seen.insert(normalized.identity_key()) {
            return Err(VaultSyncError::DuplicatePolicy {
                key: policy.label().to_string(),
                vault: vault.vault_name.clone(),
            });
        }
        policies.push(normalized);
    }

    Ok(VaultRecord {
        policies,
        ..vault.clone()
    })
}

/// Permissions `retrieved` grants that `desired` no longer does, as a
/// policy carrying only those permissions. `None` when nothing is lost.
pub fn removed_permissions(
    desired: &PrincipalPolicy,
    retrieved: &PrincipalPolicy,
) -> Option<PrincipalPolicy> {
    let mut dropped = PrincipalPolicy::new(
        retrieved.principal_type,
        &retrieved.display_name,
        &retrieved.alias,
    );

    for category in PermissionCategory::ALL {
        let kept = desired.permission_set(category);
        let removed: Vec<String> = retrieved
            .permissions(category)
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !kept.contains(p))
            .collect();
        dropped.set_permissions(category, removed);
    }

    (!dropped.is_empty()).then_some(dropped)
}

/// Count the policy changes between desired and retrieved state.
///
/// Deletions are counted from the retrieved side, additions and updates
/// from the desired side, so no policy is counted twice. Grammar and
/// duplicate-policy errors are fatal.
pub fn compute_changes(desired: &[VaultRecord], retrieved: &[VaultRecord]) -> Result<ChangePlan> {
    let mut plan = ChangePlan::default();

    for vault in desired {
        let current = find_vault(retrieved, &vault.vault_name).ok_or_else(|| {
            VaultSyncError::VaultAdded {
                vault: vault.vault_name.clone(),
            }
        })?;
        let normalized = normalize_vault(vault)?;
        let current = normalize_vault(current)?;

        if normalized.same_policies(&current) {
            tracing::debug!(vault = %vault.vault_name, "no policy changes");
            continue;
        }

        let mut changes = 0;
        for existing in &current.policies {
            if normalized.find_policy(&existing.identity_key()).is_none() {
                tracing::debug!(vault = %vault.vault_name, principal = %existing.label(), "policy removed");
                changes += 1;
            }
        }

        let mut dropped = current.without_policies();
        for policy in &normalized.policies {
            match current.find_policy(&policy.identity_key()) {
                None => {
                    tracing::debug!(vault = %vault.vault_name, principal = %policy.label(), "policy added");
                    changes += 1;
                }
                Some(existing) if !policy.same_grants(existing) => {
                    tracing::debug!(vault = %vault.vault_name, principal = %policy.label(), "policy updated");
                    changes += 1;
                    if let Some(lost) = removed_permissions(policy, existing) {
                        dropped.policies.push(lost);
                    }
                }
                Some(_) => {}
            }
        }

        if !dropped.policies.is_empty() {
            plan.report.dropped_policies.push(dropped);
        }
        plan.report.change_count += changes;
        plan.pending.push(normalized);
    }

    Ok(plan)
}
