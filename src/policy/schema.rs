//! Required-field validation for vault records and principal policies.
//!
//! Any violation is fatal: the caller must abort the whole load.

use super::document::{RawPolicy, RawVault};
use super::model::{PrincipalPolicy, PrincipalType, VaultRecord};
use crate::errors::{Result, VaultSyncError};

/// Placeholder used in messages when the vault name itself is missing.
const UNNAMED_VAULT: &str = "<unnamed>";

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required(value: &Option<String>, field: &str, vault: &str) -> Result<String> {
    present(value)
        .map(str::to_string)
        .ok_or_else(|| VaultSyncError::Schema {
            field: field.to_string(),
            vault: vault.to_string(),
        })
}

fn required_list(value: &Option<Vec<String>>, field: &str, vault: &str) -> Result<Vec<String>> {
    value.clone().ok_or_else(|| VaultSyncError::Schema {
        field: field.to_string(),
        vault: vault.to_string(),
    })
}

/// Validate every vault of a document, stopping at the first error.
pub fn validate_document(raw: &[RawVault]) -> Result<Vec<VaultRecord>> {
    raw.iter().map(validate_vault).collect()
}

/// Validate one vault record and all of its policies.
pub fn validate_vault(raw: &RawVault) -> Result<VaultRecord> {
    let name_for_errors = present(&raw.vault_name).unwrap_or(UNNAMED_VAULT);

    let vault_name = required(&raw.vault_name, "vaultName", name_for_errors)?;
    let resource_group = required(&raw.resource_group, "resourceGroup", &vault_name)?;
    let subscription_id = required(&raw.subscription_id, "subscriptionId", &vault_name)?;
    let location = required(&raw.location, "location", &vault_name)?;
    let tenant_id = required(&raw.tenant_id, "tenantId", &vault_name)?;

    let raw_policies = raw.policies.as_ref().ok_or_else(|| VaultSyncError::Schema {
        field: "policies".into(),
        vault: vault_name.clone(),
    })?;
    let policies = raw_policies
        .iter()
        .map(|p| validate_policy(p, &vault_name))
        .collect::<Result<Vec<_>>>()?;

    Ok(VaultRecord {
        vault_name,
        resource_group,
        subscription_id,
        location,
        tenant_id,
        policies,
    })
}

/// Validate one principal policy belonging to `vault`.
pub fn validate_policy(raw: &RawPolicy, vault: &str) -> Result<PrincipalPolicy> {
    let type_name = required(&raw.principal_type, "type", vault)?;
    let display_name = required(&raw.display_name, "displayName", vault)?;

    let principal_type =
        PrincipalType::parse(&type_name).ok_or_else(|| VaultSyncError::InvalidPrincipalType {
            value: type_name.clone(),
            principal: display_name.clone(),
            vault: vault.to_string(),
        })?;
    if principal_type == PrincipalType::Unknown {
        return Err(VaultSyncError::UnknownPrincipal {
            principal: display_name,
            vault: vault.to_string(),
        });
    }

    Ok(PrincipalPolicy {
        principal_type,
        display_name,
        alias: present(&raw.alias).unwrap_or_default().to_string(),
        key_permissions: required_list(&raw.key_permissions, "keyPermissions", vault)?,
        secret_permissions: required_list(&raw.secret_permissions, "secretPermissions", vault)?,
        certificate_permissions: required_list(
            &raw.certificate_permissions,
            "certificatePermissions",
            vault,
        )?,
        object_id: present(&raw.object_id).map(str::to_string),
    })
}
