//! File-backed collaborators.
//!
//! `SnapshotDirectory` treats a saved snapshot document as the live
//! service: commits rewrite the snapshot atomically. `StaticIdentityDirectory`
//! answers lookups from a JSON or YAML export of the identity directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::directory::{Identity, IdentityDirectory, VaultDirectory};
use crate::errors::{Result, VaultSyncError};
use crate::policy::document::{self, DocumentFormat};
use crate::policy::{PrincipalPolicy, VaultRecord};

/// A vault directory stored in a snapshot document on disk.
pub struct SnapshotDirectory {
    path: PathBuf,
    vaults: Vec<VaultRecord>,
}

impl SnapshotDirectory {
    /// Load the snapshot at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let vaults = document::load(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            vaults,
        })
    }

    /// The current contents, including any commits made so far.
    pub fn vaults(&self) -> &[VaultRecord] {
        &self.vaults
    }

    fn position(&self, resource_group: &str, vault_name: &str) -> Option<usize> {
        self.vaults.iter().position(|v| {
            v.vault_name.eq_ignore_ascii_case(vault_name)
                && v.resource_group.eq_ignore_ascii_case(resource_group)
        })
    }
}

impl VaultDirectory for SnapshotDirectory {
    fn fetch(
        &self,
        subscription_id: &str,
        resource_group: &str,
        vault_name: &str,
    ) -> Result<VaultRecord> {
        self.position(resource_group, vault_name)
            .map(|i| &self.vaults[i])
            .filter(|v| v.subscription_id.eq_ignore_ascii_case(subscription_id))
            .cloned()
            .ok_or_else(|| VaultSyncError::VaultNotFound(vault_name.to_string()))
    }

    fn commit(
        &mut self,
        resource_group: &str,
        vault_name: &str,
        policies: &[PrincipalPolicy],
        tenant_id: &str,
    ) -> Result<()> {
        let index = self
            .position(resource_group, vault_name)
            .ok_or_else(|| VaultSyncError::VaultNotFound(vault_name.to_string()))?;

        if !self.vaults[index].tenant_id.eq_ignore_ascii_case(tenant_id) {
            return Err(VaultSyncError::Directory(format!(
                "vault '{vault_name}' belongs to tenant '{}', not '{tenant_id}'",
                self.vaults[index].tenant_id
            )));
        }
        if let Some(missing) = policies.iter().find(|p| p.object_id.is_none()) {
            return Err(VaultSyncError::Directory(format!(
                "policy for '{}' has no object id",
                missing.label()
            )));
        }

        self.vaults[index].policies = policies.to_vec();
        document::save(&self.path, &self.vaults)?;
        tracing::info!(vault = %vault_name, policies = policies.len(), "snapshot updated");
        Ok(())
    }
}

/// An identity directory export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticIdentityDirectory {
    #[serde(default)]
    pub users: Vec<Identity>,
    #[serde(default)]
    pub groups: Vec<Identity>,
    #[serde(default)]
    pub applications: Vec<Identity>,
    #[serde(default)]
    pub service_principals: Vec<Identity>,
}

impl StaticIdentityDirectory {
    /// Load an export from a JSON or YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VaultSyncError::DocumentNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        match DocumentFormat::from_path(path) {
            DocumentFormat::Json => serde_json::from_str(&content).map_err(|e| {
                VaultSyncError::Serialization(format!("invalid identity directory: {e}"))
            }),
            DocumentFormat::Yaml => serde_yaml::from_str(&content).map_err(|e| {
                VaultSyncError::Serialization(format!("invalid identity directory: {e}"))
            }),
        }
    }
}

fn alias_of(identity: &Identity) -> &str {
    identity.alias.as_deref().unwrap_or_default()
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value.to_lowercase().starts_with(&prefix.trim().to_lowercase())
}

fn first_match<'a>(
    candidates: &'a [Identity],
    key: impl Fn(&'a Identity) -> &'a str,
    prefix: &str,
) -> Option<Identity> {
    if prefix.trim().is_empty() {
        return None;
    }
    candidates
        .iter()
        .find(|c| starts_with_ignore_case(key(*c), prefix))
        .cloned()
}

impl IdentityDirectory for StaticIdentityDirectory {
    fn resolve_user(&self, alias: &str) -> Result<Option<Identity>> {
        Ok(self
            .users
            .iter()
            .find(|u| alias_of(u).eq_ignore_ascii_case(alias.trim()))
            .cloned())
    }

    fn resolve_group(&self, alias_prefix: &str) -> Result<Option<Identity>> {
        Ok(first_match(&self.groups, alias_of, alias_prefix))
    }

    fn resolve_application(&self, display_name_prefix: &str) -> Result<Option<Identity>> {
        Ok(first_match(
            &self.applications,
            |i| i.display_name.as_str(),
            display_name_prefix,
        ))
    }

    fn resolve_service_principal(&self, display_name_prefix: &str) -> Result<Option<Identity>> {
        Ok(first_match(
            &self.service_principals,
            |i| i.display_name.as_str(),
            display_name_prefix,
        ))
    }
}
