//! Vault records and principal policies.
//!
//! These are the validated, strongly-typed forms. Documents are first read
//! into the raw layer in [`super::document`] and only become a
//! [`VaultRecord`] after passing [`super::schema`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::vocabulary::PermissionCategory;

/// The kind of security principal a policy grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalType {
    User,
    Group,
    Application,
    ServicePrincipal,
    /// A principal the directory no longer knows about.
    Unknown,
}

impl PrincipalType {
    /// Parse a type name, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "user" => Some(Self::User),
            "group" => Some(Self::Group),
            "application" | "app" => Some(Self::Application),
            "serviceprincipal" | "service principal" | "service-principal" => {
                Some(Self::ServicePrincipal)
            }
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Users and groups are identified by alias, everything else by display name.
    pub fn keyed_by_alias(self) -> bool {
        matches!(self, Self::User | Self::Group)
    }
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "User",
            Self::Group => "Group",
            Self::Application => "Application",
            Self::ServicePrincipal => "ServicePrincipal",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// One principal's grants across keys, secrets and certificates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalPolicy {
    #[serde(rename = "type")]
    pub principal_type: PrincipalType,

    pub display_name: String,

    /// User principal name or group alias. Empty for applications.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alias: String,

    pub key_permissions: Vec<String>,
    pub secret_permissions: Vec<String>,
    pub certificate_permissions: Vec<String>,

    /// Directory object id, known once the principal has been resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl PrincipalPolicy {
    /// A policy with no permissions at all.
    pub fn new(principal_type: PrincipalType, display_name: &str, alias: &str) -> Self {
        Self {
            principal_type,
            display_name: display_name.to_string(),
            alias: alias.to_string(),
            key_permissions: Vec::new(),
            secret_permissions: Vec::new(),
            certificate_permissions: Vec::new(),
            object_id: None,
        }
    }

    /// The key that must be unique per vault: lowercased alias for users
    /// and groups, lowercased display name otherwise.
    pub fn identity_key(&self) -> String {
        if self.principal_type.keyed_by_alias() {
            self.alias.trim().to_lowercase()
        } else {
            self.display_name.trim().to_lowercase()
        }
    }

    /// Human-readable label for messages.
    pub fn label(&self) -> &str {
        if self.principal_type.keyed_by_alias() && !self.alias.trim().is_empty() {
            &self.alias
        } else {
            &self.display_name
        }
    }

    pub fn permissions(&self, category: PermissionCategory) -> &[String] {
        match category {
            PermissionCategory::Keys => &self.key_permissions,
            PermissionCategory::Secrets => &self.secret_permissions,
            PermissionCategory::Certificates => &self.certificate_permissions,
        }
    }

    pub fn set_permissions(&mut self, category: PermissionCategory, permissions: Vec<String>) {
        match category {
            PermissionCategory::Keys => self.key_permissions = permissions,
            PermissionCategory::Secrets => self.secret_permissions = permissions,
            PermissionCategory::Certificates => self.certificate_permissions = permissions,
        }
    }

    /// Case- and whitespace-insensitive permission set for one category.
    pub fn permission_set(&self, category: PermissionCategory) -> BTreeSet<String> {
        self.permissions(category)
            .iter()
            .map(|p| p.trim().to_lowercase())
            .collect()
    }

    /// True when the policy grants nothing in any category.
    pub fn is_empty(&self) -> bool {
        PermissionCategory::ALL
            .iter()
            .all(|c| self.permissions(*c).is_empty())
    }

    /// Structural equality over normalized permission sets. Object ids are
    /// ignored since desired policies never carry them.
    pub fn same_grants(&self, other: &PrincipalPolicy) -> bool {
        self.principal_type == other.principal_type
            && self.identity_key() == other.identity_key()
            && self.display_name.trim().eq_ignore_ascii_case(other.display_name.trim())
            && PermissionCategory::ALL
                .iter()
                .all(|c| self.permission_set(*c) == other.permission_set(*c))
    }
}

/// The full access-policy state of one vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultRecord {
    pub vault_name: String,
    pub resource_group: String,
    pub subscription_id: String,
    pub location: String,
    pub tenant_id: String,
    pub policies: Vec<PrincipalPolicy>,
}

impl VaultRecord {
    /// Find the policy whose identity key matches `key`.
    pub fn find_policy(&self, key: &str) -> Option<&PrincipalPolicy> {
        self.policies.iter().find(|p| p.identity_key() == key)
    }

    /// Whether both records hold the same policies, ignoring order.
    pub fn same_policies(&self, other: &VaultRecord) -> bool {
        self.policies.len() == other.policies.len()
            && self.policies.iter().all(|mine| {
                other
                    .find_policy(&mine.identity_key())
                    .is_some_and(|theirs| mine.same_grants(theirs))
            })
    }

    /// A copy of the identity fields with no policies.
    pub fn without_policies(&self) -> VaultRecord {
        VaultRecord {
            policies: Vec::new(),
            ..self.clone()
        }
    }
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeReport {
    /// Per vault, the permissions the run revokes from existing principals.
    pub dropped_policies: Vec<VaultRecord>,
    pub change_count: usize,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.change_count == 0 && self.dropped_policies.is_empty()
    }

    /// Total number of individual permissions revoked across all vaults.
    pub fn dropped_permission_count(&self) -> usize {
        self.dropped_policies
            .iter()
            .flat_map(|v| v.policies.iter())
            .map(|p| {
                PermissionCategory::ALL
                    .iter()
                    .map(|c| p.permissions(*c).len())
                    .sum::<usize>()
            })
            .sum()
    }
}
