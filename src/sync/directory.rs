//! Collaborator interfaces the reconciler talks to.
//!
//! Real deployments back these with the secrets service's management API
//! and its identity directory. The file-backed implementations in
//! [`super::local`] serve offline runs and tests.

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::policy::{PrincipalPolicy, VaultRecord};

/// A directory object a policy resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub object_id: String,
    pub display_name: String,
    /// User principal name for users, mail nickname for groups.
    #[serde(default)]
    pub alias: Option<String>,
    /// Application (client) id for applications and service principals.
    #[serde(default)]
    pub application_id: Option<String>,
}

/// Reads and writes vault access policies.
pub trait VaultDirectory {
    /// Retrieve the live record of one vault.
    fn fetch(&self, subscription_id: &str, resource_group: &str, vault_name: &str)
        -> Result<VaultRecord>;

    /// Replace a vault's access policies. Every policy carries a resolved
    /// `object_id`.
    fn commit(
        &mut self,
        resource_group: &str,
        vault_name: &str,
        policies: &[PrincipalPolicy],
        tenant_id: &str,
    ) -> Result<()>;
}

/// Looks principals up in the identity directory. `Ok(None)` means the
/// principal does not exist.
pub trait IdentityDirectory {
    fn resolve_user(&self, alias: &str) -> Result<Option<Identity>>;
    fn resolve_group(&self, alias_prefix: &str) -> Result<Option<Identity>>;
    fn resolve_application(&self, display_name_prefix: &str) -> Result<Option<Identity>>;
    fn resolve_service_principal(&self, display_name_prefix: &str) -> Result<Option<Identity>>;
}
