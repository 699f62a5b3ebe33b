//! Declarative document loading and saving.
//!
//! A document is an ordered list of vault records, in JSON or YAML:
//!
//! ```yaml
//! - vaultName: kv-payments
//!   resourceGroup: rg-payments
//!   subscriptionId: 00000000-0000-0000-0000-000000000000
//!   location: eastus
//!   tenantId: 11111111-1111-1111-1111-111111111111
//!   policies:
//!     - type: User
//!       displayName: Ada Lovelace
//!       alias: ada@contoso.com
//!       keyPermissions: [read]
//!       secretPermissions: [all]
//!       certificatePermissions: []
//! ```
//!
//! Documents are read into the all-optional raw layer first so that a
//! missing field becomes a schema error naming the field and vault, not a
//! generic parse error.

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::model::VaultRecord;
use super::schema;
use crate::errors::{Result, VaultSyncError};

/// A vault entry exactly as written in a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVault {
    pub vault_name: Option<String>,
    pub resource_group: Option<String>,
    pub subscription_id: Option<String>,
    pub location: Option<String>,
    pub tenant_id: Option<String>,
    pub policies: Option<Vec<RawPolicy>>,
}

/// A principal policy exactly as written in a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPolicy {
    #[serde(rename = "type")]
    pub principal_type: Option<String>,
    pub display_name: Option<String>,
    pub alias: Option<String>,
    pub key_permissions: Option<Vec<String>>,
    pub secret_permissions: Option<Vec<String>>,
    pub certificate_permissions: Option<Vec<String>>,
    pub object_id: Option<String>,
}

/// Supported document encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick a format from the file extension. Unknown extensions are JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("yml" | "yaml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// Parse document text into raw vault entries.
pub fn parse_raw(content: &str, format: DocumentFormat) -> Result<Vec<RawVault>> {
    match format {
        DocumentFormat::Json => serde_json::from_str(content)
            .map_err(|e| VaultSyncError::Serialization(format!("invalid JSON document: {e}"))),
        DocumentFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| VaultSyncError::Serialization(format!("invalid YAML document: {e}"))),
    }
}

/// Parse and schema-validate document text.
pub fn parse(content: &str, format: DocumentFormat) -> Result<Vec<VaultRecord>> {
    let raw = parse_raw(content, format)?;
    schema::validate_document(&raw)
}

/// Load and schema-validate a document from disk.
pub fn load(path: &Path) -> Result<Vec<VaultRecord>> {
    if !path.exists() {
        return Err(VaultSyncError::DocumentNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    let vaults = parse(&content, DocumentFormat::from_path(path))?;
    tracing::debug!(path = %path.display(), vaults = vaults.len(), "loaded document");
    Ok(vaults)
}

/// Save vault records to disk in the format implied by the extension.
pub fn save(path: &Path, vaults: &[VaultRecord]) -> Result<()> {
    let content = match DocumentFormat::from_path(path) {
        DocumentFormat::Json => to_pretty_json(vaults)?,
        DocumentFormat::Yaml => serde_yaml::to_string(vaults)
            .map_err(|e| VaultSyncError::Serialization(format!("document: {e}")))?,
    };
    write_atomic(path, content.as_bytes())
}

/// Serialize any value as pretty JSON with a trailing newline.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value)
        .map_err(|e| VaultSyncError::Serialization(e.to_string()))?;
    json.push('\n');
    Ok(json)
}

/// Write a file **atomically**: write a temp file in the same directory,
/// then rename it over the target so readers never see a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    if !parent.as_os_str().is_empty() && !parent.exists() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// SHA-256 of a file's bytes, base64 encoded. Recorded in the audit log so
/// a run can be traced back to the exact document it applied.
pub fn fingerprint(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(STANDARD.encode(Sha256::digest(&bytes)))
}
