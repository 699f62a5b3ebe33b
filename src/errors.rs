use std::path::PathBuf;
use thiserror::Error;

use crate::policy::{GrammarError, PermissionCategory};

/// All errors that can occur in vaultsync.
///
/// Every variant here is fatal: it aborts the run and is surfaced to the
/// caller verbatim. Recoverable per-vault and per-principal problems are
/// reported as [`crate::sync::Diagnostic`] values instead.
#[derive(Debug, Error)]
pub enum VaultSyncError {
    // --- Schema errors ---
    #[error("Missing {field} for vault '{vault}'")]
    Schema { field: String, vault: String },

    #[error("Unknown principal '{principal}' in vault '{vault}' — it was probably deleted from the directory since the last sync")]
    UnknownPrincipal { principal: String, vault: String },

    #[error("Invalid principal type '{value}' for '{principal}' in vault '{vault}'")]
    InvalidPrincipalType {
        value: String,
        principal: String,
        vault: String,
    },

    // --- Identity drift ---
    #[error("Vault '{vault}' was removed from the desired state — vaults cannot be deleted here")]
    VaultRemoved { vault: String },

    #[error("Vault '{vault}' was added to the desired state — vaults cannot be created here")]
    VaultAdded { vault: String },

    #[error("{field} of vault '{vault}' changed from '{retrieved}' to '{desired}' — only policies may be updated")]
    IdentityDrift {
        vault: String,
        field: &'static str,
        retrieved: String,
        desired: String,
    },

    // --- Grammar errors ---
    #[error("Invalid {category} permissions for '{principal}' in vault '{vault}': {source}")]
    Grammar {
        #[source]
        source: GrammarError,
        category: PermissionCategory,
        principal: String,
        vault: String,
    },

    #[error("A policy for '{key}' is already defined in vault '{vault}'")]
    DuplicatePolicy { key: String, vault: String },

    // --- Safety ---
    #[error("You have changed too many policies: {changes} changes, the maximum is {max}")]
    BudgetExceeded { changes: usize, max: usize },

    #[error("{failed} of {total} vault commits failed")]
    ApplyIncomplete { failed: usize, total: usize },

    // --- Collaborator errors ---
    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Vault '{0}' not found in the directory")]
    VaultNotFound(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    #[error("Document not found at {0}")]
    DocumentNotFound(PathBuf),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Audit error: {0}")]
    Audit(String),
}

impl VaultSyncError {
    /// Short machine-friendly name for the error class, used in the audit log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } | Self::UnknownPrincipal { .. } | Self::InvalidPrincipalType { .. } => {
                "schema"
            }
            Self::VaultRemoved { .. } | Self::VaultAdded { .. } | Self::IdentityDrift { .. } => {
                "identity-drift"
            }
            Self::Grammar { .. } | Self::DuplicatePolicy { .. } => "grammar",
            Self::BudgetExceeded { .. } => "budget",
            Self::ApplyIncomplete { .. } => "apply",
            Self::Directory(_) | Self::VaultNotFound(_) => "directory",
            Self::Config(_) | Self::DocumentNotFound(_) => "config",
            Self::Io(_) | Self::Serialization(_) => "io",
            Self::CommandFailed(_) => "cli",
            Self::Audit(_) => "audit",
        }
    }
}

/// Convenience type alias for vaultsync results.
pub type Result<T> = std::result::Result<T, VaultSyncError>;
