//! Non-fatal problems collected during a reconciliation run.

use std::fmt;

use crate::policy::VaultRecord;

/// A recoverable problem. The run continues; only the named vault or
/// principal is affected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The vault has too few `User` principals and was skipped.
    InsufficientUsers {
        vault: String,
        users: usize,
        required: usize,
    },

    /// A principal could not be resolved and its update was dropped.
    IdentityResolution {
        vault: String,
        principal: String,
        reason: String,
    },

    /// Committing one vault failed; the remaining vaults were still processed.
    Commit { vault: String, message: String },
}

impl Diagnostic {
    pub fn vault(&self) -> &str {
        match self {
            Self::InsufficientUsers { vault, .. }
            | Self::IdentityResolution { vault, .. }
            | Self::Commit { vault, .. } => vault,
        }
    }

    /// Short name used in the audit log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientUsers { .. } => "skip",
            Self::IdentityResolution { .. } => "unresolved",
            Self::Commit { .. } => "commit-failed",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientUsers {
                vault,
                users,
                required,
            } => write!(
                f,
                "Skipping vault '{vault}': {users} user(s) granted access, at least {required} required ({} short)",
                required.saturating_sub(*users)
            ),
            Self::IdentityResolution {
                vault,
                principal,
                reason,
            } => write!(f, "Skipping '{principal}' in vault '{vault}': {reason}"),
            Self::Commit { vault, message } => {
                write!(f, "Failed to update vault '{vault}': {message}")
            }
        }
    }
}

/// Receives diagnostics and per-vault outcomes as a run progresses.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);

    /// Called after a vault's policies were committed.
    fn vault_committed(&mut self, _vault: &VaultRecord) {}
}

/// A sink that simply keeps everything in memory.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    diagnostics: Vec<Diagnostic>,
    committed: Vec<String>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Names of the vaults that were committed, in order.
    pub fn committed(&self) -> &[String] {
        &self.committed
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn commit_failures(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::Commit { .. }))
            .count()
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn vault_committed(&mut self, vault: &VaultRecord) {
        self.committed.push(vault.vault_name.clone());
    }
}
