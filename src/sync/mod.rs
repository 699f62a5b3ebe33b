//! Sync module — comparing desired and retrieved state and applying the
//! difference.
//!
//! This module provides:
//! - Identity-drift checks and change computation (`differ`)
//! - The change budget and minimum-user rule (`gate`)
//! - Non-fatal diagnostics and their sink (`diagnostics`)
//! - Collaborator traits (`directory`) and file-backed versions (`local`)
//! - The `reconcile` entry point (`reconciler`)

pub mod diagnostics;
pub mod differ;
pub mod directory;
pub mod gate;
pub mod local;
pub mod reconciler;

// Re-export the most commonly used items.
pub use diagnostics::{Diagnostic, DiagnosticLog, DiagnosticSink};
pub use differ::{check_identity, compute_changes, ChangePlan};
pub use directory::{Identity, IdentityDirectory, VaultDirectory};
pub use gate::{SafetyLimits, UserCheck};
pub use local::{SnapshotDirectory, StaticIdentityDirectory};
pub use reconciler::reconcile;
