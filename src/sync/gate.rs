//! Safety limits checked before anything is applied.

use crate::errors::{Result, VaultSyncError};
use crate::policy::{PrincipalPolicy, PrincipalType};

/// Externally configured safety thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyLimits {
    /// Maximum number of policy changes a single run may apply.
    pub max_changes: usize,
    /// Minimum number of `User` principals every updated vault must keep.
    pub min_users: usize,
}

/// Outcome of the per-vault user check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCheck {
    Sufficient,
    Insufficient { users: usize, required: usize },
}

impl SafetyLimits {
    pub fn new(max_changes: usize, min_users: usize) -> Self {
        Self {
            max_changes,
            min_users,
        }
    }

    /// Global budget: more than `max_changes` aborts the whole apply phase.
    pub fn check_budget(&self, change_count: usize) -> Result<()> {
        if change_count > self.max_changes {
            return Err(VaultSyncError::BudgetExceeded {
                changes: change_count,
                max: self.max_changes,
            });
        }
        Ok(())
    }

    /// Per-vault check. Falling short only skips that vault.
    pub fn check_minimum_users(&self, policies: &[PrincipalPolicy]) -> UserCheck {
        let users = policies
            .iter()
            .filter(|p| p.principal_type == PrincipalType::User)
            .count();
        if users < self.min_users {
            UserCheck::Insufficient {
                users,
                required: self.min_users,
            }
        } else {
            UserCheck::Sufficient
        }
    }
}
