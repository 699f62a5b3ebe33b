//! `vaultsync expand` — show what a permission list grants.
//!
//! Usage:
//!   vaultsync expand keys read
//!   vaultsync expand secrets "all - purge"

use console::style;

use crate::errors::{Result, VaultSyncError};
use crate::policy::{grammar, PermissionCategory};

/// Execute the `expand` command.
pub fn execute(category: &str, tokens: &[String]) -> Result<()> {
    let category = parse_category(category)?;
    let expanded = grammar::expand(tokens, category)
        .map_err(|e| VaultSyncError::CommandFailed(format!("{category} permissions: {e}")))?;

    if expanded.is_empty() {
        println!("{}", style("(no permissions)").dim());
        return Ok(());
    }

    for permission in &expanded {
        println!("{permission}");
    }

    Ok(())
}

fn parse_category(name: &str) -> Result<PermissionCategory> {
    PermissionCategory::parse(name).ok_or_else(|| {
        VaultSyncError::CommandFailed(format!(
            "unknown permission category '{name}' — supported: keys, secrets, certificates"
        ))
    })
}
