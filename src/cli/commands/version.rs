//! `vaultsync version` — display version and the permission vocabulary in use.

use console::style;

use crate::errors::Result;
use crate::policy::PermissionCategory;

/// Execute the `version` command.
pub fn execute() -> Result<()> {
    let current = env!("CARGO_PKG_VERSION");
    println!("vaultsync {current}");

    for category in PermissionCategory::ALL {
        println!(
            "  {:<12} {} permissions, {} shorthands",
            style(category.to_string()).cyan(),
            category.base_permissions().len(),
            category.shorthands().len()
        );
    }

    Ok(())
}
