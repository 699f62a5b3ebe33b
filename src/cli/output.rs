//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::policy::{ChangeReport, PermissionCategory};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print the permissions a run revokes (Vault, Principal, Category, Permissions).
pub fn print_dropped_table(report: &ChangeReport) {
    if report.dropped_policies.is_empty() {
        info("No permissions will be revoked.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Vault", "Principal", "Category", "Permissions"]);

    for vault in &report.dropped_policies {
        for policy in &vault.policies {
            for category in PermissionCategory::ALL {
                let revoked = policy.permissions(category);
                if revoked.is_empty() {
                    continue;
                }
                table.add_row(vec![
                    vault.vault_name.clone(),
                    policy.label().to_string(),
                    category.to_string(),
                    style(revoked.join(", ")).red().to_string(),
                ]);
            }
        }
    }

    println!("{table}");
}

/// One-line summary of a change report.
pub fn summary_line(report: &ChangeReport) -> String {
    format!(
        "{} policy change(s), {} permission(s) revoked across {} vault(s)",
        report.change_count,
        report.dropped_permission_count(),
        report.dropped_policies.len()
    )
}
