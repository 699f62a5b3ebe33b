//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::config::Settings;
use crate::errors::{Result, VaultSyncError};

/// vaultsync CLI: declarative access-policy sync for secrets vaults.
#[derive(Parser)]
#[command(
    name = "vaultsync",
    about = "Declarative access-policy reconciliation for secrets vaults",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// State directory for the audit log and reports (default: .vaultsync)
    #[arg(long, global = true, env = "VAULTSYNC_STATE_DIR")]
    pub state_dir: Option<String>,

    /// Maximum number of policy changes a run may apply
    #[arg(long, global = true)]
    pub max_changes: Option<usize>,

    /// Minimum number of users each updated vault must keep
    #[arg(long, global = true)]
    pub min_users: Option<usize>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Validate a desired-state document without contacting anything
    Check {
        /// Path to the desired-state document (JSON or YAML)
        desired: String,
    },

    /// Expand shorthand permission tokens into base permissions
    Expand {
        /// Permission category: keys, secrets or certificates
        category: String,
        /// Tokens to expand (e.g. read "all - purge")
        #[arg(required = true)]
        tokens: Vec<String>,
    },

    /// Show the changes a sync would make, without applying them
    Diff {
        /// Path to the desired-state document
        desired: String,
        /// Path to the retrieved-state snapshot
        live: String,
        /// Write the dropped-permission report to the state directory
        #[arg(long)]
        report: bool,
    },

    /// Apply the desired state to the live snapshot
    Apply {
        /// Path to the desired-state document
        desired: String,
        /// Path to the retrieved-state snapshot (rewritten per committed vault)
        live: String,
        /// Identity directory export used to resolve principals
        #[arg(long)]
        identities: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
        /// Fail the run if any vault could not be committed
        #[arg(long)]
        strict: bool,
    },

    /// View the history of check, diff and apply runs
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 2w, 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
        /// Show the commits and skips recorded for one vault
        #[arg(long)]
        vault: Option<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell)
        shell: String,
        /// Write the script into this directory instead of stdout
        #[arg(long)]
        dir: Option<String>,
    },

    /// Show version information
    Version,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Load `.vaultsync.toml` from the working directory and apply the global
/// command-line overrides.
pub fn settings(cli: &Cli) -> Result<Settings> {
    let cwd = std::env::current_dir()?;
    Ok(Settings::load(&cwd)?.with_overrides(
        cli.max_changes,
        cli.min_users,
        cli.state_dir.as_deref(),
    ))
}

/// Resolve a document argument relative to the working directory and make
/// sure it exists.
pub fn document_path(arg: &str) -> Result<PathBuf> {
    let trimmed = arg.trim();
    if trimmed.is_empty() {
        return Err(VaultSyncError::CommandFailed(
            "document path cannot be empty".into(),
        ));
    }

    let path = std::env::current_dir()?.join(trimmed);
    if !path.is_file() {
        return Err(VaultSyncError::DocumentNotFound(path));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_apply_with_globals() {
        let cli = Cli::try_parse_from([
            "vaultsync",
            "--max-changes",
            "9",
            "apply",
            "desired.json",
            "live.json",
            "--identities",
            "ids.yaml",
            "--force",
        ])
        .unwrap();

        assert_eq!(cli.max_changes, Some(9));
        assert!(cli.min_users.is_none());
        match cli.command {
            Commands::Apply {
                identities,
                force,
                strict,
                ..
            } => {
                assert_eq!(identities, "ids.yaml");
                assert!(force);
                assert!(!strict);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn expand_requires_tokens() {
        assert!(Cli::try_parse_from(["vaultsync", "expand", "keys"]).is_err());
    }

    #[test]
    fn apply_requires_identities() {
        assert!(Cli::try_parse_from(["vaultsync", "apply", "a.json", "b.json"]).is_err());
    }

    #[test]
    fn parses_audit_vault_filter() {
        let cli = Cli::try_parse_from(["vaultsync", "audit", "--vault", "kv-one", "--last", "5"])
            .unwrap();
        match cli.command {
            Commands::Audit { last, vault, since } => {
                assert_eq!(last, 5);
                assert_eq!(vault.as_deref(), Some("kv-one"));
                assert!(since.is_none());
            }
            _ => panic!("expected audit"),
        }
    }

    #[test]
    fn document_path_rejects_empty() {
        assert!(document_path("  ").is_err());
    }

    #[test]
    fn document_path_rejects_missing_file() {
        let err = document_path("definitely-not-here.json").unwrap_err();
        assert!(matches!(err, VaultSyncError::DocumentNotFound(_)));
    }
}
