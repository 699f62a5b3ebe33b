//! `vaultsync completions` — generate shell completion scripts.
//!
//! Usage:
//!   vaultsync completions bash > ~/.bash_completion.d/vaultsync
//!   vaultsync completions zsh --dir ~/.zfunc

use std::io;
use std::path::Path;

use clap::CommandFactory;
use clap_complete::{generate, generate_to, Shell};

use crate::cli::output;
use crate::cli::Cli;
use crate::errors::{Result, VaultSyncError};

const BIN_NAME: &str = "vaultsync";

/// Execute the `completions` command.
///
/// Writes to stdout, or into `dir` when one is given.
pub fn execute(shell: &str, dir: Option<&str>) -> Result<()> {
    let shell = parse_shell(shell)?;
    let mut cmd = Cli::command();

    match dir {
        Some(dir) => {
            let dir = Path::new(dir);
            std::fs::create_dir_all(dir)?;
            let path = generate_to(shell, &mut cmd, BIN_NAME, dir)?;
            output::success(&format!("Wrote {shell} completions to {}", path.display()));
        }
        None => generate(shell, &mut cmd, BIN_NAME, &mut io::stdout()),
    }
    Ok(())
}

/// Parse a shell name string into a `Shell` enum.
fn parse_shell(name: &str) -> Result<Shell> {
    match name.trim().to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        "powershell" | "pwsh" | "ps" => Ok(Shell::PowerShell),
        "elvish" => Ok(Shell::Elvish),
        other => Err(VaultSyncError::CommandFailed(format!(
            "unknown shell '{other}' — supported: bash, zsh, fish, powershell, elvish"
        ))),
    }
}
