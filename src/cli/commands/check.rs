//! `vaultsync check` — validate a desired-state document offline.
//!
//! Usage:
//!   vaultsync check policies.yaml

use std::path::Path;

use crate::audit::{RunOutcome, RunRecorder};
use crate::cli::output;
use crate::cli::{document_path, settings, Cli};
use crate::errors::Result;
use crate::policy::{document, PrincipalType, VaultRecord};
use crate::sync::differ::normalize_vault;

/// Execute the `check` command.
pub fn execute(cli: &Cli, desired: &str) -> Result<()> {
    let settings = settings(cli)?;
    let path = document_path(desired)?;
    let recorder = RunRecorder::start(
        &settings,
        "check",
        Some(&document::fingerprint(&path)?),
        None,
    );

    let (vaults, policies, warnings) = match validate(&path, &recorder) {
        Ok(counts) => counts,
        Err(e) => {
            recorder.abort(e.kind());
            return Err(e);
        }
    };
    recorder.finish(RunOutcome::Valid, 0, 0);

    output::success(&format!(
        "{} is valid: {} vault(s), {} policies",
        path.display(),
        vaults,
        policies
    ));
    if warnings > 0 {
        output::tip("Principals with warnings will be skipped when the document is applied.");
    }

    Ok(())
}

/// Schema, grammar and duplicate-principal validation. Returns the vault,
/// policy and warning counts.
fn validate(path: &Path, recorder: &RunRecorder) -> Result<(usize, usize, usize)> {
    let vaults = document::load(path)?;

    let mut policies = 0;
    let mut warnings = 0;
    for vault in &vaults {
        let normalized = normalize_vault(vault)?;
        policies += normalized.policies.len();
        for w in alias_warnings(&normalized) {
            output::warning(&w);
            recorder.event(&vault.vault_name, "warning", None, Some(&w));
            warnings += 1;
        }
    }

    Ok((vaults.len(), policies, warnings))
}

/// Principals whose alias does not fit their type; these can never resolve.
pub fn alias_warnings(vault: &VaultRecord) -> Vec<String> {
    let mut warnings = Vec::new();
    for policy in &vault.policies {
        let has_alias = !policy.alias.trim().is_empty();
        match policy.principal_type {
            PrincipalType::User | PrincipalType::Group if !has_alias => warnings.push(format!(
                "'{}' in vault '{}' is a {} without an alias",
                policy.display_name, vault.vault_name, policy.principal_type
            )),
            PrincipalType::Application | PrincipalType::ServicePrincipal if has_alias => {
                warnings.push(format!(
                    "'{}' in vault '{}' is a {} but has alias '{}'",
                    policy.display_name, vault.vault_name, policy.principal_type, policy.alias
                ))
            }
            _ => {}
        }
    }
    warnings
}
