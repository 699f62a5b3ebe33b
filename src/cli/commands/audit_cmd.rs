//! `vaultsync audit` — display the run history.
//!
//! Usage:
//!   vaultsync audit                     # last 50 runs
//!   vaultsync audit --since 7d          # runs from the last 7 days
//!   vaultsync audit --vault kv-payments # what happened to one vault

use chrono::Utc;
use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::audit::{AuditLog, RunEntry, VaultEvent};
use crate::cli::output;
use crate::cli::{settings, Cli};
use crate::errors::{Result, VaultSyncError};

/// Fingerprints are shortened to this many characters in the table.
const FINGERPRINT_WIDTH: usize = 12;

/// Execute the `audit` command.
pub fn execute(cli: &Cli, last: usize, since: Option<&str>, vault: Option<&str>) -> Result<()> {
    let settings = settings(cli)?;
    let state_dir = std::env::current_dir()?.join(&settings.state_dir);

    let audit = AuditLog::open(&state_dir)
        .ok_or_else(|| VaultSyncError::Audit("failed to open audit database".into()))?;

    let since_dt = match since {
        Some(s) => Some(parse_duration(s)?),
        None => None,
    };

    match vault {
        Some(name) => {
            let events = audit.vault_history(name, last, since_dt)?;
            if events.is_empty() {
                output::info(&format!("No recorded events for vault '{}'.", name.trim()));
            } else {
                print_vault_table(name.trim(), &events);
            }
        }
        None => {
            let runs = audit.runs(last, since_dt)?;
            if runs.is_empty() {
                output::info("No runs recorded yet.");
            } else {
                print_runs_table(&runs);
            }
        }
    }

    Ok(())
}

/// Parse a human-friendly lookback like "2w", "7d", "24h", "30m" into the
/// earliest timestamp to include.
fn parse_duration(input: &str) -> Result<chrono::DateTime<Utc>> {
    let input = input.trim();
    let invalid = || {
        VaultSyncError::CommandFailed(format!(
            "invalid duration '{input}' — use format like 2w, 7d, 24h, or 30m"
        ))
    };

    let unit = input.chars().last().ok_or_else(invalid)?;
    let amount: i64 = input[..input.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;

    let duration = match unit {
        'w' => chrono::Duration::weeks(amount),
        'd' => chrono::Duration::days(amount),
        'h' => chrono::Duration::hours(amount),
        'm' => chrono::Duration::minutes(amount),
        _ => return Err(invalid()),
    };

    Ok(Utc::now() - duration)
}

fn short_fingerprint(fingerprint: Option<&str>) -> String {
    fingerprint.map_or_else(
        || "-".to_string(),
        |f| f.chars().take(FINGERPRINT_WIDTH).collect(),
    )
}

fn print_runs_table(runs: &[RunEntry]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Run", "Time", "Command", "Outcome", "Changes", "Revoked", "Desired", "Live",
    ]);

    for run in runs {
        let outcome = match &run.error_kind {
            Some(kind) => format!("{} ({kind})", colorize_outcome(&run.outcome)),
            None => colorize_outcome(&run.outcome),
        };
        table.add_row(vec![
            run.id.to_string(),
            run.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            run.command.clone(),
            outcome,
            run.change_count.to_string(),
            run.revoked_permissions.to_string(),
            short_fingerprint(run.desired_fingerprint.as_deref()),
            short_fingerprint(run.live_fingerprint.as_deref()),
        ]);
    }

    println!("{}", style(format!("{} run(s):", runs.len())).bold());
    println!("{table}");
}

fn print_vault_table(vault: &str, events: &[VaultEvent]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Run", "Time", "Event", "Principal", "Details"]);

    for event in events {
        table.add_row(vec![
            event.run_id.to_string(),
            event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            colorize_event(&event.event),
            event.principal.clone().unwrap_or_else(|| "-".into()),
            event.details.clone().unwrap_or_else(|| "-".into()),
        ]);
    }

    println!(
        "{}",
        style(format!("{} event(s) for vault '{vault}':", events.len())).bold()
    );
    println!("{table}");
}

fn colorize_outcome(outcome: &str) -> String {
    match outcome {
        "applied" | "valid" | "no-changes" => style(outcome).green().to_string(),
        "previewed" => style(outcome).magenta().to_string(),
        "partial" | "cancelled" | "running" => style(outcome).yellow().to_string(),
        "aborted" => style(outcome).red().to_string(),
        _ => outcome.to_string(),
    }
}

fn colorize_event(event: &str) -> String {
    match event {
        "commit" => style(event).green().to_string(),
        "commit-failed" => style(event).red().to_string(),
        "skip" | "unresolved" | "warning" => style(event).yellow().to_string(),
        _ => event.to_string(),
    }
}
