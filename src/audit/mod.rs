//! Run history in SQLite.
//!
//! Every `check`, `diff` and `apply` invocation is one row in `runs`,
//! carrying the fingerprints of the documents it read, its change totals
//! and how it ended. What happened to each vault during an apply (commit,
//! skip, unresolved principal, failed commit) goes to `vault_events`,
//! keyed by run, so a single vault's history can be pulled out later.
//!
//! The database lives at `<state_dir>/audit.db`. Commands never fail
//! because of it: [`RunRecorder`] turns every write into a no-op when the
//! database is unavailable.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::config::Settings;
use crate::errors::{Result, VaultSyncError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at           TEXT NOT NULL,
    command              TEXT NOT NULL,
    desired_fingerprint  TEXT,
    live_fingerprint     TEXT,
    outcome              TEXT NOT NULL DEFAULT 'running',
    change_count         INTEGER NOT NULL DEFAULT 0,
    revoked_permissions  INTEGER NOT NULL DEFAULT 0,
    error_kind           TEXT
);
CREATE TABLE IF NOT EXISTS vault_events (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id     INTEGER NOT NULL REFERENCES runs (id),
    timestamp  TEXT NOT NULL,
    vault      TEXT NOT NULL COLLATE NOCASE,
    event      TEXT NOT NULL,
    principal  TEXT,
    details    TEXT
);
CREATE INDEX IF NOT EXISTS vault_events_by_vault ON vault_events (vault, id);
";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// `check` found the document valid.
    Valid,
    /// `diff` computed a plan; nothing was written.
    Previewed,
    /// Desired and live state already matched.
    NoChanges,
    /// Every pending vault was committed.
    Applied,
    /// Some vaults were skipped or failed to commit.
    Partial,
    /// The confirmation prompt was declined.
    Cancelled,
    /// A fatal error stopped the run.
    Aborted,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Previewed => "previewed",
            Self::NoChanges => "no-changes",
            Self::Applied => "applied",
            Self::Partial => "partial",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        }
    }
}

/// One row of `runs`.
#[derive(Debug, Clone)]
pub struct RunEntry {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub command: String,
    pub desired_fingerprint: Option<String>,
    pub live_fingerprint: Option<String>,
    /// `running` until the run finishes.
    pub outcome: String,
    pub change_count: usize,
    pub revoked_permissions: usize,
    pub error_kind: Option<String>,
}

/// One row of `vault_events`.
#[derive(Debug, Clone)]
pub struct VaultEvent {
    pub run_id: i64,
    pub timestamp: DateTime<Utc>,
    pub vault: String,
    pub event: String,
    pub principal: Option<String>,
    pub details: Option<String>,
}

/// SQLite-backed run history.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the database at `<state_dir>/audit.db`.
    ///
    /// `None` means the history is unavailable; callers carry on without it.
    pub fn open(state_dir: &Path) -> Option<Self> {
        std::fs::create_dir_all(state_dir).ok()?;
        let db_path = Self::db_path(state_dir);
        let conn = Connection::open(&db_path).ok()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        conn.execute_batch(SCHEMA).ok()?;
        Some(Self { conn })
    }

    pub fn db_path(state_dir: &Path) -> PathBuf {
        state_dir.join("audit.db")
    }

    /// Insert a `running` row for a new run and return its id.
    pub fn begin_run(
        &self,
        command: &str,
        desired_fingerprint: Option<&str>,
        live_fingerprint: Option<&str>,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO runs (started_at, command, desired_fingerprint, live_fingerprint)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    Utc::now().to_rfc3339(),
                    command,
                    desired_fingerprint,
                    live_fingerprint
                ],
            )
            .map_err(|e| VaultSyncError::Audit(format!("begin run: {e}")))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Store the final outcome and totals of a run.
    pub fn finish_run(
        &self,
        run_id: i64,
        outcome: RunOutcome,
        change_count: usize,
        revoked_permissions: usize,
        error_kind: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE runs
                 SET outcome = ?2, change_count = ?3, revoked_permissions = ?4, error_kind = ?5
                 WHERE id = ?1",
                params![
                    run_id,
                    outcome.as_str(),
                    to_sql_count(change_count),
                    to_sql_count(revoked_permissions),
                    error_kind
                ],
            )
            .map_err(|e| VaultSyncError::Audit(format!("finish run {run_id}: {e}")))?;
        Ok(())
    }

    /// Attach a per-vault event to a run.
    pub fn record_event(
        &self,
        run_id: i64,
        vault: &str,
        event: &str,
        principal: Option<&str>,
        details: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO vault_events (run_id, timestamp, vault, event, principal, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    run_id,
                    Utc::now().to_rfc3339(),
                    vault.trim(),
                    event,
                    principal,
                    details
                ],
            )
            .map_err(|e| VaultSyncError::Audit(format!("record event: {e}")))?;
        Ok(())
    }

    /// Most recent runs first, optionally only those started after `since`.
    pub fn runs(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<RunEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, started_at, command, desired_fingerprint, live_fingerprint,
                        outcome, change_count, revoked_permissions, error_kind
                 FROM runs
                 WHERE ?1 IS NULL OR started_at >= ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| VaultSyncError::Audit(format!("query prepare: {e}")))?;

        let rows = stmt
            .query_map(
                params![since.map(|ts| ts.to_rfc3339()), to_sql_count(limit)],
                |row| {
                    Ok(RunEntry {
                        id: row.get(0)?,
                        started_at: parse_timestamp(&row.get::<_, String>(1)?),
                        command: row.get(2)?,
                        desired_fingerprint: row.get(3)?,
                        live_fingerprint: row.get(4)?,
                        outcome: row.get(5)?,
                        change_count: from_sql_count(row.get(6)?),
                        revoked_permissions: from_sql_count(row.get(7)?),
                        error_kind: row.get(8)?,
                    })
                },
            )
            .map_err(|e| VaultSyncError::Audit(format!("query exec: {e}")))?;

        let entries = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| VaultSyncError::Audit(format!("row parse: {e}")))?;
        Ok(entries)
    }

    /// Events for one vault, most recent first. Vault names match
    /// case-insensitively.
    pub fn vault_history(
        &self,
        vault: &str,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<VaultEvent>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT run_id, timestamp, vault, event, principal, details
                 FROM vault_events
                 WHERE vault = ?1 AND (?2 IS NULL OR timestamp >= ?2)
                 ORDER BY id DESC
                 LIMIT ?3",
            )
            .map_err(|e| VaultSyncError::Audit(format!("query prepare: {e}")))?;

        let rows = stmt
            .query_map(
                params![
                    vault.trim(),
                    since.map(|ts| ts.to_rfc3339()),
                    to_sql_count(limit)
                ],
                |row| {
                    Ok(VaultEvent {
                        run_id: row.get(0)?,
                        timestamp: parse_timestamp(&row.get::<_, String>(1)?),
                        vault: row.get(2)?,
                        event: row.get(3)?,
                        principal: row.get(4)?,
                        details: row.get(5)?,
                    })
                },
            )
            .map_err(|e| VaultSyncError::Audit(format!("query exec: {e}")))?;

        let entries = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| VaultSyncError::Audit(format!("row parse: {e}")))?;
        Ok(entries)
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

fn to_sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn from_sql_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

/// Records one command invocation into the configured state directory.
///
/// Every method is fire-and-forget: write failures are logged at debug
/// level and never reach the caller.
pub struct RunRecorder {
    audit: Option<AuditLog>,
    run_id: Option<i64>,
}

impl RunRecorder {
    /// Open the history and insert the run row.
    pub fn start(
        settings: &Settings,
        command: &str,
        desired_fingerprint: Option<&str>,
        live_fingerprint: Option<&str>,
    ) -> Self {
        let audit = std::env::current_dir()
            .ok()
            .and_then(|cwd| AuditLog::open(&cwd.join(&settings.state_dir)));
        Self::with_log(audit, command, desired_fingerprint, live_fingerprint)
    }

    fn with_log(
        audit: Option<AuditLog>,
        command: &str,
        desired_fingerprint: Option<&str>,
        live_fingerprint: Option<&str>,
    ) -> Self {
        let run_id = audit.as_ref().and_then(|log| {
            log.begin_run(command, desired_fingerprint, live_fingerprint)
                .map_err(|e| tracing::debug!(error = %e, command, "audit write failed"))
                .ok()
        });
        Self { audit, run_id }
    }

    fn target(&self) -> Option<(&AuditLog, i64)> {
        Some((self.audit.as_ref()?, self.run_id?))
    }

    pub fn event(&self, vault: &str, event: &str, principal: Option<&str>, details: Option<&str>) {
        if let Some((log, run_id)) = self.target() {
            if let Err(e) = log.record_event(run_id, vault, event, principal, details) {
                tracing::debug!(error = %e, vault, event, "audit write failed");
            }
        }
    }

    pub fn finish(&self, outcome: RunOutcome, change_count: usize, revoked_permissions: usize) {
        self.close(outcome, change_count, revoked_permissions, None);
    }

    /// Mark the run as stopped by a fatal error of the given kind.
    pub fn abort(&self, error_kind: &str) {
        self.close(RunOutcome::Aborted, 0, 0, Some(error_kind));
    }

    fn close(
        &self,
        outcome: RunOutcome,
        change_count: usize,
        revoked_permissions: usize,
        error_kind: Option<&str>,
    ) {
        if let Some((log, run_id)) = self.target() {
            if let Err(e) =
                log.finish_run(run_id, outcome, change_count, revoked_permissions, error_kind)
            {
                tracing::debug!(error = %e, run_id, "audit write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_missing_state_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join(".vaultsync");
        assert!(AuditLog::open(&nested).is_some());
        assert!(nested.join("audit.db").exists());
    }

    #[test]
    fn open_fails_when_state_dir_is_a_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();
        assert!(AuditLog::open(&file).is_none());
    }

    #[test]
    fn finished_run_keeps_fingerprints_and_totals() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();

        let id = audit
            .begin_run("apply", Some("desired-sha"), Some("live-sha"))
            .unwrap();
        assert_eq!(audit.runs(1, None).unwrap()[0].outcome, "running");

        audit
            .finish_run(id, RunOutcome::Partial, 4, 7, None)
            .unwrap();

        let run = &audit.runs(10, None).unwrap()[0];
        assert_eq!(run.id, id);
        assert_eq!(run.command, "apply");
        assert_eq!(run.desired_fingerprint.as_deref(), Some("desired-sha"));
        assert_eq!(run.live_fingerprint.as_deref(), Some("live-sha"));
        assert_eq!(run.outcome, "partial");
        assert_eq!(run.change_count, 4);
        assert_eq!(run.revoked_permissions, 7);
        assert!(run.error_kind.is_none());
    }

    #[test]
    fn runs_are_newest_first_and_limited() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();

        for command in ["check", "diff", "apply"] {
            audit.begin_run(command, None, None).unwrap();
        }

        let runs = audit.runs(2, None).unwrap();
        let commands: Vec<&str> = runs.iter().map(|r| r.command.as_str()).collect();
        assert_eq!(commands, ["apply", "diff"]);
    }

    #[test]
    fn runs_since_filter() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();
        audit.begin_run("diff", None, Some("live")).unwrap();

        let past = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(audit.runs(10, Some(past)).unwrap().len(), 1);

        let future = Utc::now() + chrono::Duration::hours(1);
        assert!(audit.runs(10, Some(future)).unwrap().is_empty());
    }

    #[test]
    fn vault_history_matches_name_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();
        let id = audit.begin_run("apply", None, None).unwrap();

        audit
            .record_event(id, "kv-one", "unresolved", Some("ada@contoso.com"), None)
            .unwrap();
        audit
            .record_event(id, "kv-two", "skip", None, Some("1 user"))
            .unwrap();
        audit
            .record_event(id, " KV-One ", "commit", None, Some("3 policies"))
            .unwrap();

        let events = audit.vault_history("KV-ONE", 10, None).unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(kinds, ["commit", "unresolved"]);
        assert!(events.iter().all(|e| e.run_id == id));
        assert_eq!(events[1].principal.as_deref(), Some("ada@contoso.com"));
    }

    #[test]
    fn recorder_writes_run_and_events() {
        let dir = TempDir::new().unwrap();
        let recorder = RunRecorder::with_log(AuditLog::open(dir.path()), "apply", Some("d"), Some("l"));
        recorder.event("kv-one", "commit", None, Some("2 policies"));
        recorder.finish(RunOutcome::Applied, 2, 1);

        let audit = AuditLog::open(dir.path()).unwrap();
        let run = &audit.runs(1, None).unwrap()[0];
        assert_eq!(run.outcome, "applied");
        assert_eq!(run.change_count, 2);
        assert_eq!(audit.vault_history("kv-one", 10, None).unwrap().len(), 1);
    }

    #[test]
    fn recorder_abort_stores_error_kind() {
        let dir = TempDir::new().unwrap();
        let recorder = RunRecorder::with_log(AuditLog::open(dir.path()), "diff", None, None);
        recorder.abort("budget");

        let run = &AuditLog::open(dir.path()).unwrap().runs(1, None).unwrap()[0];
        assert_eq!(run.outcome, "aborted");
        assert_eq!(run.error_kind.as_deref(), Some("budget"));
    }

    #[test]
    fn recorder_without_database_is_a_no_op() {
        let recorder = RunRecorder::with_log(None, "apply", None, None);
        recorder.event("kv-one", "commit", None, None);
        recorder.finish(RunOutcome::Applied, 1, 0);
    }

    #[cfg(unix)]
    #[test]
    fn audit_db_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let _audit = AuditLog::open(dir.path()).unwrap();

        let perms = std::fs::metadata(dir.path().join("audit.db"))
            .unwrap()
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }
}
