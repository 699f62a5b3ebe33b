use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, VaultSyncError};
use crate::sync::SafetyLimits;

/// Project-level configuration, loaded from `.vaultsync.toml`.
///
/// Every field has a sensible default so vaultsync works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Maximum number of policy changes a single run may apply (default: 5).
    #[serde(default = "default_max_changes")]
    pub max_changes: usize,

    /// Minimum number of users every updated vault must keep (default: 2).
    #[serde(default = "default_min_users")]
    pub min_users: usize,

    /// Directory (relative to project root) for the audit log and reports.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// File name of the dropped-permission report inside `state_dir`.
    #[serde(default = "default_report_file")]
    pub report_file: String,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_max_changes() -> usize {
    5
}

fn default_min_users() -> usize {
    2
}

fn default_state_dir() -> String {
    ".vaultsync".to_string()
}

fn default_report_file() -> String {
    "dropped-permissions.json".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_changes: default_max_changes(),
            min_users: default_min_users(),
            state_dir: default_state_dir(),
            report_file: default_report_file(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    const FILE_NAME: &'static str = ".vaultsync.toml";

    /// Load settings from `<project_dir>/.vaultsync.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultSyncError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Apply command-line overrides on top of the file values.
    pub fn with_overrides(
        mut self,
        max_changes: Option<usize>,
        min_users: Option<usize>,
        state_dir: Option<&str>,
    ) -> Self {
        if let Some(max) = max_changes {
            self.max_changes = max;
        }
        if let Some(min) = min_users {
            self.min_users = min;
        }
        if let Some(dir) = state_dir {
            self.state_dir = dir.to_string();
        }
        self
    }

    /// The safety thresholds consumed by the reconciler.
    pub fn limits(&self) -> SafetyLimits {
        SafetyLimits::new(self.max_changes, self.min_users)
    }

    /// Full path to the dropped-permission report.
    ///
    /// Example: `project_dir/.vaultsync/dropped-permissions.json`
    pub fn report_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.state_dir).join(&self.report_file)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
