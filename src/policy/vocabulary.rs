//! Per-category permission vocabularies.
//!
//! Each category owns a fixed list of base permissions and a set of
//! shorthand groups. `all` is always the full base list and is listed
//! first so it is expanded before the narrower groups.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The shorthand that stands for every base permission of a category.
pub const ALL: &str = "all";

const KEY_PERMISSIONS: &[&str] = &[
    "get", "list", "update", "create", "import", "delete", "recover", "backup", "restore",
    "decrypt", "encrypt", "unwrapkey", "wrapkey", "verify", "sign", "purge",
];

const SECRET_PERMISSIONS: &[&str] = &[
    "get", "list", "set", "delete", "recover", "backup", "restore", "purge",
];

const CERTIFICATE_PERMISSIONS: &[&str] = &[
    "get",
    "list",
    "delete",
    "create",
    "import",
    "update",
    "managecontacts",
    "getissuers",
    "listissuers",
    "setissuers",
    "deleteissuers",
    "manageissuers",
    "recover",
    "backup",
    "restore",
    "purge",
];

const KEY_SHORTHANDS: &[(&str, &[&str])] = &[
    (ALL, KEY_PERMISSIONS),
    ("read", &["get", "list"]),
    ("write", &["update", "create", "delete"]),
    ("storage", &["import", "recover", "backup", "restore"]),
    (
        "crypto",
        &["decrypt", "encrypt", "unwrapkey", "wrapkey", "verify", "sign"],
    ),
];

const SECRET_SHORTHANDS: &[(&str, &[&str])] = &[
    (ALL, SECRET_PERMISSIONS),
    ("read", &["get", "list"]),
    ("write", &["set", "delete"]),
    ("storage", &["recover", "backup", "restore"]),
];

const CERTIFICATE_SHORTHANDS: &[(&str, &[&str])] = &[
    (ALL, CERTIFICATE_PERMISSIONS),
    ("read", &["get", "list"]),
    ("write", &["delete", "create", "import", "update"]),
    ("storage", &["recover", "backup", "restore"]),
    (
        "management",
        &[
            "managecontacts",
            "getissuers",
            "listissuers",
            "setissuers",
            "deleteissuers",
            "manageissuers",
        ],
    ),
];

/// One of the three permission families a principal policy grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionCategory {
    Keys,
    Secrets,
    Certificates,
}

impl PermissionCategory {
    /// Every category, in the order policies list them.
    pub const ALL: [PermissionCategory; 3] = [Self::Keys, Self::Secrets, Self::Certificates];

    /// Base permissions in canonical order.
    pub fn base_permissions(self) -> &'static [&'static str] {
        match self {
            Self::Keys => KEY_PERMISSIONS,
            Self::Secrets => SECRET_PERMISSIONS,
            Self::Certificates => CERTIFICATE_PERMISSIONS,
        }
    }

    /// Shorthand groups in expansion order (`all` first).
    pub fn shorthands(self) -> &'static [(&'static str, &'static [&'static str])] {
        match self {
            Self::Keys => KEY_SHORTHANDS,
            Self::Secrets => SECRET_SHORTHANDS,
            Self::Certificates => CERTIFICATE_SHORTHANDS,
        }
    }

    pub fn is_base_permission(self, name: &str) -> bool {
        self.base_permissions().contains(&name)
    }

    /// Look up the base permissions a shorthand stands for.
    pub fn shorthand(self, name: &str) -> Option<&'static [&'static str]> {
        self.shorthands()
            .iter()
            .find(|(shorthand, _)| *shorthand == name)
            .map(|(_, permissions)| *permissions)
    }

    /// Parse a category name (case-insensitive, singular or plural).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "keys" | "key" => Some(Self::Keys),
            "secrets" | "secret" => Some(Self::Secrets),
            "certificates" | "certificate" | "certs" => Some(Self::Certificates),
            _ => None,
        }
    }
}

impl fmt::Display for PermissionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Keys => "key",
            Self::Secrets => "secret",
            Self::Certificates => "certificate",
        };
        f.write_str(name)
    }
}
