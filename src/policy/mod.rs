//! Policy module — the data model and everything that checks a single
//! vault in isolation.
//!
//! This module provides:
//! - Per-category permission tables (`vocabulary`)
//! - `VaultRecord`, `PrincipalPolicy` and `ChangeReport` (`model`)
//! - Shorthand parsing and expansion (`grammar`)
//! - Required-field validation (`schema`)
//! - JSON/YAML document loading and saving (`document`)

pub mod document;
pub mod grammar;
pub mod model;
pub mod schema;
pub mod vocabulary;

// Re-export the most commonly used items.
pub use grammar::GrammarError;
pub use model::{ChangeReport, PrincipalPolicy, PrincipalType, VaultRecord};
pub use vocabulary::PermissionCategory;
