//! Command implementations, one module per subcommand.

pub mod apply;
pub mod audit_cmd;
pub mod check;
pub mod completions;
pub mod diff;
pub mod expand;
pub mod version;
