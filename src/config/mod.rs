//! Configuration module — project settings from `.vaultsync.toml`.

pub mod settings;

pub use settings::Settings;
