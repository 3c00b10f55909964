//! Configuration management
//!
//! Handles the fingerprint → layout bindings with JSON persistence, plus
//! archiving of settings files (manual backups and corrupt files).

pub mod backup;
pub mod settings;
pub mod store;

pub use backup::{BackupKind, BackupManager};
pub use settings::{AppConfig, FingerprintConfig, VariableOverrideMap};
pub use store::{ConfigStore, StoreError};
