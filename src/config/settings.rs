//! Persisted application settings
//!
//! The whole file is one [`AppConfig`]: fingerprint bindings plus the handful
//! of paths needed to find layouts, skins and the layout engine executable.
//! Every field has a serde default so files written by older versions load.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::common::constants::{engine, switcher};
use crate::common::types::Fingerprint;

/// skin name -> variable name -> override value
pub type VariableOverrideMap = BTreeMap<String, BTreeMap<String, String>>;

/// What to activate when a given monitor topology is seen
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FingerprintConfig {
    #[serde(default)]
    pub layout_name: String,
    /// Per-skin variable overrides applied after the layout loads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_overrides: Option<VariableOverrideMap>,
}

impl FingerprintConfig {
    pub fn new(layout_name: impl Into<String>) -> Self {
        Self {
            layout_name: layout_name.into(),
            variable_overrides: None,
        }
    }

    /// Number of variables overridden across all skins
    pub fn override_count(&self) -> usize {
        self.variable_overrides
            .as_ref()
            .map(|skins| skins.values().map(|vars| vars.len()).sum())
            .unwrap_or(0)
    }
}

/// How to launch the external layout engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_engine_executable")]
    pub executable: PathBuf,
    /// Optional wrapper program (e.g. `wine`) the executable is passed to
    #[serde(default = "default_engine_launcher")]
    pub launcher: Option<String>,
}

/// Root of the persisted state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub configurations: BTreeMap<Fingerprint, FingerprintConfig>,
    #[serde(default)]
    pub start_with_system: bool,
    #[serde(default = "default_layouts_root")]
    pub layouts_root_path: PathBuf,
    #[serde(default = "default_skins_root")]
    pub skins_root_path: PathBuf,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

/// Drop whitespace-only values and skins left without any override
pub fn normalize_overrides(overrides: VariableOverrideMap) -> VariableOverrideMap {
    overrides
        .into_iter()
        .filter_map(|(skin, variables)| {
            let kept: BTreeMap<String, String> = variables
                .into_iter()
                .filter(|(_, value)| !value.trim().is_empty())
                .collect();
            (!kept.is_empty()).then_some((skin, kept))
        })
        .collect()
}

// Default value functions
fn default_layouts_root() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(engine::DATA_DIR);
    path.push(engine::LAYOUTS_DIR);
    path
}

fn default_skins_root() -> PathBuf {
    let mut path = dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    path.push(engine::DATA_DIR);
    path.push(engine::SKINS_DIR);
    path
}

#[cfg(windows)]
fn default_engine_executable() -> PathBuf {
    PathBuf::from(engine::WINDOWS_EXECUTABLE)
}

#[cfg(not(windows))]
fn default_engine_executable() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(engine::WINE_EXECUTABLE)
}

#[cfg(windows)]
fn default_engine_launcher() -> Option<String> {
    None
}

#[cfg(not(windows))]
fn default_engine_launcher() -> Option<String> {
    Some(engine::WINE_LAUNCHER.to_string())
}

fn default_debounce_ms() -> u64 {
    switcher::DEBOUNCE_MS
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            executable: default_engine_executable(),
            launcher: default_engine_launcher(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            configurations: BTreeMap::new(),
            start_with_system: false,
            layouts_root_path: default_layouts_root(),
            skins_root_path: default_skins_root(),
            engine: EngineSettings::default(),
            debounce_ms: default_debounce_ms(),
        }
    }
}
