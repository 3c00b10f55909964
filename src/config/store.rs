//! Fingerprint → layout binding store
//!
//! [`ConfigStore`] owns the single in-memory [`AppConfig`] and is the only
//! writer of the settings file. Every mutation rewrites the whole file before
//! returning; mutation frequency is bounded by user edits, so there is no
//! write batching.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::backup::{BackupKind, BackupManager};
use super::settings::{AppConfig, VariableOverrideMap, normalize_overrides};
use crate::common::constants::config;
use crate::common::types::Fingerprint;

/// Failures surfaced to callers of user-initiated edits
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write settings to {path:?}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no layout is bound to fingerprint '{0}'; bind a layout first")]
    BindingNotFound(Fingerprint),
}

pub struct ConfigStore {
    path: PathBuf,
    config: RwLock<AppConfig>,
}

impl ConfigStore {
    /// Settings file location: `$DISPLAY_LAYOUT_SWITCHER_CONFIG_DIR` or the
    /// per-user config dir
    pub fn default_path() -> PathBuf {
        let mut path = match std::env::var_os(config::DIR_ENV_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
                dir.push(config::APP_DIR);
                dir
            }
        };
        path.push(config::FILENAME);
        path
    }

    /// Load settings from `path`, falling back to defaults
    ///
    /// Never fails: a missing file yields defaults, and a file that cannot be
    /// parsed is moved into the backup directory before defaults are used.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = Self::read_or_default(&path);
        Self {
            path,
            config: RwLock::new(config),
        }
    }

    fn read_or_default(path: &Path) -> AppConfig {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = ?path, "Settings file not found, using defaults");
                return AppConfig::default();
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Settings file unreadable, using defaults");
                return AppConfig::default();
            }
        };

        match serde_json::from_str::<AppConfig>(&contents) {
            Ok(config) => {
                info!(
                    path = ?path,
                    bindings = config.configurations.len(),
                    "Loaded settings"
                );
                config
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Settings file is corrupt, using defaults");
                Self::quarantine(path);
                AppConfig::default()
            }
        }
    }

    fn quarantine(path: &Path) {
        let backups = BackupManager::for_config(path);
        match backups.create_backup(path, BackupKind::Corrupt) {
            Ok(archive) => {
                warn!(archive = ?archive, "Archived corrupt settings file");
                // Archived once; later loads see a missing file
                if let Err(e) = fs::remove_file(path) {
                    warn!(path = ?path, error = %e, "Failed to remove corrupt settings file");
                }
                if let Err(e) =
                    backups.prune_backups(BackupKind::Corrupt, config::backup::CORRUPT_RETENTION)
                {
                    warn!(error = %e, "Failed to prune corrupt settings archives");
                }
            }
            Err(e) => warn!(error = %e, "Failed to archive corrupt settings file"),
        }
    }

    /// Re-read the settings file, replacing the in-memory state
    ///
    /// Picks up edits made by other processes; the fallback rules of
    /// [`ConfigStore::load`] apply.
    pub fn reload(&self) {
        let config = Self::read_or_default(&self.path);
        *self.write_guard() = config;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read access to the live settings
    ///
    /// Not a copy: hold the guard briefly, writers block while it is alive.
    pub fn get(&self) -> RwLockReadGuard<'_, AppConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Owned copy of the current settings
    pub fn snapshot(&self) -> AppConfig {
        self.get().clone()
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, AppConfig> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the settings and write them out
    pub fn save(&self, new_config: AppConfig) -> Result<(), StoreError> {
        self.mutate(|config| {
            *config = new_config;
            Ok(())
        })
    }

    /// Bind `layout_name` to `fingerprint`, keeping any existing overrides
    pub fn set_layout(&self, fingerprint: &Fingerprint, layout_name: &str) -> Result<(), StoreError> {
        self.mutate(|config| {
            config
                .configurations
                .entry(fingerprint.clone())
                .or_default()
                .layout_name = layout_name.to_string();
            Ok(())
        })?;
        info!(fingerprint = %fingerprint, layout = %layout_name, "Bound layout");
        Ok(())
    }

    /// Replace the overrides of an existing binding
    pub fn set_overrides(
        &self,
        fingerprint: &Fingerprint,
        overrides: VariableOverrideMap,
    ) -> Result<(), StoreError> {
        let overrides = normalize_overrides(overrides);
        self.mutate(|config| {
            let binding = config
                .configurations
                .get_mut(fingerprint)
                .ok_or_else(|| StoreError::BindingNotFound(fingerprint.clone()))?;
            binding.variable_overrides = Some(overrides);
            Ok(())
        })?;
        debug!(fingerprint = %fingerprint, "Updated variable overrides");
        Ok(())
    }

    /// Remove a binding; writes the file even when nothing was bound
    pub fn remove_binding(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        let removed = self.mutate(|config| Ok(config.configurations.remove(fingerprint)))?;
        if removed.is_some() {
            info!(fingerprint = %fingerprint, "Removed binding");
        }
        Ok(())
    }

    pub fn lookup_layout(&self, fingerprint: &Fingerprint) -> Option<String> {
        self.get()
            .configurations
            .get(fingerprint)
            .map(|binding| binding.layout_name.clone())
    }

    pub fn lookup_overrides(&self, fingerprint: &Fingerprint) -> VariableOverrideMap {
        self.get()
            .configurations
            .get(fingerprint)
            .and_then(|binding| binding.variable_overrides.clone())
            .unwrap_or_default()
    }

    /// All fingerprint → layout pairs, ordered by fingerprint
    pub fn bindings(&self) -> Vec<(Fingerprint, String)> {
        self.get()
            .configurations
            .iter()
            .map(|(fingerprint, binding)| (fingerprint.clone(), binding.layout_name.clone()))
            .collect()
    }

    /// Update the layouts and/or skins root directories
    pub fn set_paths(
        &self,
        layouts_root: Option<PathBuf>,
        skins_root: Option<PathBuf>,
    ) -> Result<(), StoreError> {
        self.mutate(|config| {
            if let Some(path) = layouts_root {
                config.layouts_root_path = path;
            }
            if let Some(path) = skins_root {
                config.skins_root_path = path;
            }
            Ok(())
        })
    }

    pub fn set_start_with_system(&self, enabled: bool) -> Result<(), StoreError> {
        self.mutate(|config| {
            config.start_with_system = enabled;
            Ok(())
        })
    }

    /// Apply `change` and persist; on a failed write the previous state is
    /// restored so memory never runs ahead of disk
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut AppConfig) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut config = self.write_guard();
        let previous = config.clone();

        let result = change(&mut *config)?;

        if let Err(e) = self.write_file(&config) {
            *config = previous;
            return Err(e);
        }
        Ok(result)
    }

    fn write_file(&self, config: &AppConfig) -> Result<(), StoreError> {
        let storage_error = |source: io::Error| StoreError::Storage {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(storage_error)?;
        }

        let json = serde_json::to_string_pretty(config)
            .map_err(|e| storage_error(io::Error::other(e)))?;

        // Write beside the target and rename so a crash never truncates it
        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        fs::write(&tmp_path, json).map_err(storage_error)?;
        fs::rename(&tmp_path, &self.path).map_err(storage_error)?;

        debug!(path = ?self.path, "Saved settings");
        Ok(())
    }
}
