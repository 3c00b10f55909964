//! Configuration Backup Manager
//!
//! Archives copies of the settings file as .tar.gz files in a 'backups'
//! subdirectory next to it. A settings file that fails to parse is archived
//! here before defaults replace it, so the user's bindings can be recovered.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{error, info};

use crate::common::constants::config::backup;

/// Why a backup was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    /// Requested by the user; never pruned
    Manual,
    /// Settings file that could not be parsed at startup
    Corrupt,
}

impl BackupKind {
    fn prefix(self) -> &'static str {
        match self {
            BackupKind::Manual => "manual_backup",
            BackupKind::Corrupt => "corrupt_backup",
        }
    }

    fn from_filename(filename: &str) -> Option<Self> {
        [BackupKind::Manual, BackupKind::Corrupt]
            .into_iter()
            .find(|kind| filename.starts_with(kind.prefix()))
    }
}

/// Represents a backup file
#[derive(Debug, Clone)]
pub struct BackupEntry {
    pub filename: String,
    pub path: PathBuf,
    pub timestamp: SystemTime,
    pub kind: BackupKind,
}

pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    /// Manager for the backup directory that sits next to `config_path`
    pub fn for_config(config_path: &Path) -> Self {
        let mut dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        dir.push(backup::SUBDIR);
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Archive `source` as `<kind>_YYYYMMDD_HHMMSS.tar.gz`
    pub fn create_backup(&self, source: &Path, kind: BackupKind) -> Result<PathBuf> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).context("Failed to create backup directory")?;
        }

        let datetime: chrono::DateTime<chrono::Local> = SystemTime::now().into();
        let timestamp_str = datetime.format("%Y%m%d_%H%M%S").to_string();

        // Two backups within the same second get a numeric suffix
        let mut backup_path = self
            .dir
            .join(format!("{}_{}.tar.gz", kind.prefix(), timestamp_str));
        let mut suffix = 1;
        while backup_path.exists() {
            backup_path = self.dir.join(format!(
                "{}_{}_{}.tar.gz",
                kind.prefix(),
                timestamp_str,
                suffix
            ));
            suffix += 1;
        }

        let entry_name = source
            .file_name()
            .context("Backup source has no file name")?
            .to_os_string();
        let mut file = fs::File::open(source)
            .with_context(|| format!("Failed to open {:?} for backup", source))?;

        let tar_gz = fs::File::create(&backup_path).context("Failed to create backup file")?;
        let enc = GzEncoder::new(tar_gz, Compression::default());
        let mut tar = tar::Builder::new(enc);
        tar.append_file(&entry_name, &mut file)
            .context("Failed to add settings file to archive")?;
        tar.into_inner()
            .context("Failed to finish backup archive")?
            .finish()
            .context("Failed to finish backup compression")?;

        info!(path = ?backup_path, kind = ?kind, "Created backup");
        Ok(backup_path)
    }

    /// List all available backups, sorted by date (newest first)
    pub fn list_backups(&self) -> Result<Vec<BackupEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("gz") {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().to_string();
            let Some(kind) = BackupKind::from_filename(&filename) else {
                continue;
            };
            let timestamp = fs::metadata(&path)?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);

            backups.push(BackupEntry {
                filename,
                path,
                timestamp,
                kind,
            });
        }

        // Newest first; filenames embed the timestamp and break mtime ties
        backups.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.filename.cmp(&a.filename))
        });

        Ok(backups)
    }

    /// Keep only the newest `retention_count` backups of `kind`
    pub fn prune_backups(&self, kind: BackupKind, retention_count: usize) -> Result<()> {
        let backups = self.list_backups()?;
        let matching: Vec<&BackupEntry> = backups.iter().filter(|b| b.kind == kind).collect();

        if matching.len() > retention_count {
            for backup in &matching[retention_count..] {
                if let Err(e) = fs::remove_file(&backup.path) {
                    error!(path = ?backup.path, error = %e, "Failed to prune backup");
                } else {
                    info!(filename = %backup.filename, "Pruned old backup");
                }
            }
        }
        Ok(())
    }
}
