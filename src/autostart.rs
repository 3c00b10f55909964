//! Start with the desktop session via an XDG autostart entry

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::common::constants::autostart;

pub struct AutostartEntry {
    path: PathBuf,
}

impl AutostartEntry {
    /// `$XDG_CONFIG_HOME/autostart/display-layout-switcher.desktop`
    pub fn for_current_user() -> Result<Self> {
        let mut path = dirs::config_dir().context("Could not determine config directory")?;
        path.push(autostart::DIR);
        path.push(autostart::FILENAME);
        Ok(Self { path })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_file()
    }

    /// Write or remove the entry; enabling points it at the running binary
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        if enabled {
            let exe = std::env::current_exe().context("Failed to resolve executable path")?;
            self.enable(&exe)
        } else {
            self.disable()
        }
    }

    pub fn enable(&self, executable: &Path) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create autostart directory")?;
        }
        fs::write(&self.path, desktop_entry(executable))
            .with_context(|| format!("Failed to write autostart entry {:?}", self.path))?;
        info!(path = ?self.path, "Enabled start with system");
        Ok(())
    }

    /// Missing entry counts as already disabled
    pub fn disable(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = ?self.path, "Disabled start with system");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove autostart entry {:?}", self.path))
            }
        }
    }
}

fn desktop_entry(executable: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=Display Layout Switcher\n\
         Comment=Switch desktop layouts when monitors change\n\
         Exec={} run --minimized\n\
         Terminal=false\n\
         X-GNOME-Autostart-enabled=true\n",
        quote_exec_arg(&executable.to_string_lossy())
    )
}

/// Quote per the desktop entry `Exec` rules when the path needs it
fn quote_exec_arg(arg: &str) -> String {
    const RESERVED: &[char] = &[
        ' ', '\t', '"', '\'', '\\', '>', '<', '~', '|', '&', ';', '$', '*', '?', '#', '(', ')',
        '`',
    ];
    if !arg.contains(RESERVED) {
        return arg.to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if matches!(c, '"' | '`' | '$' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
