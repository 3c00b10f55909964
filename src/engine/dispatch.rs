//! Launches the layout engine executable with bang commands
//!
//! Every command is a fresh, fire-and-forget process: the engine forwards the
//! bang to its running instance and exits. Arguments go through argv one by
//! one, so values containing spaces need no quoting.
//!
//! When a launcher such as wine wraps the executable, file arguments are
//! rewritten to the wine drive that maps the host root (`/a/b` becomes
//! `Z:\a\b`). A relative or drive-qualified path is passed unchanged.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::CommandDispatch;
use crate::common::constants::engine::{WINE_ROOT_DRIVE, bang};
use crate::config::ConfigStore;

/// Engine commands this application issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bang<'a> {
    LoadLayout(&'a str),
    WriteKeyValue {
        section: &'a str,
        key: &'a str,
        value: &'a str,
        file: &'a Path,
    },
    Refresh(&'a str),
}

impl Bang<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Bang::LoadLayout(_) => bang::LOAD_LAYOUT,
            Bang::WriteKeyValue { .. } => bang::WRITE_KEY_VALUE,
            Bang::Refresh(_) => bang::REFRESH,
        }
    }

    /// Full argv tail passed to a native engine executable
    pub fn args(&self) -> Vec<OsString> {
        self.build_args(|file| file.as_os_str().to_os_string())
    }

    /// Argv tail for an engine running under wine
    pub fn wine_args(&self) -> Vec<OsString> {
        self.build_args(wine_path)
    }

    fn build_args(&self, file_arg: fn(&Path) -> OsString) -> Vec<OsString> {
        let mut args = vec![OsString::from(self.name())];
        match self {
            Bang::LoadLayout(layout) => args.push(layout.into()),
            Bang::WriteKeyValue {
                section,
                key,
                value,
                file,
            } => {
                args.push(section.into());
                args.push(key.into());
                args.push(value.into());
                args.push(file_arg(file));
            }
            Bang::Refresh(skin) => args.push(skin.into()),
        }
        args
    }
}

/// Host path as seen from inside wine
fn wine_path(path: &Path) -> OsString {
    if !path.has_root() {
        return path.as_os_str().to_os_string();
    }
    let mut mapped = OsString::from(WINE_ROOT_DRIVE);
    mapped.push(path.to_string_lossy().replace('/', "\\"));
    mapped
}

/// [`CommandDispatch`] that runs the configured engine executable
///
/// Executable and launcher are read from the store for every command.
pub struct ProcessDispatcher {
    store: Arc<ConfigStore>,
}

impl ProcessDispatcher {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    fn run(&self, bang: Bang<'_>) -> Result<()> {
        let engine = self.store.get().engine.clone();

        if !engine.executable.exists() {
            warn!(
                executable = ?engine.executable,
                bang = bang.name(),
                "Layout engine executable not found, command skipped"
            );
            return Ok(());
        }

        let mut command = match &engine.launcher {
            Some(launcher) => {
                let mut command = Command::new(launcher);
                command.arg(&engine.executable).args(bang.wine_args());
                command
            }
            None => {
                let mut command = Command::new(&engine.executable);
                command.args(bang.args());
                command
            }
        };
        // Launcher chatter (wine fixme lines) stays out of the log
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to launch layout engine for {}", bang.name()))?;
        debug!(pid = child.id(), bang = ?bang, "Dispatched engine command");

        // Reap in the background so finished launches do not linger as zombies
        thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

impl CommandDispatch for ProcessDispatcher {
    fn load_layout(&self, layout: &str) -> Result<()> {
        self.run(Bang::LoadLayout(layout))
    }

    fn write_key_value(&self, file: &Path, section: &str, key: &str, value: &str) -> Result<()> {
        self.run(Bang::WriteKeyValue {
            section,
            key,
            value,
            file,
        })
    }

    fn refresh_skin(&self, skin: &str) -> Result<()> {
        self.run(Bang::Refresh(skin))
    }
}
