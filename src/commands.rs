//! Command implementations behind the CLI
//!
//! Each command loads the store once, does its work and returns. Only `run`
//! stays resident.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::autostart::AutostartEntry;
use crate::common::types::Fingerprint;
use crate::config::{BackupKind, BackupManager, ConfigStore};
use crate::engine::{FsLayoutDiscovery, LayoutDiscovery, ProcessDispatcher};
use crate::monitor::{FingerprintGenerator, X11MonitorSource, X11TopologySource};
use crate::switcher::{AutoSwitcher, SwitchCore, SwitchOutcome};

/// Shared handles every command works from
pub struct App {
    store: Arc<ConfigStore>,
    discovery: Arc<dyn LayoutDiscovery>,
    fingerprints: FingerprintGenerator,
}

impl App {
    pub fn new(store: ConfigStore) -> Self {
        let store = Arc::new(store);
        Self {
            discovery: Arc::new(FsLayoutDiscovery::new(Arc::clone(&store))),
            fingerprints: FingerprintGenerator::new(Arc::new(X11MonitorSource)),
            store,
        }
    }

    fn switch_core(&self) -> SwitchCore {
        SwitchCore::new(
            self.fingerprints.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.discovery),
            Arc::new(ProcessDispatcher::new(Arc::clone(&self.store))),
        )
    }

    /// An explicit fingerprint, or the one of the monitors connected now
    fn fingerprint_or_current(&self, explicit: Option<String>) -> Fingerprint {
        match explicit {
            Some(fingerprint) => Fingerprint::from(fingerprint),
            None => self.fingerprints.compute(),
        }
    }
}

fn describe(fingerprint: &Fingerprint) -> String {
    if fingerprint.is_empty() {
        "(no monitors)".to_string()
    } else {
        fingerprint.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlSignal {
    Interrupt,
    Terminate,
    Reload,
}

/// Process signals `run` reacts to
///
/// Streams are registered once up front; a signal arriving while the loop is
/// busy stays queued until the next `recv`.
struct ControlSignals {
    interrupt: Signal,
    terminate: Signal,
    hangup: Signal,
}

impl ControlSignals {
    fn register() -> Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())
                .context("Failed to register SIGINT handler")?,
            terminate: signal(SignalKind::terminate())
                .context("Failed to register SIGTERM handler")?,
            hangup: signal(SignalKind::hangup()).context("Failed to register SIGHUP handler")?,
        })
    }

    async fn recv(&mut self) -> ControlSignal {
        tokio::select! {
            _ = self.interrupt.recv() => ControlSignal::Interrupt,
            _ = self.terminate.recv() => ControlSignal::Terminate,
            _ = self.hangup.recv() => ControlSignal::Reload,
        }
    }
}

/// Run the auto switcher until interrupted
pub fn run(app: &App, minimized: bool) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;
    rt.block_on(run_switcher(app, minimized))
}

async fn run_switcher(app: &App, minimized: bool) -> Result<()> {
    let debounce = Duration::from_millis(app.store.get().debounce_ms);
    let core = Arc::new(app.switch_core());
    let mut switcher = AutoSwitcher::new(Arc::clone(&core), Arc::new(X11TopologySource), debounce);
    let mut observed = switcher.subscribe();

    let mut signals = ControlSignals::register()?;

    switcher.start()?;
    if !minimized {
        println!("Watching monitor topology, press Ctrl-C to quit");
    }

    loop {
        tokio::select! {
            received = signals.recv() => match received {
                ControlSignal::Interrupt => {
                    info!("Interrupted, shutting down");
                    break;
                }
                ControlSignal::Terminate => {
                    info!("SIGTERM received, shutting down");
                    break;
                }
                // Edits made by other invocations of this binary
                ControlSignal::Reload => {
                    info!("SIGHUP received, reloading settings");
                    app.store.reload();
                    if !switcher.check_now() {
                        warn!("Auto switcher not running, reload not evaluated");
                    }
                }
            },
            received = observed.recv() => match received {
                Ok(fingerprint) => {
                    info!(fingerprint = %fingerprint, "Fingerprint observed");
                    if !minimized {
                        println!("{}", describe(&fingerprint));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed fingerprint events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    let evaluations = *switcher.evaluations().borrow();
    info!(
        evaluations,
        phase = ?switcher.phase(),
        layout = ?core.last_applied_layout(),
        "Stopping auto switcher"
    );
    switcher.stop().await;
    Ok(())
}

pub fn print_fingerprint(app: &App) {
    println!("{}", describe(&app.fingerprints.compute()));
}

pub fn list_layouts(app: &App) {
    let layouts = app.discovery.list_layouts();
    if layouts.is_empty() {
        eprintln!(
            "No layouts found in {}",
            app.store.get().layouts_root_path.display()
        );
        return;
    }
    for layout in layouts {
        println!("{}", layout);
    }
}

pub fn list_bindings(app: &App) {
    let config = app.store.get();
    if config.configurations.is_empty() {
        eprintln!("No bindings");
        return;
    }
    for (fingerprint, binding) in &config.configurations {
        let overrides = binding.override_count();
        if overrides > 0 {
            println!(
                "{} -> {} ({} overrides)",
                describe(fingerprint),
                binding.layout_name,
                overrides
            );
        } else {
            println!("{} -> {}", describe(fingerprint), binding.layout_name);
        }
    }
}

pub fn bind(app: &App, fingerprint: Option<String>, layout: &str) -> Result<()> {
    let fingerprint = app.fingerprint_or_current(fingerprint);
    if !app.discovery.list_layouts().iter().any(|l| l == layout) {
        warn!(layout = %layout, "Layout not found under the layouts root, binding anyway");
    }
    app.store.set_layout(&fingerprint, layout)?;
    println!("Bound {} to {}", layout, describe(&fingerprint));
    Ok(())
}

pub fn unbind(app: &App, fingerprint: Option<String>) -> Result<()> {
    let fingerprint = app.fingerprint_or_current(fingerprint);
    app.store.remove_binding(&fingerprint)?;
    println!("Unbound {}", describe(&fingerprint));
    Ok(())
}

/// Each active skin's variables with their defaults and any override
pub fn show_skins(app: &App, layout: &str, fingerprint: Option<String>) {
    let fingerprint = app.fingerprint_or_current(fingerprint);
    let overrides = app.store.lookup_overrides(&fingerprint);
    let skins = app.discovery.resolve_skins(layout);
    if skins.is_empty() {
        eprintln!("No active skins in layout '{}'", layout);
        return;
    }

    for (skin, files) in &skins {
        // The first file carries the variables shown for the skin
        let Some(first) = files.first() else {
            continue;
        };
        let variables = app.discovery.read_variables(first, true);
        if variables.is_empty() {
            continue;
        }

        println!("[{}]", skin);
        let skin_overrides = overrides.get(skin);
        for (name, default) in &variables {
            match skin_overrides.and_then(|vars| vars.get(name)) {
                Some(value) => println!("  {} = {} (default {})", name, value, default),
                None => println!("  {} = {}", name, default),
            }
        }
    }
}

/// Add, replace or (with an empty value) remove one override
pub fn set_override(
    app: &App,
    fingerprint: Option<String>,
    skin: &str,
    variable: &str,
    value: &str,
) -> Result<()> {
    let fingerprint = app.fingerprint_or_current(fingerprint);
    let mut overrides = app.store.lookup_overrides(&fingerprint);
    overrides
        .entry(skin.to_string())
        .or_default()
        .insert(variable.to_string(), value.to_string());
    app.store.set_overrides(&fingerprint, overrides)?;

    if value.trim().is_empty() {
        println!("Removed override {}.{}", skin, variable);
    } else {
        println!("Set {}.{} = {}", skin, variable, value);
    }
    Ok(())
}

pub fn clear_overrides(app: &App, fingerprint: Option<String>) -> Result<()> {
    let fingerprint = app.fingerprint_or_current(fingerprint);
    app.store.set_overrides(&fingerprint, Default::default())?;
    println!("Cleared overrides for {}", describe(&fingerprint));
    Ok(())
}

/// One immediate evaluation, without debounce
pub fn apply(app: &App) {
    match app.switch_core().check_and_switch() {
        Some(SwitchOutcome::Switched { layout, report }) => {
            println!("Loaded {} ({} variable writes)", layout, report.writes);
            if !report.is_clean() {
                eprintln!("{} variable writes failed", report.failed_writes);
            }
        }
        Some(SwitchOutcome::Unchanged { layout }) => println!("{} already applied", layout),
        Some(SwitchOutcome::Unbound(fingerprint)) => {
            println!("No layout bound to {}", describe(&fingerprint));
        }
        None => eprintln!("Switch failed, see log for details"),
    }
}

pub fn paths(app: &App, layouts: Option<PathBuf>, skins: Option<PathBuf>) -> Result<()> {
    if layouts.is_some() || skins.is_some() {
        app.store.set_paths(layouts, skins)?;
    }
    let config = app.store.get();
    println!("settings: {}", app.store.path().display());
    println!("layouts:  {}", config.layouts_root_path.display());
    println!("skins:    {}", config.skins_root_path.display());
    println!("engine:   {}", config.engine.executable.display());
    let autostart = AutostartEntry::for_current_user()
        .map(|entry| entry.is_enabled())
        .unwrap_or(false);
    println!("autostart: {}", if autostart { "on" } else { "off" });
    Ok(())
}

pub fn set_autostart(app: &App, enabled: bool) -> Result<()> {
    toggle_autostart(&app.store, &AutostartEntry::for_current_user()?, enabled)?;
    println!(
        "Start with system {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

/// Persist the flag, then write or remove the entry; a failed entry update
/// restores the previous flag so both stay in agreement
fn toggle_autostart(store: &ConfigStore, entry: &AutostartEntry, enabled: bool) -> Result<()> {
    let previous = store.get().start_with_system;
    store.set_start_with_system(enabled)?;

    if let Err(e) = entry.set_enabled(enabled) {
        if let Err(revert) = store.set_start_with_system(previous) {
            warn!(error = %revert, "Failed to restore start with system setting");
        }
        return Err(e);
    }
    Ok(())
}

pub fn backup(app: &App) -> Result<()> {
    if !app.store.path().exists() {
        // Nothing on disk yet; write the current state so there is something to archive
        app.store.save(app.store.snapshot())?;
    }
    let archive = BackupManager::for_config(app.store.path())
        .create_backup(app.store.path(), BackupKind::Manual)?;
    println!("{}", archive.display());
    Ok(())
}

pub fn list_backups(app: &App) -> Result<()> {
    let manager = BackupManager::for_config(app.store.path());
    let backups = manager.list_backups()?;
    if backups.is_empty() {
        eprintln!("No backups in {}", manager.dir().display());
        return Ok(());
    }
    for entry in backups {
        let datetime: chrono::DateTime<chrono::Local> = entry.timestamp.into();
        println!(
            "{}  {:<7}  {}",
            datetime.format("%Y-%m-%d %H:%M:%S"),
            match entry.kind {
                BackupKind::Manual => "manual",
                BackupKind::Corrupt => "corrupt",
            },
            entry.path.display()
        );
    }
    Ok(())
}
