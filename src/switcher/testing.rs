//! In-memory collaborators for switcher tests

use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::common::types::MonitorDescriptor;
use crate::config::VariableOverrideMap;
use crate::engine::{CommandDispatch, LayoutDiscovery};
use crate::monitor::{MonitorSource, TopologyNotifier, TopologySource, TopologySubscription};

pub fn overrides(entries: &[(&str, &str, &str)]) -> VariableOverrideMap {
    let mut map = VariableOverrideMap::new();
    for (skin, name, value) in entries {
        map.entry(skin.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
    }
    map
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchCall {
    LoadLayout(String),
    WriteKeyValue {
        file: PathBuf,
        section: String,
        key: String,
        value: String,
    },
    Refresh(String),
}

/// Records every command; optionally fails writes to one file or every load
#[derive(Default)]
pub struct RecordingDispatch {
    calls: Mutex<Vec<DispatchCall>>,
    failing_file: Option<PathBuf>,
    fail_loads: bool,
}

impl RecordingDispatch {
    pub fn failing_writes_to(file: &str) -> Self {
        Self {
            failing_file: Some(PathBuf::from(file)),
            ..Self::default()
        }
    }

    pub fn failing_loads() -> Self {
        Self {
            fail_loads: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<DispatchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DispatchCall::LoadLayout(layout) => Some(layout),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: DispatchCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl CommandDispatch for RecordingDispatch {
    fn load_layout(&self, layout: &str) -> Result<()> {
        if self.fail_loads {
            return Err(anyhow!("engine launch failed"));
        }
        self.record(DispatchCall::LoadLayout(layout.to_string()));
        Ok(())
    }

    fn write_key_value(&self, file: &Path, section: &str, key: &str, value: &str) -> Result<()> {
        if self.failing_file.as_deref() == Some(file) {
            return Err(anyhow!("write rejected"));
        }
        self.record(DispatchCall::WriteKeyValue {
            file: file.to_path_buf(),
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn refresh_skin(&self, skin: &str) -> Result<()> {
        self.record(DispatchCall::Refresh(skin.to_string()));
        Ok(())
    }
}

/// layout -> skin -> files
#[derive(Default)]
pub struct FakeDiscovery {
    layouts: BTreeMap<String, BTreeMap<String, Vec<PathBuf>>>,
}

impl FakeDiscovery {
    pub fn with_skin(mut self, layout: &str, skin: &str, files: &[&str]) -> Self {
        self.layouts
            .entry(layout.to_string())
            .or_default()
            .insert(skin.to_string(), files.iter().map(PathBuf::from).collect());
        self
    }
}

impl LayoutDiscovery for FakeDiscovery {
    fn list_layouts(&self) -> Vec<String> {
        self.layouts.keys().cloned().collect()
    }

    fn resolve_skins(&self, layout: &str) -> BTreeMap<String, Vec<PathBuf>> {
        self.layouts.get(layout).cloned().unwrap_or_default()
    }

    fn read_variables(&self, _file: &Path, _filter_includes: bool) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Monitor list that tests can swap at any time
#[derive(Default)]
pub struct FakeMonitors {
    monitors: Mutex<Vec<MonitorDescriptor>>,
    queries: AtomicUsize,
}

impl FakeMonitors {
    pub fn new(monitors: Vec<MonitorDescriptor>) -> Self {
        Self {
            monitors: Mutex::new(monitors),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, monitors: Vec<MonitorDescriptor>) {
        *self.monitors.lock().unwrap() = monitors;
    }

    /// How many times the topology was read
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl MonitorSource for FakeMonitors {
    fn monitors(&self) -> Result<Vec<MonitorDescriptor>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.monitors.lock().unwrap().clone())
    }
}

/// Topology source fired by hand
#[derive(Default)]
pub struct ManualTopology {
    notifier: Arc<Mutex<Option<TopologyNotifier>>>,
}

impl ManualTopology {
    /// Deliver one notification if subscribed; returns whether it was delivered
    pub fn fire(&self) -> bool {
        match self.notifier.lock().unwrap().as_ref() {
            Some(notifier) => {
                notifier.notify();
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.notifier.lock().unwrap().is_some()
    }
}

impl TopologySource for ManualTopology {
    fn subscribe(&self, notifier: TopologyNotifier) -> Result<Box<dyn TopologySubscription>> {
        *self.notifier.lock().unwrap() = Some(notifier);
        Ok(Box::new(ManualSubscription {
            notifier: Arc::clone(&self.notifier),
        }))
    }
}

struct ManualSubscription {
    notifier: Arc<Mutex<Option<TopologyNotifier>>>,
}

impl TopologySubscription for ManualSubscription {
    fn unsubscribe(self: Box<Self>) {
        self.notifier.lock().unwrap().take();
    }
}
