//! Monitor topology: where the current monitor geometry comes from and how
//! changes to it are announced

pub mod fingerprint;
pub mod x11;

use anyhow::Result;
use std::fmt;
use std::sync::Arc;

use crate::common::types::MonitorDescriptor;

pub use fingerprint::FingerprintGenerator;
pub use x11::{X11MonitorSource, X11TopologySource};

/// Enumerates the monitors that are currently connected
pub trait MonitorSource: Send + Sync {
    fn monitors(&self) -> Result<Vec<MonitorDescriptor>>;
}

/// Callback handed to a [`TopologySource`]; safe to call from any thread
#[derive(Clone)]
pub struct TopologyNotifier {
    notify: Arc<dyn Fn() + Send + Sync>,
}

impl TopologyNotifier {
    pub fn new(notify: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            notify: Arc::new(notify),
        }
    }

    pub fn notify(&self) {
        (self.notify)();
    }
}

impl fmt::Debug for TopologyNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopologyNotifier").finish_non_exhaustive()
    }
}

/// Emits a notification whenever the monitor topology may have changed
///
/// Notifications carry no payload and may be spurious or bursty; consumers
/// debounce them and recompute the fingerprint.
pub trait TopologySource: Send + Sync {
    fn subscribe(&self, notifier: TopologyNotifier) -> Result<Box<dyn TopologySubscription>>;
}

/// Live subscription; delivery stops once `unsubscribe` returns
pub trait TopologySubscription: Send {
    fn unsubscribe(self: Box<Self>);
}
