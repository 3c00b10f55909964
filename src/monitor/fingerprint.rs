use std::sync::Arc;

use tracing::{debug, error};

use super::MonitorSource;
use crate::common::types::Fingerprint;

/// Computes the [`Fingerprint`] of the monitors connected right now
#[derive(Clone)]
pub struct FingerprintGenerator {
    source: Arc<dyn MonitorSource>,
}

impl FingerprintGenerator {
    pub fn new(source: Arc<dyn MonitorSource>) -> Self {
        Self { source }
    }

    /// Never fails: an unreadable topology is reported as no monitors, which
    /// yields the empty fingerprint
    pub fn compute(&self) -> Fingerprint {
        let monitors = match self.source.monitors() {
            Ok(monitors) => monitors,
            Err(e) => {
                error!(error = %e, "Failed to enumerate monitors");
                Vec::new()
            }
        };
        let fingerprint = Fingerprint::from_monitors(&monitors);
        debug!(monitors = monitors.len(), fingerprint = %fingerprint, "Computed fingerprint");
        fingerprint
    }
}
