//! One evaluation of "which layout should be active right now"

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use super::overrides::{ApplyReport, OverrideApplier};
use crate::common::constants::switcher;
use crate::common::types::Fingerprint;
use crate::config::ConfigStore;
use crate::engine::{CommandDispatch, LayoutDiscovery};
use crate::monitor::FingerprintGenerator;

/// Result of a completed evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// No layout is bound to the current topology
    Unbound(Fingerprint),
    /// The bound layout is the one applied last
    Unchanged { layout: String },
    Switched { layout: String, report: ApplyReport },
}

#[derive(Debug, Default)]
struct SwitchState {
    /// Empty until a layout load has been dispatched successfully
    last_applied_layout: String,
}

/// Shared by the control loop and manual checks; evaluations never overlap
pub struct SwitchCore {
    fingerprints: FingerprintGenerator,
    store: Arc<ConfigStore>,
    dispatch: Arc<dyn CommandDispatch>,
    applier: OverrideApplier,
    state: Mutex<SwitchState>,
    observed: broadcast::Sender<Fingerprint>,
}

impl SwitchCore {
    pub fn new(
        fingerprints: FingerprintGenerator,
        store: Arc<ConfigStore>,
        discovery: Arc<dyn LayoutDiscovery>,
        dispatch: Arc<dyn CommandDispatch>,
    ) -> Self {
        let (observed, _) = broadcast::channel(switcher::FINGERPRINT_CHANNEL_CAPACITY);
        Self {
            fingerprints,
            store,
            applier: OverrideApplier::new(discovery, Arc::clone(&dispatch)),
            dispatch,
            state: Mutex::new(SwitchState::default()),
            observed,
        }
    }

    /// Every fingerprint computed from now on, bound or not
    pub fn subscribe(&self) -> broadcast::Receiver<Fingerprint> {
        self.observed.subscribe()
    }

    pub fn last_applied_layout(&self) -> Option<String> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        (!state.last_applied_layout.is_empty()).then(|| state.last_applied_layout.clone())
    }

    /// Compute the fingerprint and load its bound layout if that differs from
    /// the last one applied
    ///
    /// Errors are logged, never returned; `None` means the evaluation failed.
    pub fn check_and_switch(&self) -> Option<SwitchOutcome> {
        match self.try_check_and_switch() {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                let message = format!("{:#}", e);
                error!(error = %message, "Layout switch failed");
                None
            }
        }
    }

    fn try_check_and_switch(&self) -> Result<SwitchOutcome> {
        // Held for the whole evaluation so concurrent checks run one at a time
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let fingerprint = self.fingerprints.compute();
        // Nobody listening is fine
        let _ = self.observed.send(fingerprint.clone());

        let target = match self.store.lookup_layout(&fingerprint) {
            Some(layout) if !layout.is_empty() => layout,
            _ => {
                info!(fingerprint = %fingerprint, "No layout bound to monitor topology");
                return Ok(SwitchOutcome::Unbound(fingerprint));
            }
        };

        if target == state.last_applied_layout {
            debug!(fingerprint = %fingerprint, layout = %target, "Layout already applied");
            return Ok(SwitchOutcome::Unchanged { layout: target });
        }

        info!(fingerprint = %fingerprint, layout = %target, "Switching layout");
        self.dispatch
            .load_layout(&target)
            .with_context(|| format!("Failed to load layout '{}'", target))?;
        state.last_applied_layout = target.clone();

        let overrides = self.store.lookup_overrides(&fingerprint);
        let report = self.applier.apply(&target, &overrides);

        Ok(SwitchOutcome::Switched {
            layout: target,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::MonitorDescriptor;
    use crate::switcher::testing::{
        DispatchCall, FakeDiscovery, FakeMonitors, RecordingDispatch, overrides,
    };

    struct Harness {
        _dir: tempfile::TempDir,
        store: Arc<ConfigStore>,
        monitors: Arc<FakeMonitors>,
        dispatch: Arc<RecordingDispatch>,
        core: SwitchCore,
    }

    fn single_1080p() -> Vec<MonitorDescriptor> {
        vec![MonitorDescriptor::new(1920, 1080, 0, 0)]
    }

    fn harness_with(dispatch: RecordingDispatch, discovery: FakeDiscovery) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConfigStore::load(dir.path().join("settings.json")));
        let monitors = Arc::new(FakeMonitors::new(single_1080p()));
        let dispatch = Arc::new(dispatch);
        let core = SwitchCore::new(
            FingerprintGenerator::new(monitors.clone()),
            store.clone(),
            Arc::new(discovery),
            dispatch.clone(),
        );
        Harness {
            _dir: dir,
            store,
            monitors,
            dispatch,
            core,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingDispatch::default(), FakeDiscovery::default())
    }

    #[test]
    fn test_switch_once_then_unchanged() {
        let h = harness();
        h.store
            .set_layout(&Fingerprint::from("1920x1080@0,0"), "Work")
            .unwrap();

        let first = h.core.check_and_switch();
        let second = h.core.check_and_switch();

        assert!(matches!(first, Some(SwitchOutcome::Switched { ref layout, .. }) if layout == "Work"));
        assert_eq!(
            second,
            Some(SwitchOutcome::Unchanged {
                layout: "Work".to_string()
            })
        );
        assert_eq!(h.dispatch.loads(), vec!["Work"]);
        assert_eq!(h.core.last_applied_layout().as_deref(), Some("Work"));
    }

    #[test]
    fn test_unbound_topology_dispatches_nothing() {
        let h = harness();

        let outcome = h.core.check_and_switch();

        assert_eq!(
            outcome,
            Some(SwitchOutcome::Unbound(Fingerprint::from("1920x1080@0,0")))
        );
        assert!(h.dispatch.calls().is_empty());
        assert_eq!(h.core.last_applied_layout(), None);
    }

    #[test]
    fn test_empty_layout_name_counts_as_unbound() {
        let h = harness();
        h.store
            .set_layout(&Fingerprint::from("1920x1080@0,0"), "")
            .unwrap();

        assert!(matches!(
            h.core.check_and_switch(),
            Some(SwitchOutcome::Unbound(_))
        ));
        assert!(h.dispatch.calls().is_empty());
    }

    #[test]
    fn test_topology_change_switches_to_other_binding() {
        let h = harness();
        h.store
            .set_layout(&Fingerprint::from("1920x1080@0,0"), "Work")
            .unwrap();
        h.store
            .set_layout(
                &Fingerprint::from("1920x1080@0,0|2560x1440@1920,0"),
                "Dual",
            )
            .unwrap();

        h.core.check_and_switch();
        h.monitors.set(vec![
            MonitorDescriptor::new(2560, 1440, 1920, 0),
            MonitorDescriptor::new(1920, 1080, 0, 0),
        ]);
        h.core.check_and_switch();
        // Unplugging the second monitor goes back to the first layout
        h.monitors.set(single_1080p());
        h.core.check_and_switch();

        assert_eq!(h.dispatch.loads(), vec!["Work", "Dual", "Work"]);
    }

    #[test]
    fn test_failed_load_keeps_last_applied_and_retries() {
        let h = harness_with(RecordingDispatch::failing_loads(), FakeDiscovery::default());
        h.store
            .set_layout(&Fingerprint::from("1920x1080@0,0"), "Work")
            .unwrap();

        assert_eq!(h.core.check_and_switch(), None);
        assert_eq!(h.core.last_applied_layout(), None);
        // Not marked as applied, so the next evaluation tries again
        assert_eq!(h.core.check_and_switch(), None);
        assert_eq!(h.monitors.queries(), 2);
    }

    #[test]
    fn test_overrides_applied_after_layout_load() {
        let discovery = FakeDiscovery::default().with_skin("Work", "Clock", &["/s/Clock.ini"]);
        let h = harness_with(RecordingDispatch::default(), discovery);
        let fp = Fingerprint::from("1920x1080@0,0");
        h.store.set_layout(&fp, "Work").unwrap();
        h.store
            .set_overrides(&fp, overrides(&[("Clock", "FontSize", "14")]))
            .unwrap();

        let outcome = h.core.check_and_switch();

        let calls = h.dispatch.calls();
        assert_eq!(calls[0], DispatchCall::LoadLayout("Work".to_string()));
        assert!(matches!(calls[1], DispatchCall::WriteKeyValue { ref key, .. } if key == "FontSize"));
        assert_eq!(calls[2], DispatchCall::Refresh("Clock".to_string()));
        assert!(matches!(
            outcome,
            Some(SwitchOutcome::Switched { report, .. }) if report.writes == 1
        ));
    }

    #[test]
    fn test_every_evaluation_publishes_fingerprint() {
        let h = harness();
        let mut observed = h.core.subscribe();
        h.store
            .set_layout(&Fingerprint::from("1920x1080@0,0"), "Work")
            .unwrap();

        h.core.check_and_switch();
        h.core.check_and_switch();
        h.monitors.set(Vec::new());
        h.core.check_and_switch();

        assert_eq!(observed.try_recv().unwrap().as_str(), "1920x1080@0,0");
        assert_eq!(observed.try_recv().unwrap().as_str(), "1920x1080@0,0");
        assert!(observed.try_recv().unwrap().is_empty());
        assert!(observed.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_checks_load_once() {
        let h = harness();
        h.store
            .set_layout(&Fingerprint::from("1920x1080@0,0"), "Work")
            .unwrap();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| h.core.check_and_switch());
            }
        });

        assert_eq!(h.dispatch.loads(), vec!["Work"]);
    }
}
