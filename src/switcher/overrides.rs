//! Pushes a binding's variable overrides into the skins of a loaded layout

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::common::constants::engine;
use crate::config::VariableOverrideMap;
use crate::engine::{CommandDispatch, LayoutDiscovery};

/// What one `apply` call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub writes: usize,
    pub failed_writes: usize,
    pub refreshed_skins: usize,
    /// Overridden skins that are not active in the layout
    pub skipped_skins: usize,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failed_writes == 0
    }
}

pub struct OverrideApplier {
    discovery: Arc<dyn LayoutDiscovery>,
    dispatch: Arc<dyn CommandDispatch>,
}

impl OverrideApplier {
    pub fn new(discovery: Arc<dyn LayoutDiscovery>, dispatch: Arc<dyn CommandDispatch>) -> Self {
        Self {
            discovery,
            dispatch,
        }
    }

    /// Write every override into each file of its skin, then refresh the skin
    ///
    /// Failures are logged per write and counted; they never stop the rest.
    pub fn apply(&self, layout: &str, overrides: &VariableOverrideMap) -> ApplyReport {
        let mut report = ApplyReport::default();
        if overrides.is_empty() {
            return report;
        }

        let skins = self.discovery.resolve_skins(layout);

        for (skin, variables) in overrides {
            let Some(files) = skins.get(skin) else {
                debug!(layout = %layout, skin = %skin, "Skin not active in layout, skipping overrides");
                report.skipped_skins += 1;
                continue;
            };
            if files.is_empty() {
                debug!(skin = %skin, "Skin has no files, nothing to override");
                continue;
            }

            for file in files {
                for (name, value) in variables {
                    match self.dispatch.write_key_value(
                        file,
                        engine::VARIABLES_SECTION,
                        name,
                        value,
                    ) {
                        Ok(()) => report.writes += 1,
                        Err(e) => {
                            warn!(
                                skin = %skin,
                                file = ?file,
                                variable = %name,
                                error = %e,
                                "Failed to write variable override"
                            );
                            report.failed_writes += 1;
                        }
                    }
                }
            }

            match self.dispatch.refresh_skin(skin) {
                Ok(()) => report.refreshed_skins += 1,
                Err(e) => warn!(skin = %skin, error = %e, "Failed to refresh skin"),
            }
        }

        info!(
            layout = %layout,
            writes = report.writes,
            failed = report.failed_writes,
            refreshed = report.refreshed_skins,
            skipped = report.skipped_skins,
            "Applied variable overrides"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::switcher::testing::{DispatchCall, FakeDiscovery, RecordingDispatch, overrides};
    use std::path::PathBuf;

    fn applier(
        discovery: FakeDiscovery,
        dispatch: &Arc<RecordingDispatch>,
    ) -> OverrideApplier {
        OverrideApplier::new(Arc::new(discovery), dispatch.clone())
    }

    #[test]
    fn test_empty_overrides_touch_nothing() {
        let dispatch = Arc::new(RecordingDispatch::default());
        let discovery = FakeDiscovery::default().with_skin("Work", "Clock", &["/s/Clock.ini"]);

        let report = applier(discovery, &dispatch).apply("Work", &VariableOverrideMap::new());

        assert_eq!(report, ApplyReport::default());
        assert!(dispatch.calls().is_empty());
    }

    #[test]
    fn test_writes_every_variable_to_every_file_then_refreshes_once() {
        let dispatch = Arc::new(RecordingDispatch::default());
        let discovery = FakeDiscovery::default().with_skin(
            "Work",
            "Clock",
            &["/s/Clock/Clock.ini", "/s/Clock/Big.ini"],
        );

        let report = applier(discovery, &dispatch).apply(
            "Work",
            &overrides(&[("Clock", "Color", "red"), ("Clock", "FontSize", "14")]),
        );

        assert_eq!(report.writes, 4);
        assert_eq!(report.refreshed_skins, 1);
        assert!(report.is_clean());

        let write = |file: &str, key: &str, value: &str| DispatchCall::WriteKeyValue {
            file: PathBuf::from(file),
            section: "Variables".to_string(),
            key: key.to_string(),
            value: value.to_string(),
        };
        assert_eq!(
            dispatch.calls(),
            vec![
                write("/s/Clock/Clock.ini", "Color", "red"),
                write("/s/Clock/Clock.ini", "FontSize", "14"),
                write("/s/Clock/Big.ini", "Color", "red"),
                write("/s/Clock/Big.ini", "FontSize", "14"),
                DispatchCall::Refresh("Clock".to_string()),
            ]
        );
    }

    #[test]
    fn test_skin_missing_from_layout_is_skipped_without_error() {
        let dispatch = Arc::new(RecordingDispatch::default());
        let discovery = FakeDiscovery::default().with_skin("Work", "Weather", &["/s/W.ini"]);

        let report =
            applier(discovery, &dispatch).apply("Work", &overrides(&[("Clock", "FontSize", "14")]));

        assert_eq!(report.writes, 0);
        assert_eq!(report.skipped_skins, 1);
        assert!(dispatch.calls().is_empty());
    }

    #[test]
    fn test_failed_write_is_counted_and_processing_continues() {
        let dispatch = Arc::new(RecordingDispatch::failing_writes_to("/s/Clock/Clock.ini"));
        let discovery = FakeDiscovery::default()
            .with_skin("Work", "Clock", &["/s/Clock/Clock.ini", "/s/Clock/Big.ini"])
            .with_skin("Work", "Disk", &["/s/Disk/Disk.ini"]);

        let report = applier(discovery, &dispatch).apply(
            "Work",
            &overrides(&[("Clock", "FontSize", "14"), ("Disk", "Drive", "D:")]),
        );

        assert_eq!(report.failed_writes, 1);
        assert_eq!(report.writes, 2);
        assert_eq!(report.refreshed_skins, 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_skin_without_files_is_not_refreshed() {
        let dispatch = Arc::new(RecordingDispatch::default());
        let discovery = FakeDiscovery::default().with_skin("Work", "Clock", &[]);

        let report =
            applier(discovery, &dispatch).apply("Work", &overrides(&[("Clock", "FontSize", "14")]));

        assert_eq!(report, ApplyReport::default());
        assert!(dispatch.calls().is_empty());
    }
}
