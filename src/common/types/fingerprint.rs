//! Monitor topology fingerprint
//!
//! A fingerprint is the canonical string identity of a set of monitors. The
//! descriptors are sorted by origin before encoding so that display servers
//! re-numbering their outputs never changes the result.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::MonitorDescriptor;
use crate::common::constants::fingerprint::SEPARATOR;

/// Deterministic identity of a monitor topology, e.g. `1920x1080@0,0|2560x1440@1920,0`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Encode a set of monitors in any order
    pub fn from_monitors(monitors: &[MonitorDescriptor]) -> Self {
        let mut sorted = monitors.to_vec();
        sorted.sort_by_key(MonitorDescriptor::sort_key);

        let encoded: Vec<String> = sorted.iter().map(ToString::to_string).collect();
        Self(encoded.join(SEPARATOR))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the degenerate fingerprint of an empty monitor list
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
