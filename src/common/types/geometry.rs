//! Geometric types for monitor topology
//!
//! Monitors are described in root-window pixel coordinates: an origin that may
//! be negative (monitors left of or above the primary) and an unsigned size.

use std::fmt;

/// One attached monitor as reported by the display server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MonitorDescriptor {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

impl MonitorDescriptor {
    /// Create a new descriptor
    pub fn new(width: u32, height: u32, x: i32, y: i32) -> Self {
        Self {
            width,
            height,
            x,
            y,
        }
    }

    /// Ordering key used for fingerprinting: left-to-right, then top-to-bottom
    ///
    /// Size breaks ties between monitors sharing an origin (cloned outputs).
    pub fn sort_key(&self) -> (i32, i32, u32, u32) {
        (self.x, self.y, self.width, self.height)
    }
}

/// Encodes as `"{width}x{height}@{x},{y}"`
impl fmt::Display for MonitorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@{},{}", self.width, self.height, self.x, self.y)
    }
}
