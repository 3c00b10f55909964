//! Automatic layout switching
//!
//! [`SwitchCore`] decides and applies; [`AutoSwitcher`] decides *when*, by
//! debouncing topology notifications into single evaluations.

pub mod auto;
pub mod overrides;
pub mod switch;

#[cfg(test)]
pub(crate) mod testing;

pub use auto::{AutoSwitcher, SwitchPhase};
pub use overrides::{ApplyReport, OverrideApplier};
pub use switch::{SwitchCore, SwitchOutcome};
