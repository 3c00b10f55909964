//! Domain types shared across the application

pub mod fingerprint;
pub mod geometry;

pub use fingerprint::Fingerprint;
pub use geometry::MonitorDescriptor;
