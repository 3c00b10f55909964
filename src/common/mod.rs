//! Shared constants and domain types

pub mod constants;
pub mod types;
