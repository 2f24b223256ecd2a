//! CLI command implementations

pub mod keys;
pub mod show;
pub mod simulate;
