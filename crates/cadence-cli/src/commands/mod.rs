//! CLI command implementations.

pub mod patches;
pub mod render;
