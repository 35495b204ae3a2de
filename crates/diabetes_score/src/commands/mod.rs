//! CLI command implementations.

pub mod migrate;
pub mod predict;
pub mod serve;
pub mod train;
