//! CLI command implementations.

pub mod project;
pub mod replay;
pub mod welcome;
