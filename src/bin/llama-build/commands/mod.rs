//! Command implementations

pub mod build;
pub mod options;
pub mod plan;
