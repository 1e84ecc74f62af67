//! High-level operations.
//!
//! This module contains the implementation of llama-build commands.

pub mod build;
pub mod llama;

pub use build::{build, plan, BuildOptions, PlannedBuild};
pub use llama::{configure, list_options, CANDIDATE_EXECUTABLES};
