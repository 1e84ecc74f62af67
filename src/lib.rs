//! llama-build - a native build-graph orchestrator for llama.cpp
//!
//! This crate provides the library side of llama-build: configuration
//! resolution, the target graph, backend wiring, build planning and
//! execution through a C/C++ toolchain.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

pub use builder::{BuildConfiguration, BuildPlan, ConfigureError, GraphBuilder, TargetGraph};
pub use core::{OptionRegistry, TargetTriple};
pub use util::config::Config;
