//! Core data structures.
//!
//! This module contains the foundational types used throughout llama-build:
//! - Target platform and optimization mode
//! - Library and executable targets
//! - The user option registry

pub mod options;
pub mod platform;
pub mod target;

pub use options::{DeclaredOption, OptionKind, OptionRegistry};
pub use platform::{CompilerIdentity, OptimizeMode, TargetTriple};
pub use target::{
    Executable, ExecutableId, ExecutableTarget, Language, LibraryId, LibraryTarget, Runtime,
    TargetKind,
};
