//! C/C++ build system.
//!
//! Configuration, target declaration, planning and native execution for
//! the llama.cpp sources.

pub mod build_info;
pub mod context;
pub mod errors;
pub mod executor;
pub mod features;
pub mod flags;
pub mod graph;
pub mod native;
pub mod plan;
pub mod revision;
pub mod toolchain;

pub use context::{BuildConfiguration, ConfigurationBuilder, ConfigureInputs};
pub use errors::{BuildError, ConfigureError};
pub use executor::{BuildExecutor, BuildSummary};
pub use features::Capabilities;
pub use flags::FlagSet;
pub use graph::{BackendWiring, GraphBuilder, TargetGraph};
pub use native::{Artifact, NativeBuilder};
pub use plan::{BuildPlan, BuildStep, PlanLayout};
pub use revision::{GitCommand, GitRepository, RevisionSource, RevisionSourceKind, StaticRevision};
pub use toolchain::{detect_toolchain, CommandSpec, GccToolchain, MsvcToolchain, Toolchain, ToolchainPlatform};
