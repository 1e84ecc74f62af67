//! Configuration and build error types.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error while resolving the configuration or declaring targets.
///
/// Every variant is fatal: configuration never continues in a degraded mode.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigureError {
    #[error("failed to look up the source revision with {tool}")]
    #[diagnostic(
        code(llama_build::revision_lookup),
        help("run from inside a git checkout with `git` on PATH, or use --revision-source libgit2")
    )]
    RevisionLookup {
        tool: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid target triple `{0}`")]
    #[diagnostic(
        code(llama_build::invalid_target),
        help("use arch-vendor-os[-abi], e.g. x86_64-unknown-linux-gnu or aarch64-apple-darwin")
    )]
    InvalidTarget(String),

    #[error(transparent)]
    #[diagnostic(code(llama_build::invalid_optimize))]
    InvalidOptimizeMode(#[from] crate::core::platform::OptimizeModeParseError),

    #[error("invalid value `{value}` for option `{name}`: expected {expected}")]
    #[diagnostic(code(llama_build::invalid_option_value))]
    InvalidOptionValue {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("unknown option `{name}` (available: {})", .known.join(", "))]
    #[diagnostic(
        code(llama_build::unknown_option),
        help("run `llama-build options` to list every option with its default")
    )]
    UnknownOption { name: String, known: Vec<String> },

    #[error("option `{0}` declared twice")]
    #[diagnostic(code(llama_build::option_redeclared))]
    OptionRedeclared(String),

    #[error("target `{name}` declared twice ({} and {})", .first.display(), .second.display())]
    #[diagnostic(
        code(llama_build::duplicate_target),
        help("every library and executable needs a distinct name")
    )]
    DuplicateTarget {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("failed to write generated source {}", .path.display())]
    #[diagnostic(code(llama_build::build_info))]
    WriteBuildInfo {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// Error while executing a build plan.
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error("compilation failed for target `{target}` ({})\n{stderr}", .source_file.display())]
    #[diagnostic(code(llama_build::compile), help("run with --verbose to see the compiler command"))]
    Compile {
        target: String,
        source_file: PathBuf,
        stderr: String,
    },

    #[error("archiving failed for target `{target}` ({})\n{stderr}", .output.display())]
    #[diagnostic(code(llama_build::archive))]
    Archive {
        target: String,
        output: PathBuf,
        stderr: String,
    },

    #[error("linking failed for target `{target}` ({})\n{stderr}", .output.display())]
    #[diagnostic(code(llama_build::link), help("run with --verbose to see the linker command"))]
    Link {
        target: String,
        output: PathBuf,
        stderr: String,
    },

    #[error("failed to run `{}` for target `{target}` ({})", .program.display(), .file.display())]
    #[diagnostic(code(llama_build::spawn), help("check the [toolchain] paths in the config file"))]
    Spawn {
        target: String,
        program: PathBuf,
        /// Source file for a compile, output file otherwise
        file: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to create the output directory for target `{target}` ({})", .path.display())]
    #[diagnostic(code(llama_build::prepare_output))]
    PrepareOutput {
        target: String,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("the {toolchain} toolchain cannot build for `{target}`")]
    #[diagnostic(
        code(llama_build::unsupported_cross_target),
        help("use clang for cross builds, or drop `-D target` to build for the host")
    )]
    UnsupportedCrossTarget {
        toolchain: &'static str,
        target: String,
    },

    #[error("failed to install target `{target}`")]
    #[diagnostic(code(llama_build::install))]
    Install {
        target: String,
        #[source]
        source: anyhow::Error,
    },
}
