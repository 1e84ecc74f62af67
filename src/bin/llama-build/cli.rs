//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use llama_build::builder::RevisionSourceKind;

/// llama-build - configure, plan and build the llama.cpp sources
#[derive(Parser)]
#[command(name = "llama-build")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Root of the llama.cpp checkout
    #[arg(short = 'C', long = "source-dir", global = true, default_value = ".")]
    pub source_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every command.
pub struct GlobalArgs {
    pub verbose: bool,
    pub source_dir: PathBuf,
}

impl Cli {
    pub fn global(&self) -> GlobalArgs {
        GlobalArgs {
            verbose: self.verbose,
            source_dir: self.source_dir.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure, plan and build the selected executables
    Build(BuildArgs),

    /// Print the build plan as JSON without compiling anything
    Plan(PlanArgs),

    /// List every build option with its default
    Options(OptionsArgs),
}

/// Options that select what gets configured.
#[derive(Args)]
pub struct ConfigureArgs {
    /// Set a build option, e.g. -D server -D vulkan=true -D optimize=release-fast
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    pub define: Vec<String>,

    /// How to look up the source revision (git, libgit2)
    #[arg(long, value_name = "SOURCE")]
    pub revision_source: Option<RevisionSourceKind>,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub configure: ConfigureArgs,

    /// Number of parallel compile jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Write compile_commands.json into the build directory
    #[arg(long)]
    pub emit_compile_commands: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub configure: ConfigureArgs,

    /// Write compile_commands.json into the build directory
    #[arg(long)]
    pub emit_compile_commands: bool,
}

#[derive(Args)]
pub struct OptionsArgs {
    /// Print the options as JSON
    #[arg(long)]
    pub json: bool,
}
