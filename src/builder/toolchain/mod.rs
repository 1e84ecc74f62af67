//! Toolchain abstraction for C/C++ compilers.
//!
//! A toolchain turns plan steps into concrete command lines. The plan
//! itself stays toolchain-neutral so it can be serialised and inspected.
//!
//! Toolchain detection priority:
//! 1. `[toolchain]` table in the config files
//! 2. Environment variables (CC, CXX, AR)
//! 3. Auto-detection (searching PATH for common compilers)

use std::path::{Path, PathBuf};

use crate::core::platform::OptimizeMode;
use crate::core::target::{Language, Runtime};
use crate::util::process::ProcessBuilder;

mod detect;
mod gcc;
mod msvc;

pub use detect::{detect_compiler_identity, detect_toolchain};
pub use gcc::GccToolchain;
pub use msvc::MsvcToolchain;

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to run (e.g., "gcc", "cl.exe")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program followed by arguments, as used in `compile_commands.json`.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.display().to_string());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Convert into a runnable process.
    pub fn to_process(&self, cwd: &Path) -> ProcessBuilder {
        let mut pb = ProcessBuilder::new(&self.program)
            .args(&self.args)
            .cwd(cwd);
        for (key, value) in &self.env {
            pb = pb.env(key.clone(), value.clone());
        }
        pb
    }
}

/// Input for a compile step.
#[derive(Debug, Clone)]
pub struct CompileInput {
    pub source: PathBuf,
    pub output: PathBuf,
    pub lang: Language,
    pub include_dirs: Vec<PathBuf>,
    /// Flags captured at declaration time (language standard, defines)
    pub flags: Vec<String>,
    pub optimize: OptimizeMode,
    pub lto: bool,
    /// Target triple when cross compiling
    pub cross_target: Option<String>,
}

/// Input for an archive step (creating static library).
#[derive(Debug, Clone)]
pub struct ArchiveInput {
    pub objects: Vec<PathBuf>,
    pub output: PathBuf,
}

/// Input for linking an executable.
#[derive(Debug, Clone)]
pub struct LinkInput {
    /// Object files linked directly, including raw backend objects
    pub objects: Vec<PathBuf>,
    /// Static archives, in link-line order
    pub archives: Vec<PathBuf>,
    /// Platform libraries (without `-l` prefix or `.lib` suffix)
    pub system_libs: Vec<String>,
    /// macOS frameworks
    pub frameworks: Vec<String>,
    pub output: PathBuf,
    pub lto: bool,
    /// Strongest runtime among the linked units
    pub runtime: Runtime,
    pub cross_target: Option<String>,
}

/// The platform/family of a toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainPlatform {
    Gcc,
    Clang,
    AppleClang,
    Msvc,
}

impl ToolchainPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainPlatform::Gcc => "gcc",
            ToolchainPlatform::Clang => "clang",
            ToolchainPlatform::AppleClang => "apple-clang",
            ToolchainPlatform::Msvc => "msvc",
        }
    }

    /// Whether the driver understands `--target=<triple>`.
    pub fn supports_target_flag(&self) -> bool {
        matches!(self, ToolchainPlatform::Clang | ToolchainPlatform::AppleClang)
    }
}

/// Trait for toolchain implementations.
///
/// Each toolchain knows how to generate commands for its specific compiler.
pub trait Toolchain: Send + Sync {
    fn platform(&self) -> ToolchainPlatform;

    /// Compiler driver for a source class.
    fn compiler_path(&self, lang: Language) -> &Path;

    fn compile_command(&self, input: &CompileInput) -> CommandSpec;

    /// Static libraries always use ar/lib.exe, never the compiler driver.
    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec;

    fn link_exe_command(&self, input: &LinkInput) -> CommandSpec;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_argv() {
        let cmd = CommandSpec::new("cc").arg("-c").args(["a.c", "-o", "a.o"]);
        assert_eq!(cmd.argv(), ["cc", "-c", "a.c", "-o", "a.o"]);
    }

    #[test]
    fn test_command_spec_to_process() {
        let cmd = CommandSpec::new("cl").arg("/nologo").env("INCLUDE", "C:/inc");
        let pb = cmd.to_process(Path::new("."));
        assert_eq!(pb.get_program(), Path::new("cl"));
        assert_eq!(pb.get_args(), ["/nologo"]);
    }

    #[test]
    fn test_target_flag_support() {
        assert!(ToolchainPlatform::Clang.supports_target_flag());
        assert!(!ToolchainPlatform::Gcc.supports_target_flag());
        assert!(!ToolchainPlatform::Msvc.supports_target_flag());
    }
}
