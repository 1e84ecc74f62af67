//! GCC/Clang toolchain implementation.

use std::path::{Path, PathBuf};

use crate::core::platform::{OptimizeMode, TargetTriple};
use crate::core::target::{Language, Runtime};

use super::{ArchiveInput, CommandSpec, CompileInput, LinkInput, Toolchain, ToolchainPlatform};

/// GCC/Clang toolchain (Unix-like systems and MinGW).
#[derive(Debug, Clone)]
pub struct GccToolchain {
    /// Path to the C compiler
    pub cc: PathBuf,
    /// Path to the C++ compiler
    pub cxx: PathBuf,
    /// Path to the archiver
    pub ar: PathBuf,
    /// Compiler family (gcc, clang, apple-clang)
    pub family: ToolchainPlatform,
}

impl GccToolchain {
    pub fn new(cc: PathBuf, cxx: PathBuf, ar: PathBuf, family: ToolchainPlatform) -> Self {
        GccToolchain {
            cc,
            cxx,
            ar,
            family,
        }
    }

    /// Infer C++ compiler path from C compiler path.
    ///
    /// - gcc, x86_64-linux-gnu-gcc -> g++, x86_64-linux-gnu-g++
    /// - clang -> clang++
    /// - cc, /usr/bin/cc -> c++, /usr/bin/c++
    pub fn infer_cxx(cc: &Path) -> PathBuf {
        let cc_str = cc.to_string_lossy();

        if let Some(prefix) = cc_str.strip_suffix("gcc") {
            return PathBuf::from(format!("{}g++", prefix));
        }
        if cc_str.ends_with("clang") {
            return PathBuf::from(format!("{}++", cc_str));
        }

        // Only a complete "cc" basename, not "mycc"
        let is_standalone_cc = cc_str == "cc"
            || cc_str.ends_with("/cc")
            || cc_str.ends_with("\\cc")
            || cc_str.ends_with("-cc");
        if let (true, Some(prefix)) = (is_standalone_cc, cc_str.strip_suffix("cc")) {
            return PathBuf::from(format!("{}c++", prefix));
        }

        PathBuf::from(format!("{}++", cc_str))
    }

    fn optimize_flags(mode: OptimizeMode) -> &'static [&'static str] {
        match mode {
            OptimizeMode::Debug => &["-O0", "-g"],
            OptimizeMode::ReleaseFast => &["-O3", "-DNDEBUG"],
            OptimizeMode::ReleaseSafe => &["-O2"],
            OptimizeMode::ReleaseSmall => &["-Os", "-DNDEBUG"],
        }
    }

    fn target_flag(&self, cross_target: Option<&String>) -> Option<String> {
        match cross_target {
            Some(triple) if self.family.supports_target_flag() => {
                Some(format!("--target={}", triple))
            }
            _ => None,
        }
    }

    /// Whether the archives go inside `--start-group`/`--end-group`.
    ///
    /// GNU ld and lld scan each archive once, left to right; a group is
    /// rescanned until no new symbol resolves. ld64 has no group option.
    fn groups_archives(&self, input: &LinkInput) -> bool {
        if self.family == ToolchainPlatform::AppleClang || input.archives.len() < 2 {
            return false;
        }
        let target = input
            .cross_target
            .as_deref()
            .and_then(TargetTriple::parse)
            .unwrap_or_else(TargetTriple::host);
        !target.is_macos()
    }
}

impl Toolchain for GccToolchain {
    fn platform(&self) -> ToolchainPlatform {
        self.family
    }

    fn compiler_path(&self, lang: Language) -> &Path {
        match lang {
            Language::C => &self.cc,
            Language::Cxx => &self.cxx,
        }
    }

    fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.compiler_path(input.lang)).arg("-c");

        if let Some(flag) = self.target_flag(input.cross_target.as_ref()) {
            cmd = cmd.arg(flag);
        }
        cmd = cmd.args(Self::optimize_flags(input.optimize).iter().copied());
        if input.lto {
            cmd = cmd.arg("-flto");
        }

        for dir in &input.include_dirs {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }
        cmd = cmd.args(input.flags.iter().cloned());

        cmd.arg(input.source.display().to_string())
            .arg("-o")
            .arg(input.output.display().to_string())
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        // Create archive with symbol index, replace files
        CommandSpec::new(&self.ar)
            .arg("rcs")
            .arg(input.output.display().to_string())
            .args(input.objects.iter().map(|o| o.display().to_string()))
    }

    fn link_exe_command(&self, input: &LinkInput) -> CommandSpec {
        let driver = match input.runtime {
            Runtime::LibCpp => Language::Cxx,
            Runtime::LibC => Language::C,
        };
        let mut cmd = CommandSpec::new(self.compiler_path(driver));

        if let Some(flag) = self.target_flag(input.cross_target.as_ref()) {
            cmd = cmd.arg(flag);
        }
        if input.lto {
            cmd = cmd.arg("-flto");
        }

        cmd = cmd
            .arg("-o")
            .arg(input.output.display().to_string())
            .args(input.objects.iter().map(|o| o.display().to_string()));

        let group = self.groups_archives(input);
        if group {
            cmd = cmd.arg("-Wl,--start-group");
        }
        cmd = cmd.args(input.archives.iter().map(|a| a.display().to_string()));
        if group {
            cmd = cmd.arg("-Wl,--end-group");
        }

        for lib in &input.system_libs {
            cmd = cmd.arg(format!("-l{}", lib));
        }
        for framework in &input.frameworks {
            cmd = cmd.arg("-framework").arg(framework.clone());
        }
        cmd
    }
}
