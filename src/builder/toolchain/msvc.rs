//! MSVC toolchain implementation.

use std::path::{Path, PathBuf};

use crate::core::platform::OptimizeMode;
use crate::core::target::Language;

use super::{ArchiveInput, CommandSpec, CompileInput, LinkInput, Toolchain, ToolchainPlatform};

/// MSVC toolchain (Windows).
#[derive(Debug, Clone)]
pub struct MsvcToolchain {
    /// Path to cl.exe (compiler)
    pub cl: PathBuf,
    /// Path to lib.exe (librarian)
    pub lib: PathBuf,
    /// Path to link.exe (linker)
    pub link: PathBuf,
}

impl MsvcToolchain {
    pub fn new(cl: PathBuf, lib: PathBuf, link: PathBuf) -> Self {
        MsvcToolchain { cl, lib, link }
    }

    fn optimize_flags(mode: OptimizeMode) -> &'static [&'static str] {
        match mode {
            OptimizeMode::Debug => &["/Od", "/Zi"],
            OptimizeMode::ReleaseFast => &["/O2", "/DNDEBUG"],
            OptimizeMode::ReleaseSafe => &["/O2"],
            OptimizeMode::ReleaseSmall => &["/O1", "/DNDEBUG"],
        }
    }

    /// cl.exe ignores `-std=c11`/`-std=c++11`; map them to `/std:` and pass
    /// everything else through (cl accepts `-D` as well as `/D`).
    fn translate_flag(flag: &str) -> Option<String> {
        match flag {
            "-std=c11" => Some("/std:c11".to_string()),
            "-std=c++11" => None,
            other => Some(other.to_string()),
        }
    }
}

impl Toolchain for MsvcToolchain {
    fn platform(&self) -> ToolchainPlatform {
        ToolchainPlatform::Msvc
    }

    fn compiler_path(&self, _lang: Language) -> &Path {
        // Same cl.exe for both C and C++
        &self.cl
    }

    fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cl).arg("/nologo").arg("/c");

        match input.lang {
            Language::Cxx => cmd = cmd.arg("/TP").arg("/EHsc"),
            Language::C => cmd = cmd.arg("/TC"),
        }
        cmd = cmd.args(Self::optimize_flags(input.optimize).iter().copied());
        if input.lto {
            cmd = cmd.arg("/GL");
        }

        for dir in &input.include_dirs {
            cmd = cmd.arg(format!("/I{}", dir.display()));
        }
        cmd = cmd.args(input.flags.iter().filter_map(|f| Self::translate_flag(f)));

        cmd.arg(input.source.display().to_string())
            .arg(format!("/Fo{}", input.output.display()))
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        CommandSpec::new(&self.lib)
            .arg("/nologo")
            .arg(format!("/OUT:{}", input.output.display()))
            .args(input.objects.iter().map(|o| o.display().to_string()))
    }

    fn link_exe_command(&self, input: &LinkInput) -> CommandSpec {
        // link.exe for both C and C++; the C++ runtime comes with the CRT
        let mut cmd = CommandSpec::new(&self.link)
            .arg("/nologo")
            .arg(format!("/OUT:{}", input.output.display()));
        if input.lto {
            cmd = cmd.arg("/LTCG");
        }

        cmd = cmd
            .args(input.objects.iter().map(|o| o.display().to_string()))
            .args(input.archives.iter().map(|a| a.display().to_string()));

        for lib in &input.system_libs {
            cmd = cmd.arg(format!("{}.lib", lib));
        }
        cmd
    }
}
