//! Target definitions - what gets built.
//!
//! A library is a single compilation unit archived into a static library.
//! An executable is a single C++ compilation unit linked against libraries
//! and, optionally, raw backend objects.

use std::fmt;
use std::path::{Path, PathBuf};

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::core::platform::TargetTriple;

/// Source-file class. Picks the flag sequence and the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// C and Objective-C
    #[default]
    C,
    /// C++ (and anything not recognised as C)
    #[serde(rename = "c++")]
    Cxx,
}

impl Language {
    /// Classify a source file by extension: `.c` and `.m` are C, all else C++.
    pub fn from_source(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("c") | Some("m") => Language::C,
            _ => Language::Cxx,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
        }
    }
}

/// Language runtime a unit links against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    #[serde(rename = "libc")]
    LibC,
    #[serde(rename = "libc++")]
    LibCpp,
}

impl Runtime {
    /// Runtime for a unit of the given class on the given target.
    ///
    /// On the MSVC ABI the C++ runtime comes in with the platform C runtime,
    /// so C++ units link libc only.
    pub fn for_language(lang: Language, triple: &TargetTriple) -> Self {
        match lang {
            Language::C => Runtime::LibC,
            Language::Cxx if triple.is_msvc() => Runtime::LibC,
            Language::Cxx => Runtime::LibCpp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Runtime::LibC => "libc",
            Runtime::LibCpp => "libc++",
        }
    }
}

/// Handle to a declared library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LibraryId(pub(crate) NodeIndex);

/// Handle to a declared, included executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutableId(pub(crate) NodeIndex);

/// Result of declaring an executable.
///
/// An `Absent` executable was not selected by the user; it has no node in
/// the graph and every later pass skips it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Executable {
    Present(ExecutableId),
    Absent { name: String },
}

impl Executable {
    pub fn id(&self) -> Option<ExecutableId> {
        match self {
            Executable::Present(id) => Some(*id),
            Executable::Absent { .. } => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Executable::Present(_))
    }
}

/// A static library built from a single source file.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryTarget {
    pub name: String,
    pub source: PathBuf,
    pub lang: Language,
    pub runtime: Runtime,
    /// Flags captured from the configuration when the library was declared
    pub flags: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    pub lto: bool,
    /// Copy the archive into the install prefix
    pub install: bool,
}

/// An executable built from a single C++ source file.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutableTarget {
    pub name: String,
    pub source: PathBuf,
    pub runtime: Runtime,
    /// Flags captured from the configuration when the executable was declared
    pub flags: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    pub lto: bool,
    /// Library dependencies in link-line order
    #[serde(skip)]
    pub dependencies: Vec<LibraryId>,
    /// Libraries linked as raw objects (always included in the image)
    #[serde(skip)]
    pub extra_objects: Vec<LibraryId>,
    /// Platform libraries, e.g. `vulkan`, `ws2_32`
    pub system_libs: Vec<String>,
    /// macOS frameworks, e.g. `Metal`
    pub frameworks: Vec<String>,
}

impl ExecutableTarget {
    /// Attach a raw object. Attaching the same object twice is a no-op.
    pub fn add_extra_object(&mut self, lib: LibraryId) {
        if !self.extra_objects.contains(&lib) {
            self.extra_objects.push(lib);
        }
    }

    /// Link a platform library. Linking the same library twice is a no-op.
    pub fn link_system_library(&mut self, name: &str) {
        if !self.system_libs.iter().any(|l| l == name) {
            self.system_libs.push(name.to_string());
        }
    }

    /// Link a framework. Linking the same framework twice is a no-op.
    pub fn link_framework(&mut self, name: &str) {
        if !self.frameworks.iter().any(|f| f == name) {
            self.frameworks.push(name.to_string());
        }
    }
}

/// Kind of artifact a target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Exe,
    StaticLib,
}

impl TargetKind {
    /// Output filename for a target on the given triple.
    pub fn output_filename(&self, name: &str, triple: &TargetTriple) -> String {
        match (self, triple.is_windows()) {
            (TargetKind::Exe, true) => format!("{}.exe", name),
            (TargetKind::Exe, false) => name.to_string(),
            (TargetKind::StaticLib, true) if triple.is_msvc() => format!("{}.lib", name),
            (TargetKind::StaticLib, _) => format!("lib{}.a", name),
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Exe => write!(f, "exe"),
            TargetKind::StaticLib => write!(f, "staticlib"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> TargetTriple {
        TargetTriple::new("x86_64", "unknown", "linux", Some("gnu"))
    }

    fn msvc() -> TargetTriple {
        TargetTriple::new("x86_64", "pc", "windows", Some("msvc"))
    }

    #[test]
    fn test_language_from_source() {
        assert_eq!(Language::from_source(Path::new("ggml.c")), Language::C);
        assert_eq!(Language::from_source(Path::new("ggml-metal.m")), Language::C);
        assert_eq!(Language::from_source(Path::new("llama.cpp")), Language::Cxx);
        assert_eq!(
            Language::from_source(Path::new("common/build-info.cpp")),
            Language::Cxx
        );
        assert_eq!(Language::from_source(Path::new("Makefile")), Language::Cxx);
    }

    #[test]
    fn test_runtime_for_language() {
        assert_eq!(Runtime::for_language(Language::C, &linux()), Runtime::LibC);
        assert_eq!(
            Runtime::for_language(Language::Cxx, &linux()),
            Runtime::LibCpp
        );
        assert_eq!(Runtime::for_language(Language::C, &msvc()), Runtime::LibC);
        assert_eq!(Runtime::for_language(Language::Cxx, &msvc()), Runtime::LibC);
    }

    #[test]
    fn test_output_filename() {
        let mingw = TargetTriple::new("x86_64", "pc", "windows", Some("gnu"));

        assert_eq!(TargetKind::Exe.output_filename("main", &linux()), "main");
        assert_eq!(TargetKind::Exe.output_filename("main", &msvc()), "main.exe");
        assert_eq!(
            TargetKind::StaticLib.output_filename("ggml-core", &linux()),
            "libggml-core.a"
        );
        assert_eq!(
            TargetKind::StaticLib.output_filename("ggml-core", &msvc()),
            "ggml-core.lib"
        );
        assert_eq!(
            TargetKind::StaticLib.output_filename("ggml-core", &mingw),
            "libggml-core.a"
        );
    }

    #[test]
    fn test_wiring_helpers_are_idempotent() {
        let mut exe = ExecutableTarget {
            name: "server".to_string(),
            source: PathBuf::from("examples/server/server.cpp"),
            runtime: Runtime::LibCpp,
            flags: vec![],
            include_dirs: vec![],
            lto: false,
            dependencies: vec![],
            extra_objects: vec![],
            system_libs: vec![],
            frameworks: vec![],
        };

        let obj = LibraryId(NodeIndex::new(3));
        exe.add_extra_object(obj);
        exe.add_extra_object(obj);
        exe.link_system_library("vulkan");
        exe.link_system_library("vulkan");
        exe.link_framework("Metal");
        exe.link_framework("Metal");

        assert_eq!(exe.extra_objects, vec![obj]);
        assert_eq!(exe.system_libs, vec!["vulkan"]);
        assert_eq!(exe.frameworks, vec!["Metal"]);
    }

    #[test]
    fn test_executable_variant() {
        let present = Executable::Present(ExecutableId(NodeIndex::new(0)));
        let absent = Executable::Absent {
            name: "main".to_string(),
        };
        assert!(present.is_present());
        assert!(present.id().is_some());
        assert!(!absent.is_present());
        assert_eq!(absent.id(), None);
    }
}
