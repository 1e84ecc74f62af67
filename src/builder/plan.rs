//! Build plan generation.
//!
//! A BuildPlan is the ordered list of compile, archive, link and install
//! steps derived from a target graph. It is toolchain-neutral; commands are
//! produced from it only at execution time (or for compile_commands.json).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::graph::{Node, TargetGraph};
use crate::builder::toolchain::{ArchiveInput, CompileInput, LinkInput, Toolchain};
use crate::core::platform::{OptimizeMode, TargetTriple};
use crate::core::target::{ExecutableTarget, Language, LibraryTarget, Runtime, TargetKind};
use crate::util::fs::write_string;
use crate::util::hash::Fingerprint;

/// Output directories for a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLayout {
    pub build_dir: PathBuf,
    pub prefix: PathBuf,
}

impl PlanLayout {
    /// Relative paths are taken relative to the source root. Defaults are
    /// `build/` and `out/`.
    pub fn new(source_root: &Path, build_dir: Option<&Path>, prefix: Option<&Path>) -> Self {
        PlanLayout {
            build_dir: source_root.join(build_dir.unwrap_or(Path::new("build"))),
            prefix: source_root.join(prefix.unwrap_or(Path::new("out"))),
        }
    }

    pub fn obj_dir(&self) -> PathBuf {
        self.build_dir.join("obj")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.build_dir.join("lib")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.build_dir.join("bin")
    }

    pub fn install_bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    pub fn install_lib_dir(&self) -> PathBuf {
        self.prefix.join("lib")
    }
}

/// A complete build plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    pub target: String,
    pub optimize: OptimizeMode,
    /// Triple passed to cross-capable drivers; `None` for native builds
    pub cross_target: Option<String>,
    /// All build steps in execution order
    pub steps: Vec<BuildStep>,
    /// Hash of the steps
    pub fingerprint: String,
}

/// A build step in the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildStep {
    Compile(CompileStep),
    Archive(ArchiveStep),
    Link(LinkStep),
    Install(InstallStep),
}

impl BuildStep {
    pub fn target(&self) -> &str {
        match self {
            BuildStep::Compile(s) => &s.target,
            BuildStep::Archive(s) => &s.target,
            BuildStep::Link(s) => &s.target,
            BuildStep::Install(s) => &s.target,
        }
    }
}

/// Compile one source file to one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileStep {
    pub target: String,
    pub source: PathBuf,
    pub object: PathBuf,
    pub lang: Language,
    pub include_dirs: Vec<PathBuf>,
    pub flags: Vec<String>,
    pub lto: bool,
}

/// Archive a library object into a static library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveStep {
    pub target: String,
    pub object: PathBuf,
    pub output: PathBuf,
}

/// Link an executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStep {
    pub target: String,
    pub object: PathBuf,
    /// Backend objects linked directly into the image
    pub extra_objects: Vec<PathBuf>,
    /// Dependency archives, in link-line order
    pub archives: Vec<PathBuf>,
    pub system_libs: Vec<String>,
    pub frameworks: Vec<String>,
    pub runtime: Runtime,
    pub lto: bool,
    pub output: PathBuf,
}

/// Copy an artifact into the install prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallStep {
    pub target: String,
    pub artifact: PathBuf,
    pub dest_dir: PathBuf,
}

impl BuildPlan {
    /// Plan every present executable and the libraries it needs.
    ///
    /// A library is planned when a present executable references it or when
    /// it is marked for installation. Steps follow the graph's topological
    /// order, so every archive exists before anything links it.
    pub fn new(graph: &TargetGraph, layout: &PlanLayout) -> Self {
        let triple = graph.triple();
        let obj_ext = if triple.is_msvc() { "obj" } else { "o" };

        let referenced: BTreeSet<&str> = graph
            .executables()
            .flat_map(|(_, exe)| exe.dependencies.iter().chain(&exe.extra_objects))
            .map(|&id| graph.library(id).name.as_str())
            .collect();

        let mut steps = Vec::new();
        let mut installs = Vec::new();

        for node in graph.topological_order() {
            match node {
                Node::Library(lib) => {
                    if !(lib.install || referenced.contains(lib.name.as_str())) {
                        tracing::debug!("{} is not used by any executable, leaving it out", lib.name);
                        continue;
                    }
                    let object = object_path(layout, &lib.name, obj_ext);
                    let output = layout
                        .lib_dir()
                        .join(TargetKind::StaticLib.output_filename(&lib.name, triple));

                    steps.push(BuildStep::Compile(library_compile(graph, lib, &object)));
                    steps.push(BuildStep::Archive(ArchiveStep {
                        target: lib.name.clone(),
                        object,
                        output: output.clone(),
                    }));
                    if lib.install {
                        installs.push(BuildStep::Install(InstallStep {
                            target: lib.name.clone(),
                            artifact: output,
                            dest_dir: layout.install_lib_dir(),
                        }));
                    }
                }
                Node::Executable(exe) => {
                    let object = object_path(layout, &exe.name, obj_ext);
                    let output = layout
                        .bin_dir()
                        .join(TargetKind::Exe.output_filename(&exe.name, triple));

                    steps.push(BuildStep::Compile(CompileStep {
                        target: exe.name.clone(),
                        source: graph.source_root().join(&exe.source),
                        object: object.clone(),
                        lang: Language::Cxx,
                        include_dirs: exe.include_dirs.clone(),
                        flags: exe.flags.clone(),
                        lto: exe.lto,
                    }));
                    steps.push(BuildStep::Link(executable_link(
                        graph, layout, exe, object, &output, obj_ext,
                    )));
                    installs.push(BuildStep::Install(InstallStep {
                        target: exe.name.clone(),
                        artifact: output,
                        dest_dir: layout.install_bin_dir(),
                    }));
                }
            }
        }
        steps.extend(installs);

        let cross_target = (*triple != TargetTriple::host()).then(|| triple.to_string());
        let fingerprint = plan_fingerprint(&steps, graph.optimize(), cross_target.as_deref());

        BuildPlan {
            target: triple.to_string(),
            optimize: graph.optimize(),
            cross_target,
            steps,
            fingerprint,
        }
    }

    pub fn compile_steps(&self) -> impl Iterator<Item = &CompileStep> {
        self.steps.iter().filter_map(|s| match s {
            BuildStep::Compile(c) => Some(c),
            _ => None,
        })
    }

    pub fn link_steps(&self) -> impl Iterator<Item = &LinkStep> {
        self.steps.iter().filter_map(|s| match s {
            BuildStep::Link(l) => Some(l),
            _ => None,
        })
    }

    /// Names of the planned libraries, in plan order.
    pub fn libraries(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                BuildStep::Archive(a) => Some(a.target.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Names of the planned executables, in plan order.
    pub fn executables(&self) -> Vec<&str> {
        self.link_steps().map(|l| l.target.as_str()).collect()
    }

    pub fn link_step(&self, target: &str) -> Option<&LinkStep> {
        self.link_steps().find(|l| l.target == target)
    }

    pub fn compile_count(&self) -> usize {
        self.compile_steps().count()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize build plan")
    }

    /// Toolchain input for a compile step.
    pub fn compile_input(&self, step: &CompileStep) -> CompileInput {
        CompileInput {
            source: step.source.clone(),
            output: step.object.clone(),
            lang: step.lang,
            include_dirs: step.include_dirs.clone(),
            flags: step.flags.clone(),
            optimize: self.optimize,
            lto: step.lto,
            cross_target: self.cross_target.clone(),
        }
    }

    /// Toolchain input for an archive step.
    pub fn archive_input(&self, step: &ArchiveStep) -> ArchiveInput {
        ArchiveInput {
            objects: vec![step.object.clone()],
            output: step.output.clone(),
        }
    }

    /// Toolchain input for a link step.
    pub fn link_input(&self, step: &LinkStep) -> LinkInput {
        let mut objects = vec![step.object.clone()];
        objects.extend(step.extra_objects.iter().cloned());
        LinkInput {
            objects,
            archives: step.archives.clone(),
            system_libs: step.system_libs.clone(),
            frameworks: step.frameworks.clone(),
            output: step.output.clone(),
            lto: step.lto,
            runtime: step.runtime,
            cross_target: self.cross_target.clone(),
        }
    }

    /// Write compile_commands.json for IDE integration.
    pub fn emit_compile_commands(
        &self,
        toolchain: &dyn Toolchain,
        directory: &Path,
        path: &Path,
    ) -> Result<()> {
        let commands: Vec<CompileCommand> = self
            .compile_steps()
            .map(|step| CompileCommand {
                directory: directory.display().to_string(),
                file: step.source.display().to_string(),
                arguments: toolchain.compile_command(&self.compile_input(step)).argv(),
                output: step.object.display().to_string(),
            })
            .collect();

        let json = serde_json::to_string_pretty(&commands)?;
        write_string(path, &json)?;
        tracing::info!("wrote {}", path.display());
        Ok(())
    }
}

/// compile_commands.json entry.
#[derive(Debug, Serialize, Deserialize)]
struct CompileCommand {
    directory: String,
    file: String,
    arguments: Vec<String>,
    output: String,
}

fn object_path(layout: &PlanLayout, name: &str, ext: &str) -> PathBuf {
    layout.obj_dir().join(format!("{}.{}", name, ext))
}

fn library_compile(graph: &TargetGraph, lib: &LibraryTarget, object: &Path) -> CompileStep {
    CompileStep {
        target: lib.name.clone(),
        source: graph.source_root().join(&lib.source),
        object: object.to_path_buf(),
        lang: lib.lang,
        include_dirs: lib.include_dirs.clone(),
        flags: lib.flags.clone(),
        lto: lib.lto,
    }
}

fn executable_link(
    graph: &TargetGraph,
    layout: &PlanLayout,
    exe: &ExecutableTarget,
    object: PathBuf,
    output: &Path,
    obj_ext: &str,
) -> LinkStep {
    let triple = graph.triple();
    let mut runtime = exe.runtime;

    let extra_objects = exe
        .extra_objects
        .iter()
        .map(|&id| {
            let lib = graph.library(id);
            runtime = runtime.max(lib.runtime);
            object_path(layout, &lib.name, obj_ext)
        })
        .collect();

    let archives = exe
        .dependencies
        .iter()
        .map(|&id| {
            let lib = graph.library(id);
            runtime = runtime.max(lib.runtime);
            layout
                .lib_dir()
                .join(TargetKind::StaticLib.output_filename(&lib.name, triple))
        })
        .collect();

    LinkStep {
        target: exe.name.clone(),
        object,
        extra_objects,
        archives,
        system_libs: exe.system_libs.clone(),
        frameworks: exe.frameworks.clone(),
        runtime,
        lto: exe.lto,
        output: output.to_path_buf(),
    }
}

fn plan_fingerprint(steps: &[BuildStep], optimize: OptimizeMode, cross: Option<&str>) -> String {
    let mut fp = Fingerprint::new();
    fp.update_strs([optimize.as_str(), cross.unwrap_or("")]);
    for step in steps {
        let encoded = serde_json::to_string(step).unwrap_or_default();
        fp.update_str(&encoded);
    }
    fp.finish_short()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::context::{ConfigurationBuilder, ConfigureInputs};
    use crate::builder::graph::GraphBuilder;
    use crate::builder::revision::StaticRevision;
    use crate::builder::toolchain::{GccToolchain, ToolchainPlatform};
    use crate::core::options::OptionRegistry;
    use tempfile::TempDir;

    fn graph(root: &Path, args: &[&str]) -> TargetGraph {
        let rev = StaticRevision("abc".to_string());
        let inputs = ConfigureInputs {
            source_root: root.to_path_buf(),
            compiler: "gcc-13.2".to_string(),
            revision_source: &rev,
            dry_run: true,
        };
        let mut options = OptionRegistry::from_args(args);
        let config = ConfigurationBuilder::resolve(&inputs, &mut options)
            .unwrap()
            .freeze();
        let mut builder = GraphBuilder::new(&config, &mut options);

        let ggml = builder.library("ggml-core", "ggml.c").unwrap();
        let llama = builder.library("llama-core", "llama.cpp").unwrap();
        builder.library("train", "common/train.cpp").unwrap();
        builder
            .executable("main", "examples/main/main.cpp", &[ggml, llama])
            .unwrap();
        builder.finish()
    }

    #[test]
    fn test_layout_defaults() {
        let layout = PlanLayout::new(Path::new("/src"), None, None);
        assert_eq!(layout.obj_dir(), PathBuf::from("/src/build/obj"));
        assert_eq!(layout.install_bin_dir(), PathBuf::from("/src/out/bin"));

        let layout = PlanLayout::new(Path::new("/src"), Some(Path::new("/tmp/b")), None);
        assert_eq!(layout.lib_dir(), PathBuf::from("/tmp/b/lib"));
    }

    #[test]
    fn test_unreferenced_library_left_out() {
        let tmp = TempDir::new().unwrap();
        let g = graph(tmp.path(), &["target=x86_64-linux-gnu", "main"]);
        let plan = BuildPlan::new(&g, &PlanLayout::new(tmp.path(), None, None));

        assert_eq!(plan.libraries(), ["ggml-core", "llama-core"]);
        assert_eq!(plan.executables(), ["main"]);
    }

    #[test]
    fn test_install_libs_plans_everything() {
        let tmp = TempDir::new().unwrap();
        let g = graph(tmp.path(), &["target=x86_64-linux-gnu", "install-libs"]);
        let plan = BuildPlan::new(&g, &PlanLayout::new(tmp.path(), None, None));

        assert_eq!(plan.libraries(), ["ggml-core", "llama-core", "train"]);
        assert!(plan.executables().is_empty());
        let installs = plan
            .steps
            .iter()
            .filter(|s| matches!(s, BuildStep::Install(_)))
            .count();
        assert_eq!(installs, 3);
    }

    #[test]
    fn test_link_step() {
        let tmp = TempDir::new().unwrap();
        let g = graph(tmp.path(), &["target=x86_64-linux-gnu", "main"]);
        let layout = PlanLayout::new(tmp.path(), None, None);
        let plan = BuildPlan::new(&g, &layout);

        let link = plan.link_step("main").unwrap();
        assert_eq!(link.runtime, Runtime::LibCpp);
        assert_eq!(
            link.archives,
            [
                layout.lib_dir().join("libggml-core.a"),
                layout.lib_dir().join("libllama-core.a")
            ]
        );
        assert_eq!(link.output, layout.bin_dir().join("main"));
        assert_eq!(plan.cross_target, None);
    }

    #[test]
    fn test_msvc_naming() {
        let tmp = TempDir::new().unwrap();
        let g = graph(tmp.path(), &["target=x86_64-pc-windows-msvc", "main"]);
        let layout = PlanLayout::new(tmp.path(), None, None);
        let plan = BuildPlan::new(&g, &layout);

        let link = plan.link_step("main").unwrap();
        assert_eq!(link.output, layout.bin_dir().join("main.exe"));
        assert_eq!(link.archives[0], layout.lib_dir().join("ggml-core.lib"));
        assert_eq!(link.object, layout.obj_dir().join("main.obj"));
        assert_eq!(link.runtime, Runtime::LibC);
    }

    #[test]
    fn test_steps_ordered_and_fingerprint_stable() {
        let tmp = TempDir::new().unwrap();
        let g = graph(tmp.path(), &["target=x86_64-linux-gnu", "main"]);
        let layout = PlanLayout::new(tmp.path(), None, None);
        let first = BuildPlan::new(&g, &layout);
        let second = BuildPlan::new(&g, &layout);

        let link_pos = first
            .steps
            .iter()
            .position(|s| matches!(s, BuildStep::Link(_)))
            .unwrap();
        let last_archive = first
            .steps
            .iter()
            .rposition(|s| matches!(s, BuildStep::Archive(_)))
            .unwrap();
        assert!(last_archive < link_pos);
        assert_eq!(first.fingerprint, second.fingerprint);
    }

    #[test]
    fn test_json_round_trip() {
        let tmp = TempDir::new().unwrap();
        let g = graph(tmp.path(), &["target=x86_64-linux-gnu", "main"]);
        let plan = BuildPlan::new(&g, &PlanLayout::new(tmp.path(), None, None));

        let json = plan.to_json().unwrap();
        assert!(json.contains("\"type\": \"compile\""));
        let back: BuildPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back.steps, plan.steps);
    }

    #[test]
    fn test_emit_compile_commands() {
        let tmp = TempDir::new().unwrap();
        let g = graph(tmp.path(), &["target=x86_64-linux-gnu", "main"]);
        let plan = BuildPlan::new(&g, &PlanLayout::new(tmp.path(), None, None));
        let toolchain = GccToolchain::new(
            PathBuf::from("gcc"),
            PathBuf::from("g++"),
            PathBuf::from("ar"),
            ToolchainPlatform::Gcc,
        );

        let path = tmp.path().join("compile_commands.json");
        plan.emit_compile_commands(&toolchain, tmp.path(), &path)
            .unwrap();

        let entries: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["arguments"][0], "gcc");
        assert_eq!(entries[2]["arguments"][0], "g++");
    }
}
