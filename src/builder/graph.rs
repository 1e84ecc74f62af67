//! Target graph - declared libraries and executables.
//!
//! Edges run from a library to the executables that use it, so a
//! topological walk yields every library before its dependents. Libraries
//! have no outgoing dependency edges of their own, which keeps the graph
//! acyclic by construction.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::builder::context::BuildConfiguration;
use crate::builder::errors::ConfigureError;
use crate::builder::features::{Capabilities, ACCELERATE_FRAMEWORK, METAL_FRAMEWORKS};
use crate::core::options::OptionRegistry;
use crate::core::platform::{OptimizeMode, TargetTriple};
use crate::core::target::{
    Executable, ExecutableId, ExecutableTarget, Language, LibraryId, LibraryTarget, Runtime,
};

/// A node in the target graph.
#[derive(Debug, Clone)]
pub enum Node {
    Library(LibraryTarget),
    Executable(ExecutableTarget),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Library(lib) => &lib.name,
            Node::Executable(exe) => &exe.name,
        }
    }

    pub fn source(&self) -> &Path {
        match self {
            Node::Library(lib) => &lib.source,
            Node::Executable(exe) => &exe.source,
        }
    }
}

/// Declared targets and their dependency edges.
#[derive(Debug, Clone)]
pub struct TargetGraph {
    graph: DiGraph<Node, ()>,
    names: HashMap<String, NodeIndex>,
    triple: TargetTriple,
    optimize: OptimizeMode,
    source_root: PathBuf,
}

/// Backend libraries and the capabilities that produced them.
///
/// The library ids must come from the graph being wired. Ids that do not
/// name a library there are skipped.
#[derive(Debug, Clone)]
pub struct BackendWiring {
    pub capabilities: Capabilities,
    pub vulkan: Option<LibraryId>,
    pub metal: Option<LibraryId>,
    pub triple: TargetTriple,
}

impl TargetGraph {
    fn new(config: &BuildConfiguration) -> Self {
        TargetGraph {
            graph: DiGraph::new(),
            names: HashMap::new(),
            triple: config.triple().clone(),
            optimize: config.optimize(),
            source_root: config.source_root().to_path_buf(),
        }
    }

    fn insert(&mut self, node: Node) -> Result<NodeIndex, ConfigureError> {
        if let Some(&existing) = self.names.get(node.name()) {
            return Err(ConfigureError::DuplicateTarget {
                name: node.name().to_string(),
                first: self.graph[existing].source().to_path_buf(),
                second: node.source().to_path_buf(),
            });
        }
        let name = node.name().to_string();
        let index = self.graph.add_node(node);
        self.names.insert(name, index);
        Ok(index)
    }

    fn connect(&mut self, lib: LibraryId, exe: ExecutableId) {
        if !self.graph.contains_edge(lib.0, exe.0) {
            self.graph.add_edge(lib.0, exe.0, ());
        }
    }

    fn executable_mut(&mut self, id: ExecutableId) -> Option<&mut ExecutableTarget> {
        match self.graph.node_weight_mut(id.0)? {
            Node::Executable(exe) => Some(exe),
            Node::Library(_) => None,
        }
    }

    fn is_library(&self, id: LibraryId) -> bool {
        matches!(self.graph.node_weight(id.0), Some(Node::Library(_)))
    }

    /// Attach backend objects and link requirements to every present
    /// candidate. Running the pass twice changes nothing.
    pub fn wire_backends(&mut self, candidates: &[Executable], wiring: &BackendWiring) {
        let caps = wiring.capabilities;

        for candidate in candidates {
            let Some(id) = candidate.id() else {
                continue;
            };
            if self.executable_mut(id).is_none() {
                tracing::debug!("skipping wiring for an id outside this graph");
                continue;
            }

            for lib in [wiring.vulkan, wiring.metal].into_iter().flatten() {
                if !self.is_library(lib) {
                    continue;
                }
                if let Some(exe) = self.executable_mut(id) {
                    exe.add_extra_object(lib);
                }
                self.connect(lib, id);
            }

            let Some(exe) = self.executable_mut(id) else {
                continue;
            };
            if caps.vulkan {
                exe.link_system_library(Capabilities::gpu_driver_library(&wiring.triple));
            }
            if caps.metal {
                for framework in METAL_FRAMEWORKS {
                    exe.link_framework(framework);
                }
            }
            if caps.accelerate {
                exe.link_framework(ACCELERATE_FRAMEWORK);
            }
            tracing::debug!(
                "wired {}: objects={} libs={:?} frameworks={:?}",
                exe.name,
                exe.extra_objects.len(),
                exe.system_libs,
                exe.frameworks
            );
        }
    }

    /// Add a platform library to a present executable. No-op when absent.
    pub fn link_system_library(&mut self, exe: &Executable, name: &str) {
        if let Some(target) = exe.id().and_then(|id| self.executable_mut(id)) {
            target.link_system_library(name);
        }
    }

    /// # Panics
    ///
    /// If `id` was not handed out by this graph.
    pub fn library(&self, id: LibraryId) -> &LibraryTarget {
        match &self.graph[id.0] {
            Node::Library(lib) => lib,
            Node::Executable(_) => unreachable!("library id points at an executable"),
        }
    }

    /// # Panics
    ///
    /// If `id` was not handed out by this graph.
    pub fn executable(&self, id: ExecutableId) -> &ExecutableTarget {
        match &self.graph[id.0] {
            Node::Executable(exe) => exe,
            Node::Library(_) => unreachable!("executable id points at a library"),
        }
    }

    /// Look up a library by name.
    pub fn find_library(&self, name: &str) -> Option<LibraryId> {
        let &index = self.names.get(name)?;
        match self.graph[index] {
            Node::Library(_) => Some(LibraryId(index)),
            Node::Executable(_) => None,
        }
    }

    /// Look up a present executable by name.
    pub fn find_executable(&self, name: &str) -> Option<ExecutableId> {
        let &index = self.names.get(name)?;
        match self.graph[index] {
            Node::Executable(_) => Some(ExecutableId(index)),
            Node::Library(_) => None,
        }
    }

    /// All libraries, in declaration order.
    pub fn libraries(&self) -> impl Iterator<Item = (LibraryId, &LibraryTarget)> {
        self.graph.node_indices().filter_map(|i| match &self.graph[i] {
            Node::Library(lib) => Some((LibraryId(i), lib)),
            Node::Executable(_) => None,
        })
    }

    /// All present executables, in declaration order.
    pub fn executables(&self) -> impl Iterator<Item = (ExecutableId, &ExecutableTarget)> {
        self.graph.node_indices().filter_map(|i| match &self.graph[i] {
            Node::Executable(exe) => Some((ExecutableId(i), exe)),
            Node::Library(_) => None,
        })
    }

    /// Executables that link a library, directly or as a raw object.
    pub fn dependents(&self, lib: LibraryId) -> Vec<ExecutableId> {
        self.graph
            .neighbors_directed(lib.0, Direction::Outgoing)
            .map(ExecutableId)
            .collect()
    }

    /// Nodes with every library before the executables that use it.
    ///
    /// Among nodes that are ready at the same time, the one declared first
    /// comes first, so the order is stable across runs.
    pub fn topological_order(&self) -> Vec<&Node> {
        let mut indegree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|i| self.graph.neighbors_directed(i, Direction::Incoming).count())
            .collect();
        let mut ready: BTreeSet<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|i| indegree[i.index()] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(index) = ready.pop_first() {
            order.push(&self.graph[index]);
            for next in self.graph.neighbors_directed(index, Direction::Outgoing) {
                indegree[next.index()] -= 1;
                if indegree[next.index()] == 0 {
                    ready.insert(next);
                }
            }
        }
        order
    }

    pub fn triple(&self) -> &TargetTriple {
        &self.triple
    }

    pub fn optimize(&self) -> OptimizeMode {
        self.optimize
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

/// Declares targets against a frozen configuration.
pub struct GraphBuilder<'a> {
    config: &'a BuildConfiguration,
    options: &'a mut OptionRegistry,
    graph: TargetGraph,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(config: &'a BuildConfiguration, options: &'a mut OptionRegistry) -> Self {
        GraphBuilder {
            graph: TargetGraph::new(config),
            config,
            options,
        }
    }

    pub fn config(&self) -> &BuildConfiguration {
        self.config
    }

    /// Declare a static library built from one source file.
    ///
    /// `source` is relative to the source root. Flags and include
    /// directories are copied from the configuration now.
    pub fn library(&mut self, name: &str, source: &str) -> Result<LibraryId, ConfigureError> {
        let source = PathBuf::from(source);
        let lang = Language::from_source(&source);
        let runtime = Runtime::for_language(lang, self.config.triple());

        let lib = LibraryTarget {
            name: name.to_string(),
            lang,
            runtime,
            flags: self.config.flags().for_language(lang).to_vec(),
            include_dirs: self.config.include_dirs().to_vec(),
            lto: self.config.lto(),
            install: self.config.install_libs(),
            source,
        };

        tracing::debug!("library {} ({}, {})", lib.name, lang.as_str(), runtime.as_str());
        self.graph.insert(Node::Library(lib)).map(LibraryId)
    }

    /// Declare a candidate executable.
    ///
    /// The `<name>` option is declared either way so listings show it. The
    /// executable is built only when that option or `build-all` is set.
    pub fn executable(
        &mut self,
        name: &str,
        source: &str,
        dependencies: &[LibraryId],
    ) -> Result<Executable, ConfigureError> {
        let description = format!("Build the {} executable", name);
        let requested = self.options.flag(name, &description, "false")?.unwrap_or(false);

        if !(requested || self.config.build_all()) {
            tracing::debug!("skipping executable {}", name);
            return Ok(Executable::Absent {
                name: name.to_string(),
            });
        }

        let exe = ExecutableTarget {
            name: name.to_string(),
            source: PathBuf::from(source),
            runtime: Runtime::for_language(Language::Cxx, self.config.triple()),
            flags: self.config.flags().cxx().to_vec(),
            include_dirs: self.config.include_dirs().to_vec(),
            lto: self.config.lto(),
            dependencies: dependencies.to_vec(),
            extra_objects: Vec::new(),
            system_libs: Vec::new(),
            frameworks: Vec::new(),
        };

        tracing::debug!("executable {} ({} dependencies)", name, dependencies.len());
        let id = ExecutableId(self.graph.insert(Node::Executable(exe))?);
        for &lib in dependencies {
            self.graph.connect(lib, id);
        }
        Ok(Executable::Present(id))
    }

    /// Add a platform library to a present executable.
    pub fn link_system_library(&mut self, exe: &Executable, name: &str) {
        self.graph.link_system_library(exe, name);
    }

    /// Run the backend wiring pass over the candidates.
    pub fn wire_backends(&mut self, candidates: &[Executable], wiring: &BackendWiring) {
        self.graph.wire_backends(candidates, wiring);
    }

    pub fn graph(&self) -> &TargetGraph {
        &self.graph
    }

    /// Finish declaration and hand over the graph.
    pub fn finish(self) -> TargetGraph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::context::{ConfigurationBuilder, ConfigureInputs};
    use crate::builder::revision::StaticRevision;
    use tempfile::TempDir;

    fn configure(root: &Path, options: &mut OptionRegistry) -> BuildConfiguration {
        let rev = StaticRevision("abc".to_string());
        let inputs = ConfigureInputs {
            source_root: root.to_path_buf(),
            compiler: "gcc-13.2".to_string(),
            revision_source: &rev,
            dry_run: true,
        };
        ConfigurationBuilder::resolve(&inputs, options)
            .unwrap()
            .freeze()
    }

    #[test]
    fn test_library_classification() {
        let tmp = TempDir::new().unwrap();
        let mut options = OptionRegistry::from_args(["target=x86_64-linux-gnu"]);
        let config = configure(tmp.path(), &mut options);
        let mut builder = GraphBuilder::new(&config, &mut options);

        let ggml = builder.library("ggml-core", "ggml.c").unwrap();
        let llama = builder.library("llama-core", "llama.cpp").unwrap();
        let metal = builder.library("ggml-metal-backend", "ggml-metal.m").unwrap();
        let graph = builder.finish();

        assert_eq!(graph.library(ggml).lang, Language::C);
        assert_eq!(graph.library(ggml).runtime, Runtime::LibC);
        assert_eq!(graph.library(ggml).flags[0], "-std=c11");
        assert_eq!(graph.library(llama).lang, Language::Cxx);
        assert_eq!(graph.library(llama).runtime, Runtime::LibCpp);
        assert_eq!(graph.library(llama).flags[0], "-std=c++11");
        assert_eq!(graph.library(metal).lang, Language::C);
    }

    #[test]
    fn test_msvc_cxx_library_links_libc() {
        let tmp = TempDir::new().unwrap();
        let mut options = OptionRegistry::from_args(["target=x86_64-pc-windows-msvc"]);
        let config = configure(tmp.path(), &mut options);
        let mut builder = GraphBuilder::new(&config, &mut options);

        let llama = builder.library("llama-core", "llama.cpp").unwrap();
        assert_eq!(builder.graph().library(llama).runtime, Runtime::LibC);
    }

    #[test]
    fn test_duplicate_library_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut options = OptionRegistry::new();
        let config = configure(tmp.path(), &mut options);
        let mut builder = GraphBuilder::new(&config, &mut options);

        builder.library("common", "common/common.cpp").unwrap();
        let err = builder
            .library("common", "common/build-info.cpp")
            .unwrap_err();
        match err {
            ConfigureError::DuplicateTarget { name, first, second } => {
                assert_eq!(name, "common");
                assert_eq!(first, PathBuf::from("common/common.cpp"));
                assert_eq!(second, PathBuf::from("common/build-info.cpp"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_executable_absent_unless_requested() {
        let tmp = TempDir::new().unwrap();
        let mut options = OptionRegistry::from_args(["main"]);
        let config = configure(tmp.path(), &mut options);
        let mut builder = GraphBuilder::new(&config, &mut options);

        let lib = builder.library("ggml-core", "ggml.c").unwrap();
        let main = builder.executable("main", "examples/main/main.cpp", &[lib]).unwrap();
        let quantize = builder
            .executable("quantize", "examples/quantize/quantize.cpp", &[lib])
            .unwrap();
        let graph = builder.finish();

        assert!(main.is_present());
        assert_eq!(
            quantize,
            Executable::Absent {
                name: "quantize".to_string()
            }
        );
        assert_eq!(graph.executables().count(), 1);
        assert_eq!(graph.dependents(lib), vec![main.id().unwrap()]);
    }

    #[test]
    fn test_build_all_includes_everything() {
        let tmp = TempDir::new().unwrap();
        let mut options = OptionRegistry::from_args(["build-all"]);
        let config = configure(tmp.path(), &mut options);
        let mut builder = GraphBuilder::new(&config, &mut options);

        let exe = builder.executable("embedding", "examples/embedding/embedding.cpp", &[]);
        assert!(exe.unwrap().is_present());
    }

    #[test]
    fn test_wiring_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut options =
            OptionRegistry::from_args(["target=aarch64-apple-darwin", "vulkan", "server"]);
        let config = configure(tmp.path(), &mut options);
        let mut builder = GraphBuilder::new(&config, &mut options);

        let vulkan = builder.library("ggml-vulkan-backend", "ggml-vulkan.cpp").unwrap();
        let metal = builder.library("ggml-metal-backend", "ggml-metal.m").unwrap();
        let server = builder
            .executable("server", "examples/server/server.cpp", &[])
            .unwrap();
        let main = builder.executable("main", "examples/main/main.cpp", &[]).unwrap();

        let wiring = BackendWiring {
            capabilities: config.capabilities(),
            vulkan: Some(vulkan),
            metal: Some(metal),
            triple: config.triple().clone(),
        };
        let candidates = [server.clone(), main];
        builder.wire_backends(&candidates, &wiring);
        builder.wire_backends(&candidates, &wiring);
        let graph = builder.finish();

        let exe = graph.executable(server.id().unwrap());
        assert_eq!(exe.extra_objects, vec![vulkan, metal]);
        assert_eq!(exe.system_libs, vec!["vulkan".to_string()]);
        assert_eq!(
            exe.frameworks,
            vec!["Foundation", "Metal", "MetalKit", "Accelerate"]
        );
        assert_eq!(graph.dependents(vulkan).len(), 1);
    }

    #[test]
    fn test_wiring_skips_ids_from_another_graph() {
        let tmp = TempDir::new().unwrap();
        let mut options = OptionRegistry::from_args(["target=x86_64-linux-gnu", "vulkan", "main"]);
        let config = configure(tmp.path(), &mut options);
        let mut builder = GraphBuilder::new(&config, &mut options);

        let lib = builder.library("ggml-core", "ggml.c").unwrap();
        let main = builder.executable("main", "examples/main/main.cpp", &[lib]).unwrap();
        let foreign = Executable::Present(ExecutableId(NodeIndex::new(40)));

        builder.wire_backends(
            &[foreign.clone(), main.clone()],
            &BackendWiring {
                capabilities: config.capabilities(),
                vulkan: Some(LibraryId(NodeIndex::new(41))),
                metal: None,
                triple: config.triple().clone(),
            },
        );
        builder.link_system_library(&foreign, "ws2_32");
        let graph = builder.finish();

        let exe = graph.executable(main.id().unwrap());
        assert!(exe.extra_objects.is_empty());
        assert_eq!(exe.system_libs, vec!["vulkan".to_string()]);
        assert_eq!(graph.dependents(lib).len(), 1);
    }

    #[test]
    fn test_topological_order_libraries_first() {
        let tmp = TempDir::new().unwrap();
        let mut options = OptionRegistry::from_args(["build-all"]);
        let config = configure(tmp.path(), &mut options);
        let mut builder = GraphBuilder::new(&config, &mut options);

        let exe = builder.executable("main", "examples/main/main.cpp", &[]).unwrap();
        let late = builder.library("late", "late.c").unwrap();
        builder.wire_backends(
            &[exe],
            &BackendWiring {
                capabilities: Capabilities::default(),
                vulkan: Some(late),
                metal: None,
                triple: config.triple().clone(),
            },
        );
        let graph = builder.finish();

        let names: Vec<_> = graph.topological_order().into_iter().map(Node::name).collect();
        assert_eq!(names, ["late", "main"]);
    }
}
