//! The llama.cpp recipe.
//!
//! Declares every library and candidate executable of the llama.cpp source
//! tree against a resolved configuration, then runs the backend wiring
//! pass over the candidates.

use crate::builder::build_info::BUILD_INFO_SOURCE;
use crate::builder::context::{ConfigurationBuilder, ConfigureInputs};
use crate::builder::errors::ConfigureError;
use crate::builder::graph::{BackendWiring, GraphBuilder, TargetGraph};
use crate::builder::revision::StaticRevision;
use crate::core::options::{DeclaredOption, OptionRegistry};
use crate::core::target::LibraryId;

use std::path::Path;

/// Executables that can be selected with `-D <name>`, in declaration order.
pub const CANDIDATE_EXECUTABLES: [&str; 7] = [
    "main",
    "quantize",
    "perplexity",
    "embedding",
    "finetune",
    "train-text-from-scratch",
    "server",
];

/// Resolve the configuration and declare every target.
///
/// Fails if the user supplied an option the recipe never read.
pub fn configure(
    inputs: &ConfigureInputs<'_>,
    options: &mut OptionRegistry,
) -> Result<TargetGraph, ConfigureError> {
    let config = ConfigurationBuilder::resolve(inputs, options)?.freeze();

    let mut builder = GraphBuilder::new(&config, options);
    declare(&mut builder)?;
    let graph = builder.finish();

    options.finish()?;
    tracing::info!(
        "declared {} libraries and {} executables",
        graph.libraries().count(),
        graph.executables().count()
    );
    Ok(graph)
}

/// Declare the llama.cpp targets.
pub fn declare(b: &mut GraphBuilder<'_>) -> Result<(), ConfigureError> {
    let ggml = b.library("ggml-core", "ggml.c")?;
    let ggml_alloc = b.library("ggml-alloc", "ggml-alloc.c")?;
    let ggml_backend = b.library("ggml-backend", "ggml-backend.c")?;
    let ggml_quants = b.library("ggml-quants", "ggml-quants.c")?;
    let llama = b.library("llama-core", "llama.cpp")?;

    let common = b.library("common", "common/common.cpp")?;
    let build_info = b.library("build-info", BUILD_INFO_SOURCE)?;
    let sampling = b.library("sampling", "common/sampling.cpp")?;
    let console = b.library("console", "common/console.cpp")?;
    let grammar_parser = b.library("grammar-parser", "common/grammar-parser.cpp")?;
    let train = b.library("train", "common/train.cpp")?;
    let clip = b.library("clip", "examples/llava/clip.cpp")?;

    let caps = b.config().capabilities();
    let vulkan = if caps.vulkan {
        Some(b.library("ggml-vulkan-backend", "ggml-vulkan.cpp")?)
    } else {
        None
    };
    let metal = if caps.metal {
        Some(b.library("ggml-metal-backend", "ggml-metal.m")?)
    } else {
        None
    };

    let base = [ggml, ggml_alloc, ggml_backend, ggml_quants, llama, common, build_info];
    let deps = |extra: &[LibraryId]| -> Vec<LibraryId> {
        base.iter().chain(extra).copied().collect()
    };

    let main = b.executable(
        "main",
        "examples/main/main.cpp",
        &deps(&[sampling, console, grammar_parser]),
    )?;
    let quantize = b.executable("quantize", "examples/quantize/quantize.cpp", &deps(&[]))?;
    let perplexity = b.executable("perplexity", "examples/perplexity/perplexity.cpp", &deps(&[]))?;
    let embedding = b.executable("embedding", "examples/embedding/embedding.cpp", &deps(&[]))?;
    let finetune = b.executable("finetune", "examples/finetune/finetune.cpp", &deps(&[train]))?;
    let train_text = b.executable(
        "train-text-from-scratch",
        "examples/train-text-from-scratch/train-text-from-scratch.cpp",
        &deps(&[train]),
    )?;
    let server = b.executable(
        "server",
        "examples/server/server.cpp",
        &deps(&[sampling, console, grammar_parser, clip]),
    )?;

    if b.config().triple().is_windows() {
        b.link_system_library(&server, "ws2_32");
    }

    let wiring = BackendWiring {
        capabilities: caps,
        vulkan,
        metal,
        triple: b.config().triple().clone(),
    };
    b.wire_backends(
        &[main, quantize, perplexity, embedding, finetune, train_text, server],
        &wiring,
    );
    Ok(())
}

/// Every option the recipe declares, with its default.
///
/// Runs the recipe without a version control lookup and without writing
/// generated sources.
pub fn list_options(source_root: &Path) -> Result<Vec<DeclaredOption>, ConfigureError> {
    let revision = StaticRevision("unknown".to_string());
    let inputs = ConfigureInputs {
        source_root: source_root.to_path_buf(),
        compiler: "unknown".to_string(),
        revision_source: &revision,
        dry_run: true,
    };
    let mut options = OptionRegistry::new();
    configure(&inputs, &mut options)?;
    Ok(options.declared().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn configure_with(root: &Path, args: &[&str]) -> Result<TargetGraph, ConfigureError> {
        let revision = StaticRevision("0123abc".to_string());
        let inputs = ConfigureInputs {
            source_root: root.to_path_buf(),
            compiler: "gcc-13.2".to_string(),
            revision_source: &revision,
            dry_run: false,
        };
        let mut options = OptionRegistry::from_args(args);
        configure(&inputs, &mut options)
    }

    #[test]
    fn test_options_list_every_candidate() {
        let tmp = TempDir::new().unwrap();
        let declared = list_options(tmp.path()).unwrap();
        let names: Vec<&str> = declared.iter().map(|o| o.name.as_str()).collect();

        for exe in CANDIDATE_EXECUTABLES {
            assert!(names.contains(&exe), "missing option {exe}");
        }
        for option in ["target", "optimize", "lto", "install-libs", "build-all", "vulkan"] {
            assert!(names.contains(&option), "missing option {option}");
        }
        assert!(!tmp.path().join(BUILD_INFO_SOURCE).exists());
    }

    #[test]
    fn test_no_toggles_means_no_executables() {
        let tmp = TempDir::new().unwrap();
        let graph = configure_with(tmp.path(), &["target=x86_64-linux-gnu"]).unwrap();
        assert_eq!(graph.executables().count(), 0);
        assert_eq!(graph.libraries().count(), 12);
    }

    #[test]
    fn test_build_all_declares_every_candidate() {
        let tmp = TempDir::new().unwrap();
        let graph = configure_with(tmp.path(), &["target=x86_64-linux-gnu", "build-all"]).unwrap();
        let names: Vec<&str> = graph.executables().map(|(_, e)| e.name.as_str()).collect();
        assert_eq!(names, CANDIDATE_EXECUTABLES);
    }

    #[test]
    fn test_server_links_winsock_on_windows() {
        let tmp = TempDir::new().unwrap();
        let graph = configure_with(tmp.path(), &["target=x86_64-windows-msvc", "server"]).unwrap();
        let id = graph.find_executable("server").unwrap();
        assert_eq!(graph.executable(id).system_libs, vec!["ws2_32".to_string()]);

        let graph = configure_with(tmp.path(), &["target=x86_64-linux-gnu", "server"]).unwrap();
        let id = graph.find_executable("server").unwrap();
        assert!(graph.executable(id).system_libs.is_empty());
    }

    #[test]
    fn test_finetune_depends_on_train() {
        let tmp = TempDir::new().unwrap();
        let graph = configure_with(tmp.path(), &["target=x86_64-linux-gnu", "finetune"]).unwrap();
        let train = graph.find_library("train").unwrap();
        let finetune = graph.find_executable("finetune").unwrap();
        assert!(graph.executable(finetune).dependencies.contains(&train));
        assert_eq!(graph.dependents(train), vec![finetune]);
    }

    #[test]
    fn test_unknown_option_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = configure_with(tmp.path(), &["vulcan"]).unwrap_err();
        assert!(matches!(err, ConfigureError::UnknownOption { ref name, .. } if name == "vulcan"));
    }

    #[test]
    fn test_metal_backend_on_macos() {
        let tmp = TempDir::new().unwrap();
        let graph = configure_with(tmp.path(), &["target=aarch64-macos", "main"]).unwrap();
        let metal = graph.find_library("ggml-metal-backend").unwrap();
        let main = graph.executable(graph.find_executable("main").unwrap());
        assert_eq!(main.extra_objects, vec![metal]);
        assert!(main.frameworks.contains(&"Metal".to_string()));
        assert!(main.frameworks.contains(&"Accelerate".to_string()));
    }
}
