//! Implementation of `llama-build build` and `llama-build plan`.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use crate::builder::context::ConfigureInputs;
use crate::builder::errors::BuildError;
use crate::builder::executor::{BuildExecutor, BuildSummary};
use crate::builder::graph::TargetGraph;
use crate::builder::plan::{BuildPlan, PlanLayout};
use crate::builder::revision::RevisionSourceKind;
use crate::builder::toolchain::{detect_compiler_identity, detect_toolchain, Toolchain};
use crate::core::options::OptionRegistry;
use crate::ops::llama;
use crate::util::config::{global_config_path, load_config, project_config_path, Config};

/// Options shared by the build and plan commands.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Root of the llama.cpp checkout
    pub source_root: PathBuf,

    /// `-D name[=value]` arguments, in command-line order
    pub defines: Vec<String>,

    /// Number of parallel compile jobs
    pub jobs: Option<usize>,

    /// Revision backend (overrides the config file)
    pub revision_source: Option<RevisionSourceKind>,

    /// Emit compile_commands.json
    pub emit_compile_commands: bool,

    /// Verbose output
    pub verbose: bool,

    /// Global config file (None = platform default)
    pub global_config: Option<PathBuf>,
}

/// A configured and planned build, ready to execute.
pub struct PlannedBuild {
    pub source_root: PathBuf,
    pub config: Config,
    pub graph: TargetGraph,
    pub plan: BuildPlan,
    pub layout: PlanLayout,
    /// `None` when no toolchain was found and none was required
    pub toolchain: Option<Box<dyn Toolchain>>,
}

/// Configure the source tree and compute the build plan.
///
/// When `require_toolchain` is false a missing compiler is tolerated: the
/// plan is toolchain-neutral, only build-info loses the compiler version.
pub fn plan(opts: &BuildOptions, require_toolchain: bool) -> Result<PlannedBuild> {
    let source_root = opts
        .source_root
        .canonicalize()
        .with_context(|| format!("source directory not found: {}", opts.source_root.display()))?;

    let global = opts.global_config.clone().or_else(global_config_path);
    let config = load_config(global.as_deref(), &project_config_path(&source_root));

    let mut options = OptionRegistry::from_args(&opts.defines);
    for (name, value) in config.option_defaults()? {
        options.supply_default(&name, &value);
    }

    let toolchain = match detect_toolchain(&config.toolchain) {
        Ok(toolchain) => Some(toolchain),
        Err(e) if !require_toolchain => {
            tracing::warn!("{:#}", e);
            None
        }
        Err(e) => return Err(e),
    };
    let compiler = match &toolchain {
        Some(toolchain) => detect_compiler_identity(toolchain.as_ref()).to_string(),
        None => "unknown".to_string(),
    };
    tracing::debug!("compiler identity: {}", compiler);

    let revision_kind = resolve_revision_source(opts, &config)?;
    let revision_source = revision_kind.into_source();
    let inputs = ConfigureInputs {
        source_root: source_root.clone(),
        compiler,
        revision_source: revision_source.as_ref(),
        dry_run: false,
    };

    let graph = llama::configure(&inputs, &mut options)?;

    let layout = PlanLayout::new(
        &source_root,
        config.build.build_dir.as_deref(),
        config.build.prefix.as_deref(),
    );
    let plan = BuildPlan::new(&graph, &layout);
    tracing::info!(
        "planned {} step(s) for {} executable(s)",
        plan.steps.len(),
        plan.executables().len()
    );

    if opts.emit_compile_commands || config.build.emit_compile_commands {
        match &toolchain {
            Some(toolchain) => plan.emit_compile_commands(
                toolchain.as_ref(),
                &source_root,
                &compile_commands_path(&layout),
            )?,
            None => tracing::warn!("no toolchain found, not writing compile_commands.json"),
        }
    }

    Ok(PlannedBuild {
        source_root,
        config,
        graph,
        plan,
        layout,
        toolchain,
    })
}

/// Configure, plan and execute a build.
pub fn build(opts: &BuildOptions) -> Result<BuildSummary> {
    let planned = plan(opts, true)?;
    let toolchain = planned
        .toolchain
        .as_deref()
        .ok_or_else(|| anyhow!("no C/C++ toolchain available"))?;

    check_cross_target(&planned.plan, toolchain)?;

    if planned.plan.executables().is_empty() && !planned.graph.libraries().any(|(_, l)| l.install) {
        tracing::debug!(
            "no executable selected; candidates: {}",
            llama::CANDIDATE_EXECUTABLES.join(", ")
        );
    }

    let jobs = opts.jobs.or(planned.config.build.jobs);
    let summary = BuildExecutor::new(toolchain, &planned.source_root)
        .verbose(opts.verbose)
        .execute(&planned.plan, jobs)?;
    Ok(summary)
}

/// A toolchain without `--target` only builds for the host.
fn check_cross_target(plan: &BuildPlan, toolchain: &dyn Toolchain) -> Result<(), BuildError> {
    match &plan.cross_target {
        Some(target) if !toolchain.platform().supports_target_flag() => {
            Err(BuildError::UnsupportedCrossTarget {
                toolchain: toolchain.platform().as_str(),
                target: target.clone(),
            })
        }
        _ => Ok(()),
    }
}

/// CLI flag first, then the config file, then `git`.
fn resolve_revision_source(opts: &BuildOptions, config: &Config) -> Result<RevisionSourceKind> {
    if let Some(kind) = opts.revision_source {
        return Ok(kind);
    }
    match &config.build.revision_source {
        Some(raw) => raw
            .parse::<RevisionSourceKind>()
            .map_err(|e| anyhow!(e))
            .context("invalid `build.revision-source` in config"),
        None => Ok(RevisionSourceKind::default()),
    }
}

fn compile_commands_path(layout: &PlanLayout) -> PathBuf {
    layout.build_dir.join("compile_commands.json")
}
