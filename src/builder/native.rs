//! Native C/C++ compiler driver.
//!
//! Runs the steps of a build plan through a toolchain. Compile steps are
//! independent of each other and run in parallel; archive, link and install
//! steps run one at a time in plan order.

use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::builder::errors::BuildError;
use crate::builder::plan::{ArchiveStep, BuildPlan, BuildStep, CompileStep, InstallStep, LinkStep};
use crate::builder::toolchain::{CommandSpec, Toolchain};
use crate::core::target::TargetKind;
use crate::util::fs::{ensure_dir, install_file};

/// A file produced by the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub target: String,
    pub kind: TargetKind,
    pub path: PathBuf,
}

/// Native C/C++ builder.
pub struct NativeBuilder<'a> {
    toolchain: &'a dyn Toolchain,
    /// Working directory for every tool invocation
    cwd: PathBuf,
    progress: Option<ProgressBar>,
}

impl<'a> NativeBuilder<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, cwd: &Path) -> Self {
        NativeBuilder {
            toolchain,
            cwd: cwd.to_path_buf(),
            progress: None,
        }
    }

    /// Advance `bar` by one for every finished step.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Execute the build plan.
    ///
    /// The first failing step aborts the build. Among parallel compile
    /// failures, the one earliest in the plan is reported.
    pub fn execute(
        &self,
        plan: &BuildPlan,
        jobs: Option<usize>,
    ) -> Result<Vec<Artifact>, BuildError> {
        let compile_steps: Vec<&CompileStep> = plan.compile_steps().collect();

        if !compile_steps.is_empty() {
            tracing::info!("compiling {} file(s)", compile_steps.len());
            let run = || -> Vec<Result<(), BuildError>> {
                compile_steps
                    .par_iter()
                    .map(|step| self.compile(plan, step))
                    .collect()
            };

            let results = match jobs {
                Some(j) => match rayon::ThreadPoolBuilder::new().num_threads(j).build() {
                    Ok(pool) => pool.install(run),
                    Err(e) => {
                        tracing::warn!("could not create a {}-thread pool ({}), using the default", j, e);
                        run()
                    }
                },
                None => run(),
            };
            for result in results {
                result?;
            }
        }

        let mut artifacts = Vec::new();
        for step in &plan.steps {
            match step {
                BuildStep::Compile(_) => {}
                BuildStep::Archive(s) => artifacts.push(self.archive(plan, s)?),
                BuildStep::Link(s) => artifacts.push(self.link(plan, s)?),
                BuildStep::Install(s) => self.install(s)?,
            }
        }

        Ok(artifacts)
    }

    fn compile(&self, plan: &BuildPlan, step: &CompileStep) -> Result<(), BuildError> {
        prepare_output(&step.target, &step.object)?;

        let spec = self.toolchain.compile_command(&plan.compile_input(step));
        tracing::debug!(
            "compiling {} -> {} ({})",
            step.source.display(),
            step.object.display(),
            step.lang.as_str()
        );

        let stderr = self.run(&step.target, &spec, &step.source)?;
        match stderr {
            None => {
                self.tick(&step.target);
                Ok(())
            }
            Some(stderr) => Err(BuildError::Compile {
                target: step.target.clone(),
                source_file: step.source.clone(),
                stderr,
            }),
        }
    }

    fn archive(&self, plan: &BuildPlan, step: &ArchiveStep) -> Result<Artifact, BuildError> {
        prepare_output(&step.target, &step.output)?;
        // ar appends to an existing archive
        let _ = std::fs::remove_file(&step.output);

        let spec = self.toolchain.archive_command(&plan.archive_input(step));
        tracing::debug!("creating static library {}", step.output.display());

        if let Some(stderr) = self.run(&step.target, &spec, &step.output)? {
            return Err(BuildError::Archive {
                target: step.target.clone(),
                output: step.output.clone(),
                stderr,
            });
        }
        self.tick(&step.target);
        Ok(Artifact {
            target: step.target.clone(),
            kind: TargetKind::StaticLib,
            path: step.output.clone(),
        })
    }

    fn link(&self, plan: &BuildPlan, step: &LinkStep) -> Result<Artifact, BuildError> {
        prepare_output(&step.target, &step.output)?;

        let spec = self.toolchain.link_exe_command(&plan.link_input(step));
        tracing::debug!(
            "linking executable {} (runtime: {})",
            step.output.display(),
            step.runtime.as_str()
        );

        if let Some(stderr) = self.run(&step.target, &spec, &step.output)? {
            return Err(BuildError::Link {
                target: step.target.clone(),
                output: step.output.clone(),
                stderr,
            });
        }
        self.tick(&step.target);
        Ok(Artifact {
            target: step.target.clone(),
            kind: TargetKind::Exe,
            path: step.output.clone(),
        })
    }

    fn install(&self, step: &InstallStep) -> Result<(), BuildError> {
        tracing::debug!(
            "installing {} to {}",
            step.artifact.display(),
            step.dest_dir.display()
        );
        install_file(&step.artifact, &step.dest_dir).map_err(|source| BuildError::Install {
            target: step.target.clone(),
            source,
        })
    }

    /// Run a tool working on `file`. `Ok(Some(stderr))` means it ran and
    /// failed.
    fn run(
        &self,
        target: &str,
        spec: &CommandSpec,
        file: &Path,
    ) -> Result<Option<String>, BuildError> {
        let process = spec.to_process(&self.cwd);
        tracing::debug!("{}", process.display_command());

        let output = process.exec().map_err(|source| BuildError::Spawn {
            target: target.to_string(),
            program: spec.program.clone(),
            file: file.to_path_buf(),
            source,
        })?;
        if output.status.success() {
            Ok(None)
        } else {
            Ok(Some(String::from_utf8_lossy(&output.stderr).trim_end().to_string()))
        }
    }

    fn tick(&self, target: &str) {
        if let Some(bar) = &self.progress {
            bar.set_message(target.to_string());
            bar.inc(1);
        }
    }
}

fn prepare_output(target: &str, output: &Path) -> Result<(), BuildError> {
    match output.parent() {
        Some(parent) => ensure_dir(parent).map_err(|source| BuildError::PrepareOutput {
            target: target.to_string(),
            path: parent.to_path_buf(),
            source,
        }),
        None => Ok(()),
    }
}
