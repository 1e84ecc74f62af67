//! Build executor with progress reporting.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::builder::errors::BuildError;
use crate::builder::native::{Artifact, NativeBuilder};
use crate::builder::plan::{BuildPlan, BuildStep};
use crate::builder::toolchain::Toolchain;

/// Outcome of a finished build.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub artifacts: Vec<Artifact>,
    pub elapsed: Duration,
}

/// Build executor with progress tracking.
pub struct BuildExecutor<'a> {
    toolchain: &'a dyn Toolchain,
    cwd: PathBuf,
    verbose: bool,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, cwd: &Path) -> Self {
        BuildExecutor {
            toolchain,
            cwd: cwd.to_path_buf(),
            verbose: false,
        }
    }

    /// Verbose builds log every command instead of drawing a progress bar.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Execute a build plan with progress reporting.
    pub fn execute(&self, plan: &BuildPlan, jobs: Option<usize>) -> Result<BuildSummary, BuildError> {
        let start = Instant::now();

        let total = progress_total(plan);
        if self.verbose {
            eprintln!("   Compiling {} file(s)", plan.compile_count());
            eprintln!("     Linking {} executable(s)", plan.executables().len());
        }

        let mut builder = NativeBuilder::new(self.toolchain, &self.cwd);
        let bar = (!self.verbose && total > 1).then(|| progress_bar(total));
        if let Some(bar) = &bar {
            builder = builder.with_progress(bar.clone());
        }

        let result = builder.execute(plan, jobs);
        if let Some(bar) = bar {
            match &result {
                Ok(_) => bar.finish_with_message("done"),
                Err(_) => bar.abandon(),
            }
        }
        let artifacts = result?;

        let elapsed = start.elapsed();
        eprintln!(
            "    Finished {} artifact(s) in {:.2}s",
            artifacts.len(),
            elapsed.as_secs_f64()
        );

        Ok(BuildSummary { artifacts, elapsed })
    }
}

/// Steps that advance the progress bar (everything but installs).
fn progress_total(plan: &BuildPlan) -> u64 {
    plan.steps
        .iter()
        .filter(|s| !matches!(s, BuildStep::Install(_)))
        .count() as u64
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::plan::{ArchiveStep, InstallStep};
    use crate::core::platform::OptimizeMode;

    fn plan(steps: Vec<BuildStep>) -> BuildPlan {
        BuildPlan {
            target: "x86_64-unknown-linux-gnu".to_string(),
            optimize: OptimizeMode::Debug,
            cross_target: None,
            steps,
            fingerprint: String::new(),
        }
    }

    #[test]
    fn test_progress_total_skips_installs() {
        let plan = plan(vec![
            BuildStep::Archive(ArchiveStep {
                target: "ggml-core".to_string(),
                object: PathBuf::from("obj/ggml-core.o"),
                output: PathBuf::from("lib/libggml-core.a"),
            }),
            BuildStep::Install(InstallStep {
                target: "ggml-core".to_string(),
                artifact: PathBuf::from("lib/libggml-core.a"),
                dest_dir: PathBuf::from("out/lib"),
            }),
        ]);
        assert_eq!(progress_total(&plan), 1);
    }

    #[test]
    fn test_progress_bar_length() {
        let bar = progress_bar(7);
        assert_eq!(bar.length(), Some(7));
    }

    #[test]
    fn test_empty_plan_succeeds() {
        let toolchain = crate::builder::toolchain::GccToolchain::new(
            PathBuf::from("cc"),
            PathBuf::from("c++"),
            PathBuf::from("ar"),
            crate::builder::toolchain::ToolchainPlatform::Gcc,
        );
        let summary = BuildExecutor::new(&toolchain, Path::new("."))
            .execute(&plan(vec![]), None)
            .unwrap();
        assert!(summary.artifacts.is_empty());
    }
}
