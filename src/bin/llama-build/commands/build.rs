//! `llama-build build` command

use anyhow::Result;

use crate::cli::{BuildArgs, GlobalArgs};
use llama_build::ops::build::{build, BuildOptions};

pub fn execute(args: BuildArgs, global: &GlobalArgs) -> Result<()> {
    let opts = BuildOptions {
        source_root: global.source_dir.clone(),
        defines: args.configure.define,
        jobs: args.jobs,
        revision_source: args.configure.revision_source,
        emit_compile_commands: args.emit_compile_commands,
        verbose: global.verbose,
        global_config: None,
    };

    let summary = build(&opts)?;
    for artifact in &summary.artifacts {
        tracing::debug!("built {} -> {}", artifact.target, artifact.path.display());
    }
    Ok(())
}
