//! `llama-build plan` command

use anyhow::Result;

use crate::cli::{GlobalArgs, PlanArgs};
use llama_build::ops::build::{plan, BuildOptions};

pub fn execute(args: PlanArgs, global: &GlobalArgs) -> Result<()> {
    let opts = BuildOptions {
        source_root: global.source_dir.clone(),
        defines: args.configure.define,
        revision_source: args.configure.revision_source,
        emit_compile_commands: args.emit_compile_commands,
        verbose: global.verbose,
        ..Default::default()
    };

    let planned = plan(&opts, false)?;
    println!("{}", planned.plan.to_json()?);
    Ok(())
}
