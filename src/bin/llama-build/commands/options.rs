//! `llama-build options` command

use anyhow::{Context, Result};

use crate::cli::{GlobalArgs, OptionsArgs};
use llama_build::core::OptionKind;
use llama_build::ops::llama::list_options;

pub fn execute(args: OptionsArgs, global: &GlobalArgs) -> Result<()> {
    let declared = list_options(&global.source_dir)?;

    if args.json {
        let json = serde_json::to_string_pretty(&declared).context("failed to serialize options")?;
        println!("{}", json);
        return Ok(());
    }

    let width = declared.iter().map(|o| o.name.len()).max().unwrap_or(0);
    for option in &declared {
        let kind = match option.kind {
            OptionKind::Bool => "bool",
            OptionKind::String => "string",
        };
        println!(
            "  -D {:<width$}  {:<6}  {} (default: {})",
            option.name,
            kind,
            option.description,
            option.default,
            width = width
        );
    }
    Ok(())
}
