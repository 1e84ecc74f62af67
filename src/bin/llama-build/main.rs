//! llama-build CLI - build orchestrator for the llama.cpp sources

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("llama_build=debug")
    } else {
        EnvFilter::new("llama_build=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let global = cli.global();
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &global),
        Commands::Plan(args) => commands::plan::execute(args, &global),
        Commands::Options(args) => commands::options::execute(args, &global),
    }
}
