//! CLI command definitions and dispatch.

pub mod cat;
pub mod tree;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sbox_common::config::SandboxConfig;
use sbox_common::constants::RESERVED_DIRS;
use sbox_core::namespace::{
    MountNamespace, NamespaceCell, SymlinkBudget, build_namespace, build_root,
};

/// sbox: inspect the layered root filesystem of a sandbox.
#[derive(Parser, Debug)]
#[command(name = "sbox", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Comma-separated host directories to layer into the root, lowest
    /// precedence first.
    #[arg(long, global = true, env = "SBOX_MOUNTS")]
    pub mounts: Option<String>,

    /// JSON sandbox configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the directory tree of the assembled root.
    Tree(tree::TreeArgs),
    /// Print a file as seen from inside the sandbox.
    Cat(cat::CatArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the sandbox cannot be assembled or the command fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let ns = assemble(&config)?;
    match cli.command {
        Command::Tree(args) => tree::execute(&ns, &args),
        Command::Cat(args) => cat::execute(&ns, &args),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<SandboxConfig> {
    let mut config = match &cli.config {
        Some(path) => SandboxConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SandboxConfig::default(),
    };
    if let Some(mounts) = &cli.mounts {
        config.mounts = SandboxConfig::parse_mounts(mounts);
    }
    Ok(config)
}

fn assemble(config: &SandboxConfig) -> anyhow::Result<Arc<MountNamespace>> {
    let root = build_root(&config.mounts, &RESERVED_DIRS).context("error creating mounts")?;
    let cell = NamespaceCell::new();
    let mut budget = SymlinkBudget::new(config.max_symlink_traversals);
    let ns = build_namespace(&cell, root, &config.hostname, &mut budget)
        .context("error creating mount namespace")?;
    Ok(ns)
}
