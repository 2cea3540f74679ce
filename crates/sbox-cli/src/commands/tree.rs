//! `sbox tree` — Print the assembled directory tree.

use std::io::Write as _;

use clap::Args;
use sbox_core::namespace::MountNamespace;

/// Arguments for the `tree` command.
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Directory inside the sandbox to start from.
    #[arg(default_value = "/")]
    pub path: String,

    /// Maximum depth to descend.
    #[arg(short, long, default_value_t = 2)]
    pub depth: usize,
}

/// Executes the `tree` command.
///
/// # Errors
///
/// Returns an error if the path cannot be resolved or listed.
pub fn execute(ns: &MountNamespace, args: &TreeArgs) -> anyhow::Result<()> {
    tracing::info!(path = %args.path, depth = args.depth, "rendering tree");
    let rendered = crate::output::render_tree(ns, &args.path, args.depth)?;
    std::io::stdout().lock().write_all(rendered.as_bytes())?;
    Ok(())
}
