//! `sbox cat` — Print a file from inside the sandbox.

use std::io::Write as _;

use clap::Args;
use sbox_core::namespace::MountNamespace;

/// Arguments for the `cat` command.
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Absolute path inside the sandbox.
    pub path: String,
}

/// Executes the `cat` command.
///
/// # Errors
///
/// Returns an error if the path does not resolve to a readable file.
pub fn execute(ns: &MountNamespace, args: &CatArgs) -> anyhow::Result<()> {
    let data = ns.read_file(&args.path)?;
    std::io::stdout().lock().write_all(&data)?;
    Ok(())
}
