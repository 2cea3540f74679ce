//! Sandbox startup sequence.

use std::sync::Arc;

use sbox_common::config::SandboxConfig;
use sbox_common::constants::{CONTAINER_ID, DEFAULT_UMASK, RESERVED_DIRS, STDIO_FDS};
use sbox_common::error::Result;
use sbox_common::types::Credentials;
use sbox_core::fd::import_stdio;
use sbox_core::namespace::{MountNamespace, SymlinkBudget, build_namespace, build_root};

use crate::engine::{CreateProcessArgs, ExecutionEngine, InitProcess};

/// Runs `config.args` in a new sandbox using the host's own stdio.
///
/// # Errors
///
/// Returns the first error hit while building the sandbox or running the
/// program. Nothing is executed unless the namespace and descriptor table
/// were both built completely.
pub fn run<E: ExecutionEngine>(config: &SandboxConfig, engine: &mut E) -> Result<i32> {
    run_with_stdio(config, engine, STDIO_FDS)
}

/// Like [`run`], with explicit host descriptors for stdin, stdout, and stderr.
///
/// # Errors
///
/// See [`run`].
pub fn run_with_stdio<E: ExecutionEngine>(
    config: &SandboxConfig,
    engine: &mut E,
    host_fds: [i32; 3],
) -> Result<i32> {
    config.validate()?;
    tracing::info!(
        program = %config.args[0],
        tty = config.tty,
        mounts = config.mounts.len(),
        "starting sandbox"
    );
    if config.host_net {
        tracing::debug!("host networking requested");
    }

    let credentials = Credentials::root();
    let fd_table = import_stdio(host_fds, credentials.file_owner(), config.tty, &config.limits)?;
    let terminal = if config.tty { fd_table.get(0).cloned() } else { None };

    let namespace = root_namespace(config, engine)?;

    let args = CreateProcessArgs {
        argv: config.args.clone(),
        envv: config.env.clone(),
        working_directory: config.working_dir.clone(),
        credentials,
        umask: DEFAULT_UMASK,
        limits: config.limits.clone(),
        max_symlink_traversals: config.max_symlink_traversals,
        hostname: config.hostname.clone(),
        container_id: CONTAINER_ID.to_owned(),
        namespace,
        fd_table,
    };
    let mut process = engine.create_process(args)?;

    if let Some(tty) = terminal.as_deref().and_then(|f| f.as_terminal()) {
        tty.init_foreground_process_group(process.process_group())?;
    }

    process.start()?;
    let status = process.wait()?;
    tracing::info!(status, "sandbox exited");
    Ok(status)
}

fn root_namespace<E: ExecutionEngine>(
    config: &SandboxConfig,
    engine: &E,
) -> Result<Arc<MountNamespace>> {
    if let Some(ns) = engine.root_namespace().get() {
        tracing::debug!("reusing existing root mount namespace");
        return Ok(ns);
    }
    let root = build_root(&config.mounts, &RESERVED_DIRS)?;
    let mut budget = SymlinkBudget::new(config.max_symlink_traversals);
    build_namespace(engine.root_namespace(), root, &config.hostname, &mut budget)
}
