//! Contract of the process-execution engine.
//!
//! The engine owns the kernel-side process model. It receives a fully
//! built namespace and descriptor table and runs the program to completion.

use std::sync::Arc;

use sbox_common::error::Result;
use sbox_common::types::{Credentials, ProcessGroupId, ResourceLimits};
use sbox_core::fd::DescriptorTable;
use sbox_core::namespace::{MountNamespace, NamespaceCell};

/// Everything needed to create the initial sandboxed process.
#[derive(Debug)]
pub struct CreateProcessArgs {
    /// Program argument vector.
    pub argv: Vec<String>,
    /// Environment, as `KEY=value` strings.
    pub envv: Vec<String>,
    /// Working directory inside the namespace.
    pub working_directory: String,
    /// Credentials of the process.
    pub credentials: Credentials,
    /// File mode creation mask.
    pub umask: u32,
    /// Resource limits.
    pub limits: ResourceLimits,
    /// Symlink budget for the process's own path lookups.
    pub max_symlink_traversals: u32,
    /// Hostname reported to the process.
    pub hostname: String,
    /// Identifier of the container the process belongs to.
    pub container_id: String,
    /// Root mount namespace.
    pub namespace: Arc<MountNamespace>,
    /// Initial descriptor table. Ownership passes to the engine.
    pub fd_table: DescriptorTable,
}

/// The initial process, created but not yet running.
pub trait InitProcess {
    /// Process group the process was placed in.
    fn process_group(&self) -> ProcessGroupId;

    /// Begins execution.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot start the process.
    fn start(&mut self) -> Result<()>;

    /// Blocks until the process exits and returns its exit status.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine loses track of the process.
    fn wait(self) -> Result<i32>;
}

/// A process-execution engine.
pub trait ExecutionEngine {
    /// Handle to a created process.
    type Process: InitProcess;

    /// Slot holding the engine's root mount namespace.
    fn root_namespace(&self) -> &NamespaceCell;

    /// Creates the initial process without starting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be created.
    fn create_process(&mut self, args: CreateProcessArgs) -> Result<Self::Process>;
}
