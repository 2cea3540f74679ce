//! # sbox-core
//!
//! Construction of a sandboxed process's view of the system:
//! - **Filesystem**: host whitelist mounts, synthetic mount-point subtrees,
//!   writable temporary storage, the process-information filesystem, and
//!   overlay composition of them.
//! - **Namespace**: assembly of the layered root, the mount table, and
//!   path resolution bounded by a symlink budget.
//! - **Descriptors**: import of host stdio into a sandbox descriptor table,
//!   sharing one terminal object across the stdio slots in terminal mode.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod fd;
pub mod filesystem;
pub mod namespace;
