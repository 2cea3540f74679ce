//! Assembly of the sandbox root filesystem.
//!
//! The root is built bottom-up, each step yielding a new tree that holds
//! references to its inputs:
//!
//! 1. one host whitelist tree per configured directory, each later one
//!    layered over the ones before it;
//! 2. a synthetic subtree of reserved mount points layered *under* the
//!    host content;
//! 3. an empty writable layer on top, which receives every write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sbox_common::constants::{FS_PROC, FS_RAMFS, FS_TMPFS, FS_WHITELIST, PROC_MOUNT_POINT};
use sbox_common::error::{Result, SboxError};

use super::{MountNamespace, NamespaceCell, SymlinkBudget};
use crate::filesystem::{FilesystemKind, InodeTree, MountFlags, MountOptions, compose};

const READ_ONLY: MountFlags = MountFlags { read_only: true };

fn filesystem(name: &str) -> Result<FilesystemKind> {
    FilesystemKind::lookup(name)
        .ok_or_else(|| SboxError::mount(format!("unknown filesystem type {name:?}")))
}

/// Builds the composed root tree.
///
/// Relative entries of `mounts` are resolved against the current working
/// directory. The last entry has the highest precedence. Every path in
/// `reserved_dirs` exists as a directory in the result even if no host
/// mount provides it.
///
/// # Errors
///
/// Returns [`SboxError::Mount`] if a host directory cannot be mounted, a
/// composition step fails, or the writable layer cannot be created.
pub fn build_root<P: AsRef<Path>, S: AsRef<str>>(
    mounts: &[P],
    reserved_dirs: &[S],
) -> Result<InodeTree> {
    let whitelistfs = filesystem(FS_WHITELIST)?;
    let ramfs = filesystem(FS_RAMFS)?;
    let tmpfs = filesystem(FS_TMPFS)?;

    let mut acc: Option<InodeTree> = None;
    for (index, mount) in mounts.iter().enumerate() {
        let root = absolute(mount.as_ref())?;
        tracing::info!(layer = index, root = %root.display(), "mounting host layer");
        let options = MountOptions {
            root: Some(root),
            ..MountOptions::default()
        };
        let layer = whitelistfs
            .mount_with("host", READ_ONLY, options)
            .map_err(|e| e.into_mount(&format!("host layer {index}")))?;

        acc = Some(match acc {
            None => layer,
            Some(below) => compose(&layer, &below)
                .map_err(|e| e.into_mount(&format!("layering host layer {index}")))?,
        });
    }

    let host_root = match acc {
        Some(tree) => tree,
        None => ramfs
            .mount_with("none", READ_ONLY, MountOptions::default())
            .map_err(|e| e.into_mount("creating empty host layer"))?,
    };

    let reserved = MountOptions {
        paths: reserved_dirs.iter().map(|d| d.as_ref().to_owned()).collect(),
        ..MountOptions::default()
    };
    let mount_points = ramfs
        .mount_with("none", READ_ONLY, reserved)
        .map_err(|e| e.into_mount("building mount point tree"))?;
    let with_mount_points = compose(&host_root, &mount_points)
        .map_err(|e| e.into_mount("adding mount point overlay"))?;

    let upper = tmpfs
        .mount_with("upper", MountFlags::default(), MountOptions::default())
        .map_err(|e| e.into_mount("creating writable layer"))?;
    let root = compose(&upper, &with_mount_points)
        .map_err(|e| e.into_mount("adding writable layer"))?;

    tracing::info!(
        layers = mounts.len(),
        reserved = reserved_dirs.len(),
        "root filesystem assembled"
    );
    Ok(root)
}

fn absolute(mount: &Path) -> Result<PathBuf> {
    if mount.is_absolute() {
        return Ok(mount.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| {
        SboxError::Io {
            path: mount.to_path_buf(),
            source: e,
        }
        .into_mount("resolving relative host mount")
    })?;
    Ok(cwd.join(mount))
}

/// Creates the sandbox namespace from `root`, attaches the
/// process-information filesystem at `/proc`, and stores it in `target`.
///
/// The mount point is resolved against `budget`.
///
/// # Errors
///
/// Returns [`SboxError::AlreadyInitialized`] if `target` already holds a
/// namespace, [`SboxError::NotFound`] or [`SboxError::SymlinkLimitExceeded`]
/// if `/proc` cannot be resolved, and [`SboxError::Mount`] if the
/// process-information filesystem cannot be created or attached.
pub fn build_namespace(
    target: &NamespaceCell,
    root: InodeTree,
    hostname: &str,
    budget: &mut SymlinkBudget,
) -> Result<Arc<MountNamespace>> {
    if target.is_initialized() {
        return Err(SboxError::AlreadyInitialized {
            what: "root mount namespace",
        });
    }

    let ns = MountNamespace::new(root).map_err(|e| e.into_mount("creating mount namespace"))?;

    let options = MountOptions {
        hostname: Some(hostname.to_owned()),
        ..MountOptions::default()
    };
    let proc = filesystem(FS_PROC)?
        .mount_with("none", READ_ONLY, options)
        .map_err(|e| e.into_mount("creating process-info filesystem"))?;
    let mount_point = ns.resolve(PROC_MOUNT_POINT, budget)?;
    ns.mount(&mount_point, proc)
        .map_err(|e| e.into_mount("attaching process-info filesystem"))?;
    tracing::info!(path = %mount_point.path, "process-info filesystem mounted");

    target.set(ns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbox_common::constants::RESERVED_DIRS;

    #[test]
    fn empty_spec_still_has_reserved_dirs() {
        let root = build_root::<PathBuf, _>(&[], &RESERVED_DIRS).expect("root");
        assert_eq!(root.list().expect("list"), vec!["dev", "proc", "sys", "tmp"]);
    }

    #[test]
    fn missing_host_dir_is_a_mount_error() {
        let err = build_root(&["/definitely/not/here"], &RESERVED_DIRS).expect_err("missing");
        assert!(matches!(err, SboxError::Mount { .. }));
    }

    #[test]
    fn relative_reserved_dir_is_a_mount_error() {
        let err = build_root::<PathBuf, _>(&[], &["tmp"]).expect_err("relative");
        assert!(matches!(err, SboxError::Mount { .. }));
    }

    #[test]
    fn namespace_mounts_proc() {
        let cell = NamespaceCell::new();
        let root = build_root::<PathBuf, _>(&[], &RESERVED_DIRS).expect("root");
        let ns = build_namespace(&cell, root, "sbox", &mut SymlinkBudget::default())
            .expect("namespace");
        assert_eq!(ns.mount_points(), vec!["/proc"]);
        assert_eq!(
            ns.read_file("/proc/sys/kernel/hostname").expect("read"),
            b"sbox\n"
        );
    }

    #[test]
    fn building_twice_is_rejected() {
        let cell = NamespaceCell::new();
        let root = build_root::<PathBuf, _>(&[], &RESERVED_DIRS).expect("root");
        let first = build_namespace(&cell, root.clone(), "sbox", &mut SymlinkBudget::default())
            .expect("first");
        let err = build_namespace(&cell, root, "sbox", &mut SymlinkBudget::default())
            .expect_err("second");
        assert!(matches!(err, SboxError::AlreadyInitialized { .. }));
        assert!(Arc::ptr_eq(&first, &cell.get().expect("set")));
    }

    #[test]
    fn missing_proc_dir_is_not_found() {
        let cell = NamespaceCell::new();
        let root = build_root::<PathBuf, _>(&[], &["/tmp"]).expect("root");
        let err = build_namespace(&cell, root, "sbox", &mut SymlinkBudget::default())
            .expect_err("no /proc");
        assert!(matches!(err, SboxError::NotFound { .. }));
        assert!(!cell.is_initialized());
    }
}
