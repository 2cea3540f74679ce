//! End-to-end tests of root assembly and namespace construction against
//! real host directories.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sbox_common::constants::RESERVED_DIRS;
use sbox_common::error::SboxError;
use sbox_core::filesystem::{EntryKind, InodeTree, memfs};
use sbox_core::namespace::{
    MountNamespace, NamespaceCell, SymlinkBudget, build_namespace, build_root,
};

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(path, contents).expect("write");
}

fn read(ns_root: &InodeTree, path: &str) -> String {
    let ns = MountNamespace::new(ns_root.clone()).expect("namespace");
    String::from_utf8(ns.read_file(path).expect("read")).expect("utf8")
}

/// Recursively snapshots a host directory as (relative path, contents).
fn snapshot(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).expect("read_dir") {
            let path = entry.expect("entry").path();
            if path.is_dir() {
                out.push((path.strip_prefix(dir).expect("prefix").to_path_buf(), Vec::new()));
                stack.push(path);
            } else {
                let contents = std::fs::read(&path).expect("read");
                out.push((path.strip_prefix(dir).expect("prefix").to_path_buf(), contents));
            }
        }
    }
    out.sort();
    out
}

#[test]
fn last_listed_mount_wins() {
    let a = tempfile::tempdir().expect("tempdir");
    let b = tempfile::tempdir().expect("tempdir");
    write(a.path(), "x", "base");
    write(b.path(), "x", "override");

    let root = build_root(&[a.path(), b.path()], &RESERVED_DIRS).expect("root");
    assert_eq!(read(&root, "/x"), "override");
}

#[test]
fn last_of_many_mounts_wins_and_lower_paths_show_through() {
    let layers: Vec<_> = (0..4).map(|_| tempfile::tempdir().expect("tempdir")).collect();
    for (i, layer) in layers.iter().enumerate() {
        write(layer.path(), "etc/release", &format!("layer {i}"));
        write(layer.path(), &format!("only/{i}"), "unique");
    }
    let paths: Vec<&Path> = layers.iter().map(tempfile::TempDir::path).collect();

    let root = build_root(&paths, &RESERVED_DIRS).expect("root");
    assert_eq!(read(&root, "/etc/release"), "layer 3");
    for i in 0..4 {
        assert_eq!(read(&root, &format!("/only/{i}")), "unique");
    }
}

#[test]
fn empty_spec_has_every_reserved_dir() {
    let root = build_root::<PathBuf, _>(&[], &RESERVED_DIRS).expect("root");
    for dir in RESERVED_DIRS {
        let name = dir.trim_start_matches('/');
        let entry = root.lookup(name).expect("lookup").expect("reserved dir present");
        assert_eq!(entry.kind().expect("kind"), EntryKind::Directory);
        assert!(entry.list().expect("list").is_empty());
    }
}

#[test]
fn host_content_wins_over_reserved_dirs() {
    let host = tempfile::tempdir().expect("tempdir");
    write(host.path(), "dev/null-ish", "host device");

    let root = build_root(&[host.path()], &RESERVED_DIRS).expect("root");
    assert_eq!(read(&root, "/dev/null-ish"), "host device");
    assert!(root.lookup("sys").expect("lookup").is_some());
}

#[test]
fn relative_mounts_resolve_against_working_directory() {
    let cwd = std::env::current_dir().expect("cwd");
    let host = tempfile::tempdir_in(&cwd).expect("tempdir");
    write(host.path(), "hello", "relative");
    let rel = host.path().strip_prefix(&cwd).expect("under cwd");

    let root = build_root(&[rel], &RESERVED_DIRS).expect("root");
    assert_eq!(read(&root, "/hello"), "relative");
}

#[test]
fn sandbox_writes_never_reach_host() {
    let host = tempfile::tempdir().expect("tempdir");
    write(host.path(), "etc/config", "original");
    write(host.path(), "var/log/app.log", "line1\n");
    let before = snapshot(host.path());

    {
        let cell = NamespaceCell::new();
        let root = build_root(&[host.path()], &RESERVED_DIRS).expect("root");
        let ns = build_namespace(&cell, root, "sbox", &mut SymlinkBudget::default())
            .expect("namespace");

        ns.write_file("/etc/config", b"changed").expect("overwrite");
        ns.append_file("/var/log/app.log", b"line2\n").expect("append");
        ns.write_file("/tmp/scratch", b"tmp").expect("tmp write");
        let _ = ns.create_dir("/etc/new.d").expect("mkdir");
        ns.write_file("/etc/new.d/conf", b"new").expect("nested write");

        assert_eq!(ns.read_file("/etc/config").expect("read"), b"changed");
        assert_eq!(ns.read_file("/var/log/app.log").expect("read"), b"line1\nline2\n");
    }

    assert_eq!(snapshot(host.path()), before);

    let remounted = build_root(&[host.path()], &RESERVED_DIRS).expect("remount");
    assert_eq!(read(&remounted, "/etc/config"), "original");
    let tmp = remounted.lookup("tmp").expect("lookup").expect("tmp");
    assert!(tmp.list().expect("list").is_empty());
}

#[test]
fn proc_is_mounted_over_reserved_dir() {
    let cell = NamespaceCell::new();
    let root = build_root::<PathBuf, _>(&[], &RESERVED_DIRS).expect("root");
    let ns = build_namespace(&cell, root, "box", &mut SymlinkBudget::default())
        .expect("namespace");
    assert_eq!(ns.read_file("/proc/sys/kernel/hostname").expect("read"), b"box\n");
    assert!(ns.write_file("/proc/version", b"x").is_err());
}

/// Builds a host tree where `/proc` reaches a real directory through
/// exactly `links` symlinks: `/proc -> /l1 -> ... -> /real-proc`.
fn proc_behind_links(links: u32) -> tempfile::TempDir {
    let host = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(host.path().join("real-proc")).expect("mkdir");
    let hop = |i: u32| if i == 0 { "proc".to_owned() } else { format!("l{i}") };
    for i in 0..links {
        let target = if i + 1 == links {
            "/real-proc".to_owned()
        } else {
            format!("/{}", hop(i + 1))
        };
        std::os::unix::fs::symlink(target, host.path().join(hop(i))).expect("symlink");
    }
    host
}

#[test]
fn proc_resolution_within_budget_succeeds() {
    let host = proc_behind_links(5);
    let cell = NamespaceCell::new();
    let root = build_root(&[host.path()], &RESERVED_DIRS).expect("root");
    let mut budget = SymlinkBudget::new(5);
    let ns = build_namespace(&cell, root, "sbox", &mut budget).expect("exactly budget links");
    assert_eq!(budget.remaining(), 0);
    assert_eq!(ns.mount_points(), vec!["/real-proc"]);
}

#[test]
fn proc_resolution_over_budget_fails() {
    let host = proc_behind_links(6);
    let cell = NamespaceCell::new();
    let root = build_root(&[host.path()], &RESERVED_DIRS).expect("root");
    let err = build_namespace(&cell, root, "sbox", &mut SymlinkBudget::new(5))
        .expect_err("one link too many");
    assert!(matches!(err, SboxError::SymlinkLimitExceeded { .. }));
    assert!(!cell.is_initialized());
}

#[test]
fn cyclic_symlinks_exhaust_budget() {
    let host = tempfile::tempdir().expect("tempdir");
    std::os::unix::fs::symlink("/b", host.path().join("a")).expect("symlink");
    std::os::unix::fs::symlink("/a", host.path().join("b")).expect("symlink");

    let root = build_root(&[host.path()], &RESERVED_DIRS).expect("root");
    let ns = MountNamespace::new(root).expect("namespace");
    let err = ns
        .find_inode("/a", &mut SymlinkBudget::default())
        .expect_err("cycle");
    assert!(matches!(err, SboxError::SymlinkLimitExceeded { .. }));
}

#[test]
fn absolute_host_symlinks_stay_inside_sandbox() {
    let host = tempfile::tempdir().expect("tempdir");
    write(host.path(), "etc/hostname", "inside");
    std::os::unix::fs::symlink("/etc/hostname", host.path().join("name")).expect("symlink");

    let root = build_root(&[host.path()], &RESERVED_DIRS).expect("root");
    assert_eq!(read(&root, "/name"), "inside");
}

#[test]
fn assembled_root_is_the_only_handle_left() {
    let host = tempfile::tempdir().expect("tempdir");
    write(host.path(), "etc/hostname", "inside");
    let other = tempfile::tempdir().expect("tempdir");

    let root = build_root(&[host.path(), other.path()], &RESERVED_DIRS).expect("root");
    assert_eq!(InodeTree::ref_count(&root), 1);

    let cell = NamespaceCell::new();
    let ns = build_namespace(&cell, root.clone(), "sbox", &mut SymlinkBudget::default())
        .expect("namespace");
    assert!(InodeTree::ptr_eq(&ns.root(), &root));
    assert_eq!(InodeTree::ref_count(&root), 2);

    drop(ns);
    drop(cell);
    assert_eq!(InodeTree::ref_count(&root), 1);
}

#[test]
fn failed_namespace_build_releases_root() {
    let root = build_root::<PathBuf, _>(&[], &["/tmp"]).expect("root");
    let cell = NamespaceCell::new();
    let err = build_namespace(&cell, root.clone(), "sbox", &mut SymlinkBudget::default())
        .expect_err("no /proc");
    assert!(matches!(err, SboxError::NotFound { .. }));
    assert_eq!(InodeTree::ref_count(&root), 1);
}

#[test]
fn mounted_tree_is_shared_not_copied() {
    let cell = NamespaceCell::new();
    let root = build_root::<PathBuf, _>(&[], &RESERVED_DIRS).expect("root");
    let ns = build_namespace(&cell, root, "sbox", &mut SymlinkBudget::default())
        .expect("namespace");

    let scratch = memfs::new_dir(true);
    ns.mount_at("/tmp", scratch.clone(), &mut SymlinkBudget::default())
        .expect("mount");
    let found = ns
        .find_inode("/tmp", &mut SymlinkBudget::default())
        .expect("find");
    assert!(InodeTree::ptr_eq(&found, &scratch));
    assert_eq!(InodeTree::ref_count(&scratch), 3);

    ns.write_file("/tmp/note", b"hi").expect("write");
    let note = scratch.lookup("note").expect("lookup").expect("note");
    assert_eq!(note.read().expect("read"), b"hi");
}
