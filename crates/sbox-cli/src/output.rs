//! Formatted output helpers for CLI commands.

use std::fmt::Write as _;

use sbox_common::error::Result;
use sbox_core::filesystem::{EntryKind, InodeTree};
use sbox_core::namespace::{MountNamespace, SymlinkBudget};

/// Renders the tree under `path` as an indented listing.
///
/// Directories end in `/`, symlinks show their target, and mount points
/// are tagged. Symlinks are not descended into.
///
/// # Errors
///
/// Returns an error if `path` cannot be resolved or a directory cannot be
/// listed.
pub fn render_tree(ns: &MountNamespace, path: &str, depth: usize) -> Result<String> {
    let start = ns.resolve(path, &mut SymlinkBudget::default())?;
    let mut out = format!("{}\n", start.path);
    let mount_points = ns.mount_points();
    render_dir(ns, &start.path, &start.inode, depth, 1, &mount_points, &mut out)?;
    Ok(out)
}

fn render_dir(
    ns: &MountNamespace,
    dir_path: &str,
    dir: &InodeTree,
    max_depth: usize,
    level: usize,
    mount_points: &[String],
    out: &mut String,
) -> Result<()> {
    if level > max_depth || !dir.is_dir()? {
        return Ok(());
    }
    for name in dir.list()? {
        let child_path = if dir_path == "/" {
            format!("/{name}")
        } else {
            format!("{dir_path}/{name}")
        };
        let mounted = mount_points.contains(&child_path);
        let child = if mounted {
            ns.find_inode(&child_path, &mut SymlinkBudget::default())?
        } else {
            match dir.lookup(&name)? {
                Some(child) => child,
                None => continue,
            }
        };
        let indent = "  ".repeat(level);
        let tag = if mounted { "  [mount]" } else { "" };
        match child.kind()? {
            EntryKind::Directory => {
                let _ = writeln!(out, "{indent}{name}/{tag}");
                render_dir(ns, &child_path, &child, max_depth, level + 1, mount_points, out)?;
            }
            EntryKind::File => {
                let _ = writeln!(out, "{indent}{name}");
            }
            EntryKind::Symlink => {
                let _ = writeln!(out, "{indent}{name} -> {}", child.read_link()?);
            }
        }
    }
    Ok(())
}
