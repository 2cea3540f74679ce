//! Path resolution inside a mount namespace.

use std::collections::VecDeque;

use sbox_common::constants::MAX_SYMLINK_TRAVERSALS;
use sbox_common::error::{Result, SboxError};

use super::MountNamespace;
use crate::filesystem::{EntryKind, InodeTree};

/// Number of symlinks one lookup may still follow.
///
/// Following a link consumes one unit. With a budget of `n`, a path that
/// crosses exactly `n` links resolves; one more link fails with
/// [`SboxError::SymlinkLimitExceeded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymlinkBudget {
    remaining: u32,
}

impl SymlinkBudget {
    /// A budget allowing `max` traversals.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { remaining: max }
    }

    /// Traversals left.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    pub(super) fn consume(&mut self, path: &str) -> Result<()> {
        if self.remaining == 0 {
            return Err(SboxError::SymlinkLimitExceeded { path: path.into() });
        }
        self.remaining -= 1;
        Ok(())
    }
}

impl Default for SymlinkBudget {
    fn default() -> Self {
        Self::new(MAX_SYMLINK_TRAVERSALS)
    }
}

/// A fully resolved location in a namespace.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Canonical absolute path, with symlinks and `..` removed.
    pub path: String,
    /// The entry at that path, after crossing any mount point.
    pub inode: InodeTree,
}

fn canonical(stack: &[(String, InodeTree)]) -> String {
    let mut path = String::from("/");
    path.push_str(
        &stack
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join("/"),
    );
    path
}

pub(super) fn join(base: &str, name: &str) -> String {
    if base == "/" {
        format!("/{name}")
    } else {
        format!("{base}/{name}")
    }
}

fn components(path: &str) -> impl DoubleEndedIterator<Item = String> + '_ {
    path.split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .map(str::to_owned)
}

/// Walks `path` from the namespace root.
///
/// Relative paths are taken relative to the root. Every symlink, including
/// one in the final component, costs one unit of `budget` and restarts
/// resolution at its target: from the root if the target is absolute,
/// otherwise from the directory containing the link. `..` never climbs
/// above the root.
pub(super) fn resolve(
    ns: &MountNamespace,
    path: &str,
    budget: &mut SymlinkBudget,
) -> Result<Resolved> {
    let mut stack: Vec<(String, InodeTree)> = Vec::new();
    let mut pending: VecDeque<String> = components(path).collect();

    while let Some(name) = pending.pop_front() {
        if name == ".." {
            let _ = stack.pop();
            continue;
        }

        let here = canonical(&stack);
        let dir = stack.last().map_or_else(|| ns.root(), |(_, inode)| inode.clone());
        if !dir.is_dir()? {
            return Err(SboxError::NotADirectory { path: here });
        }

        let child_path = join(&here, &name);
        let child = match ns.mounted_at(&child_path) {
            Some(mounted) => mounted,
            None => dir
                .lookup(&name)?
                .ok_or_else(|| SboxError::NotFound {
                    path: child_path.clone(),
                })?,
        };

        if child.kind()? == EntryKind::Symlink {
            budget.consume(path)?;
            let target = child.read_link()?;
            tracing::trace!(link = %child_path, target = %target, "following symlink");
            if target.starts_with('/') {
                stack.clear();
            }
            for component in components(&target).rev() {
                pending.push_front(component);
            }
            continue;
        }

        stack.push((name, child));
    }

    Ok(Resolved {
        path: canonical(&stack),
        inode: stack.pop().map_or_else(|| ns.root(), |(_, inode)| inode),
    })
}
