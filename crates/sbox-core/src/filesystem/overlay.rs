//! Overlay composition of two inode trees.
//!
//! Entries of the upper tree shadow entries of the lower tree at the same
//! path. Directories present in both are merged recursively. Writes always
//! land in the upper tree: a directory that only exists below is copied up
//! (created empty in the upper tree) the first time something is written
//! into it, and a lower file is copied up before it is appended to.

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

use sbox_common::error::{Result, SboxError};

use super::inode::{EntryKind, Inode, InodeTree, is_a_directory};

pub(crate) struct OverlayNode {
    upper: RwLock<Option<InodeTree>>,
    lower: Option<InodeTree>,
    parent: Option<(InodeTree, String)>,
}

/// Layers `upper` over `lower`, returning a new tree. Neither input is
/// modified; the result holds a reference to each.
///
/// # Errors
///
/// Returns [`SboxError::Mount`] if either root is not a directory.
pub fn compose(upper: &InodeTree, lower: &InodeTree) -> Result<InodeTree> {
    if !upper.is_dir()? || !lower.is_dir()? {
        return Err(SboxError::mount(
            "overlay layers must both be rooted at a directory",
        ));
    }
    Ok(InodeTree::from_inode(Inode::Overlay(OverlayNode {
        upper: RwLock::new(Some(upper.clone())),
        lower: Some(lower.clone()),
        parent: None,
    })))
}

fn overlay_of(tree: &InodeTree) -> Result<&OverlayNode> {
    match &*tree.0 {
        Inode::Overlay(o) => Ok(o),
        _ => Err(SboxError::mount("expected an overlay node")),
    }
}

impl OverlayNode {
    fn upper(&self) -> Option<InodeTree> {
        self.upper
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn child(
        this: &InodeTree,
        name: &str,
        upper: Option<InodeTree>,
        lower: Option<InodeTree>,
    ) -> InodeTree {
        InodeTree::from_inode(Inode::Overlay(Self {
            upper: RwLock::new(upper),
            lower,
            parent: Some((this.clone(), name.to_owned())),
        }))
    }

    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    pub(crate) const fn kind(&self) -> Result<EntryKind> {
        Ok(EntryKind::Directory)
    }

    pub(crate) fn lookup(&self, this: &InodeTree, name: &str) -> Result<Option<InodeTree>> {
        let upper = match self.upper() {
            Some(u) => u.lookup(name)?,
            None => None,
        };
        let lower = match &self.lower {
            Some(l) => l.lookup(name)?,
            None => None,
        };
        Ok(match (upper, lower) {
            (None, None) => None,
            (Some(u), Some(l)) if u.is_dir()? && l.is_dir()? => {
                Some(Self::child(this, name, Some(u), Some(l)))
            }
            (Some(u), _) => Some(u),
            (None, Some(l)) if l.is_dir()? => Some(Self::child(this, name, None, Some(l))),
            (None, Some(l)) => Some(l),
        })
    }

    pub(crate) fn list(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        if let Some(upper) = self.upper() {
            names.extend(upper.list()?);
        }
        if let Some(lower) = &self.lower {
            names.extend(lower.list()?);
        }
        Ok(names.into_iter().collect())
    }

    /// Returns the upper directory for this node, creating it (and any
    /// missing ancestors) in the upper tree if needed.
    fn copy_up(&self) -> Result<InodeTree> {
        let mut slot = self.upper.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(upper) = &*slot {
            return Ok(upper.clone());
        }
        let Some((parent, name)) = &self.parent else {
            return Err(SboxError::mount("overlay root has no upper layer"));
        };
        let parent_upper = overlay_of(parent)?.copy_up()?;
        let dir = match parent_upper.lookup(name)? {
            Some(existing) if existing.is_dir()? => existing,
            Some(_) => return Err(SboxError::NotADirectory { path: name.clone() }),
            None => parent_upper.create_dir(name)?,
        };
        tracing::debug!(dir = %name, "copied up overlay directory");
        *slot = Some(dir.clone());
        Ok(dir)
    }

    fn lower_entry(&self, name: &str) -> Result<Option<InodeTree>> {
        match &self.lower {
            Some(lower) => lower.lookup(name),
            None => Ok(None),
        }
    }

    pub(crate) fn create_dir(&self, this: &InodeTree, name: &str) -> Result<InodeTree> {
        if self.lookup(this, name)?.is_some() {
            return Err(SboxError::Exists { path: name.into() });
        }
        let _ = self.copy_up()?.create_dir(name)?;
        self.lookup(this, name)?
            .ok_or_else(|| SboxError::NotFound { path: name.into() })
    }

    pub(crate) fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let upper = self.copy_up()?;
        if upper.lookup(name)?.is_none() {
            if let Some(lower) = self.lower_entry(name)? {
                if lower.is_dir()? {
                    return Err(is_a_directory(name));
                }
            }
        }
        upper.write_file(name, data)
    }

    pub(crate) fn append_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let upper = self.copy_up()?;
        if upper.lookup(name)?.is_none() {
            if let Some(lower) = self.lower_entry(name)? {
                match lower.kind()? {
                    EntryKind::Directory => return Err(is_a_directory(name)),
                    EntryKind::Symlink => return Err(SboxError::Exists { path: name.into() }),
                    EntryKind::File => {
                        upper.write_file(name, &lower.read()?)?;
                        tracing::debug!(file = %name, "copied up overlay file");
                    }
                }
            }
        }
        upper.append_file(name, data)
    }

    pub(crate) fn symlink(&self, this: &InodeTree, name: &str, target: &str) -> Result<()> {
        if self.lookup(this, name)?.is_some() {
            return Err(SboxError::Exists { path: name.into() });
        }
        self.copy_up()?.symlink(name, target)
    }
}
