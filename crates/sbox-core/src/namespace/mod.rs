//! Mount namespaces.
//!
//! A [`MountNamespace`] is one root tree plus a table of additional mounts
//! attached after construction. The root never changes once the namespace
//! exists; [`NamespaceCell`] makes sure a sandbox gets exactly one.

pub mod assemble;
pub mod lookup;

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use sbox_common::error::{Result, SboxError};

use crate::filesystem::{EntryKind, InodeTree};

pub use assemble::{build_namespace, build_root};
pub use lookup::{Resolved, SymlinkBudget};

/// A root tree and the mounts layered onto it.
#[derive(Debug)]
pub struct MountNamespace {
    root: InodeTree,
    mounts: RwLock<BTreeMap<String, InodeTree>>,
}

impl MountNamespace {
    /// Creates a namespace rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::Mount`] if `root` is not a directory.
    pub fn new(root: InodeTree) -> Result<Self> {
        if !root.is_dir()? {
            return Err(SboxError::mount("namespace root must be a directory"));
        }
        Ok(Self {
            root,
            mounts: RwLock::new(BTreeMap::new()),
        })
    }

    /// Handle to the root tree.
    #[must_use]
    pub fn root(&self) -> InodeTree {
        self.root.clone()
    }

    /// Canonical paths that have something mounted on them, sorted.
    #[must_use]
    pub fn mount_points(&self) -> Vec<String> {
        self.mounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub(crate) fn mounted_at(&self, path: &str) -> Option<InodeTree> {
        self.mounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Resolves `path` to its canonical location, following symlinks
    /// against `budget`.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::NotFound`] if a component is missing and
    /// [`SboxError::SymlinkLimitExceeded`] if the budget runs out.
    pub fn resolve(&self, path: &str, budget: &mut SymlinkBudget) -> Result<Resolved> {
        lookup::resolve(self, path, budget)
    }

    /// Finds the entry at `path`, following symlinks against `budget`.
    ///
    /// # Errors
    ///
    /// See [`MountNamespace::resolve`].
    pub fn find_inode(&self, path: &str, budget: &mut SymlinkBudget) -> Result<InodeTree> {
        Ok(self.resolve(path, budget)?.inode)
    }

    /// Attaches `tree` at an already resolved directory.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::Mount`] if the target is the root, is not a
    /// directory, is already a mount point, or `tree` is not a directory.
    pub fn mount(&self, target: &Resolved, tree: InodeTree) -> Result<()> {
        if target.path == "/" {
            return Err(SboxError::mount("the namespace root cannot be remounted"));
        }
        if !target.inode.is_dir()? {
            return Err(SboxError::mount(format!(
                "mount point {} is not a directory",
                target.path
            )));
        }
        if !tree.is_dir()? {
            return Err(SboxError::mount(format!(
                "tree mounted at {} is not rooted at a directory",
                target.path
            )));
        }
        let mut mounts = self.mounts.write().unwrap_or_else(PoisonError::into_inner);
        if mounts.contains_key(&target.path) {
            return Err(SboxError::mount(format!(
                "{} is already a mount point",
                target.path
            )));
        }
        let _ = mounts.insert(target.path.clone(), tree);
        tracing::debug!(path = %target.path, "attached mount");
        Ok(())
    }

    /// Resolves `path` and attaches `tree` there.
    ///
    /// # Errors
    ///
    /// See [`MountNamespace::resolve`] and [`MountNamespace::mount`].
    pub fn mount_at(&self, path: &str, tree: InodeTree, budget: &mut SymlinkBudget) -> Result<()> {
        let target = self.resolve(path, budget)?;
        self.mount(&target, tree)
    }

    /// Reads the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not resolve to a regular file.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.find_inode(path, &mut SymlinkBudget::default())?.read()
    }

    /// Lists the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not resolve to a directory.
    pub fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        self.find_inode(path, &mut SymlinkBudget::default())?.list()
    }

    /// Creates or replaces the file at `path`. A symlink in the last
    /// component is followed, so writing through a link updates its target.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent does not resolve or is read-only, and
    /// [`SboxError::SymlinkLimitExceeded`] if links chain too deep.
    pub fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let (parent, name) = self.follow_last(path)?;
        parent.write_file(&name, data)
    }

    /// Appends to the file at `path`, creating it if needed. A symlink in
    /// the last component is followed.
    ///
    /// # Errors
    ///
    /// See [`MountNamespace::write_file`].
    pub fn append_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let (parent, name) = self.follow_last(path)?;
        parent.append_file(&name, data)
    }

    /// Creates an empty directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent does not resolve, is read-only, or
    /// the name already exists.
    pub fn create_dir(&self, path: &str) -> Result<InodeTree> {
        let (parent, name) = self.parent_of(path)?;
        parent.create_dir(name)
    }

    /// Creates a symlink at `path` pointing at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent does not resolve, is read-only, or
    /// the name already exists.
    pub fn symlink(&self, path: &str, target: &str) -> Result<()> {
        let (parent, name) = self.parent_of(path)?;
        parent.symlink(name, target)
    }

    fn parent_of<'p>(&self, path: &'p str) -> Result<(InodeTree, &'p str)> {
        let (dir, name) = split_last(path)?;
        let parent = self.find_inode(dir, &mut SymlinkBudget::default())?;
        Ok((parent, name))
    }

    /// Like `parent_of`, but chases a symlink named by the last component
    /// until it reaches an entry that is not a link, or a missing one.
    fn follow_last(&self, path: &str) -> Result<(InodeTree, String)> {
        let mut budget = SymlinkBudget::default();
        let mut current = path.to_owned();
        loop {
            let (dir, name) = split_last(&current)?;
            let parent = self.resolve(dir, &mut budget)?;
            let link = match parent.inode.lookup(name)? {
                Some(entry) if entry.kind()? == EntryKind::Symlink => entry.read_link()?,
                _ => return Ok((parent.inode, name.to_owned())),
            };
            budget.consume(path)?;
            current = if link.starts_with('/') {
                link
            } else {
                lookup::join(&parent.path, &link)
            };
        }
    }
}

fn split_last(path: &str) -> Result<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    let (dir, name) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
    if name.is_empty() || name == "." || name == ".." {
        return Err(SboxError::Config {
            message: format!("{path:?} does not name an entry"),
        });
    }
    Ok((if dir.is_empty() { "/" } else { dir }, name))
}

/// Holds the single mount namespace of a sandbox.
#[derive(Debug, Default)]
pub struct NamespaceCell(OnceLock<Arc<MountNamespace>>);

impl NamespaceCell {
    /// An empty cell.
    #[must_use]
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// The namespace, if one has been set.
    #[must_use]
    pub fn get(&self) -> Option<Arc<MountNamespace>> {
        self.0.get().cloned()
    }

    /// Whether a namespace has been set.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.0.get().is_some()
    }

    /// Stores `ns` as the namespace.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::AlreadyInitialized`] if a namespace was already set.
    pub fn set(&self, ns: MountNamespace) -> Result<Arc<MountNamespace>> {
        let ns = Arc::new(ns);
        self.0
            .set(Arc::clone(&ns))
            .map_err(|_| SboxError::AlreadyInitialized {
                what: "root mount namespace",
            })?;
        Ok(ns)
    }
}
