//! In-memory trees with no backing store.
//!
//! Backs synthetic subtrees (read-only mount-point skeletons), writable
//! temporary storage, and the process-information filesystem.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sbox_common::error::{Result, SboxError};

use super::inode::{EntryKind, Inode, InodeTree, is_a_directory, not_a_directory};

pub(crate) struct MemNode {
    writable: bool,
    data: MemData,
}

enum MemData {
    Dir(RwLock<BTreeMap<String, InodeTree>>),
    File(RwLock<Vec<u8>>),
    Symlink(String),
}

/// Creates an empty in-memory directory.
#[must_use]
pub fn new_dir(writable: bool) -> InodeTree {
    InodeTree::from_inode(Inode::Memory(MemNode {
        writable,
        data: MemData::Dir(RwLock::new(BTreeMap::new())),
    }))
}

/// Builds a directory tree containing exactly `paths` as empty directories.
///
/// Intermediate directories are created as needed. Every path must be
/// absolute.
///
/// # Errors
///
/// Returns [`SboxError::Mount`] if a path is relative.
pub fn make_directory_tree<S: AsRef<str>>(paths: &[S], writable: bool) -> Result<InodeTree> {
    let root = new_dir(writable);
    for path in paths {
        let path = path.as_ref();
        if !path.starts_with('/') {
            return Err(SboxError::mount(format!(
                "synthetic subtree path must be absolute: {path}"
            )));
        }
        let mut dir = root.clone();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            dir = match dir.lookup(component)? {
                Some(existing) => existing,
                None => {
                    let child = new_dir(writable);
                    mem(&dir)?.insert(component, child.clone())?;
                    child
                }
            };
        }
    }
    Ok(root)
}

pub(crate) fn new_file(writable: bool, data: Vec<u8>) -> InodeTree {
    InodeTree::from_inode(Inode::Memory(MemNode {
        writable,
        data: MemData::File(RwLock::new(data)),
    }))
}

pub(crate) fn new_symlink(writable: bool, target: &str) -> InodeTree {
    InodeTree::from_inode(Inode::Memory(MemNode {
        writable,
        data: MemData::Symlink(target.to_owned()),
    }))
}

pub(crate) fn mem(tree: &InodeTree) -> Result<&MemNode> {
    match &*tree.0 {
        Inode::Memory(m) => Ok(m),
        _ => Err(SboxError::Config {
            message: "expected an in-memory node".into(),
        }),
    }
}

fn read_guard<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_guard<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl MemNode {
    pub(crate) const fn kind(&self) -> EntryKind {
        match self.data {
            MemData::Dir(_) => EntryKind::Directory,
            MemData::File(_) => EntryKind::File,
            MemData::Symlink(_) => EntryKind::Symlink,
        }
    }

    fn entries(&self, name: &str) -> Result<&RwLock<BTreeMap<String, InodeTree>>> {
        match &self.data {
            MemData::Dir(entries) => Ok(entries),
            _ => Err(not_a_directory(name)),
        }
    }

    fn writable_entries(&self, name: &str) -> Result<&RwLock<BTreeMap<String, InodeTree>>> {
        if !self.writable {
            return Err(SboxError::ReadOnly { path: name.into() });
        }
        self.entries(name)
    }

    /// Adds a child regardless of writability. Used while building trees.
    pub(crate) fn insert(&self, name: &str, child: InodeTree) -> Result<()> {
        let mut entries = write_guard(self.entries(name)?);
        if entries.contains_key(name) {
            return Err(SboxError::Exists { path: name.into() });
        }
        let _ = entries.insert(name.to_owned(), child);
        Ok(())
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<Option<InodeTree>> {
        Ok(read_guard(self.entries(name)?).get(name).cloned())
    }

    pub(crate) fn list(&self) -> Result<Vec<String>> {
        Ok(read_guard(self.entries("directory")?).keys().cloned().collect())
    }

    pub(crate) fn read(&self) -> Result<Vec<u8>> {
        match &self.data {
            MemData::File(data) => Ok(read_guard(data).clone()),
            MemData::Dir(_) => Err(is_a_directory("directory")),
            MemData::Symlink(target) => Err(SboxError::Config {
                message: format!("cannot read symlink to {target} as a file"),
            }),
        }
    }

    pub(crate) fn read_link(&self) -> Result<String> {
        match &self.data {
            MemData::Symlink(target) => Ok(target.clone()),
            _ => Err(SboxError::Config {
                message: "not a symlink".into(),
            }),
        }
    }

    pub(crate) fn create_dir(&self, name: &str) -> Result<InodeTree> {
        let mut entries = write_guard(self.writable_entries(name)?);
        if entries.contains_key(name) {
            return Err(SboxError::Exists { path: name.into() });
        }
        let dir = new_dir(self.writable);
        let _ = entries.insert(name.to_owned(), dir.clone());
        Ok(dir)
    }

    pub(crate) fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        self.update_file(name, |contents| {
            contents.clear();
            contents.extend_from_slice(data);
        })
    }

    pub(crate) fn append_file(&self, name: &str, data: &[u8]) -> Result<()> {
        self.update_file(name, |contents| contents.extend_from_slice(data))
    }

    fn update_file(&self, name: &str, update: impl FnOnce(&mut Vec<u8>)) -> Result<()> {
        let mut entries = write_guard(self.writable_entries(name)?);
        if let Some(existing) = entries.get(name) {
            return match &mem(existing)?.data {
                MemData::File(contents) => {
                    update(&mut write_guard(contents));
                    Ok(())
                }
                MemData::Dir(_) => Err(is_a_directory(name)),
                MemData::Symlink(_) => Err(SboxError::Exists { path: name.into() }),
            };
        }
        let mut contents = Vec::new();
        update(&mut contents);
        let _ = entries.insert(name.to_owned(), new_file(self.writable, contents));
        Ok(())
    }

    pub(crate) fn symlink(&self, name: &str, target: &str) -> Result<()> {
        let mut entries = write_guard(self.writable_entries(name)?);
        if entries.contains_key(name) {
            return Err(SboxError::Exists { path: name.into() });
        }
        let _ = entries.insert(name.to_owned(), new_symlink(self.writable, target));
        Ok(())
    }
}
