//! Shared inode tree handles.
//!
//! An [`InodeTree`] is a reference-counted handle to one node of a rooted
//! tree. Cloning a handle takes a reference; the node is torn down when the
//! last handle is dropped. Composition never mutates its inputs: an overlay
//! holds handles to the trees it was built from.

use std::fmt;
use std::sync::Arc;

use sbox_common::error::{Result, SboxError};

use super::host::HostNode;
use super::memfs::MemNode;
use super::overlay::OverlayNode;

/// Type of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory, possibly a mount point.
    Directory,
    /// A regular file.
    File,
    /// A symbolic link.
    Symlink,
}

pub(crate) enum Inode {
    Memory(MemNode),
    Host(HostNode),
    Overlay(OverlayNode),
}

/// Reference-counted handle to a node in an inode tree.
#[derive(Clone)]
pub struct InodeTree(pub(crate) Arc<Inode>);

impl InodeTree {
    pub(crate) fn from_inode(inode: Inode) -> Self {
        Self(Arc::new(inode))
    }

    /// Returns `true` if both handles refer to the same node.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Number of live handles to this node.
    #[must_use]
    pub fn ref_count(this: &Self) -> usize {
        Arc::strong_count(&this.0)
    }

    /// Type of this entry.
    ///
    /// # Errors
    ///
    /// Returns an error if a host-backed entry cannot be inspected.
    pub fn kind(&self) -> Result<EntryKind> {
        match &*self.0 {
            Inode::Memory(m) => Ok(m.kind()),
            Inode::Host(h) => h.kind(),
            Inode::Overlay(o) => o.kind(),
        }
    }

    /// Returns `true` if this entry is a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if a host-backed entry cannot be inspected.
    pub fn is_dir(&self) -> Result<bool> {
        Ok(self.kind()? == EntryKind::Directory)
    }

    /// Looks up a single child by name. `Ok(None)` means the name is absent.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::NotADirectory`] if this entry is not a directory.
    pub fn lookup(&self, name: &str) -> Result<Option<Self>> {
        check_name(name)?;
        match &*self.0 {
            Inode::Memory(m) => m.lookup(name),
            Inode::Host(h) => h.lookup(name),
            Inode::Overlay(o) => o.lookup(self, name),
        }
    }

    /// Sorted names of the children of this directory.
    ///
    /// # Errors
    ///
    /// Returns an error if this entry is not a directory or cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        match &*self.0 {
            Inode::Memory(m) => m.list(),
            Inode::Host(h) => h.list(),
            Inode::Overlay(o) => o.list(),
        }
    }

    /// Contents of this file.
    ///
    /// # Errors
    ///
    /// Returns an error if this entry is not a regular file.
    pub fn read(&self) -> Result<Vec<u8>> {
        match &*self.0 {
            Inode::Memory(m) => m.read(),
            Inode::Host(h) => h.read(),
            Inode::Overlay(_) => Err(is_a_directory("overlay root")),
        }
    }

    /// Target of this symlink.
    ///
    /// # Errors
    ///
    /// Returns an error if this entry is not a symlink.
    pub fn read_link(&self) -> Result<String> {
        match &*self.0 {
            Inode::Memory(m) => m.read_link(),
            Inode::Host(h) => h.read_link(),
            Inode::Overlay(_) => Err(SboxError::Config {
                message: "overlay directory is not a symlink".into(),
            }),
        }
    }

    /// Creates an empty child directory and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::Exists`] if the name is taken and
    /// [`SboxError::ReadOnly`] if this tree cannot be written.
    pub fn create_dir(&self, name: &str) -> Result<Self> {
        check_name(name)?;
        match &*self.0 {
            Inode::Memory(m) => m.create_dir(name),
            Inode::Host(h) => h.create_dir(name),
            Inode::Overlay(o) => o.create_dir(self, name),
        }
    }

    /// Creates or replaces a child file with `data`.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::ReadOnly`] if this tree cannot be written.
    pub fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        check_name(name)?;
        match &*self.0 {
            Inode::Memory(m) => m.write_file(name, data),
            Inode::Host(h) => h.write_file(name, data),
            Inode::Overlay(o) => o.write_file(name, data),
        }
    }

    /// Appends `data` to a child file, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::ReadOnly`] if this tree cannot be written.
    pub fn append_file(&self, name: &str, data: &[u8]) -> Result<()> {
        check_name(name)?;
        match &*self.0 {
            Inode::Memory(m) => m.append_file(name, data),
            Inode::Host(h) => h.append_file(name, data),
            Inode::Overlay(o) => o.append_file(name, data),
        }
    }

    /// Creates a child symlink pointing at `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::Exists`] if the name is taken and
    /// [`SboxError::ReadOnly`] if this tree cannot be written.
    pub fn symlink(&self, name: &str, target: &str) -> Result<()> {
        check_name(name)?;
        match &*self.0 {
            Inode::Memory(m) => m.symlink(name, target),
            Inode::Host(h) => h.symlink(name, target),
            Inode::Overlay(o) => o.symlink(self, name, target),
        }
    }
}

impl fmt::Debug for InodeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &*self.0 {
            Inode::Memory(_) => "memory",
            Inode::Host(h) => return write!(f, "InodeTree(host:{})", h.path().display()),
            Inode::Overlay(_) => "overlay",
        };
        write!(f, "InodeTree({source})")
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(SboxError::Config {
            message: format!("invalid entry name {name:?}"),
        });
    }
    Ok(())
}

pub(crate) fn is_a_directory(path: &str) -> SboxError {
    SboxError::Io {
        path: path.into(),
        source: std::io::Error::from(std::io::ErrorKind::IsADirectory),
    }
}

pub(crate) fn not_a_directory(path: &str) -> SboxError {
    SboxError::NotADirectory { path: path.into() }
}
