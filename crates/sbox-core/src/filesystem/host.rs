//! Host whitelist mounts.
//!
//! Exposes a host directory as an inode tree. An optional whitelist limits
//! which paths under the mount root are visible: a path is visible if it
//! is whitelisted, lies under a whitelisted path, or is an ancestor of one.
//! Symlinks are surfaced as-is and resolved inside the sandbox namespace,
//! never against the host root.

use std::io::Write as _;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use sbox_common::error::{Result, SboxError};

use super::MountFlags;
use super::inode::{EntryKind, Inode, InodeTree, is_a_directory};

#[derive(Debug)]
struct HostPolicy {
    root: PathBuf,
    whitelist: Option<Vec<PathBuf>>,
    read_only: bool,
}

impl HostPolicy {
    fn permits(&self, rel: &Path) -> bool {
        self.whitelist.as_ref().is_none_or(|allowed| {
            allowed
                .iter()
                .any(|w| rel.starts_with(w) || w.starts_with(rel))
        })
    }
}

pub(crate) struct HostNode {
    policy: Arc<HostPolicy>,
    rel: PathBuf,
}

/// Mounts the host directory `root` as a tree.
///
/// `whitelist` entries are paths inside the mount, written either absolute
/// (`/usr/lib`) or relative (`usr/lib`) to `root`.
///
/// # Errors
///
/// Returns [`SboxError::Mount`] if `root` is relative, missing, or not a
/// directory, or if a whitelist entry escapes the mount with `..`.
pub fn mount(root: &Path, whitelist: Option<Vec<PathBuf>>, flags: MountFlags) -> Result<InodeTree> {
    if !root.is_absolute() {
        return Err(SboxError::mount(format!(
            "host mount root must be absolute: {}",
            root.display()
        )));
    }
    let meta = std::fs::metadata(root)
        .map_err(|e| SboxError::mount(format!("host mount root {}: {e}", root.display())))?;
    if !meta.is_dir() {
        return Err(SboxError::mount(format!(
            "host mount root is not a directory: {}",
            root.display()
        )));
    }

    let whitelist = whitelist
        .map(|entries| {
            entries
                .iter()
                .map(|p| normalize_whitelist(p))
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?;

    tracing::debug!(
        root = %root.display(),
        read_only = flags.read_only,
        whitelisted = whitelist.as_ref().map(Vec::len),
        "mounting host directory"
    );
    let policy = Arc::new(HostPolicy {
        root: root.to_path_buf(),
        whitelist,
        read_only: flags.read_only,
    });
    Ok(InodeTree::from_inode(Inode::Host(HostNode {
        policy,
        rel: PathBuf::new(),
    })))
}

fn normalize_whitelist(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(SboxError::mount(format!(
                    "whitelist entry escapes mount: {}",
                    path.display()
                )));
            }
        }
    }
    Ok(out)
}

fn io_err(path: &Path, source: std::io::Error) -> SboxError {
    SboxError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl HostNode {
    pub(crate) fn path(&self) -> PathBuf {
        self.policy.root.join(&self.rel)
    }

    fn child(&self, name: &str) -> Self {
        Self {
            policy: Arc::clone(&self.policy),
            rel: self.rel.join(name),
        }
    }

    fn ensure_writable(&self, name: &str) -> Result<PathBuf> {
        if self.policy.read_only {
            return Err(SboxError::ReadOnly {
                path: self.path().join(name).display().to_string(),
            });
        }
        if self.kind()? != EntryKind::Directory {
            return Err(SboxError::NotADirectory {
                path: self.path().display().to_string(),
            });
        }
        Ok(self.path().join(name))
    }

    pub(crate) fn kind(&self) -> Result<EntryKind> {
        let path = self.path();
        let ft = std::fs::symlink_metadata(&path)
            .map_err(|e| io_err(&path, e))?
            .file_type();
        Ok(if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        })
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<Option<InodeTree>> {
        if self.kind()? != EntryKind::Directory {
            return Err(SboxError::NotADirectory {
                path: self.path().display().to_string(),
            });
        }
        let child = self.child(name);
        if !self.policy.permits(&child.rel) {
            return Ok(None);
        }
        let path = child.path();
        match std::fs::symlink_metadata(&path) {
            Ok(_) => Ok(Some(InodeTree::from_inode(Inode::Host(child)))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    pub(crate) fn list(&self) -> Result<Vec<String>> {
        let path = self.path();
        let entries = std::fs::read_dir(&path).map_err(|e| io_err(&path, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&path, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.policy.permits(&self.rel.join(&name)) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub(crate) fn read(&self) -> Result<Vec<u8>> {
        let path = self.path();
        if self.kind()? == EntryKind::Directory {
            return Err(is_a_directory(&path.display().to_string()));
        }
        std::fs::read(&path).map_err(|e| io_err(&path, e))
    }

    pub(crate) fn read_link(&self) -> Result<String> {
        let path = self.path();
        let target = std::fs::read_link(&path).map_err(|e| io_err(&path, e))?;
        Ok(target.to_string_lossy().into_owned())
    }

    pub(crate) fn create_dir(&self, name: &str) -> Result<InodeTree> {
        let path = self.ensure_writable(name)?;
        std::fs::create_dir(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                SboxError::Exists {
                    path: path.display().to_string(),
                }
            } else {
                io_err(&path, e)
            }
        })?;
        Ok(InodeTree::from_inode(Inode::Host(self.child(name))))
    }

    pub(crate) fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.ensure_writable(name)?;
        std::fs::write(&path, data).map_err(|e| io_err(&path, e))
    }

    pub(crate) fn append_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.ensure_writable(name)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;
        file.write_all(data).map_err(|e| io_err(&path, e))
    }

    pub(crate) fn symlink(&self, name: &str, target: &str) -> Result<()> {
        let path = self.ensure_writable(name)?;
        std::os::unix::fs::symlink(target, &path).map_err(|e| io_err(&path, e))
    }
}
