//! Filesystem kinds that can back a sandbox mount.
//!
//! The set of kinds is closed: host whitelist mounts, synthetic subtrees,
//! writable temporary storage, and the process-information filesystem.
//! [`FilesystemKind::lookup`] maps a type name to a kind and
//! [`FilesystemKind::mount`] (or [`FilesystemKind::mount_with`]) produces
//! the root of a new tree.

pub mod host;
pub mod inode;
pub mod memfs;
pub mod overlay;
pub mod procfs;

use std::collections::BTreeSet;
use std::path::PathBuf;

use sbox_common::constants::{FS_PROC, FS_RAMFS, FS_TMPFS, FS_WHITELIST};
use sbox_common::error::{Result, SboxError};

pub use inode::{EntryKind, InodeTree};
pub use overlay::compose;

/// Flags applied to a new mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountFlags {
    /// Refuse all writes through this mount.
    pub read_only: bool,
}

/// A filesystem type the sandbox knows how to mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilesystemKind {
    /// Host directory restricted to whitelisted paths.
    HostWhitelist,
    /// In-memory skeleton of empty mount points.
    SyntheticSubtree,
    /// Empty writable in-memory storage.
    WritableTemp,
    /// Process-information filesystem.
    ProcessInfo,
}

impl FilesystemKind {
    /// Every kind, in registration order.
    pub const ALL: [Self; 4] = [
        Self::HostWhitelist,
        Self::SyntheticSubtree,
        Self::WritableTemp,
        Self::ProcessInfo,
    ];

    /// Finds the kind registered under `name`.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Type name of this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HostWhitelist => FS_WHITELIST,
            Self::SyntheticSubtree => FS_RAMFS,
            Self::WritableTemp => FS_TMPFS,
            Self::ProcessInfo => FS_PROC,
        }
    }

    /// Whether mounts of this kind are backed by a host device.
    #[must_use]
    pub const fn requires_device(self) -> bool {
        matches!(self, Self::HostWhitelist)
    }

    /// Options this kind accepts.
    #[must_use]
    pub const fn accepted_options(self) -> &'static [&'static str] {
        match self {
            Self::HostWhitelist => &["root", "whitelist"],
            Self::SyntheticSubtree => &["paths"],
            Self::WritableTemp => &[],
            Self::ProcessInfo => &["hostname"],
        }
    }

    /// Mounts a new tree of this kind from a mount(2)-style option string.
    ///
    /// `data` is a comma-separated option string:
    /// - host whitelist: `root=<dir>` (required), `whitelist=<p1>:<p2>`
    /// - synthetic subtree: `paths=<p1>:<p2>`
    /// - process info: `hostname=<name>`
    ///
    /// `source` is a free-form label used only for logging.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::Mount`] if the options are invalid or the
    /// backing tree cannot be created.
    pub fn mount(self, source: &str, flags: MountFlags, data: &str) -> Result<InodeTree> {
        self.mount_with(source, flags, MountOptions::parse(data)?)
    }

    /// Mounts a new tree of this kind from already parsed options.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::Mount`] if an option does not apply to this
    /// kind, a required option is missing, or the backing tree cannot be
    /// created.
    pub fn mount_with(
        self,
        source: &str,
        flags: MountFlags,
        options: MountOptions,
    ) -> Result<InodeTree> {
        if let Some(key) = options
            .present()
            .into_iter()
            .find(|key| !self.accepted_options().contains(key))
        {
            return Err(SboxError::mount(format!(
                "unsupported option {key:?} for {}",
                self.name()
            )));
        }
        tracing::debug!(
            fs = self.name(),
            source,
            read_only = flags.read_only,
            "mounting filesystem"
        );

        let MountOptions {
            root,
            whitelist,
            paths,
            hostname,
        } = options;
        match self {
            Self::HostWhitelist => {
                let root = root
                    .ok_or_else(|| SboxError::mount("whitelistfs requires a root= option"))?;
                host::mount(&root, whitelist, flags)
            }
            Self::SyntheticSubtree => memfs::make_directory_tree(&paths, !flags.read_only),
            Self::WritableTemp => Ok(memfs::new_dir(!flags.read_only)),
            Self::ProcessInfo => procfs::mount(hostname.as_deref()),
        }
    }
}

/// Parsed mount options. Which fields apply depends on the
/// [`FilesystemKind`]; see [`FilesystemKind::accepted_options`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptions {
    /// Host directory backing a whitelist mount.
    pub root: Option<PathBuf>,
    /// Paths inside `root` that stay visible.
    pub whitelist: Option<Vec<PathBuf>>,
    /// Directories created in a synthetic subtree.
    pub paths: Vec<String>,
    /// Hostname reported by the process-information filesystem.
    pub hostname: Option<String>,
}

impl MountOptions {
    /// Parses a comma-separated `key=value` option string. List values are
    /// separated by `:`.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::Mount`] on a malformed, duplicate, or unknown
    /// option.
    pub fn parse(data: &str) -> Result<Self> {
        let mut options = Self::default();
        let mut seen = BTreeSet::new();
        for opt in data.split(',').filter(|o| !o.is_empty()) {
            let (key, value) = opt
                .split_once('=')
                .ok_or_else(|| SboxError::mount(format!("malformed mount option {opt:?}")))?;
            if !seen.insert(key) {
                return Err(SboxError::mount(format!("duplicate mount option {key:?}")));
            }
            match key {
                "root" => options.root = Some(PathBuf::from(value)),
                "whitelist" => {
                    options.whitelist = Some(split_list(value).map(PathBuf::from).collect());
                }
                "paths" => options.paths = split_list(value).map(str::to_owned).collect(),
                "hostname" => options.hostname = Some(value.to_owned()),
                _ => return Err(SboxError::mount(format!("unknown mount option {key:?}"))),
            }
        }
        Ok(options)
    }

    fn present(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.root.is_some() {
            keys.push("root");
        }
        if self.whitelist.is_some() {
            keys.push("whitelist");
        }
        if !self.paths.is_empty() {
            keys.push("paths");
        }
        if self.hostname.is_some() {
            keys.push("hostname");
        }
        keys
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(':').filter(|p| !p.is_empty())
}
