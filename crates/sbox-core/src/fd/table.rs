//! Per-sandbox descriptor tables.

use std::collections::BTreeMap;
use std::sync::Arc;

use sbox_common::error::{Result, SboxError};
use sbox_common::types::ResourceLimits;

use super::file::SandboxFile;

/// Per-descriptor flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FdFlags {
    /// Close this descriptor across `execve`.
    pub close_on_exec: bool,
}

/// One populated slot.
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// The file object. Several slots may share one.
    pub file: Arc<SandboxFile>,
    /// Slot flags.
    pub flags: FdFlags,
}

/// Maps sandbox descriptor numbers to file objects.
///
/// Each slot holds its own reference; a file shared by several slots is
/// released when the last of them goes away.
#[derive(Debug, Default)]
pub struct DescriptorTable {
    entries: BTreeMap<i32, Descriptor>,
}

impl DescriptorTable {
    /// An empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Installs `file` at descriptor number `fd`.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::Import`] if `fd` is negative, not below the
    /// open-files limit, or already in use.
    pub fn new_fd_at(
        &mut self,
        fd: i32,
        file: Arc<SandboxFile>,
        flags: FdFlags,
        limits: &ResourceLimits,
    ) -> Result<()> {
        let within_limit = u32::try_from(fd).is_ok_and(|n| n < limits.open_files);
        if !within_limit {
            return Err(SboxError::Import {
                fd,
                message: format!(
                    "descriptor outside the open-files limit of {}",
                    limits.open_files
                ),
            });
        }
        if self.entries.contains_key(&fd) {
            return Err(SboxError::Import {
                fd,
                message: "descriptor already in use".into(),
            });
        }
        let _ = self.entries.insert(fd, Descriptor { file, flags });
        Ok(())
    }

    /// The file at `fd`.
    #[must_use]
    pub fn get(&self, fd: i32) -> Option<&Arc<SandboxFile>> {
        self.entries.get(&fd).map(|d| &d.file)
    }

    /// The slot at `fd`, with its flags.
    #[must_use]
    pub fn descriptor(&self, fd: i32) -> Option<&Descriptor> {
        self.entries.get(&fd)
    }

    /// Removes and returns the file at `fd`.
    pub fn remove(&mut self, fd: i32) -> Option<Arc<SandboxFile>> {
        self.entries.remove(&fd).map(|d| d.file)
    }

    /// Populated descriptor numbers, ascending.
    #[must_use]
    pub fn fds(&self) -> Vec<i32> {
        self.entries.keys().copied().collect()
    }

    /// Number of populated slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no slot is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `a` and `b` refer to the same file object.
    #[must_use]
    pub fn shares_file(&self, a: i32, b: i32) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(x), Some(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }
}
