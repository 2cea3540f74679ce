//! Domain primitive types used across the sbox workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity that owns files imported into the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileOwner {
    /// Owning user ID inside the sandbox.
    pub uid: u32,
    /// Owning group ID inside the sandbox.
    pub gid: u32,
}

impl FileOwner {
    /// The sandbox root user.
    pub const ROOT: Self = Self { uid: 0, gid: 0 };
}

/// Credentials of the initial sandboxed process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Real and effective user ID.
    pub uid: u32,
    /// Real and effective group ID.
    pub gid: u32,
    /// Supplementary group IDs.
    pub extra_gids: Vec<u32>,
}

impl Credentials {
    /// Root credentials in the sandbox's own user namespace.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            uid: 0,
            gid: 0,
            extra_gids: Vec::new(),
        }
    }

    /// The identity files created or imported by these credentials belong to.
    #[must_use]
    pub const fn file_owner(&self) -> FileOwner {
        FileOwner {
            uid: self.uid,
            gid: self.gid,
        }
    }
}

/// Process group identifier inside the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessGroupId(i32);

impl ProcessGroupId {
    /// Wraps a raw process group number.
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Returns the raw process group number.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resource limits applied to the initial process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of open descriptors; also bounds descriptor numbers.
    pub open_files: u32,
    /// Address-space limit in bytes.
    pub address_space_bytes: Option<u64>,
    /// CPU time limit in seconds.
    pub cpu_seconds: Option<u64>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            open_files: crate::constants::DEFAULT_OPEN_FILES,
            address_space_bytes: None,
            cpu_seconds: None,
        }
    }
}
