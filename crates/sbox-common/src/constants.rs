//! System-wide constants.

/// Directories that always exist as mount points in the sandbox root,
/// whether or not any host mount provides them.
pub const RESERVED_DIRS: [&str; 4] = ["/dev", "/sys", "/proc", "/tmp"];

/// Mount point of the process-information filesystem.
pub const PROC_MOUNT_POINT: &str = "/proc";

/// Upper bound on symlinks followed during a single path lookup.
pub const MAX_SYMLINK_TRAVERSALS: u32 = 40;

/// Default working directory of the initial sandboxed process.
pub const DEFAULT_WORKING_DIR: &str = "/";

/// Hostname reported inside the sandbox.
pub const DEFAULT_HOSTNAME: &str = "sbox";

/// Identifier attached to the initial process.
pub const CONTAINER_ID: &str = "sbox";

/// File mode creation mask of the initial process.
pub const DEFAULT_UMASK: u32 = 0o022;

/// Default soft limit on open descriptors per sandbox.
pub const DEFAULT_OPEN_FILES: u32 = 1024;

/// Sandbox descriptor numbers of stdin, stdout, and stderr.
pub const STDIO_FDS: [i32; 3] = [0, 1, 2];

/// Filesystem type name of host whitelist mounts.
pub const FS_WHITELIST: &str = "whitelistfs";

/// Filesystem type name of synthetic in-memory subtrees.
pub const FS_RAMFS: &str = "ramfs";

/// Filesystem type name of writable temporary storage.
pub const FS_TMPFS: &str = "tmpfs";

/// Filesystem type name of the process-information filesystem.
pub const FS_PROC: &str = "proc";
