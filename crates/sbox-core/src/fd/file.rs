//! File objects imported from host descriptors.

use std::fs::File;
use std::io::IsTerminal as _;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd as _};
use std::sync::OnceLock;

use nix::fcntl::{FcntlArg, fcntl};
use sbox_common::error::{Result, SboxError};
use sbox_common::types::{FileOwner, ProcessGroupId};

/// An independent duplicate of a host descriptor.
#[derive(Debug)]
pub struct HostFile {
    file: File,
    host_fd: i32,
}

impl HostFile {
    /// Duplicates `host_fd` (close-on-exec) so the sandbox owns its own handle.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::Import`] if `host_fd` is not an open descriptor.
    #[allow(unsafe_code)]
    pub fn import(host_fd: i32) -> Result<Self> {
        if host_fd < 0 {
            return Err(SboxError::Import {
                fd: host_fd,
                message: "negative descriptor".into(),
            });
        }
        // SAFETY: host_fd is non-negative and only borrowed for the fcntl
        // call below, which fails with EBADF if it is not open.
        let borrowed = unsafe { BorrowedFd::borrow_raw(host_fd) };
        let dup = fcntl(borrowed, FcntlArg::F_DUPFD_CLOEXEC(0)).map_err(|e| SboxError::Import {
            fd: host_fd,
            message: e.to_string(),
        })?;
        // SAFETY: `dup` was just returned by fcntl and nothing else owns it.
        let file = unsafe { File::from_raw_fd(dup) };
        Ok(Self { file, host_fd })
    }

    /// Host descriptor this file was imported from.
    #[must_use]
    pub const fn host_fd(&self) -> i32 {
        self.host_fd
    }

    /// The sandbox's own duplicate descriptor.
    #[must_use]
    pub fn raw_fd(&self) -> i32 {
        self.file.as_raw_fd()
    }

    /// Underlying host file.
    #[must_use]
    pub const fn file(&self) -> &File {
        &self.file
    }
}

/// A host terminal shared by the sandbox's stdio slots.
#[derive(Debug)]
pub struct TerminalFile {
    host: HostFile,
    foreground: OnceLock<ProcessGroupId>,
}

impl TerminalFile {
    /// Wraps an imported host descriptor as a terminal.
    #[must_use]
    pub fn new(host: HostFile) -> Self {
        if !host.file().is_terminal() {
            tracing::warn!(
                host_fd = host.host_fd(),
                "importing non-terminal descriptor as a terminal"
            );
        }
        Self {
            host,
            foreground: OnceLock::new(),
        }
    }

    /// Host side of the terminal.
    #[must_use]
    pub const fn host(&self) -> &HostFile {
        &self.host
    }

    /// Records the initial foreground process group.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::AlreadyInitialized`] if a foreground group was
    /// already set.
    pub fn init_foreground_process_group(&self, pgid: ProcessGroupId) -> Result<()> {
        self.foreground
            .set(pgid)
            .map_err(|_| SboxError::AlreadyInitialized {
                what: "terminal foreground process group",
            })?;
        tracing::debug!(pgid = pgid.as_raw(), "terminal foreground process group set");
        Ok(())
    }

    /// Current foreground process group, if set.
    #[must_use]
    pub fn foreground_process_group(&self) -> Option<ProcessGroupId> {
        self.foreground.get().copied()
    }
}

/// What kind of object a sandbox file is.
#[derive(Debug)]
pub enum FileKind {
    /// A plain host file, pipe, or socket.
    Regular(HostFile),
    /// A controlling terminal.
    Terminal(TerminalFile),
}

/// A file object visible inside the sandbox.
#[derive(Debug)]
pub struct SandboxFile {
    owner: FileOwner,
    kind: FileKind,
}

impl SandboxFile {
    /// Imports `host_fd` as a regular file owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::Import`] if the descriptor is invalid.
    pub fn import_regular(host_fd: i32, owner: FileOwner) -> Result<Self> {
        Ok(Self {
            owner,
            kind: FileKind::Regular(HostFile::import(host_fd)?),
        })
    }

    /// Imports `host_fd` as a terminal owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::Import`] if the descriptor is invalid.
    pub fn import_terminal(host_fd: i32, owner: FileOwner) -> Result<Self> {
        Ok(Self {
            owner,
            kind: FileKind::Terminal(TerminalFile::new(HostFile::import(host_fd)?)),
        })
    }

    /// Identity that owns this file.
    #[must_use]
    pub const fn owner(&self) -> FileOwner {
        self.owner
    }

    /// The file's kind.
    #[must_use]
    pub const fn kind(&self) -> &FileKind {
        &self.kind
    }

    /// Host-side handle, whatever the kind.
    #[must_use]
    pub const fn host(&self) -> &HostFile {
        match &self.kind {
            FileKind::Regular(host) => host,
            FileKind::Terminal(tty) => tty.host(),
        }
    }

    /// The terminal state, if this file is a terminal.
    #[must_use]
    pub const fn as_terminal(&self) -> Option<&TerminalFile> {
        match &self.kind {
            FileKind::Terminal(tty) => Some(tty),
            FileKind::Regular(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read as _, Write as _};
    use std::os::fd::AsRawFd as _;

    use super::*;

    #[test]
    fn import_duplicates_descriptor() {
        let (read_end, write_end) = nix::unistd::pipe().expect("pipe");
        let file = HostFile::import(write_end.as_raw_fd()).expect("import");
        assert_ne!(file.raw_fd(), write_end.as_raw_fd());
        assert_eq!(file.host_fd(), write_end.as_raw_fd());
        drop(write_end);

        let mut writer = file.file();
        writer.write_all(b"still open").expect("write through duplicate");
        drop(file);

        let mut out = String::new();
        let _ = File::from(read_end).read_to_string(&mut out).expect("read");
        assert_eq!(out, "still open");
    }

    #[test]
    fn duplicate_is_close_on_exec() {
        use nix::fcntl::FdFlag;

        let (read_end, _write_end) = nix::unistd::pipe().expect("pipe");
        let file = HostFile::import(read_end.as_raw_fd()).expect("import");
        let flags = fcntl(file.file(), FcntlArg::F_GETFD).expect("F_GETFD");
        assert!(FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC));
        let host_flags = fcntl(&read_end, FcntlArg::F_GETFD).expect("F_GETFD");
        assert!(!FdFlag::from_bits_truncate(host_flags).contains(FdFlag::FD_CLOEXEC));
    }

    #[test]
    fn import_rejects_closed_descriptor() {
        let err = HostFile::import(987_654).expect_err("closed fd");
        assert!(matches!(err, SboxError::Import { fd: 987_654, .. }));
    }

    #[test]
    fn import_rejects_negative_descriptor() {
        assert!(HostFile::import(-1).is_err());
    }

    #[test]
    fn foreground_group_is_set_once() {
        let (read_end, _write_end) = nix::unistd::pipe().expect("pipe");
        let tty =
            SandboxFile::import_terminal(read_end.as_raw_fd(), FileOwner::ROOT).expect("import");
        let state = tty.as_terminal().expect("terminal");
        assert_eq!(state.foreground_process_group(), None);

        state
            .init_foreground_process_group(ProcessGroupId::new(7))
            .expect("first");
        assert!(matches!(
            state.init_foreground_process_group(ProcessGroupId::new(8)),
            Err(SboxError::AlreadyInitialized { .. })
        ));
        assert_eq!(state.foreground_process_group(), Some(ProcessGroupId::new(7)));
    }

    #[test]
    fn regular_file_is_not_a_terminal() {
        let (read_end, _write_end) = nix::unistd::pipe().expect("pipe");
        let file =
            SandboxFile::import_regular(read_end.as_raw_fd(), FileOwner::ROOT).expect("import");
        assert!(file.as_terminal().is_none());
        assert_eq!(file.owner(), FileOwner::ROOT);
    }
}
