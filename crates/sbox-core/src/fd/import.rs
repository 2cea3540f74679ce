//! Import of host stdio into a new descriptor table.

use std::sync::Arc;

use sbox_common::constants::STDIO_FDS;
use sbox_common::error::Result;
use sbox_common::types::{FileOwner, ResourceLimits};

use super::file::SandboxFile;
use super::table::{DescriptorTable, FdFlags};

/// Builds a descriptor table whose slots 0, 1, and 2 hold `host_fds`.
///
/// With `terminal` set, only `host_fds[0]` is imported, as a terminal, and
/// all three slots reference that one object so terminal state such as the
/// foreground process group stays consistent whichever slot changes it.
/// Otherwise each host descriptor is imported on its own.
///
/// # Errors
///
/// Returns [`sbox_common::error::SboxError::Import`] if any host descriptor
/// cannot be imported or installed. No partial table is returned.
pub fn import_stdio(
    host_fds: [i32; 3],
    owner: FileOwner,
    terminal: bool,
    limits: &ResourceLimits,
) -> Result<DescriptorTable> {
    let mut table = DescriptorTable::new();
    let mut tty: Option<Arc<SandboxFile>> = None;

    for (slot, host_fd) in STDIO_FDS.into_iter().zip(host_fds) {
        let file = if terminal {
            match &tty {
                Some(shared) => Arc::clone(shared),
                None => {
                    let file = Arc::new(SandboxFile::import_terminal(host_fd, owner)?);
                    tty = Some(Arc::clone(&file));
                    file
                }
            }
        } else {
            Arc::new(SandboxFile::import_regular(host_fd, owner)?)
        };
        table.new_fd_at(slot, file, FdFlags::default(), limits)?;
        tracing::debug!(slot, host_fd, terminal, "imported stdio descriptor");
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use std::os::fd::{AsRawFd as _, OwnedFd};

    use sbox_common::error::SboxError;
    use sbox_common::types::ProcessGroupId;

    use super::*;

    fn pipes() -> Vec<(OwnedFd, OwnedFd)> {
        (0..3).map(|_| nix::unistd::pipe().expect("pipe")).collect()
    }

    #[test]
    fn non_terminal_slots_are_distinct() {
        let pipes = pipes();
        let fds = [
            pipes[0].0.as_raw_fd(),
            pipes[1].1.as_raw_fd(),
            pipes[2].1.as_raw_fd(),
        ];
        let table = import_stdio(fds, FileOwner::ROOT, false, &ResourceLimits::default())
            .expect("import");

        assert_eq!(table.fds(), vec![0, 1, 2]);
        assert!(!table.shares_file(0, 1));
        assert!(!table.shares_file(1, 2));
        assert!(!table.shares_file(0, 2));
        for fd in 0..3 {
            assert!(table.get(fd).expect("slot").as_terminal().is_none());
        }
    }

    #[test]
    fn non_terminal_import_keeps_host_mapping() {
        let pipes = pipes();
        let fds = [
            pipes[0].0.as_raw_fd(),
            pipes[1].1.as_raw_fd(),
            pipes[2].1.as_raw_fd(),
        ];
        let table = import_stdio(fds, FileOwner::ROOT, false, &ResourceLimits::default())
            .expect("import");
        for (slot, host_fd) in fds.into_iter().enumerate() {
            let slot = i32::try_from(slot).expect("slot");
            assert_eq!(table.get(slot).expect("slot").host().host_fd(), host_fd);
        }
    }

    #[test]
    fn terminal_slots_alias_one_object() {
        let pipes = pipes();
        let fd = pipes[0].0.as_raw_fd();
        let table = import_stdio([fd, fd, fd], FileOwner::ROOT, true, &ResourceLimits::default())
            .expect("import");

        assert!(table.shares_file(0, 1));
        assert!(table.shares_file(1, 2));
        assert_eq!(Arc::strong_count(table.get(0).expect("slot")), 3);
    }

    #[test]
    fn terminal_state_is_shared_between_slots() {
        let pipes = pipes();
        let fd = pipes[0].0.as_raw_fd();
        let table = import_stdio([fd, fd, fd], FileOwner::ROOT, true, &ResourceLimits::default())
            .expect("import");

        table
            .get(1)
            .and_then(|f| f.as_terminal())
            .expect("terminal")
            .init_foreground_process_group(ProcessGroupId::new(42))
            .expect("set");

        let seen = table
            .get(2)
            .and_then(|f| f.as_terminal())
            .expect("terminal")
            .foreground_process_group();
        assert_eq!(seen, Some(ProcessGroupId::new(42)));
    }

    #[test]
    fn terminal_mode_only_imports_first_descriptor() {
        let pipes = pipes();
        let fd = pipes[0].0.as_raw_fd();
        let limits = ResourceLimits::default();
        let table = import_stdio([fd, 987_654, 987_655], FileOwner::ROOT, true, &limits)
            .expect("slots 1 and 2 reuse slot 0");
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn invalid_descriptor_aborts_import() {
        let pipes = pipes();
        let fds = [pipes[0].0.as_raw_fd(), 987_654, pipes[2].1.as_raw_fd()];
        let err = import_stdio(fds, FileOwner::ROOT, false, &ResourceLimits::default())
            .expect_err("bad fd");
        assert!(matches!(err, SboxError::Import { fd: 987_654, .. }));
    }

    #[test]
    fn imported_files_carry_owner() {
        let pipes = pipes();
        let fds = [
            pipes[0].0.as_raw_fd(),
            pipes[1].1.as_raw_fd(),
            pipes[2].1.as_raw_fd(),
        ];
        let owner = FileOwner { uid: 1000, gid: 100 };
        let table = import_stdio(fds, owner, false, &ResourceLimits::default()).expect("import");
        assert_eq!(table.get(2).expect("slot").owner(), owner);
    }
}
