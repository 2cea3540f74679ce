//! Process-information filesystem.
//!
//! A read-only in-memory tree describing the sandbox to the programs
//! inside it.

use sbox_common::constants::DEFAULT_HOSTNAME;
use sbox_common::error::{Result, SboxError};

use super::FilesystemKind;
use super::inode::InodeTree;
use super::memfs::{self, mem};

/// Kernel version string reported by `/proc/version`.
pub const VERSION: &str = "Linux version 4.4.0 #1 SMP Sun Jan 10 15:06:54 PST 2016";

/// Builds the process-information tree.
///
/// # Errors
///
/// Returns an error if the tree cannot be assembled.
pub fn mount(hostname: Option<&str>) -> Result<InodeTree> {
    let root = memfs::new_dir(false);
    let node = mem(&root)?;

    let filesystems: String = FilesystemKind::ALL
        .iter()
        .map(|kind| {
            let prefix = if kind.requires_device() { "" } else { "nodev" };
            format!("{prefix}\t{}\n", kind.name())
        })
        .collect();
    node.insert("filesystems", memfs::new_file(false, filesystems.into_bytes()))?;
    node.insert("version", memfs::new_file(false, format!("{VERSION}\n").into_bytes()))?;
    node.insert("self", memfs::new_symlink(false, "1"))?;
    node.insert("1", memfs::new_dir(false))?;

    let kernel = memfs::make_directory_tree(&["/kernel"], false)?;
    let kernel_dir = mem(&kernel)?
        .lookup("kernel")?
        .ok_or_else(|| SboxError::mount("proc kernel dir missing"))?;
    let kernel_node = mem(&kernel_dir)?;
    let hostname = hostname.unwrap_or(DEFAULT_HOSTNAME);
    kernel_node.insert(
        "hostname",
        memfs::new_file(false, format!("{hostname}\n").into_bytes()),
    )?;
    kernel_node.insert("ostype", memfs::new_file(false, b"Linux\n".to_vec()))?;
    node.insert("sys", kernel)?;

    tracing::debug!(hostname, "process-info filesystem built");
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::EntryKind;

    fn read(tree: &InodeTree, path: &[&str]) -> String {
        let mut node = tree.clone();
        for name in path {
            node = node.lookup(name).expect("lookup").expect("present");
        }
        String::from_utf8(node.read().expect("read")).expect("utf8")
    }

    #[test]
    fn reports_hostname_and_ostype() {
        let proc = mount(Some("box")).expect("mount");
        assert_eq!(read(&proc, &["sys", "kernel", "hostname"]), "box\n");
        assert_eq!(read(&proc, &["sys", "kernel", "ostype"]), "Linux\n");
    }

    #[test]
    fn lists_every_filesystem_kind() {
        let proc = mount(None).expect("mount");
        let listing = read(&proc, &["filesystems"]);
        for kind in FilesystemKind::ALL {
            assert!(listing.contains(kind.name()), "missing {}", kind.name());
        }
    }

    #[test]
    fn self_is_a_symlink_to_init() {
        let proc = mount(None).expect("mount");
        let link = proc.lookup("self").expect("lookup").expect("present");
        assert_eq!(link.kind().expect("kind"), EntryKind::Symlink);
        assert_eq!(link.read_link().expect("target"), "1");
    }

    #[test]
    fn is_read_only() {
        let proc = mount(None).expect("mount");
        assert!(proc.write_file("version", b"x").is_err());
    }
}
