//! Sandbox descriptor tables and the import of host stdio.
//!
//! In terminal mode the three stdio slots share a single
//! [`TerminalFile`], so foreground process group state set through one
//! slot is seen through the others.

pub mod file;
pub mod import;
pub mod table;

pub use file::{FileKind, HostFile, SandboxFile, TerminalFile};
pub use import::import_stdio;
pub use table::{Descriptor, DescriptorTable, FdFlags};
