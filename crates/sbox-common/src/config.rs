//! Sandbox configuration model.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_HOSTNAME, DEFAULT_WORKING_DIR, MAX_SYMLINK_TRAVERSALS};
use crate::error::{Result, SboxError};
use crate::types::ResourceLimits;

/// Everything needed to start one sandboxed program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Use the host network stack instead of an isolated one.
    pub host_net: bool,
    /// Treat stdin, stdout, and stderr as one controlling terminal.
    pub tty: bool,
    /// Host directories layered into the root, lowest precedence first.
    pub mounts: Vec<PathBuf>,
    /// Program argument vector.
    pub args: Vec<String>,
    /// Environment of the initial process, as `KEY=value` strings.
    pub env: Vec<String>,
    /// Working directory inside the sandbox.
    pub working_dir: String,
    /// Hostname reported inside the sandbox.
    pub hostname: String,
    /// Symlink budget used when resolving mount points.
    pub max_symlink_traversals: u32,
    /// Resource limits of the initial process.
    pub limits: ResourceLimits,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            host_net: false,
            tty: false,
            mounts: Vec::new(),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: DEFAULT_WORKING_DIR.to_owned(),
            hostname: DEFAULT_HOSTNAME.to_owned(),
            max_symlink_traversals: MAX_SYMLINK_TRAVERSALS,
            limits: ResourceLimits::default(),
        }
    }
}

impl SandboxConfig {
    /// Splits a comma-separated host mount list, dropping empty entries.
    #[must_use]
    pub fn parse_mounts(list: &str) -> Vec<PathBuf> {
        list.split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    /// Loads a configuration from a JSON file. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| SboxError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Checks the configuration before any sandbox state is built.
    ///
    /// # Errors
    ///
    /// Returns [`SboxError::Config`] if no program is given, the symlink
    /// budget is zero, or the working directory is relative.
    pub fn validate(&self) -> Result<()> {
        if self.args.is_empty() {
            return Err(SboxError::Config {
                message: "no program given".into(),
            });
        }
        if self.max_symlink_traversals == 0 {
            return Err(SboxError::Config {
                message: "max_symlink_traversals must be positive".into(),
            });
        }
        if !self.working_dir.starts_with('/') {
            return Err(SboxError::Config {
                message: format!("working directory must be absolute: {}", self.working_dir),
            });
        }
        Ok(())
    }
}
