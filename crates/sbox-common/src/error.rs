//! Unified error type for the sbox workspace.
//!
//! Every failure during sandbox construction is fatal: none of these are
//! retried, and the bootstrap driver aborts startup on the first one.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum SboxError {
    /// A backing mount could not be created, composed, or attached.
    #[error("mount failed: {message}")]
    Mount {
        /// Description of the failed mount step.
        message: String,
    },

    /// A path component was absent during resolution.
    #[error("{path} not found")]
    NotFound {
        /// Path (or component) that could not be found.
        path: String,
    },

    /// Path resolution followed more symlinks than its budget allowed.
    #[error("too many levels of symbolic links resolving {path}")]
    SymlinkLimitExceeded {
        /// Path whose resolution was aborted.
        path: String,
    },

    /// A host descriptor could not be imported into the sandbox.
    #[error("failed to import host fd {fd}: {message}")]
    Import {
        /// Host descriptor number.
        fd: i32,
        /// Description of the failure.
        message: String,
    },

    /// A one-shot resource was initialized twice.
    #[error("{what} already initialized")]
    AlreadyInitialized {
        /// The resource that was already set.
        what: &'static str,
    },

    /// The process-execution engine refused or failed an operation.
    #[error("execution engine error: {message}")]
    Engine {
        /// Description of the failure.
        message: String,
    },

    /// A non-directory was used where a directory is required.
    #[error("{path} is not a directory")]
    NotADirectory {
        /// Offending path.
        path: String,
    },

    /// A write was attempted on a read-only tree.
    #[error("{path} is read-only")]
    ReadOnly {
        /// Offending path.
        path: String,
    },

    /// An entry already exists where a new one was to be created.
    #[error("{path} already exists")]
    Exists {
        /// Offending path.
        path: String,
    },

    /// An I/O operation on the host failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Host path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl SboxError {
    /// Shorthand for a [`SboxError::Mount`] with the given message.
    pub fn mount(message: impl Into<String>) -> Self {
        Self::Mount {
            message: message.into(),
        }
    }

    /// Wraps this error as a mount failure with added context.
    ///
    /// Resolution failures (`NotFound`, `SymlinkLimitExceeded`) keep their
    /// kind so callers can still tell them apart.
    #[must_use]
    pub fn into_mount(self, context: &str) -> Self {
        match self {
            Self::Mount { message } => Self::Mount {
                message: format!("{context}: {message}"),
            },
            e @ (Self::NotFound { .. } | Self::SymlinkLimitExceeded { .. }) => e,
            other => Self::Mount {
                message: format!("{context}: {other}"),
            },
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, SboxError>;
