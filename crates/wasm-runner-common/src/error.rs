//! Error types for wasm-runner.
//!
//! Every failure is fatal to the run. [`RunnerError`] carries enough context
//! for the binary to print a useful message before exiting non-zero, and
//! [`ErrorKind`] groups the variants into the categories callers match on.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, instantiating or running a module.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The module file could not be read.
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The bytes are not a valid module, or linking against the supplied
    /// imports failed.
    #[error("Instantiation failed: {reason}")]
    Instantiation {
        /// Description of the failure, as reported by the engine.
        reason: String,
    },

    /// The shim's entry export does not exist or has the wrong signature.
    #[error("Entry point '{name}' not found")]
    EntryPointNotFound {
        /// Name of the export that was looked up.
        name: String,
    },

    /// The guest trapped while running.
    #[error("Wasm trap: {message}")]
    Trap {
        /// Description of the trap, including the wasm backtrace if enabled.
        message: String,
        /// Trap code if the engine reported one.
        code: Option<String>,
    },

    /// An operation was called out of order.
    #[error("Invalid runner state: expected {expected}, found {actual}")]
    InvalidState {
        /// State the operation requires.
        expected: &'static str,
        /// State the runner was in.
        actual: &'static str,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

/// Coarse classification of a [`RunnerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The binary could not be loaded from disk.
    Io,
    /// The binary could not be compiled or linked.
    Instantiation,
    /// The guest failed after it started running.
    Execution,
    /// The harness itself was misconfigured or misused.
    Config,
}

impl RunnerError {
    /// Create a new `Io` error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a new `Instantiation` error.
    pub fn instantiation(reason: impl Into<String>) -> Self {
        Self::Instantiation {
            reason: reason.into(),
        }
    }

    /// Create a new `EntryPointNotFound` error.
    pub fn entry_point_not_found(name: impl Into<String>) -> Self {
        Self::EntryPointNotFound { name: name.into() }
    }

    /// Create a new `Trap` error.
    pub fn trap(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Trap {
            message: message.into(),
            code,
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::Instantiation { .. } => ErrorKind::Instantiation,
            Self::EntryPointNotFound { .. } | Self::Trap { .. } => ErrorKind::Execution,
            Self::InvalidState { .. } | Self::InvalidConfig { .. } => ErrorKind::Config,
        }
    }

    /// Returns `true` if the module file could not be read.
    pub fn is_io(&self) -> bool {
        self.kind() == ErrorKind::Io
    }

    /// Returns `true` if compiling or linking the module failed.
    pub fn is_instantiation(&self) -> bool {
        self.kind() == ErrorKind::Instantiation
    }
}
