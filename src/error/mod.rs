//! Error types for every stage of loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of the public `load` operation.
///
/// This is the only error a caller of the resolver ever sees. Lower-level
/// causes are kept for diagnostics, not for branching.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot load '{name}': {cause}")]
    NotFound {
        name: String,
        #[source]
        cause: Cause,
    },
}

impl LoadError {
    pub fn not_found(name: impl Into<String>, cause: Cause) -> Self {
        Self::NotFound {
            name: name.into(),
            cause,
        }
    }

    /// The name that was requested.
    pub fn name(&self) -> &str {
        match self {
            Self::NotFound { name, .. } => name,
        }
    }

    pub fn cause(&self) -> &Cause {
        match self {
            Self::NotFound { cause, .. } => cause,
        }
    }
}

/// Why a load produced no handle.
#[derive(Debug, Error)]
pub enum Cause {
    #[error("no install action exists for this source")]
    NoInstallAction,

    #[error("installation did not succeed")]
    InstallFailed,

    #[error("installed, but still not importable: {0}")]
    StillMissing(#[source] HostError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Errors raised by a [`crate::module::Host`].
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Failed to launch interpreter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("File does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("'{name}' failed to load: {message}")]
    Failed { name: String, message: String },

    #[error("Unreadable interpreter reply: {0}")]
    Protocol(String),
}

/// Errors raised while executing an install action.
///
/// These never escape the installer; they are logged and collapsed into a
/// boolean outcome.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Install command is empty")]
    EmptyCommand,

    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("'{program}' exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to download {url}: {message}")]
    Download { url: String, message: String },

    #[error("Failed to extract archive: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }
}
