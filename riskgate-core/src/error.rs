//! Error types for riskgate-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while appending to or reading the audit log.
///
/// A failed audit write must always reach the caller; nothing in this crate
/// swallows it.
#[derive(Debug, Error)]
pub enum AuditError {
    /// I/O failure with the path it happened at.
    #[error("audit I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be encoded as a single JSON line.
    #[error("failed to encode audit record: {0}")]
    Encode(#[from] serde_json::Error),

    /// A line in an existing log is not a valid record.
    #[error("malformed audit record at {path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error; includes the file path and serde_yaml's location.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An explicitly named config file does not exist.
    #[error("config file not found at {path}")]
    NotFound { path: PathBuf },

    #[error("unknown profile '{0}'; expected: content, tooling")]
    UnknownProfile(String),

    /// A profile resolved to no files at all.
    #[error("profile '{0}' lists no files")]
    EmptyProfile(String),
}

pub(crate) fn audit_io(path: impl Into<PathBuf>, source: std::io::Error) -> AuditError {
    AuditError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
