//! Error types for riskgate-sync.

use std::path::PathBuf;

use thiserror::Error;

use riskgate_core::AuditError;
use riskgate_gate::GateError;

use crate::push::PushState;

/// All errors that can arise from push and snapshot operations.
///
/// Refusals (missing config, missing sources, blocked gate) are not errors:
/// they are audited outcomes reported through
/// [`PushOutcome`](crate::PushOutcome).
#[derive(Debug, Error)]
pub enum SyncError {
    /// The audit log could not be written. Always fatal.
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// Gate failure other than a refusal, i.e. its audit write failed.
    #[error("gate error: {0}")]
    Gate(#[source] GateError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot metadata JSON error.
    #[error("snapshot metadata JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot '{id}' not found under {root}")]
    SnapshotNotFound { id: String, root: PathBuf },

    /// Snapshot ids are single directory names; anything else is rejected.
    #[error("invalid snapshot id '{0}'")]
    InvalidSnapshotId(String),

    #[error("rollback requires explicit confirmation")]
    RollbackNotConfirmed,

    #[error("illegal push state transition {from:?} -> {to:?}")]
    InvalidTransition { from: PushState, to: PushState },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
