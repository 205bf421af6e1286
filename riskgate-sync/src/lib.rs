//! # riskgate-sync
//!
//! Gate-guarded atomic push and snapshot/rollback.
//!
//! Call [`push`] to copy a profile's files into a destination directory once
//! the remote has been proven responsive, or [`create_snapshot`] /
//! [`rollback`] to capture and restore the pushable file set.

pub mod error;
pub mod hashing;
pub mod push;
pub mod snapshot;
pub mod writer;

pub use error::SyncError;
pub use push::{push, PushOutcome, PushRequest, PushState};
pub use snapshot::{
    create_snapshot, list_snapshots, load_snapshot, rollback, RestoreResult, RollbackReport,
    Snapshot, SnapshotMetadata, SnapshotRequest,
};
