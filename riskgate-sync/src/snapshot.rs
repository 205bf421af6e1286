//! Snapshots of the pushable file set and best-effort rollback.
//!
//! # Layout
//!
//! ```text
//! <snapshot_root>/
//!   snapshot_20261016_141502/
//!     metadata.json        (created_at, purpose, file_count, source_root, files)
//!     environment.json     (only when variables were captured)
//!     files/
//!       INDEX.md
//!       bin/riskgate-push.sh
//! ```
//!
//! A snapshot is never written to after creation. Rollback reads from it
//! and overwrites live files in place; unlike a push it is not atomic and
//! restored files are not hash-verified.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};
use crate::writer::destination_relative;

pub const METADATA_FILE: &str = "metadata.json";
pub const ENVIRONMENT_FILE: &str = "environment.json";
pub const SNAPSHOT_PREFIX: &str = "snapshot_";
/// Subdirectory holding the captured files, apart from the metadata.
pub const FILES_DIR: &str = "files";

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: DateTime<FixedOffset>,
    pub purpose: String,
    pub file_count: usize,
    /// Live tree the files were copied from; the default rollback target.
    pub source_root: PathBuf,
    #[serde(default)]
    pub files: Vec<String>,
    /// Pushable files that did not exist when the snapshot was taken.
    #[serde(default)]
    pub missing: Vec<String>,
}

/// A snapshot directory and its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub dir: PathBuf,
    pub metadata: SnapshotMetadata,
}

impl Snapshot {
    /// Directory the captured files live under.
    pub fn files_dir(&self) -> PathBuf {
        self.dir.join(FILES_DIR)
    }
}

/// Inputs of [`create_snapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotRequest<'a> {
    pub snapshot_root: &'a Path,
    pub source_root: &'a Path,
    /// Every file the push engine can push.
    pub files: &'a [String],
    pub purpose: &'a str,
    /// Captured variables, written to `environment.json` when non-empty.
    pub environment: BTreeMap<String, String>,
}

/// Per-file outcome of a rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreResult {
    pub file_name: String,
    pub snapshot_path: PathBuf,
    pub live_path: PathBuf,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub snapshot_id: String,
    pub target: PathBuf,
    pub files: Vec<RestoreResult>,
}

impl RollbackReport {
    pub fn all_restored(&self) -> bool {
        self.files.iter().all(|f| f.ok)
    }

    pub fn failed(&self) -> impl Iterator<Item = &RestoreResult> {
        self.files.iter().filter(|f| !f.ok)
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Copy the current state of `request.files` into a new snapshot directory.
///
/// Files absent from the live tree are listed under `missing` rather than
/// failing the snapshot.
pub fn create_snapshot(request: &SnapshotRequest<'_>) -> Result<Snapshot, SyncError> {
    let created_at = DateTime::<FixedOffset>::from(Local::now());
    fs::create_dir_all(request.snapshot_root).map_err(|e| io_err(request.snapshot_root, e))?;
    let (id, dir) = reserve_dir(request.snapshot_root, &created_at)?;
    let files_dir = dir.join(FILES_DIR);
    fs::create_dir_all(&files_dir).map_err(|e| io_err(&files_dir, e))?;

    let mut copied = Vec::new();
    let mut missing = Vec::new();
    for name in request.files {
        let source = request.source_root.join(name);
        if !source.is_file() {
            tracing::warn!("snapshot {id}: skipping missing {}", source.display());
            missing.push(name.clone());
            continue;
        }
        let target = files_dir.join(destination_relative(name));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        fs::copy(&source, &target).map_err(|e| io_err(&source, e))?;
        copied.push(name.clone());
    }

    let metadata = SnapshotMetadata {
        created_at,
        purpose: request.purpose.to_string(),
        file_count: copied.len(),
        source_root: absolute(request.source_root),
        files: copied,
        missing,
    };
    write_json(&dir.join(METADATA_FILE), &metadata)?;
    if !request.environment.is_empty() {
        write_json(&dir.join(ENVIRONMENT_FILE), &request.environment)?;
    }

    tracing::info!("created snapshot {id} ({} files)", metadata.file_count);
    Ok(Snapshot { id, dir, metadata })
}

/// Create `snapshot_<timestamp>`, adding `_2`, `_3`, … when the second is taken.
fn reserve_dir(
    root: &Path,
    created_at: &DateTime<FixedOffset>,
) -> Result<(String, PathBuf), SyncError> {
    let base = format!("{SNAPSHOT_PREFIX}{}", created_at.format("%Y%m%d_%H%M%S"));
    let mut n = 1u32;
    loop {
        let id = if n == 1 {
            base.clone()
        } else {
            format!("{base}_{n}")
        };
        let dir = root.join(&id);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok((id, dir)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(io_err(&dir, e)),
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SyncError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|e| io_err(path, e))
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

// ---------------------------------------------------------------------------
// Load / list
// ---------------------------------------------------------------------------

/// Load snapshot `id` from `root`.
pub fn load_snapshot(root: &Path, id: &str) -> Result<Snapshot, SyncError> {
    let mut parts = Path::new(id).components();
    let single_name = matches!(
        (parts.next(), parts.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_name {
        return Err(SyncError::InvalidSnapshotId(id.to_string()));
    }

    let dir = root.join(id);
    let meta_path = dir.join(METADATA_FILE);
    if !meta_path.is_file() {
        return Err(SyncError::SnapshotNotFound {
            id: id.to_string(),
            root: root.to_path_buf(),
        });
    }
    let raw = fs::read_to_string(&meta_path).map_err(|e| io_err(&meta_path, e))?;
    let metadata = serde_json::from_str(&raw)?;
    Ok(Snapshot {
        id: id.to_string(),
        dir,
        metadata,
    })
}

/// Every snapshot under `root`, oldest first. A missing root has none.
pub fn list_snapshots(root: &Path) -> Result<Vec<Snapshot>, SyncError> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = fs::read_dir(root)
        .map_err(|e| io_err(root, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(SNAPSHOT_PREFIX))
        .collect();

    let mut snapshots = Vec::with_capacity(ids.len());
    for id in ids {
        match load_snapshot(root, &id) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => tracing::warn!("ignoring unreadable snapshot {id}: {e}"),
        }
    }
    snapshots.sort_by(|a, b| {
        (a.metadata.created_at, id_sequence(&a.id), &a.id)
            .cmp(&(b.metadata.created_at, id_sequence(&b.id), &b.id))
    });
    Ok(snapshots)
}

/// Same-second collision counter of an id: 1 for `snapshot_<stamp>`, `n`
/// for `snapshot_<stamp>_<n>`.
fn id_sequence(id: &str) -> u32 {
    id.strip_prefix(SNAPSHOT_PREFIX)
        .and_then(|stamp| stamp.get("YYYYmmdd_HHMMSS".len()..))
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

/// Restore every file of snapshot `id` into `target` (default: the
/// snapshot's recorded source root).
///
/// Requires `confirmed`. A file that fails to restore is reported and the
/// remaining files are still attempted; earlier restores stay in place.
pub fn rollback(
    root: &Path,
    id: &str,
    target: Option<&Path>,
    confirmed: bool,
) -> Result<RollbackReport, SyncError> {
    let snapshot = load_snapshot(root, id)?;
    if !confirmed {
        return Err(SyncError::RollbackNotConfirmed);
    }
    let target = target
        .map(Path::to_path_buf)
        .unwrap_or_else(|| snapshot.metadata.source_root.clone());

    let files_dir = snapshot.files_dir();
    let mut relative = Vec::new();
    if files_dir.is_dir() {
        collect_files(&files_dir, Path::new(""), &mut relative)?;
    }
    relative.sort();

    let files = relative
        .into_iter()
        .map(|rel| restore_one(&files_dir, &target, &rel))
        .collect::<Vec<_>>();

    let failed = files.iter().filter(|f| !f.ok).count();
    if failed == 0 {
        tracing::info!("rolled back {} file(s) from {id}", files.len());
    } else {
        tracing::warn!("rollback from {id}: {failed} of {} file(s) failed", files.len());
    }

    Ok(RollbackReport {
        snapshot_id: snapshot.id,
        target,
        files,
    })
}

/// Walk `base` collecting file paths relative to it.
fn collect_files(base: &Path, rel: &Path, out: &mut Vec<PathBuf>) -> Result<(), SyncError> {
    let dir = base.join(rel);
    for entry in fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
        let entry = entry.map_err(|e| io_err(&dir, e))?;
        let child = rel.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
        if file_type.is_dir() {
            collect_files(base, &child, out)?;
        } else {
            out.push(child);
        }
    }
    Ok(())
}

fn restore_one(snapshot_dir: &Path, target: &Path, rel: &Path) -> RestoreResult {
    let snapshot_path = snapshot_dir.join(rel);
    let live_path = target.join(rel);

    let outcome = (|| -> io::Result<()> {
        if let Some(parent) = live_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut reader = File::open(&snapshot_path)?;
        let mut writer = File::create(&live_path)?;
        io::copy(&mut reader, &mut writer)?;
        Ok(())
    })();

    let error = outcome.err().map(|e| {
        tracing::warn!("restore failed for {}: {e}", live_path.display());
        e.to_string()
    });
    RestoreResult {
        file_name: rel.to_string_lossy().into_owned(),
        snapshot_path,
        live_path,
        ok: error.is_none(),
        error,
    }
}
