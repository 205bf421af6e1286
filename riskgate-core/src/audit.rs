//! Append-only audit log.
//!
//! One JSON-encoded [`AuditRecord`] per line. The file is only ever opened in
//! append mode, so a failed or partial write can damage at most its own line
//! and never the records before it.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{audit_io, AuditError};
use crate::types::AuditRecord;

/// Default audit log file name, relative to the working directory.
pub const DEFAULT_AUDIT_FILE: &str = "risk_action_audit.jsonl";

/// Append `record` to the log at `path`, creating parent directories.
///
/// The encoded line and its trailing newline are handed to the OS in a single
/// write so concurrent tailers never see a record without its terminator.
pub fn append_audit(path: &Path, record: &AuditRecord) -> Result<(), AuditError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| audit_io(parent, e))?;
    }

    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| audit_io(path, e))?;
    file.write_all(line.as_bytes())
        .map_err(|e| audit_io(path, e))?;
    file.flush().map_err(|e| audit_io(path, e))?;
    Ok(())
}

/// Read every record in the log. A missing log is an empty log.
pub fn read_audit(path: &Path) -> Result<Vec<AuditRecord>, AuditError> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(audit_io(path, err)),
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| audit_io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| AuditError::Parse {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// The last `count` records of the log, oldest first.
pub fn tail_audit(path: &Path, count: usize) -> Result<Vec<AuditRecord>, AuditError> {
    let mut records = read_audit(path)?;
    let skip = records.len().saturating_sub(count);
    Ok(records.split_off(skip))
}
