//! Domain types for the riskgate audit trail.
//!
//! Every type here is serialized into the line-delimited audit log, so field
//! names are part of the on-disk format.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum number of characters kept from a health endpoint body.
pub const BODY_PREVIEW_LIMIT: usize = 500;

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Outcome of one gate invocation against a remote health endpoint.
///
/// Never persisted on its own; always embedded as `evidence` in an
/// [`AuditRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub ok: bool,
    /// HTTP status of the last attempt, `0` when no response was received.
    pub status_code: u16,
    pub content_type: String,
    pub body_preview: String,
}

impl HealthCheckResult {
    /// The canonical "unreachable" representation: `ok=false`, status `0`.
    pub fn unreachable(reason: impl fmt::Display) -> Self {
        Self {
            ok: false,
            status_code: 0,
            content_type: String::new(),
            body_preview: body_preview(&reason.to_string()),
        }
    }
}

/// Strip line breaks and cap `raw` at [`BODY_PREVIEW_LIMIT`] characters.
pub fn body_preview(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .take(BODY_PREVIEW_LIMIT)
        .collect()
}

// ---------------------------------------------------------------------------
// Audit enums
// ---------------------------------------------------------------------------

/// Which subsystem produced an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    RiskGateHealthCheck,
    SyncPush,
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditKind::RiskGateHealthCheck => write!(f, "risk_gate_health_check"),
            AuditKind::SyncPush => write!(f, "sync_push"),
        }
    }
}

/// Outcome recorded in an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    /// Gate passed.
    Ok,
    /// Gate failed: no verifiable response from the remote.
    BlockedNoResponse,
    AbortedMissingTargetConfig,
    AbortedMissingSourceFiles,
    /// Push refused because the gate blocked it.
    AbortedBlockedNoResponse,
    /// Every file copied and verified.
    Success,
    /// At least one file failed to copy or verify.
    FailedVerify,
}

impl AuditResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditResult::Ok => "ok",
            AuditResult::BlockedNoResponse => "blocked_no_response",
            AuditResult::AbortedMissingTargetConfig => "aborted_missing_target_config",
            AuditResult::AbortedMissingSourceFiles => "aborted_missing_source_files",
            AuditResult::AbortedBlockedNoResponse => "aborted_blocked_no_response",
            AuditResult::Success => "success",
            AuditResult::FailedVerify => "failed_verify",
        }
    }
}

impl fmt::Display for AuditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Push results
// ---------------------------------------------------------------------------

/// Per-file outcome of one push attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushFileResult {
    /// Relative name as listed by the profile or the caller.
    pub file_name: String,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub source_sha256: Option<String>,
    pub destination_sha256_after_copy: Option<String>,
    /// `true` only when both digests exist and are equal.
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Audit record
// ---------------------------------------------------------------------------

/// One immutable line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub kind: AuditKind,
    pub action_type: String,
    pub actor: String,
    pub machines: String,
    pub result: AuditResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<HealthCheckResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PushFileResult>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl AuditRecord {
    /// New record stamped with the local time and its UTC offset.
    pub fn new(
        kind: AuditKind,
        action_type: impl Into<String>,
        actor: impl Into<String>,
        machines: impl Into<String>,
        result: AuditResult,
    ) -> Self {
        Self {
            timestamp: DateTime::<FixedOffset>::from(Local::now()),
            kind,
            action_type: action_type.into(),
            actor: actor.into(),
            machines: machines.into(),
            result,
            evidence: None,
            files: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: HealthCheckResult) -> Self {
        self.evidence = Some(evidence);
        self
    }

    pub fn with_files(mut self, files: Vec<PushFileResult>) -> Self {
        self.files = files;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Merge a caller-supplied map into `extra`; existing keys win.
    pub fn merge_extra(mut self, extra: &Map<String, Value>) -> Self {
        for (key, value) in extra {
            self.extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }
}
