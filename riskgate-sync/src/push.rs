//! Gate-guarded atomic push.
//!
//! ## Flow
//!
//! 1. Health URL and destination must both be set, else
//!    `aborted_missing_target_config`.
//! 2. Resolve the file list (explicit list wins over the profile).
//! 3. Every source must exist, else `aborted_missing_source_files`.
//!    Nothing is copied when any one is missing.
//! 4. Risk gate. A block adds `aborted_blocked_no_response` after the
//!    gate's own record.
//! 5. Hash, stage, rename and re-hash each file.
//! 6. One aggregate `sync_push` record for the whole push.
//!
//! Steps 1–4 never open a source file for reading.

use std::path::Path;

use serde_json::Value;

use riskgate_core::{
    append_audit, AuditKind, AuditRecord, AuditResult, HealthCheckResult, Profile, ProfileSet,
    PushConfig, PushFileResult,
};
use riskgate_gate::{require_responsive_or_abort, GateError, GateRequest, HealthProbe};

use crate::error::SyncError;
use crate::hashing::sha256_file;
use crate::writer::{atomic_copy, destination_relative};

/// Action type recorded for push audit records.
pub const ACTION_SYNC_PUSH: &str = "sync_push";

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Lifecycle of one push.
///
/// `Idle → Checking → {Blocked | Verified} → Copying → {Succeeded |
/// PartiallyFailed}`, with `Idle → Aborted` for refusals raised before the
/// gate runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    Idle,
    Checking,
    Blocked,
    Verified,
    Copying,
    Succeeded,
    PartiallyFailed,
    Aborted,
}

impl PushState {
    pub fn advance(self, to: PushState) -> Result<PushState, SyncError> {
        use PushState::*;
        let legal = matches!(
            (self, to),
            (Idle, Checking)
                | (Idle, Aborted)
                | (Checking, Blocked)
                | (Checking, Verified)
                | (Verified, Copying)
                | (Copying, Succeeded)
                | (Copying, PartiallyFailed)
        );
        if legal {
            tracing::debug!("push state {self:?} -> {to:?}");
            Ok(to)
        } else {
            Err(SyncError::InvalidTransition { from: self, to })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PushState::Blocked
                | PushState::Succeeded
                | PushState::PartiallyFailed
                | PushState::Aborted
        )
    }
}

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

/// What to push.
#[derive(Debug, Clone, Default)]
pub struct PushRequest {
    pub profile: Profile,
    /// Explicit relative file names; when non-empty the profile is ignored.
    pub files: Vec<String>,
    /// Stop after a passing gate and report what would be copied.
    pub dry_run: bool,
}

/// Result of one push invocation.
#[derive(Debug, Clone)]
pub struct PushOutcome {
    /// Terminal state, or `Verified` for a dry run.
    pub state: PushState,
    /// Result written to the last audit record of this push, if any.
    pub result: Option<AuditResult>,
    /// Files the push resolved to, in order.
    pub planned: Vec<String>,
    pub missing: Vec<String>,
    pub health: Option<HealthCheckResult>,
    pub files: Vec<PushFileResult>,
}

impl PushOutcome {
    fn refused(state: PushState, result: AuditResult, planned: Vec<String>) -> Self {
        Self {
            state,
            result: Some(result),
            planned,
            missing: Vec::new(),
            health: None,
            files: Vec::new(),
        }
    }

    /// `true` when every file verified (or a dry run passed the gate).
    pub fn succeeded(&self) -> bool {
        matches!(self.state, PushState::Succeeded | PushState::Verified)
    }

    /// Process exit status: 0 verified, 1 a verification mismatch, 2 aborted
    /// before any copy.
    pub fn exit_code(&self) -> u8 {
        match self.state {
            PushState::Succeeded | PushState::Verified => 0,
            PushState::PartiallyFailed => 1,
            _ => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// push
// ---------------------------------------------------------------------------

/// Push the requested files into `config.destination`.
///
/// Refusals are returned as an `Ok` outcome with a non-zero
/// [`PushOutcome::exit_code`]; `Err` is reserved for failures to write the
/// audit log, which must abort the caller.
pub fn push(
    probe: &dyn HealthProbe,
    config: &PushConfig,
    profiles: &ProfileSet,
    request: &PushRequest,
) -> Result<PushOutcome, SyncError> {
    let state = PushState::Idle;
    let profile_label = if request.files.is_empty() {
        request.profile.name()
    } else {
        "explicit"
    };

    // Step 1: both ends of the push must be configured.
    let (health_url, destination) = match (config.health_url(), config.destination()) {
        (Some(url), Some(dest)) => (url, dest),
        (url, dest) => {
            let mut missing = Vec::new();
            if url.is_none() {
                missing.push("health_url");
            }
            if dest.is_none() {
                missing.push("destination");
            }
            tracing::warn!("push aborted: missing {}", missing.join(", "));
            let record = base_record(config, AuditResult::AbortedMissingTargetConfig)
                .with_extra("profile", profile_label)
                .with_extra("missing_config", missing);
            append_audit(&config.audit_path, &record)?;
            return Ok(PushOutcome::refused(
                state.advance(PushState::Aborted)?,
                AuditResult::AbortedMissingTargetConfig,
                Vec::new(),
            ));
        }
    };

    // Step 2: resolve the file list.
    let planned = profiles.resolve_or_override(request.profile, &request.files);

    // Step 3: all-or-nothing source precondition.
    let missing: Vec<String> = planned
        .iter()
        .filter(|name| !config.source_root.join(name.as_str()).is_file())
        .cloned()
        .collect();
    if !missing.is_empty() {
        tracing::warn!("push aborted: {} missing source file(s)", missing.len());
        let record = base_record(config, AuditResult::AbortedMissingSourceFiles)
            .with_extra("profile", profile_label)
            .with_extra("destination", destination.display().to_string())
            .with_extra("files", planned.clone())
            .with_extra("missing", missing.clone());
        append_audit(&config.audit_path, &record)?;
        let mut outcome = PushOutcome::refused(
            state.advance(PushState::Aborted)?,
            AuditResult::AbortedMissingSourceFiles,
            planned,
        );
        outcome.missing = missing;
        return Ok(outcome);
    }

    // Step 4: the gate records its own decision.
    let state = state.advance(PushState::Checking)?;
    let gate = GateRequest {
        health_url,
        ..GateRequest::from_config(config, ACTION_SYNC_PUSH)
    };
    let health = match require_responsive_or_abort(probe, &gate) {
        Ok(health) => health,
        Err(GateError::RiskGate {
            status_code,
            preview,
        }) => {
            let evidence = HealthCheckResult {
                ok: false,
                status_code,
                content_type: String::new(),
                body_preview: preview,
            };
            let record = base_record(config, AuditResult::AbortedBlockedNoResponse)
                .with_evidence(evidence.clone())
                .with_extra("profile", profile_label)
                .with_extra("destination", destination.display().to_string())
                .with_extra("files", planned.clone());
            append_audit(&config.audit_path, &record)?;
            let mut outcome = PushOutcome::refused(
                state.advance(PushState::Blocked)?,
                AuditResult::AbortedBlockedNoResponse,
                planned,
            );
            outcome.health = Some(evidence);
            return Ok(outcome);
        }
        Err(other) => return Err(SyncError::Gate(other)),
    };
    let state = state.advance(PushState::Verified)?;

    if request.dry_run {
        tracing::info!("[dry-run] would push {} file(s)", planned.len());
        return Ok(PushOutcome {
            state,
            result: Some(AuditResult::Ok),
            planned,
            missing: Vec::new(),
            health: Some(health),
            files: Vec::new(),
        });
    }

    // Steps 5–6: copy and verify every file.
    let state = state.advance(PushState::Copying)?;
    let files = copy_all(&planned, &config.source_root, destination);

    // Step 7: one aggregate record.
    let all_ok = files.iter().all(|f| f.ok);
    let (state, result) = if all_ok {
        (state.advance(PushState::Succeeded)?, AuditResult::Success)
    } else {
        (
            state.advance(PushState::PartiallyFailed)?,
            AuditResult::FailedVerify,
        )
    };
    let record = base_record(config, result)
        .with_evidence(health.clone())
        .with_files(files.clone())
        .with_extra("profile", profile_label)
        .with_extra("destination", destination.display().to_string())
        .with_extra("source_root", config.source_root.display().to_string())
        .with_extra("file_count", Value::from(files.len()));
    append_audit(&config.audit_path, &record)?;

    if all_ok {
        tracing::info!("pushed {} file(s) to {}", files.len(), destination.display());
    } else {
        let failed = files.iter().filter(|f| !f.ok).count();
        tracing::warn!("{failed} of {} file(s) failed verification", files.len());
    }

    Ok(PushOutcome {
        state,
        result: Some(result),
        planned,
        missing: Vec::new(),
        health: Some(health),
        files,
    })
}

fn base_record(config: &PushConfig, result: AuditResult) -> AuditRecord {
    AuditRecord::new(
        AuditKind::SyncPush,
        ACTION_SYNC_PUSH,
        &config.actor,
        &config.machines,
        result,
    )
    .merge_extra(&config.extra)
}

/// Copy every file on its own scoped thread; results keep input order.
fn copy_all(names: &[String], source_root: &Path, destination: &Path) -> Vec<PushFileResult> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = names
            .iter()
            .map(|name| scope.spawn(move || push_one(name, source_root, destination)))
            .collect();

        handles
            .into_iter()
            .zip(names)
            .map(|(handle, name)| {
                handle.join().unwrap_or_else(|_| {
                    let mut failed = file_result(name, source_root, destination);
                    failed.error = Some("copy worker panicked".to_string());
                    failed
                })
            })
            .collect()
    })
}

fn file_result(name: &str, source_root: &Path, destination: &Path) -> PushFileResult {
    PushFileResult {
        file_name: name.to_string(),
        source_path: source_root.join(name),
        destination_path: destination.join(destination_relative(name)),
        source_sha256: None,
        destination_sha256_after_copy: None,
        ok: false,
        error: None,
    }
}

fn push_one(name: &str, source_root: &Path, destination: &Path) -> PushFileResult {
    let mut result = file_result(name, source_root, destination);

    match sha256_file(&result.source_path) {
        Ok(digest) => result.source_sha256 = Some(digest),
        Err(e) => {
            result.error = Some(format!("hash source: {e}"));
            return result;
        }
    }

    if let Err(e) = atomic_copy(&result.source_path, &result.destination_path) {
        tracing::warn!("copy failed for {name}: {e}");
        result.error = Some(e.to_string());
        return result;
    }

    match sha256_file(&result.destination_path) {
        Ok(digest) => result.destination_sha256_after_copy = Some(digest),
        Err(e) => {
            result.error = Some(format!("hash destination: {e}"));
            return result;
        }
    }

    result.ok = result.source_sha256 == result.destination_sha256_after_copy;
    if !result.ok {
        result.error = Some("sha256 mismatch after copy".to_string());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use riskgate_core::read_audit;
    use riskgate_gate::ProbeResponse;
    use tempfile::TempDir;

    struct AlwaysUp;

    impl HealthProbe for AlwaysUp {
        fn probe(&self, _url: &str, _timeout: Duration) -> Result<ProbeResponse, String> {
            Ok(ProbeResponse {
                status: 200,
                content_type: "text/plain".into(),
                body: "ok".into(),
            })
        }
    }

    struct Panics;

    impl HealthProbe for Panics {
        fn probe(&self, _url: &str, _timeout: Duration) -> Result<ProbeResponse, String> {
            panic!("the gate must not run");
        }
    }

    fn config(tmp: &TempDir) -> PushConfig {
        let mut cfg = PushConfig::new("tester");
        cfg.health_url = Some("http://server.lan/health".into());
        cfg.destination = Some(tmp.path().join("dest"));
        cfg.source_root = tmp.path().join("src");
        cfg.audit_path = tmp.path().join("audit.jsonl");
        fs::create_dir_all(&cfg.source_root).unwrap();
        cfg
    }

    fn explicit(files: &[&str]) -> PushRequest {
        PushRequest {
            files: files.iter().map(|f| f.to_string()).collect(),
            ..PushRequest::default()
        }
    }

    #[test]
    fn legal_path_through_the_state_machine() {
        let s = PushState::Idle
            .advance(PushState::Checking)
            .and_then(|s| s.advance(PushState::Verified))
            .and_then(|s| s.advance(PushState::Copying))
            .and_then(|s| s.advance(PushState::Succeeded))
            .unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn copying_without_verification_is_rejected() {
        let err = PushState::Checking
            .advance(PushState::Copying)
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidTransition { .. }));
        assert!(PushState::Blocked.advance(PushState::Copying).is_err());
    }

    #[test]
    fn missing_destination_never_reaches_the_gate() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(&tmp);
        cfg.destination = None;

        let outcome = push(&Panics, &cfg, &ProfileSet::default(), &explicit(&["a.md"])).unwrap();
        assert_eq!(outcome.state, PushState::Aborted);
        assert_eq!(outcome.exit_code(), 2);

        let records = read_audit(&cfg.audit_path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].result, AuditResult::AbortedMissingTargetConfig);
        assert_eq!(records[0].extra["missing_config"], serde_json::json!(["destination"]));
    }

    #[test]
    fn dry_run_copies_nothing_after_the_gate() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);
        fs::write(cfg.source_root.join("a.md"), "a").unwrap();
        let mut request = explicit(&["a.md"]);
        request.dry_run = true;

        let outcome = push(&AlwaysUp, &cfg, &ProfileSet::default(), &request).unwrap();
        assert_eq!(outcome.state, PushState::Verified);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.planned, ["a.md"]);
        assert!(!tmp.path().join("dest").exists());

        let records = read_audit(&cfg.audit_path).unwrap();
        assert_eq!(records.len(), 1, "only the gate decision is recorded");
        assert_eq!(records[0].kind, AuditKind::RiskGateHealthCheck);
    }

    #[test]
    fn nested_names_keep_their_relative_layout() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);
        fs::create_dir_all(cfg.source_root.join("bin")).unwrap();
        fs::write(cfg.source_root.join("bin/tool.sh"), "#!/bin/sh\n").unwrap();

        let outcome = push(&AlwaysUp, &cfg, &ProfileSet::default(), &explicit(&["bin/tool.sh"]))
            .unwrap();
        assert!(outcome.succeeded());
        assert_eq!(
            fs::read_to_string(tmp.path().join("dest/bin/tool.sh")).unwrap(),
            "#!/bin/sh\n"
        );
    }

    #[test]
    fn results_keep_input_order() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);
        let names: Vec<String> = (0..8).map(|i| format!("f{i}.md")).collect();
        for name in &names {
            fs::write(cfg.source_root.join(name), name.as_bytes()).unwrap();
        }
        let request = PushRequest {
            files: names.clone(),
            ..PushRequest::default()
        };

        let outcome = push(&AlwaysUp, &cfg, &ProfileSet::default(), &request).unwrap();
        let got: Vec<_> = outcome.files.iter().map(|f| f.file_name.clone()).collect();
        assert_eq!(got, names);
    }

    #[test]
    fn unwritable_audit_log_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(&tmp);
        cfg.health_url = None;
        cfg.audit_path = tmp.path().to_path_buf();

        let err = push(&Panics, &cfg, &ProfileSet::default(), &explicit(&["a.md"])).unwrap_err();
        assert!(matches!(err, SyncError::Audit(_)), "got: {err}");
    }
}
