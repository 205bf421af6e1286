//! The hard rule: no verifiable response means no operation.

use std::path::Path;
use std::time::Duration;

use serde_json::{Map, Value};

use riskgate_core::{
    append_audit, AuditKind, AuditRecord, AuditResult, HealthCheckResult, PushConfig,
};

use crate::error::GateError;
use crate::health::{check_with_backoff, HealthProbe, RETRY_BACKOFF};

/// Inputs of one gate decision.
#[derive(Debug, Clone)]
pub struct GateRequest<'a> {
    pub health_url: &'a str,
    pub audit_path: &'a Path,
    /// The operation being guarded, e.g. `sync_push`.
    pub action_type: &'a str,
    pub actor: &'a str,
    pub machines: &'a str,
    pub timeout: Duration,
    pub retries: u32,
    pub extra: &'a Map<String, Value>,
}

impl<'a> GateRequest<'a> {
    /// Gate request for `action_type` built from a resolved push config.
    pub fn from_config(config: &'a PushConfig, action_type: &'a str) -> Self {
        Self {
            health_url: config.health_url().unwrap_or(""),
            audit_path: &config.audit_path,
            action_type,
            actor: &config.actor,
            machines: &config.machines,
            timeout: config.timeout,
            retries: config.retries,
            extra: &config.extra,
        }
    }
}

/// Check the remote and record exactly one `risk_gate_health_check` record.
///
/// Returns the health evidence when the remote answered 2xx, otherwise
/// [`GateError::RiskGate`]. Callers must treat the error as fatal for the
/// whole operation. A failed audit write is returned as
/// [`GateError::Audit`] even when the remote was healthy.
pub fn require_responsive_or_abort(
    probe: &dyn HealthProbe,
    request: &GateRequest<'_>,
) -> Result<HealthCheckResult, GateError> {
    require_with_backoff(probe, request, RETRY_BACKOFF)
}

pub(crate) fn require_with_backoff(
    probe: &dyn HealthProbe,
    request: &GateRequest<'_>,
    backoff: Duration,
) -> Result<HealthCheckResult, GateError> {
    let max_attempts = request.retries.saturating_add(1);
    let health = check_with_backoff(
        probe,
        request.health_url,
        request.timeout,
        max_attempts,
        backoff,
    );

    let result = if health.ok {
        AuditResult::Ok
    } else {
        AuditResult::BlockedNoResponse
    };
    let record = AuditRecord::new(
        AuditKind::RiskGateHealthCheck,
        request.action_type,
        request.actor,
        request.machines,
        result,
    )
    .with_evidence(health.clone())
    .with_extra("health_url", request.health_url)
    .with_extra("max_attempts", max_attempts)
    .with_extra("timeout_secs", request.timeout.as_secs_f64())
    .merge_extra(request.extra);
    append_audit(request.audit_path, &record)?;

    if health.ok {
        tracing::info!(url = request.health_url, status = health.status_code, "risk gate passed");
        Ok(health)
    } else {
        tracing::warn!(url = request.health_url, "risk gate blocked");
        Err(GateError::RiskGate {
            status_code: health.status_code,
            preview: health.body_preview,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::tests::{response, ScriptedProbe};
    use riskgate_core::read_audit;
    use tempfile::TempDir;

    fn request<'a>(audit: &'a Path, extra: &'a Map<String, Value>) -> GateRequest<'a> {
        GateRequest {
            health_url: "http://server.lan/health",
            audit_path: audit,
            action_type: "sync_push",
            actor: "tester",
            machines: "local->server",
            timeout: Duration::from_millis(100),
            retries: 2,
            extra,
        }
    }

    #[test]
    fn every_attempt_failing_records_exactly_one_block() {
        let tmp = TempDir::new().unwrap();
        let audit = tmp.path().join("audit.jsonl");
        let extra = Map::new();
        let probe = ScriptedProbe::new(vec![
            Err("timed out".into()),
            Err("timed out".into()),
            Err("timed out".into()),
        ]);

        let err = require_with_backoff(&probe, &request(&audit, &extra), Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, GateError::RiskGate { status_code: 0, .. }), "got: {err}");
        assert_eq!(*probe.calls.borrow(), 3);

        let records = read_audit(&audit).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, AuditKind::RiskGateHealthCheck);
        assert_eq!(records[0].result, AuditResult::BlockedNoResponse);
        assert_eq!(records[0].evidence.as_ref().map(|e| e.ok), Some(false));
    }

    #[test]
    fn success_records_exactly_one_ok() {
        let tmp = TempDir::new().unwrap();
        let audit = tmp.path().join("audit.jsonl");
        let mut extra = Map::new();
        extra.insert("ticket".into(), Value::from("OPS-7"));
        let probe = ScriptedProbe::new(vec![response(200, "{\"status\":\"ok\"}")]);

        let health = require_with_backoff(&probe, &request(&audit, &extra), Duration::ZERO)
            .unwrap();
        assert!(health.ok);

        let records = read_audit(&audit).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].result, AuditResult::Ok);
        assert_eq!(records[0].action_type, "sync_push");
        assert_eq!(records[0].extra["ticket"], "OPS-7");
        assert_eq!(records[0].extra["max_attempts"], 3);
    }

    #[test]
    fn missing_url_is_blocked_and_audited() {
        let tmp = TempDir::new().unwrap();
        let audit = tmp.path().join("audit.jsonl");
        let extra = Map::new();
        let probe = ScriptedProbe::new(vec![response(200, "up")]);
        let mut req = request(&audit, &extra);
        req.health_url = "";

        assert!(require_with_backoff(&probe, &req, Duration::ZERO).is_err());
        assert_eq!(*probe.calls.borrow(), 0);
        assert_eq!(read_audit(&audit).unwrap().len(), 1);
    }

    #[test]
    fn unwritable_audit_wins_over_a_healthy_remote() {
        let tmp = TempDir::new().unwrap();
        let extra = Map::new();
        let probe = ScriptedProbe::new(vec![response(200, "up")]);
        // The audit path is a directory, so appending fails.
        let err = require_with_backoff(&probe, &request(tmp.path(), &extra), Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, GateError::Audit(_)), "got: {err}");
    }
}
