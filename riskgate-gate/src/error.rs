use riskgate_core::AuditError;
use thiserror::Error;

/// Error surface of the gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// The remote could not be proven responsive. Fatal for the operation.
    #[error("risk gate blocked: remote not responsive (status {status_code}): {preview}")]
    RiskGate { status_code: u16, preview: String },

    /// The gate decision could not be recorded.
    #[error("failed to record gate decision: {0}")]
    Audit(#[from] AuditError),
}
