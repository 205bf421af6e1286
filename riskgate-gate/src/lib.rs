//! # riskgate-gate
//!
//! Pre-flight reachability gate. A push may only proceed once
//! [`require_responsive_or_abort`] has returned `Ok`; absence of a verifiable
//! response is treated exactly like an explicit deny.

mod error;
pub mod gate;
pub mod health;

pub use error::GateError;
pub use gate::{require_responsive_or_abort, GateRequest};
pub use health::{
    check_remote_health, HealthProbe, HttpProbe, ProbeResponse, RETRY_BACKOFF,
};
