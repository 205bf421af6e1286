//! riskgate core library: domain types, audit log, profiles, configuration.
//!
//! - [`types`]: audit records and the values embedded in them
//! - [`audit`]: append-only line-delimited JSON log
//! - [`profile`]: named file bundles
//! - [`config`]: [`PushConfig`] and the optional `riskgate.yaml`

pub mod audit;
pub mod config;
pub mod error;
pub mod profile;
pub mod types;

pub use audit::{append_audit, read_audit, tail_audit};
pub use config::{FileConfig, PushConfig};
pub use error::{AuditError, ConfigError};
pub use profile::{Profile, ProfileSet};
pub use types::{AuditKind, AuditRecord, AuditResult, HealthCheckResult, PushFileResult};
