//! Explicit configuration passed to every entry point.
//!
//! Library code never reads the environment. The CLI merges flags,
//! environment variables and the optional `riskgate.yaml` into a
//! [`PushConfig`] and hands it over by value.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::audit::DEFAULT_AUDIT_FILE;
use crate::error::{config_io, ConfigError};
use crate::profile::ProfileSet;

pub const DEFAULT_CONFIG_FILE: &str = "riskgate.yaml";
pub const DEFAULT_SNAPSHOT_DIR: &str = "snapshots";
pub const DEFAULT_MACHINES: &str = "local->server";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_RETRIES: u32 = 2;

// ---------------------------------------------------------------------------
// PushConfig
// ---------------------------------------------------------------------------

/// Everything one push needs, resolved up front.
#[derive(Debug, Clone, PartialEq)]
pub struct PushConfig {
    pub health_url: Option<String>,
    pub destination: Option<PathBuf>,
    /// Directory relative file names are resolved against.
    pub source_root: PathBuf,
    pub audit_path: PathBuf,
    pub actor: String,
    /// Direction label, e.g. `local->server`.
    pub machines: String,
    /// Per-attempt timeout of the health probe.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub retries: u32,
    /// Free-form fields copied into every audit record.
    pub extra: Map<String, Value>,
}

impl PushConfig {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            health_url: None,
            destination: None,
            source_root: PathBuf::from("."),
            audit_path: PathBuf::from(DEFAULT_AUDIT_FILE),
            actor: actor.into(),
            machines: DEFAULT_MACHINES.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            extra: Map::new(),
        }
    }

    /// The health URL, or `None` when unset or blank.
    pub fn health_url(&self) -> Option<&str> {
        self.health_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// The destination directory, or `None` when unset or empty.
    pub fn destination(&self) -> Option<&Path> {
        self.destination
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    /// Total probe attempts: the first one plus `retries`.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// First candidate that is set and not blank.
pub fn first_non_empty<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

// ---------------------------------------------------------------------------
// riskgate.yaml
// ---------------------------------------------------------------------------

/// On-disk configuration file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub health_url: Option<String>,
    pub copy_to: Option<PathBuf>,
    pub audit: Option<PathBuf>,
    pub actor: Option<String>,
    pub machines: Option<String>,
    pub timeout_secs: Option<f64>,
    pub retries: Option<u32>,
    pub source_root: Option<PathBuf>,
    pub snapshot_dir: Option<PathBuf>,
    #[serde(default)]
    pub profiles: ProfileOverrides,
}

/// Replacement file lists for the built-in profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileOverrides {
    pub content: Option<Vec<String>>,
    pub tooling: Option<Vec<String>>,
}

impl FileConfig {
    /// Profile set with this file's overrides applied.
    pub fn profile_set(&self) -> Result<ProfileSet, ConfigError> {
        ProfileSet::with_overrides(
            self.profiles.content.clone(),
            self.profiles.tooling.clone(),
        )
    }

    /// Timeout as a `Duration`, ignoring non-finite or negative values.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Load `path`. A missing file is an error.
pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| config_io(path, e))?;
    if contents.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `path` if it exists; a missing file yields the defaults.
pub fn load_optional(path: &Path) -> Result<FileConfig, ConfigError> {
    if path.exists() {
        load_file(path)
    } else {
        Ok(FileConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_count_as_missing() {
        let mut cfg = PushConfig::new("tester");
        cfg.health_url = Some("   ".into());
        cfg.destination = Some(PathBuf::new());
        assert!(cfg.health_url().is_none());
        assert!(cfg.destination().is_none());
    }

    #[test]
    fn default_retries_mean_three_attempts() {
        let cfg = PushConfig::new("tester");
        assert_eq!(cfg.max_attempts(), 3);
        assert_eq!(cfg.timeout, Duration::from_secs(3));
    }

    #[test]
    fn first_non_empty_skips_blank_candidates() {
        let picked = first_non_empty([
            None,
            Some(String::new()),
            Some("env".into()),
            Some("file".into()),
        ]);
        assert_eq!(picked.as_deref(), Some("env"));
        assert!(first_non_empty([None, Some(" ".into())]).is_none());
    }

    #[test]
    fn timeout_rejects_nonsense() {
        let mut file = FileConfig::default();
        file.timeout_secs = Some(-1.0);
        assert!(file.timeout().is_none());
        file.timeout_secs = Some(0.5);
        assert_eq!(file.timeout(), Some(Duration::from_millis(500)));
    }
}
