//! Subcommand implementations and the configuration boundary they share.

pub mod audit;
pub mod profiles;
pub mod push;
pub mod rollback;
pub mod snapshot;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use riskgate_core::{
    audit::DEFAULT_AUDIT_FILE,
    config::{self, FileConfig, DEFAULT_CONFIG_FILE, DEFAULT_SNAPSHOT_DIR},
    ProfileSet,
};

/// Global options every command receives.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub config: Option<PathBuf>,
}

impl Settings {
    /// Load `--config` (must exist) or `./riskgate.yaml` (optional).
    pub fn file_config(&self) -> Result<FileConfig> {
        match &self.config {
            Some(path) => config::load_file(path)
                .with_context(|| format!("failed to load config '{}'", path.display())),
            None => config::load_optional(Path::new(DEFAULT_CONFIG_FILE))
                .context("failed to load ./riskgate.yaml"),
        }
    }

    pub fn profiles(&self, file: &FileConfig) -> Result<ProfileSet> {
        file.profile_set().context("invalid profile override in config")
    }
}

/// Flag, then config file, then the default audit file name.
pub fn audit_path(flag: Option<PathBuf>, file: &FileConfig) -> PathBuf {
    flag.or_else(|| file.audit.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_FILE))
}

/// Flag, then config file, then `./snapshots`.
pub fn snapshot_dir(flag: Option<PathBuf>, file: &FileConfig) -> PathBuf {
    flag.or_else(|| file.snapshot_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR))
}

/// Flag, then config file, then the working directory.
pub fn source_root(flag: Option<PathBuf>, file: &FileConfig) -> PathBuf {
    flag.or_else(|| file.source_root.clone())
        .unwrap_or_else(|| PathBuf::from("."))
}
