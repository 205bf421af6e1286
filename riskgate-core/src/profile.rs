//! Profile resolver: named, fixed bundles of files a push targets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Generated index/context artifacts.
pub const CONTENT_FILES: &[&str] = &["INDEX.md", "CONTEXT.md"];

/// The gate, push and rule files themselves, so the mechanism can update itself.
pub const TOOLING_FILES: &[&str] = &["riskgate.yaml", "RISK_RULES.md", "bin/riskgate-push.sh"];

/// A built-in push profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Content,
    Tooling,
}

impl Profile {
    pub fn all() -> &'static [Profile] {
        &[Profile::Content, Profile::Tooling]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Profile::Content => "content",
            Profile::Tooling => "tooling",
        }
    }

    pub fn builtin_files(&self) -> &'static [&'static str] {
        match self {
            Profile::Content => CONTENT_FILES,
            Profile::Tooling => TOOLING_FILES,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "content" => Ok(Profile::Content),
            "tooling" => Ok(Profile::Tooling),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}

/// Resolved file lists for every profile.
///
/// Starts from the built-ins; a config file may replace either list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSet {
    content: Vec<String>,
    tooling: Vec<String>,
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self {
            content: to_owned(CONTENT_FILES),
            tooling: to_owned(TOOLING_FILES),
        }
    }
}

impl ProfileSet {
    /// Built-ins, with `content` / `tooling` replaced where given.
    pub fn with_overrides(
        content: Option<Vec<String>>,
        tooling: Option<Vec<String>>,
    ) -> Result<Self, ConfigError> {
        let mut set = Self::default();
        if let Some(files) = content {
            if files.is_empty() {
                return Err(ConfigError::EmptyProfile(Profile::Content.to_string()));
            }
            set.content = files;
        }
        if let Some(files) = tooling {
            if files.is_empty() {
                return Err(ConfigError::EmptyProfile(Profile::Tooling.to_string()));
            }
            set.tooling = files;
        }
        Ok(set)
    }

    /// Ordered relative file names for `profile`.
    pub fn resolve(&self, profile: Profile) -> &[String] {
        match profile {
            Profile::Content => &self.content,
            Profile::Tooling => &self.tooling,
        }
    }

    /// The file list for a push: an explicit list always wins over the profile.
    pub fn resolve_or_override(&self, profile: Profile, files: &[String]) -> Vec<String> {
        if files.is_empty() {
            self.resolve(profile).to_vec()
        } else {
            files.to_vec()
        }
    }

    /// Every file any profile can push, de-duplicated, in profile order.
    pub fn pushable_files(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for profile in Profile::all() {
            for file in self.resolve(*profile) {
                if !out.contains(file) {
                    out.push(file.clone());
                }
            }
        }
        out
    }
}

fn to_owned(files: &[&str]) -> Vec<String> {
    files.iter().map(|f| (*f).to_string()).collect()
}
