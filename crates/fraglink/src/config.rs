//! Configuration types for fraglink.
//!
//! All types implement [`serde::Deserialize`] so the CLI can load them from
//! TOML. Every field has a default, so an empty document is a valid
//! configuration.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining repair and git settings.
//! - [`RepairConfig`] - Which path prefixes count as merge-tool corruption.
//! - [`GitConfig`] - Which files are models, and how fixes are committed.
//!
//! # Example
//!
//! ```
//! # use fraglink::config::AppConfig;
//! let config = AppConfig::default();
//! assert_eq!(config.git().model_suffix(), ".aird");
//! assert!(config.repair().spurious_prefixes().iter().any(|p| p == "index:/"));
//! ```

use serde::Deserialize;

/// Prefixes a merge tool may insert in front of fragment paths.
pub const DEFAULT_SPURIOUS_PREFIXES: &[&str] = &["index:/", "commit:/"];

/// URI schemes of remote model repositories.
pub const DEFAULT_REPOSITORY_SCHEMES: &[&str] = &["cdo://"];

pub const DEFAULT_MODEL_SUFFIX: &str = ".aird";

pub const DEFAULT_COMMIT_MESSAGE: &str = "fix[by-script]: merge tool index-prefix";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Repair configuration section.
    #[serde(default)]
    repair: RepairConfig,

    /// Git configuration section.
    #[serde(default)]
    git: GitConfig,
}

impl AppConfig {
    pub fn new(repair: RepairConfig, git: GitConfig) -> Self {
        Self { repair, git }
    }

    pub fn repair(&self) -> &RepairConfig {
        &self.repair
    }

    pub fn git(&self) -> &GitConfig {
        &self.git
    }
}

/// Settings for recognizing corrupted links.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Prefixes treated as merge-tool corruption, e.g. `index:/`.
    spurious_prefixes: Vec<String>,

    /// Schemes of links into remote repositories, e.g. `cdo://`.
    repository_schemes: Vec<String>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            spurious_prefixes: DEFAULT_SPURIOUS_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            repository_schemes: DEFAULT_REPOSITORY_SCHEMES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl RepairConfig {
    pub fn new(spurious_prefixes: Vec<String>, repository_schemes: Vec<String>) -> Self {
        Self {
            spurious_prefixes,
            repository_schemes,
        }
    }

    pub fn spurious_prefixes(&self) -> &[String] {
        &self.spurious_prefixes
    }

    pub fn repository_schemes(&self) -> &[String] {
        &self.repository_schemes
    }
}

/// Settings for the git integration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Suffix of the root file of each tracked model.
    model_suffix: String,

    /// Message used when committing repaired models.
    commit_message: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            model_suffix: DEFAULT_MODEL_SUFFIX.to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }
}

impl GitConfig {
    pub fn new(model_suffix: impl Into<String>, commit_message: impl Into<String>) -> Self {
        Self {
            model_suffix: model_suffix.into(),
            commit_message: commit_message.into(),
        }
    }

    pub fn model_suffix(&self) -> &str {
        &self.model_suffix
    }

    pub fn commit_message(&self) -> &str {
        &self.commit_message
    }
}
