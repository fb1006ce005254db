//! Server configuration loaded from TOML.
//!
//! # Example
//!
//! ```toml
//! name = "sklad"
//! on_duplicate = "warn"
//! mask_error_details = true
//! default_task_mode = "optional"
//! max_concurrent_tasks = 4
//!
//! [[filesystem]]
//! root = "components"
//!
//! [[skills]]
//! root = "~/.claude/skills"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registry::DuplicatePolicy;
use crate::task::TaskMode;

/// Default number of background tasks allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 8;

/// Default retention for finished tasks, in seconds.
pub const DEFAULT_TASK_RETENTION_SECS: u64 = 3600;

/// Default main instruction file of a skill directory.
pub const DEFAULT_SKILL_MAIN_FILE: &str = "SKILL.md";

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name, reported by the health tool.
    pub name: String,
    /// Server version, reported by the health tool.
    pub version: String,
    /// Policy for duplicate registrations on the local provider.
    pub on_duplicate: DuplicatePolicy,
    /// Replace internal error details with a generic message.
    pub mask_error_details: bool,
    /// Task mode for components that declare none.
    pub default_task_mode: TaskMode,
    /// Background task concurrency limit.
    pub max_concurrent_tasks: usize,
    /// How long finished tasks stay queryable.
    pub task_retention_secs: u64,
    /// Directories scanned for component manifests.
    pub filesystem: Vec<FilesystemSource>,
    /// Directories scanned for skills.
    pub skills: Vec<SkillsSource>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "sklad".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            on_duplicate: DuplicatePolicy::default(),
            mask_error_details: false,
            default_task_mode: TaskMode::default(),
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            task_retention_secs: DEFAULT_TASK_RETENTION_SECS,
            filesystem: Vec::new(),
            skills: Vec::new(),
        }
    }
}

/// A directory of component manifests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemSource {
    /// Root directory; `~` is expanded.
    pub root: PathBuf,
}

/// A directory of skills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillsSource {
    /// Root directory; `~` is expanded.
    pub root: PathBuf,
    /// Name of the main instruction file.
    #[serde(default = "default_main_file")]
    pub main_file: String,
}

fn default_main_file() -> String {
    DEFAULT_SKILL_MAIN_FILE.to_string()
}

impl ServerConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), name = %config.name, "loaded configuration");
        Ok(config)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: ServerConfig = toml::from_str(content)?;
        for source in &mut config.filesystem {
            source.root = expand_tilde(&source.root);
        }
        for source in &mut config.skills {
            source.root = expand_tilde(&source.root);
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("name must not be empty"));
        }
        if self.max_concurrent_tasks == 0 {
            return Err(Error::config("max_concurrent_tasks must be at least 1"));
        }
        if let Some(source) = self.skills.iter().find(|s| s.main_file.trim().is_empty()) {
            return Err(Error::config(format!(
                "skills source {} has an empty main_file",
                source.root.display()
            )));
        }
        Ok(())
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(raw) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
        None => path.to_path_buf(),
    }
}
