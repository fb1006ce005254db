//! Skill directories exposed as resources.
//!
//! A skill is an immediate subdirectory of a root that contains a main
//! instruction file (`SKILL.md` by default). The directory name is the skill
//! id; the main file and every supporting file become resources named
//! `skill://<id>/<relative path>`. Files are read when the resource is
//! called, and the roots are rescanned on every listing.

use std::path::{Path, PathBuf};

use serde_json::Value;
use sklad_core::config::DEFAULT_SKILL_MAIN_FILE;
use sklad_core::{Callable, Component, ComponentKind, Result, ToolError};
use walkdir::WalkDir;

use super::Provider;

/// URI scheme of skill resources.
pub const SKILL_SCHEME: &str = "skill";

/// Tag carried by every skill resource.
pub const SKILL_TAG: &str = "skill";

/// Provider exposing skill directories.
#[derive(Debug, Clone)]
pub struct SkillsProvider {
    name: String,
    roots: Vec<PathBuf>,
    main_file: String,
}

impl SkillsProvider {
    /// Creates a provider over one root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            name: "skills".to_string(),
            roots: vec![root.into()],
            main_file: DEFAULT_SKILL_MAIN_FILE.to_string(),
        }
    }

    /// Adds another root. Earlier roots win on duplicate skill ids.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Sets the main instruction file name.
    pub fn with_main_file(mut self, main_file: impl Into<String>) -> Self {
        self.main_file = main_file.into();
        self
    }

    /// Ids of the skills currently on disk, in root then name order.
    pub fn skill_ids(&self) -> Vec<String> {
        self.skill_dirs().into_iter().map(|(id, _)| id).collect()
    }

    fn skill_dirs(&self) -> Vec<(String, PathBuf)> {
        let mut skills: Vec<(String, PathBuf)> = Vec::new();
        for root in &self.roots {
            let entries = match std::fs::read_dir(root) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "cannot read skills root");
                    continue;
                }
            };
            let mut found: Vec<(String, PathBuf)> = entries
                .filter_map(|entry| readable(root, entry))
                .map(|entry| entry.path())
                .filter(|path| path.is_dir() && path.join(&self.main_file).is_file())
                .filter_map(|path| {
                    let id = path.file_name()?.to_str()?.to_string();
                    (!id.starts_with('.')).then_some((id, path))
                })
                .collect();
            found.sort();
            for (id, path) in found {
                if skills.iter().any(|(existing, _)| *existing == id) {
                    tracing::debug!(skill = %id, root = %root.display(), "skill shadowed by earlier root");
                    continue;
                }
                skills.push((id, path));
            }
        }
        skills
    }

    fn skill_resources(&self, id: &str, dir: &Path) -> Vec<Component> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|entry| readable(dir, entry))
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();

        // Main file first, supporting files after.
        let main = dir.join(&self.main_file);
        files.sort_by_key(|path| *path != main);

        files
            .into_iter()
            .filter_map(|path| {
                let relative = path.strip_prefix(dir).ok()?;
                let relative = relative
                    .components()
                    .map(|part| part.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let is_main = path == main;
                let description = if is_main {
                    format!("Instructions for skill '{id}'")
                } else {
                    format!("Supporting file '{relative}' of skill '{id}'")
                };
                Some(
                    Component::resource(format!("{SKILL_SCHEME}://{id}/{relative}"), read_file(path.clone()))
                        .with_description(description)
                        .with_tag(SKILL_TAG)
                        .with_mime_type(mime_type(&path)),
                )
            })
            .collect()
    }
}

impl Provider for SkillsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self, kind: ComponentKind) -> Result<Vec<Component>> {
        if kind != ComponentKind::Resource {
            return Ok(Vec::new());
        }
        Ok(self
            .skill_dirs()
            .iter()
            .flat_map(|(id, dir)| self.skill_resources(id, dir))
            .collect())
    }
}

/// Logs and drops a directory entry that could not be read.
fn readable<T, E: std::fmt::Display>(dir: &Path, entry: std::result::Result<T, E>) -> Option<T> {
    match entry {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable skills entry");
            None
        }
    }
}

fn read_file(path: PathBuf) -> Callable {
    Callable::from_async(move |_args, _ctx| {
        let path = path.clone();
        async move {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| ToolError::internal(format!("cannot read {}: {e}", path.display())))?;
            Ok(Value::String(content))
        }
    })
}

fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("md") => "text/markdown",
        Some("json") => "application/json",
        Some("toml") => "application/toml",
        Some("yaml" | "yml") => "application/yaml",
        Some("py") => "text/x-python",
        Some("rs") => "text/x-rust",
        Some("sh") => "text/x-shellscript",
        _ => "text/plain",
    }
}
