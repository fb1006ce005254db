//! Filesystem-discovered components.
//!
//! A [`FilesystemProvider`] walks a root directory for `*.toml` manifests.
//! Each manifest declares any number of components:
//!
//! ```toml
//! [[tool]]
//! name = "greet"
//! handler = "greet"
//! description = "Greet someone by name"
//! tags = ["public"]
//! params = [{ name = "who", type = "string", required = true }]
//!
//! [[resource]]
//! uri = "data://motd"
//! handler = "motd"
//! mime_type = "text/plain"
//!
//! [[prompt]]
//! name = "welcome"
//! handler = "welcome"
//! ```
//!
//! The body of each component is looked up by `handler` in a
//! [`HandlerCatalog`]. Package markers (`mod.toml`), cache directories,
//! hidden entries and private definitions (names starting with `_`) are
//! skipped. A manifest that fails to parse, or a definition whose handler
//! is unknown, is reported as a discovery error and skipped; the rest of
//! the tree is still loaded. The directory is rescanned on every listing;
//! a failure is logged as a warning the first time it shows up and at debug
//! level while it persists.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use sklad_core::{
    Callable, Component, ComponentKind, Error, Param, Result, Signature, TaskMode,
};
use walkdir::{DirEntry, WalkDir};

use super::Provider;

/// Manifest files that only mark a package and declare nothing.
const PACKAGE_MARKERS: &[&str] = &["mod.toml"];

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["__pycache__", ".cache", "target", "node_modules"];

// ============================================================================
// HandlerCatalog
// ============================================================================

/// Named callables that manifests refer to by `handler`.
#[derive(Clone, Default)]
pub struct HandlerCatalog {
    handlers: HashMap<String, Callable>,
}

impl HandlerCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler, replacing any previous one with the same name.
    pub fn with(mut self, name: impl Into<String>, callable: Callable) -> Self {
        self.insert(name, callable);
        self
    }

    /// Adds a handler in place.
    pub fn insert(&mut self, name: impl Into<String>, callable: Callable) {
        self.handlers.insert(name.into(), callable);
    }

    /// Looks up a handler.
    pub fn get(&self, name: &str) -> Option<&Callable> {
        self.handlers.get(name)
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerCatalog").field("handlers", &names).finish()
    }
}

// ============================================================================
// Manifest format
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    tool: Vec<Definition>,
    #[serde(default)]
    resource: Vec<Definition>,
    #[serde(default)]
    prompt: Vec<Definition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Definition {
    #[serde(alias = "uri")]
    name: String,
    handler: String,
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    tags: BTreeSet<String>,
    enabled: Option<bool>,
    #[serde(default)]
    annotations: BTreeMap<String, bool>,
    timeout_ms: Option<u64>,
    task_mode: Option<TaskMode>,
    params: Option<Vec<Param>>,
    mime_type: Option<String>,
}

impl Definition {
    fn into_component(self, kind: ComponentKind, callable: Callable) -> Component {
        let mut component = Component::new(kind, self.name, callable)
            .with_tags(self.tags)
            .with_enabled(self.enabled.unwrap_or(true));
        if let Some(title) = self.title {
            component = component.with_title(title);
        }
        if let Some(description) = self.description {
            component = component.with_description(description);
        }
        for (hint, value) in self.annotations {
            component = component.with_annotation(hint, value);
        }
        if let Some(millis) = self.timeout_ms {
            component = component.with_timeout(Duration::from_millis(millis));
        }
        if let Some(mode) = self.task_mode {
            component = component.with_task_mode(mode);
        }
        if let Some(params) = self.params {
            component = component.with_signature(Signature::new(params));
        }
        if let Some(mime_type) = self.mime_type {
            component = component.with_mime_type(mime_type);
        }
        component
    }
}

// ============================================================================
// FilesystemProvider
// ============================================================================

/// Result of one scan.
#[derive(Debug, Default)]
pub struct Discovered {
    /// Components that loaded, in directory order.
    pub components: Vec<Component>,
    /// Per-file or per-definition failures.
    pub errors: Vec<Error>,
}

/// Provider that discovers components from TOML manifests.
#[derive(Debug)]
pub struct FilesystemProvider {
    name: String,
    root: PathBuf,
    catalog: HandlerCatalog,
    default_task_mode: TaskMode,
    reported: Mutex<BTreeSet<String>>,
}

impl FilesystemProvider {
    /// Creates a provider scanning `root`.
    pub fn new(root: impl Into<PathBuf>, catalog: HandlerCatalog) -> Self {
        let root = root.into();
        Self {
            name: format!("filesystem:{}", root.display()),
            root,
            catalog,
            default_task_mode: TaskMode::default(),
            reported: Mutex::new(BTreeSet::new()),
        }
    }

    /// Sets the task mode assumed for definitions that declare none.
    pub fn with_default_task_mode(mut self, mode: TaskMode) -> Self {
        self.default_task_mode = mode;
        self
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scans the root directory once.
    pub fn discover(&self) -> Discovered {
        let mut discovered = Discovered::default();

        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(&self.root).to_path_buf();
                    discovered.errors.push(Error::discovery(path, e.to_string()));
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_manifest(entry.path()) {
                continue;
            }
            self.load_manifest(entry.path(), &mut discovered);
        }

        tracing::debug!(
            root = %self.root.display(),
            components = discovered.components.len(),
            errors = discovered.errors.len(),
            "filesystem scan complete"
        );
        discovered
    }

    /// Logs scan failures, returning how many were not already reported by
    /// the previous scan.
    fn report(&self, errors: &[Error]) -> usize {
        let current: BTreeSet<String> = errors.iter().map(ToString::to_string).collect();
        let mut reported = self.reported.lock().unwrap_or_else(PoisonError::into_inner);
        let mut fresh = 0;
        for error in &current {
            if reported.contains(error) {
                tracing::debug!(provider = %self.name, %error, "skipping component");
            } else {
                tracing::warn!(provider = %self.name, %error, "skipping component");
                fresh += 1;
            }
        }
        *reported = current;
        fresh
    }

    fn load_manifest(&self, path: &Path, discovered: &mut Discovered) {
        let manifest = match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| toml::from_str::<Manifest>(&content).map_err(|e| e.to_string()))
        {
            Ok(manifest) => manifest,
            Err(message) => {
                discovered.errors.push(Error::discovery(path, message));
                return;
            }
        };

        let sections = [
            (ComponentKind::Tool, manifest.tool),
            (ComponentKind::Resource, manifest.resource),
            (ComponentKind::Prompt, manifest.prompt),
        ];
        for (kind, definitions) in sections {
            for definition in definitions {
                if definition.name.starts_with('_') {
                    tracing::debug!(path = %path.display(), name = %definition.name, "skipping private definition");
                    continue;
                }
                let Some(callable) = self.catalog.get(&definition.handler).cloned() else {
                    discovered.errors.push(Error::discovery(
                        path,
                        format!(
                            "{kind} '{}' refers to unknown handler '{}'",
                            definition.name, definition.handler
                        ),
                    ));
                    continue;
                };
                let component = definition.into_component(kind, callable);
                match component.validate(self.default_task_mode) {
                    Ok(()) => discovered.components.push(component),
                    Err(e) => discovered.errors.push(Error::discovery(path, e.to_string())),
                }
            }
        }
    }
}

impl Provider for FilesystemProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self, kind: ComponentKind) -> Result<Vec<Component>> {
        let Discovered { components, errors } = self.discover();
        self.report(&errors);
        Ok(components.into_iter().filter(|c| c.kind() == kind).collect())
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    entry.file_type().is_dir() && SKIPPED_DIRS.contains(&&*name)
}

fn is_manifest(path: &Path) -> bool {
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let is_marker = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| PACKAGE_MARKERS.contains(&name));
    is_toml && !is_marker
}

// ============================================================================
// Tests
// ============================================================================
