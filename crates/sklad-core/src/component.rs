//! Component model: tools, resources and prompts.
//!
//! A [`Component`] is an immutable value record. Transforms never mutate a
//! component in place; every `with_*` method consumes the record and returns a
//! new one, while the callable itself is shared and never rewritten.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::callable::Callable;
use crate::error::{Error, Result};
use crate::signature::Signature;
use crate::task::TaskMode;

/// Annotation hint: the component does not modify its environment.
pub const READ_ONLY_HINT: &str = "readOnlyHint";
/// Annotation hint: the component may perform destructive updates.
pub const DESTRUCTIVE_HINT: &str = "destructiveHint";
/// Annotation hint: repeated calls with the same arguments have no extra effect.
pub const IDEMPOTENT_HINT: &str = "idempotentHint";
/// Annotation hint: the component interacts with an open world of external entities.
pub const OPEN_WORLD_HINT: &str = "openWorldHint";

// ============================================================================
// ComponentKind / ComponentKey
// ============================================================================

/// The kind of a component exposed by a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// An executable tool.
    Tool,
    /// A readable resource, named by URI.
    Resource,
    /// A prompt template.
    Prompt,
}

impl ComponentKind {
    /// All kinds, in listing order.
    pub const ALL: [ComponentKind; 3] = [
        ComponentKind::Tool,
        ComponentKind::Resource,
        ComponentKind::Prompt,
    ];

    /// Lowercase name used in keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Tool => "tool",
            ComponentKind::Resource => "resource",
            ComponentKind::Prompt => "prompt",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tool" => Ok(ComponentKind::Tool),
            "resource" => Ok(ComponentKind::Resource),
            "prompt" => Ok(ComponentKind::Prompt),
            other => Err(Error::config(format!("unknown component kind '{other}'"))),
        }
    }
}

/// Identity of a component: `kind:name`.
///
/// Resources are keyed by URI, so the textual form splits on the first `:`
/// only (`resource:data://secrets`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentKey {
    /// Component kind.
    pub kind: ComponentKind,
    /// Component name (URI for resources).
    pub name: String,
}

impl ComponentKey {
    /// Creates a key.
    pub fn new(kind: ComponentKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Key for a tool.
    pub fn tool(name: impl Into<String>) -> Self {
        Self::new(ComponentKind::Tool, name)
    }

    /// Key for a resource.
    pub fn resource(uri: impl Into<String>) -> Self {
        Self::new(ComponentKind::Resource, uri)
    }

    /// Key for a prompt.
    pub fn prompt(name: impl Into<String>) -> Self {
        Self::new(ComponentKind::Prompt, name)
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

impl FromStr for ComponentKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| Error::config(format!("component key '{s}' must be 'kind:name'")))?;
        if name.is_empty() {
            return Err(Error::config(format!("component key '{s}' has an empty name")));
        }
        Ok(Self::new(kind.parse()?, name))
    }
}

// ============================================================================
// Component
// ============================================================================

/// A named tool, resource or prompt definition.
#[derive(Clone)]
pub struct Component {
    kind: ComponentKind,
    name: String,
    title: Option<String>,
    description: Option<String>,
    tags: BTreeSet<String>,
    enabled: bool,
    annotations: BTreeMap<String, bool>,
    output_schema: Option<Value>,
    timeout: Option<Duration>,
    task_mode: Option<TaskMode>,
    signature: Signature,
    mime_type: Option<String>,
    callable: Callable,
}

impl Component {
    /// Creates an enabled component with an open signature and no metadata.
    pub fn new(kind: ComponentKind, name: impl Into<String>, callable: Callable) -> Self {
        Self {
            kind,
            name: name.into(),
            title: None,
            description: None,
            tags: BTreeSet::new(),
            enabled: true,
            annotations: BTreeMap::new(),
            output_schema: None,
            timeout: None,
            task_mode: None,
            signature: Signature::any(),
            mime_type: None,
            callable,
        }
    }

    /// Creates a tool.
    pub fn tool(name: impl Into<String>, callable: Callable) -> Self {
        Self::new(ComponentKind::Tool, name, callable)
    }

    /// Creates a resource named by `uri`.
    pub fn resource(uri: impl Into<String>, callable: Callable) -> Self {
        Self::new(ComponentKind::Resource, uri, callable)
    }

    /// Creates a prompt.
    pub fn prompt(name: impl Into<String>, callable: Callable) -> Self {
        Self::new(ComponentKind::Prompt, name, callable)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Component kind.
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Exposed name (URI for resources).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `kind:name` identity.
    pub fn key(&self) -> ComponentKey {
        ComponentKey::new(self.kind, self.name.clone())
    }

    /// Optional display title.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Optional description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Tags, sorted.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Returns `true` if the component carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Visibility flag.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Behaviour hints.
    pub fn annotations(&self) -> &BTreeMap<String, bool> {
        &self.annotations
    }

    /// Value of a single hint.
    pub fn annotation(&self, hint: &str) -> Option<bool> {
        self.annotations.get(hint).copied()
    }

    /// Optional JSON schema of the output.
    pub fn output_schema(&self) -> Option<&Value> {
        self.output_schema.as_ref()
    }

    /// Optional execution timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Declared task mode, if any.
    pub fn task_mode(&self) -> Option<TaskMode> {
        self.task_mode
    }

    /// Task mode after applying the server default.
    pub fn effective_task_mode(&self, default: TaskMode) -> TaskMode {
        self.task_mode.unwrap_or(default)
    }

    /// Parameter descriptor.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// MIME type (resources).
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// The callable body.
    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    // ------------------------------------------------------------------------
    // Builders (each returns a new record)
    // ------------------------------------------------------------------------

    /// Replaces the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds one tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Replaces the tag set.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the visibility flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets one behaviour hint.
    pub fn with_annotation(mut self, hint: impl Into<String>, value: bool) -> Self {
        self.annotations.insert(hint.into(), value);
        self
    }

    /// Sets the output schema.
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Sets the execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the task mode.
    pub fn with_task_mode(mut self, mode: TaskMode) -> Self {
        self.task_mode = Some(mode);
        self
    }

    /// Sets the parameter descriptor.
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// Sets the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Wraps the callable in an adapter. The wrapped body keeps running
    /// underneath; adapters only translate what flows in and out of it.
    pub fn map_callable(mut self, f: impl FnOnce(Callable) -> Callable) -> Self {
        self.callable = f(self.callable);
        self
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Validates the definition once, at registration.
    ///
    /// Checks the name, the signature, and that blocking bodies are not
    /// declared background-capable under `default_mode`.
    pub fn validate(&self, default_mode: TaskMode) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_definition(&self.name, "name must not be empty"));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(Error::invalid_definition(
                &self.name,
                "name must not contain whitespace",
            ));
        }
        self.signature
            .validate()
            .map_err(|message| Error::invalid_definition(&self.name, message))?;

        let mode = self.effective_task_mode(default_mode);
        if self.callable.is_blocking() && mode.allows_background() {
            return Err(Error::ModeViolation {
                component: self.key().to_string(),
                mode,
                requested: "a blocking body in the background".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("enabled", &self.enabled)
            .field("task_mode", &self.task_mode)
            .field("blocking", &self.callable.is_blocking())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
