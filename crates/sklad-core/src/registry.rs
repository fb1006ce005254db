//! Component registry owned by a single provider.
//!
//! Registration is the only mutator; lookups never mutate. Listing preserves
//! registration order, and a `replace`/`warn` overwrite keeps the original
//! position of the name it replaces.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentKey, ComponentKind};
use crate::error::{Error, Result};
use crate::task::TaskMode;

/// What happens when a registration collides with an existing name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Reject the registration with [`Error::DuplicateName`].
    #[default]
    Error,
    /// Overwrite and log a warning.
    Warn,
    /// Overwrite silently.
    Replace,
    /// Keep the existing component.
    Ignore,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::Error => write!(f, "error"),
            DuplicatePolicy::Warn => write!(f, "warn"),
            DuplicatePolicy::Replace => write!(f, "replace"),
            DuplicatePolicy::Ignore => write!(f, "ignore"),
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "error" => Ok(DuplicatePolicy::Error),
            "warn" => Ok(DuplicatePolicy::Warn),
            "replace" => Ok(DuplicatePolicy::Replace),
            "ignore" => Ok(DuplicatePolicy::Ignore),
            other => Err(Error::config(format!("unknown duplicate policy '{other}'"))),
        }
    }
}

/// Outcome of a successful [`ComponentRegistry::register`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// New name.
    Added,
    /// Existing component overwritten.
    Replaced,
    /// Existing component kept, new one dropped.
    Ignored,
}

/// Stores component definitions keyed by `(kind, name)`.
#[derive(Debug, Default, Clone)]
pub struct ComponentRegistry {
    policy: DuplicatePolicy,
    default_task_mode: TaskMode,
    entries: Vec<Component>,
    index: HashMap<ComponentKey, usize>,
}

impl ComponentRegistry {
    /// Creates an empty registry with the `error` duplicate policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the duplicate policy.
    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the task mode assumed for components that declare none.
    pub fn with_default_task_mode(mut self, mode: TaskMode) -> Self {
        self.default_task_mode = mode;
        self
    }

    /// Current duplicate policy.
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Task mode assumed for components that declare none.
    pub fn default_task_mode(&self) -> TaskMode {
        self.default_task_mode
    }

    /// Validates and stores a component.
    pub fn register(&mut self, component: Component) -> Result<Registration> {
        component.validate(self.default_task_mode)?;
        let key = component.key();

        let Some(&position) = self.index.get(&key) else {
            self.index.insert(key, self.entries.len());
            self.entries.push(component);
            return Ok(Registration::Added);
        };

        match self.policy {
            DuplicatePolicy::Error => Err(Error::DuplicateName {
                kind: key.kind,
                name: key.name,
            }),
            DuplicatePolicy::Warn => {
                tracing::warn!(component = %key, "replacing duplicate component");
                self.entries[position] = component;
                Ok(Registration::Replaced)
            }
            DuplicatePolicy::Replace => {
                self.entries[position] = component;
                Ok(Registration::Replaced)
            }
            DuplicatePolicy::Ignore => {
                tracing::debug!(component = %key, "ignoring duplicate component");
                Ok(Registration::Ignored)
            }
        }
    }

    /// Removes a component.
    pub fn remove(&mut self, kind: ComponentKind, name: &str) -> Result<Component> {
        let key = ComponentKey::new(kind, name);
        let position = self
            .index
            .remove(&key)
            .ok_or_else(|| Error::not_found(kind, name))?;
        let removed = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Ok(removed)
    }

    /// Looks up a component by kind and name.
    pub fn lookup(&self, kind: ComponentKind, name: &str) -> Result<&Component> {
        self.index
            .get(&ComponentKey::new(kind, name))
            .map(|&position| &self.entries[position])
            .ok_or_else(|| Error::not_found(kind, name))
    }

    /// Lists components of `kind` in registration order.
    pub fn list(&self, kind: ComponentKind) -> Vec<Component> {
        self.entries
            .iter()
            .filter(|c| c.kind() == kind)
            .cloned()
            .collect()
    }

    /// Number of components of every kind.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
