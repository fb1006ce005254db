//! Locally registered components.

use std::sync::{PoisonError, RwLock};

use sklad_core::{
    Component, ComponentKind, ComponentRegistry, DuplicatePolicy, Registration, Result, TaskMode,
};

use super::Provider;

/// Provider backed by a [`ComponentRegistry`].
///
/// Shareable across servers behind an `Arc`; every server that holds it
/// sees the same registrations.
pub struct LocalProvider {
    name: String,
    registry: RwLock<ComponentRegistry>,
}

impl LocalProvider {
    /// Creates an empty provider with the `error` duplicate policy.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_registry(name, ComponentRegistry::new())
    }

    /// Creates a provider around an existing registry.
    pub fn with_registry(name: impl Into<String>, registry: ComponentRegistry) -> Self {
        Self {
            name: name.into(),
            registry: RwLock::new(registry),
        }
    }

    /// Creates an empty provider with the given policies.
    pub fn with_policy(
        name: impl Into<String>,
        policy: DuplicatePolicy,
        default_task_mode: TaskMode,
    ) -> Self {
        Self::with_registry(
            name,
            ComponentRegistry::new()
                .with_policy(policy)
                .with_default_task_mode(default_task_mode),
        )
    }

    /// Registers a component.
    pub fn add(&self, component: Component) -> Result<Registration> {
        let key = component.key();
        let outcome = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(component)?;
        tracing::debug!(provider = %self.name, component = %key, ?outcome, "registered component");
        Ok(outcome)
    }

    /// Removes a component.
    pub fn remove(&self, kind: ComponentKind, name: &str) -> Result<Component> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(kind, name)
    }

    /// Number of registered components of every kind.
    pub fn len(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Provider for LocalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self, kind: ComponentKind) -> Result<Vec<Component>> {
        Ok(self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .list(kind))
    }

    fn get(&self, kind: ComponentKind, name: &str) -> Result<Option<Component>> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        Ok(registry.lookup(kind, name).ok().cloned())
    }
}

impl std::fmt::Debug for LocalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProvider")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}
