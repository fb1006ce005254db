//! Ordered provider chain.
//!
//! The chain combines several providers into one source, like a composite
//! registry: listing concatenates every provider's components in order, and
//! resolution returns the first provider's match. A name exposed by an
//! earlier provider shadows the same name from later ones, so a component is
//! resolvable exactly when it appears in the listing.
//!
//! Both operations take the server-level [`Pipeline`] and expose only
//! enabled components. Resolution walks providers one at a time and stops
//! at the first match, so a failing provider only affects the names it
//! would have answered for.

use std::collections::HashSet;
use std::sync::Arc;

use sklad_core::{Component, ComponentKind, Error, Result};

use crate::provider::Provider;
use crate::transform::Pipeline;

/// Where a chain entry came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Added with `add_provider`, or the server's local provider.
    Provider,
    /// A mounted child server, with its namespace.
    Mount(Option<String>),
}

#[derive(Clone)]
struct Entry {
    provider: Arc<dyn Provider>,
    origin: Origin,
}

/// Providers in resolution order.
#[derive(Clone, Default)]
pub struct ProviderChain {
    entries: Vec<Entry>,
}

impl ProviderChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider.
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, provider: Arc<dyn Provider>) -> Self {
        self.push(provider);
        self
    }

    /// Appends a provider in place.
    pub fn push(&mut self, provider: Arc<dyn Provider>) {
        self.entries.push(Entry {
            provider,
            origin: Origin::Provider,
        });
    }

    /// Inserts a mounted server.
    ///
    /// The mount goes before any earlier mount with the same namespace so
    /// the most recent one shadows it; otherwise it is appended.
    pub fn push_mount(&mut self, provider: Arc<dyn Provider>, namespace: Option<String>) {
        let origin = Origin::Mount(namespace);
        let position = self
            .entries
            .iter()
            .position(|entry| entry.origin == origin)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, Entry { provider, origin });
    }

    /// Number of providers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the chain has no providers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Provider names in order.
    pub fn provider_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.provider.name().to_string())
            .collect()
    }

    /// Every enabled component of `kind` after `transforms`, de-duplicated
    /// by name. The first occurrence of a name wins.
    pub fn list(&self, kind: ComponentKind, transforms: &Pipeline) -> Result<Vec<Component>> {
        let mut raw = HashSet::new();
        let mut exposed = HashSet::new();
        let mut components = Vec::new();
        for entry in &self.entries {
            for component in entry.expose(kind, transforms, &mut raw)? {
                if exposed.insert(component.name().to_string()) {
                    components.push(component);
                }
            }
        }
        Ok(components)
    }

    /// The component [`ProviderChain::list`] exposes as `name`.
    ///
    /// Providers after the one that answers are never queried.
    pub fn resolve(
        &self,
        kind: ComponentKind,
        name: &str,
        transforms: &Pipeline,
    ) -> Result<Component> {
        let mut raw = HashSet::new();
        for entry in &self.entries {
            let found = entry
                .expose(kind, transforms, &mut raw)?
                .into_iter()
                .find(|component| component.name() == name);
            if let Some(component) = found {
                return Ok(component);
            }
        }
        Err(Error::not_found(kind, name))
    }
}

impl Entry {
    /// This provider's enabled components after `transforms`, minus names an
    /// earlier provider already listed.
    fn expose(
        &self,
        kind: ComponentKind,
        transforms: &Pipeline,
        raw: &mut HashSet<String>,
    ) -> Result<Vec<Component>> {
        let mut fresh = Vec::new();
        for component in self.provider.list(kind)? {
            if raw.insert(component.name().to_string()) {
                fresh.push(component);
            } else {
                tracing::debug!(
                    provider = %self.provider.name(),
                    component = %component.key(),
                    "component shadowed by earlier provider"
                );
            }
        }
        Ok(transforms
            .apply_all(fresh)
            .into_iter()
            .filter(|component| component.is_enabled())
            .collect())
    }
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.provider_names()).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
