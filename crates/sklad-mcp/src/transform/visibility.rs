//! Enable and disable components by key or tag.
//!
//! Visibility transforms only flip the `enabled` flag; the server drops
//! disabled components at the end of the pipeline, so later stages can
//! still re-enable them.

use std::collections::BTreeSet;

use sklad_core::{Component, ComponentKey};

use super::Transform;

/// Matches components by exact key or by any shared tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    keys: BTreeSet<ComponentKey>,
    tags: BTreeSet<String>,
}

impl Selector {
    /// Matches nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector over a tag set.
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: BTreeSet::new(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Selector over a key set.
    pub fn keys<I: IntoIterator<Item = ComponentKey>>(keys: I) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            tags: BTreeSet::new(),
        }
    }

    /// Adds a key.
    pub fn key(mut self, key: ComponentKey) -> Self {
        self.keys.insert(key);
        self
    }

    /// Adds a tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Returns `true` if the component's key or any of its tags is selected.
    pub fn matches(&self, component: &Component) -> bool {
        self.keys.contains(&component.key())
            || component.tags().iter().any(|tag| self.tags.contains(tag))
    }
}

/// What a [`Visibility`] transform does with matching components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityAction {
    /// Disable matches; leave the rest alone.
    Disable,
    /// Enable matches; leave the rest alone.
    Enable,
    /// Allowlist: enable matches and disable everything else.
    Only,
}

/// Flips the `enabled` flag of selected components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    action: VisibilityAction,
    selector: Selector,
}

impl Visibility {
    /// Disables selected components.
    pub fn disable(selector: Selector) -> Self {
        Self {
            action: VisibilityAction::Disable,
            selector,
        }
    }

    /// Enables selected components.
    pub fn enable(selector: Selector) -> Self {
        Self {
            action: VisibilityAction::Enable,
            selector,
        }
    }

    /// Enables selected components and disables all others.
    pub fn only(selector: Selector) -> Self {
        Self {
            action: VisibilityAction::Only,
            selector,
        }
    }

    /// The action.
    pub fn action(&self) -> VisibilityAction {
        self.action
    }
}

impl Transform for Visibility {
    fn describe(&self) -> String {
        format!("visibility {:?}", self.action).to_lowercase()
    }

    fn apply(&self, component: Component) -> Option<Component> {
        let matched = self.selector.matches(&component);
        let component = match self.action {
            VisibilityAction::Disable if matched => component.with_enabled(false),
            VisibilityAction::Enable if matched => component.with_enabled(true),
            VisibilityAction::Only => component.with_enabled(matched),
            _ => component,
        };
        Some(component)
    }
}
