//! Rename and describe components.
//!
//! A [`Rewrite`] holds one [`RewriteConfig`] per target key. Fields left as
//! `None` keep the component's value. Argument rewrites change the
//! advertised signature and wrap the callable in an adapter that maps the
//! new argument names back to the ones the body expects.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sklad_core::{Component, ComponentKey};

use super::Transform;

/// Rename or redescribe one argument.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgRewrite {
    /// New argument name.
    pub name: Option<String>,
    /// New argument description.
    pub description: Option<String>,
}

impl ArgRewrite {
    /// Renames the argument.
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: None,
        }
    }

    /// Sets the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Field overrides for one component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// New exposed name.
    pub name: Option<String>,
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Replacement tag set.
    pub tags: Option<BTreeSet<String>>,
    /// Tags added after any replacement.
    pub add_tags: BTreeSet<String>,
    /// Hints merged over the existing annotations.
    pub annotations: BTreeMap<String, bool>,
    /// New visibility flag.
    pub enabled: Option<bool>,
    /// Per-argument rewrites keyed by the current argument name.
    pub arguments: BTreeMap<String, ArgRewrite>,
}

impl RewriteConfig {
    /// Empty config: every field kept.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the exposed name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replaces the tag set.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Adds one tag.
    pub fn add_tag(mut self, tag: impl Into<String>) -> Self {
        self.add_tags.insert(tag.into());
        self
    }

    /// Sets one annotation hint.
    pub fn annotation(mut self, hint: impl Into<String>, value: bool) -> Self {
        self.annotations.insert(hint.into(), value);
        self
    }

    /// Sets the visibility flag.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Rewrites one argument.
    pub fn argument(mut self, current: impl Into<String>, rewrite: ArgRewrite) -> Self {
        self.arguments.insert(current.into(), rewrite);
        self
    }

    /// Applies the overrides to a component.
    pub fn apply_to(&self, component: Component) -> Component {
        let mut component = component;
        if let Some(name) = &self.name {
            component = component.with_name(name.clone());
        }
        if let Some(title) = &self.title {
            component = component.with_title(title.clone());
        }
        if let Some(description) = &self.description {
            component = component.with_description(description.clone());
        }
        if let Some(tags) = &self.tags {
            component = component.with_tags(tags.iter().cloned());
        }
        for tag in &self.add_tags {
            component = component.with_tag(tag.clone());
        }
        for (hint, value) in &self.annotations {
            component = component.with_annotation(hint.clone(), *value);
        }
        if let Some(enabled) = self.enabled {
            component = component.with_enabled(enabled);
        }
        if !self.arguments.is_empty() {
            component = rewrite_arguments(component, &self.arguments);
        }
        component
    }
}

fn rewrite_arguments(component: Component, arguments: &BTreeMap<String, ArgRewrite>) -> Component {
    let mut signature = component.signature().clone();
    // Exposed name -> name the body expects.
    let mut renames: HashMap<String, String> = HashMap::new();

    for (current, rewrite) in arguments {
        let to = rewrite.name.as_deref().unwrap_or(current);
        signature = signature.rename_param(current, to, rewrite.description.as_deref());
        if to != current {
            renames.insert(to.to_string(), current.clone());
        }
    }

    let component = component.with_signature(signature);
    if renames.is_empty() {
        return component;
    }
    component.map_callable(move |callable| {
        callable.map_args(move |args| match args {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| match renames.get(&key) {
                        Some(original) => (original.clone(), value),
                        None => (key, value),
                    })
                    .collect(),
            ),
            other => other,
        })
    })
}

/// Applies [`RewriteConfig`]s to the components they target.
#[derive(Debug, Clone, Default)]
pub struct Rewrite {
    targets: HashMap<ComponentKey, RewriteConfig>,
}

impl Rewrite {
    /// Creates a rewrite with no targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a target. A later config for the same key replaces the earlier one.
    pub fn target(mut self, key: ComponentKey, config: RewriteConfig) -> Self {
        self.targets.insert(key, config);
        self
    }
}

impl Transform for Rewrite {
    fn describe(&self) -> String {
        let mut keys: Vec<String> = self.targets.keys().map(ToString::to_string).collect();
        keys.sort();
        format!("rewrite [{}]", keys.join(", "))
    }

    fn apply(&self, component: Component) -> Option<Component> {
        match self.targets.get(&component.key()) {
            Some(config) => Some(config.apply_to(component)),
            None => Some(component),
        }
    }
}
