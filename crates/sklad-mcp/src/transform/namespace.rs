//! Namespace prefixing.
//!
//! Tools and prompts become `ns.name`. Resources named by a
//! `scheme://path` URI become `scheme://ns/path`; other resource names
//! become `ns/name`. The transform is idempotent: a name that already
//! carries the prefix is left as is.

use sklad_core::{Component, ComponentKind};

use super::Transform;

/// Separator between namespace and name for tools and prompts.
pub const NAMESPACE_SEPARATOR: char = '.';

/// Prefixes component names with a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    /// Creates a namespace transform.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The namespace.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Namespaced form of `name` for a component of `kind`.
    pub fn qualify(&self, kind: ComponentKind, name: &str) -> String {
        if self.prefix.is_empty() {
            return name.to_string();
        }
        match kind {
            ComponentKind::Tool | ComponentKind::Prompt => {
                prefixed(&self.prefix, NAMESPACE_SEPARATOR, name)
            }
            ComponentKind::Resource => match name.split_once("://") {
                Some((scheme, path)) => {
                    format!("{scheme}://{}", prefixed(&self.prefix, '/', path))
                }
                None => prefixed(&self.prefix, '/', name),
            },
        }
    }
}

fn prefixed(prefix: &str, separator: char, name: &str) -> String {
    let already = name
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with(separator));
    if already {
        name.to_string()
    } else {
        format!("{prefix}{separator}{name}")
    }
}

impl Transform for Namespace {
    fn describe(&self) -> String {
        format!("namespace {}", self.prefix)
    }

    fn apply(&self, component: Component) -> Option<Component> {
        let name = self.qualify(component.kind(), component.name());
        Some(component.with_name(name))
    }
}
