//! Component transforms.
//!
//! A [`Transform`] maps one component to a new component, or to `None` to
//! suppress it. Transforms never mutate a component in place and never
//! rewrite its callable; argument renames wrap the callable in an adapter.
//!
//! A [`Pipeline`] applies transforms left to right in registration order.
//! Provider-level pipelines run while a provider materializes its list;
//! server-level pipelines run afterwards over the already-namespaced list.

pub mod namespace;
pub mod rewrite;
pub mod visibility;

use std::fmt;
use std::sync::Arc;

use sklad_core::Component;

pub use namespace::Namespace;
pub use rewrite::{ArgRewrite, Rewrite, RewriteConfig};
pub use visibility::{Selector, Visibility, VisibilityAction};

/// A stateless mapping over components.
pub trait Transform: Send + Sync {
    /// Short description used in logs.
    fn describe(&self) -> String;

    /// Produces the transformed component, or `None` to suppress it.
    fn apply(&self, component: Component) -> Option<Component>;
}

impl<T: Transform + ?Sized> Transform for Arc<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn apply(&self, component: Component) -> Option<Component> {
        (**self).apply(component)
    }
}

/// Ordered transforms, applied left to right.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Transform>>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage, builder style.
    pub fn with<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.stages.push(Arc::new(transform));
        self
    }

    /// Appends a stage.
    pub fn push(&mut self, transform: Arc<dyn Transform>) {
        self.stages.push(transform);
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs one component through every stage. Stops at the first `None`.
    pub fn apply(&self, component: Component) -> Option<Component> {
        self.stages
            .iter()
            .try_fold(component, |component, stage| stage.apply(component))
    }

    /// Runs a list through the pipeline, dropping suppressed components.
    pub fn apply_all(&self, components: Vec<Component>) -> Vec<Component> {
        if self.stages.is_empty() {
            return components;
        }
        components
            .into_iter()
            .filter_map(|component| self.apply(component))
            .collect()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|stage| stage.describe()))
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
