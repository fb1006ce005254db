//! Component providers.
//!
//! A [`Provider`] is a source of components. The server consults its
//! providers in order through the [`ProviderChain`](crate::chain::ProviderChain);
//! each provider answers `list` with its components as they should be
//! exposed, after its own provider-level transforms.
//!
//! Variants:
//! - [`LocalProvider`]: components registered by builder calls
//! - [`MountedProvider`]: a child server under an optional namespace
//! - [`FilesystemProvider`]: TOML manifests discovered under a directory
//! - [`SkillsProvider`]: skill directories exposed as resources
//! - [`FnProvider`]: custom sources backed by a closure
//! - [`TransformedProvider`]: any provider plus provider-level transforms
//! - [`AsTools`]: any provider plus tools that read its resources or prompts

pub mod as_tools;
pub mod custom;
pub mod filesystem;
pub mod local;
pub mod mounted;
pub mod skills;

use std::sync::Arc;

use sklad_core::{Component, ComponentKind, Result};

use crate::transform::{Pipeline, Transform};

pub use as_tools::AsTools;
pub use custom::FnProvider;
pub use filesystem::{FilesystemProvider, HandlerCatalog};
pub use local::LocalProvider;
pub use mounted::MountedProvider;
pub use skills::SkillsProvider;

/// A source of components.
///
/// Implementations must be cheap to list repeatedly; dynamic providers
/// rescan on every call. Errors other than `NotFound` propagate to the
/// caller (custom providers should report `ProviderUnavailable`).
pub trait Provider: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Components of `kind`, in provider order.
    fn list(&self, kind: ComponentKind) -> Result<Vec<Component>>;

    /// Looks up one component by its exposed name.
    fn get(&self, kind: ComponentKind, name: &str) -> Result<Option<Component>> {
        Ok(self.list(kind)?.into_iter().find(|c| c.name() == name))
    }

    /// All tools.
    fn list_tools(&self) -> Result<Vec<Component>> {
        self.list(ComponentKind::Tool)
    }

    /// All resources.
    fn list_resources(&self) -> Result<Vec<Component>> {
        self.list(ComponentKind::Resource)
    }

    /// All prompts.
    fn list_prompts(&self) -> Result<Vec<Component>> {
        self.list(ComponentKind::Prompt)
    }
}

impl<P: Provider + ?Sized> Provider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn list(&self, kind: ComponentKind) -> Result<Vec<Component>> {
        (**self).list(kind)
    }

    fn get(&self, kind: ComponentKind, name: &str) -> Result<Option<Component>> {
        (**self).get(kind, name)
    }
}

// ============================================================================
// TransformedProvider
// ============================================================================

/// Applies provider-level transforms to another provider's components.
///
/// Transforms run as the inner provider materializes its list, before any
/// server-level transform sees the result.
pub struct TransformedProvider {
    name: String,
    inner: Arc<dyn Provider>,
    pipeline: Pipeline,
}

impl TransformedProvider {
    /// Wraps `inner` with an empty pipeline.
    pub fn new(inner: Arc<dyn Provider>) -> Self {
        Self {
            name: inner.name().to_string(),
            inner,
            pipeline: Pipeline::new(),
        }
    }

    /// Appends a transform.
    pub fn with_transform<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.pipeline.push(Arc::new(transform));
        self
    }

    /// Replaces the pipeline.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }
}

impl Provider for TransformedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self, kind: ComponentKind) -> Result<Vec<Component>> {
        Ok(self.pipeline.apply_all(self.inner.list(kind)?))
    }
}

// ============================================================================
// Tests
// ============================================================================
