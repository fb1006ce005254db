//! Custom providers backed by a closure.
//!
//! Any type implementing [`Provider`] is a custom provider. [`FnProvider`]
//! covers the common case of an external source (a database, a remote
//! catalog) that can be queried with a function.

use sklad_core::{Component, ComponentKind, Error, Result};

use super::Provider;

type ListFn = dyn Fn(ComponentKind) -> std::result::Result<Vec<Component>, String> + Send + Sync;

/// A provider whose listing is produced by a closure.
///
/// Failures reported by the closure surface as
/// [`Error::ProviderUnavailable`].
pub struct FnProvider {
    name: String,
    list: Box<ListFn>,
}

impl FnProvider {
    /// Creates a provider from a listing function.
    pub fn new<F>(name: impl Into<String>, list: F) -> Self
    where
        F: Fn(ComponentKind) -> std::result::Result<Vec<Component>, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            list: Box::new(list),
        }
    }
}

impl Provider for FnProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self, kind: ComponentKind) -> Result<Vec<Component>> {
        (self.list)(kind).map_err(|message| {
            tracing::warn!(provider = %self.name, %kind, %message, "custom provider failed");
            Error::provider_unavailable(&self.name, message)
        })
    }
}

impl std::fmt::Debug for FnProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProvider").field("name", &self.name).finish()
    }
}
