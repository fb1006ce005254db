//! Child servers mounted into a parent.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use sklad_core::{Callable, Component, ComponentKey, ComponentKind, Error, Invocation, Result, ToolError};

use super::Provider;
use crate::middleware::{CallRequest, run_requests, run_responses};
use crate::server::Server;
use crate::transform::{Namespace, Transform};

/// Exposes a child server's components through its parent.
///
/// Listing asks the child for its exposed components, so the child's own
/// providers, transforms and visibility rules apply first. Each callable is
/// wrapped so the child's middleware sees the call under the child's name;
/// the namespace, when set, is applied last.
pub struct MountedProvider {
    name: String,
    child: Arc<Server>,
    namespace: Option<Namespace>,
}

impl MountedProvider {
    /// Mounts `child` under an optional namespace.
    pub fn new(child: Arc<Server>, namespace: Option<&str>) -> Self {
        let name = match namespace {
            Some(ns) => format!("mount:{}:{ns}", child.name()),
            None => format!("mount:{}", child.name()),
        };
        Self {
            name,
            child,
            namespace: namespace.map(Namespace::new),
        }
    }

    /// Namespace prefix, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_ref().map(Namespace::prefix)
    }

    /// The mounted server.
    pub fn child(&self) -> &Arc<Server> {
        &self.child
    }

    fn expose(&self, component: Component) -> Option<Component> {
        let key = component.key();
        let child = Arc::clone(&self.child);
        let component = component.map_callable(|inner| through_child(child, key, inner));
        match &self.namespace {
            Some(ns) => ns.apply(component),
            None => Some(component),
        }
    }
}

impl Provider for MountedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn list(&self, kind: ComponentKind) -> Result<Vec<Component>> {
        Ok(self
            .child
            .list(kind)?
            .into_iter()
            .filter_map(|component| self.expose(component))
            .collect())
    }
}

impl std::fmt::Debug for MountedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountedProvider")
            .field("child", &self.child.name())
            .field("namespace", &self.namespace())
            .finish()
    }
}

/// Wraps `inner` so that the child's middleware runs around every call.
///
/// Middleware is read when the call starts, so middleware added to the
/// child after mounting still applies.
fn through_child(child: Arc<Server>, key: ComponentKey, inner: Callable) -> Callable {
    Callable::from_async(move |args: Value, ctx| {
        let middleware = child.middleware();
        let inner = inner.clone();
        let invocation = if ctx.task_id().is_some() {
            Invocation::Background
        } else {
            Invocation::Sync
        };
        let request = CallRequest::new(key.clone(), args, invocation);
        async move {
            let started = Instant::now();
            let (entered, accepted) = run_requests(&middleware, &request);
            let outcome = match accepted {
                Ok(()) => inner.invoke(request.arguments.clone(), ctx).await,
                Err(error) => Err(ToolError::visible(error.to_string())),
            };

            if entered > 0 {
                let observed = match &outcome {
                    Ok(value) => Ok(value),
                    Err(error) => Err(as_execution_error(&request.key, error)),
                };
                let observed = observed.as_ref().map(|value| *value);
                run_responses(&middleware[..entered], &request, observed, started.elapsed());
            }
            outcome
        }
    })
}

fn as_execution_error(key: &ComponentKey, error: &ToolError) -> Error {
    let visible = matches!(error, ToolError::Visible(_) | ToolError::InvalidArguments(_));
    Error::Execution {
        component: key.to_string(),
        message: error.to_string(),
        visible,
    }
}

// ============================================================================
// Tests
// ============================================================================
