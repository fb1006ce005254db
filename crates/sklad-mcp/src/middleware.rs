//! Request middleware.
//!
//! Middleware observes individual requests: `on_request` runs before
//! resolution and may reject the call, `on_response` runs after the outcome
//! is known. A server runs its middleware in registration order for requests
//! and in reverse order for responses. A mounted child's middleware only
//! sees requests routed to that child, under the child's own names.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use sklad_core::{ComponentKey, Error, Invocation, Result};

/// One call as seen by middleware.
#[derive(Debug, Clone)]
pub struct CallRequest {
    /// Requested component, by the name the receiving server exposes.
    pub key: ComponentKey,
    /// Call arguments.
    pub arguments: Value,
    /// Requested execution mode.
    pub invocation: Invocation,
}

impl CallRequest {
    /// Creates a request.
    pub fn new(key: ComponentKey, arguments: Value, invocation: Invocation) -> Self {
        Self {
            key,
            arguments,
            invocation,
        }
    }
}

/// Hooks around request dispatch.
pub trait Middleware: Send + Sync {
    /// Middleware name used in logs.
    fn name(&self) -> &str;

    /// Runs before resolution. Returning an error rejects the request.
    fn on_request(&self, request: &CallRequest) -> Result<()> {
        let _ = request;
        Ok(())
    }

    /// Runs after the outcome is known.
    fn on_response(
        &self,
        request: &CallRequest,
        outcome: std::result::Result<&Value, &Error>,
        elapsed: Duration,
    ) {
        let _ = (request, outcome, elapsed);
    }
}

/// Runs `on_request` in order until one layer rejects.
///
/// Returns how many layers saw the request, including a rejecting one.
pub(crate) fn run_requests(layers: &[Arc<dyn Middleware>], request: &CallRequest) -> (usize, Result<()>) {
    for (index, layer) in layers.iter().enumerate() {
        if let Err(error) = layer.on_request(request) {
            tracing::debug!(middleware = layer.name(), component = %request.key, %error, "request rejected");
            return (index + 1, Err(error));
        }
    }
    (layers.len(), Ok(()))
}

/// Runs `on_response` in reverse order.
pub(crate) fn run_responses(
    layers: &[Arc<dyn Middleware>],
    request: &CallRequest,
    outcome: std::result::Result<&Value, &Error>,
    elapsed: Duration,
) {
    for layer in layers.iter().rev() {
        layer.on_response(request, outcome, elapsed);
    }
}

/// Logs every request and its outcome with `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    include_arguments: bool,
}

impl LoggingMiddleware {
    /// Creates a logging middleware that omits arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log call arguments.
    pub fn with_arguments(mut self) -> Self {
        self.include_arguments = true;
        self
    }
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_request(&self, request: &CallRequest) -> Result<()> {
        if self.include_arguments {
            tracing::info!(component = %request.key, invocation = ?request.invocation, arguments = %request.arguments, "→ request");
        } else {
            tracing::info!(component = %request.key, invocation = ?request.invocation, "→ request");
        }
        Ok(())
    }

    fn on_response(
        &self,
        request: &CallRequest,
        outcome: std::result::Result<&Value, &Error>,
        elapsed: Duration,
    ) {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(_) => tracing::info!(component = %request.key, elapsed_ms, "← ok"),
            Err(e) => tracing::warn!(component = %request.key, elapsed_ms, error = %e, "← error"),
        }
    }
}
