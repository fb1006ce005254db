//! Conversions between Sklad components and rmcp model types.
//!
//! The transport layer talks to a server through the [`ToolRegistry`]
//! trait: [`ToolRegistry::tools`] describes the exposed tools and
//! [`ToolRegistry::call`] dispatches one call. [`ServerTools`] implements it
//! for a [`Server`].
//!
//! Request-level failures (unknown tool, bad arguments, mode violations)
//! become protocol errors; failures inside a component body become tool
//! results with `is_error` set, so the model sees them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rmcp::model::{CallToolResult, Content, ErrorData, Tool, ToolAnnotations};
use serde_json::Value;
use sklad_core::{Component, ComponentKind, Error, Result};

use crate::error::McpErrorExt;
use crate::server::Server;

/// Type alias for async tool handler results.
pub type ToolResult = Pin<Box<dyn Future<Output = std::result::Result<CallToolResult, ErrorData>> + Send>>;

/// Tool listing and dispatch, as seen by a transport.
pub trait ToolRegistry: Send + Sync {
    /// Returns information about all available tools.
    fn tools(&self) -> Vec<Tool>;

    /// Dispatches a tool call by name.
    ///
    /// Returns `None` if the tool is not exposed.
    fn call(&self, name: &str, args: Value) -> Option<ToolResult>;

    /// Returns the number of exposed tools.
    fn tool_count(&self) -> usize {
        self.tools().len()
    }

    /// Check if a tool exists by name.
    fn has_tool(&self, name: &str) -> bool {
        self.tools().iter().any(|t| t.name == name)
    }
}

// ============================================================================
// Conversions
// ============================================================================

/// Describes a tool component as an rmcp [`Tool`].
pub fn to_tool(component: &Component) -> Tool {
    let input_schema = match component.signature().input_schema() {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    let output_schema = match component.output_schema() {
        Some(Value::Object(map)) => Some(Arc::new(map.clone())),
        _ => None,
    };
    let mut tool = Tool::new_with_raw(
        component.name().to_string(),
        component.description().map(|d| d.to_string().into()),
        Arc::new(input_schema),
    );
    tool.title = component.title().map(str::to_string);
    tool.output_schema = output_schema;
    tool.annotations = to_annotations(component);
    tool.icons = None;
    tool.meta = None;
    tool
}

/// Behaviour hints use the protocol's own field names, so they convert
/// through serde.
fn to_annotations(component: &Component) -> Option<ToolAnnotations> {
    if component.annotations().is_empty() {
        return None;
    }
    let hints = serde_json::to_value(component.annotations()).ok()?;
    match serde_json::from_value::<ToolAnnotations>(hints) {
        Ok(annotations) => Some(annotations),
        Err(e) => {
            tracing::warn!(component = %component.key(), error = %e, "dropping tool annotations");
            None
        }
    }
}

/// Renders a component result as tool output.
///
/// Strings are returned as-is; other values as pretty-printed JSON.
pub fn to_content(value: &Value) -> Content {
    match value {
        Value::String(text) => Content::text(text.clone()),
        other => Content::text(
            serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        ),
    }
}

/// Converts the outcome of [`Server::handle`] into a tool result.
///
/// Errors that reject the request itself are returned as protocol errors;
/// everything else becomes an error result carrying the (possibly masked)
/// structured message.
pub fn to_call_result(
    outcome: Result<Value>,
    mask_details: bool,
) -> std::result::Result<CallToolResult, ErrorData> {
    match outcome {
        Ok(value) => Ok(CallToolResult::success(vec![to_content(&value)])),
        Err(error) if is_request_error(&error) => Err(error.to_mcp_error_masked(mask_details)),
        Err(error) => {
            let structured = error.to_structured(mask_details);
            Ok(CallToolResult::error(vec![Content::text(structured.to_string())]))
        }
    }
}

fn is_request_error(error: &Error) -> bool {
    matches!(
        error,
        Error::NotFound { .. } | Error::InvalidArguments { .. } | Error::ModeViolation { .. }
    )
}

// ============================================================================
// ServerTools
// ============================================================================

/// Exposes a server's tools through [`ToolRegistry`].
#[derive(Clone, Debug)]
pub struct ServerTools {
    server: Arc<Server>,
}

impl ServerTools {
    /// Wraps a server.
    pub fn new(server: impl Into<Arc<Server>>) -> Self {
        Self {
            server: server.into(),
        }
    }

    /// The wrapped server.
    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }
}

impl ToolRegistry for ServerTools {
    fn tools(&self) -> Vec<Tool> {
        match self.server.list_tools() {
            Ok(components) => components.iter().map(to_tool).collect(),
            Err(e) => {
                tracing::warn!(server = %self.server.name(), error = %e, "failed to list tools");
                Vec::new()
            }
        }
    }

    fn call(&self, name: &str, args: Value) -> Option<ToolResult> {
        if let Err(Error::NotFound { .. }) = self.server.resolve(ComponentKind::Tool, name) {
            return None;
        }
        let server = Arc::clone(&self.server);
        let name = name.to_string();
        Some(Box::pin(async move {
            let outcome = server.call_tool(&name, args).await;
            to_call_result(outcome, server.masks_error_details())
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================
