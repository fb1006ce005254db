//! Health check tool for MCP servers.
//!
//! Provides a built-in `health` tool that reports server status,
//! version information and how many components the server exposes.

use rmcp::model::{CallToolResult, Content, ErrorData};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sklad_core::component::READ_ONLY_HINT;
use sklad_core::{Callable, Component, Signature, ToolError};

/// Name of the built-in health tool.
pub const HEALTH_TOOL: &str = "health";

/// Number of exposed components per kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCounts {
    /// Exposed tools, including `health` itself.
    pub tools: usize,
    /// Exposed resources.
    pub resources: usize,
    /// Exposed prompts.
    pub prompts: usize,
}

/// Health check response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server status ("healthy").
    pub status: String,
    /// Server name.
    pub server_name: String,
    /// Server version.
    pub version: String,
    /// Exposed component counts.
    pub components: ComponentCounts,
}

impl HealthResponse {
    /// A healthy response.
    pub fn healthy(
        server_name: impl Into<String>,
        version: impl Into<String>,
        components: ComponentCounts,
    ) -> Self {
        Self {
            status: "healthy".to_string(),
            server_name: server_name.into(),
            version: version.into(),
            components,
        }
    }
}

/// Builds the `health` tool.
///
/// `counts` is called on every invocation so the report reflects the
/// components exposed at that moment.
pub fn health_component<F>(
    server_name: impl Into<String>,
    version: impl Into<String>,
    counts: F,
) -> Component
where
    F: Fn() -> Result<ComponentCounts, String> + Send + Sync + 'static,
{
    let server_name = server_name.into();
    let version = version.into();
    Component::tool(
        HEALTH_TOOL,
        Callable::from_async(move |_args, _ctx| {
            let counts = counts().map_err(ToolError::internal);
            let server_name = server_name.clone();
            let version = version.clone();
            async move {
                let response = HealthResponse::healthy(server_name, version, counts?);
                serde_json::to_value(response).map_err(ToolError::from_error)
            }
        }),
    )
    .with_description("Check server health and status")
    .with_signature(Signature::new(Vec::new()))
    .with_annotation(READ_ONLY_HINT, true)
}

/// Handle a health check request directly (without a server).
///
/// Useful for testing or when building custom tool dispatchers.
pub async fn handle_health(
    server_name: &str,
    version: &str,
    components: ComponentCounts,
) -> Result<CallToolResult, ErrorData> {
    let response = HealthResponse::healthy(server_name, version, components);
    let json = serde_json::to_string_pretty(&response)
        .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Parses a health response back out of a tool result value.
pub fn parse_health(value: Value) -> Result<HealthResponse, serde_json::Error> {
    serde_json::from_value(value)
}

// ============================================================================
// Tests
// ============================================================================
