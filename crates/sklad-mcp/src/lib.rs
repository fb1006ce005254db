//! Provider composition, transforms and task execution for MCP servers.
//!
//! A [`Server`] resolves requested components through an ordered chain of
//! providers, reshapes them with transforms and runs them through a task
//! controller.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          sklad-mcp                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Server: middleware, provider chain, transforms, tasks       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Providers: Local, Mounted, Filesystem, Skills, Fn,          │
//! │             Transformed, AsTools                             │
//! │  ProviderChain: first match wins, local provider first       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Transforms: Namespace, Rewrite, Visibility                  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  TaskManager: modes, timeouts, background tasks, cancel      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  bridge: Component → rmcp Tool, outcome → CallToolResult     │
//! │  McpErrorExt: sklad_core::Error → rmcp::ErrorData            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Built-in tools:                                             │
//! │  └── health: server status and component counts              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use sklad_mcp::{Server, Selector};
//!
//! let child = Server::new("weather");
//! child.register(forecast_tool)?;
//!
//! let server = Server::new("main").with_health_tool()?;
//! server.register(status_tool)?;
//! server.mount(child, Some("weather"))?;
//! server.disable(Selector::tags(["admin"]));
//!
//! let value = server.call_tool("weather.forecast", json!({"city": "Oslo"})).await?;
//! ```

pub mod bridge;
pub mod chain;
pub mod error;
pub mod middleware;
pub mod provider;
pub mod server;
pub mod tasks;
pub mod tools;
pub mod transform;

// Re-export rmcp model types so downstream crates can use them
// without depending on rmcp directly.
pub use rmcp::model;

// Re-exports — server
pub use server::{Invoked, Server};

// Re-exports — providers
pub use chain::ProviderChain;
pub use provider::{
    AsTools, FilesystemProvider, FnProvider, HandlerCatalog, LocalProvider, MountedProvider, Provider,
    SkillsProvider, TransformedProvider,
};

// Re-exports — transforms
pub use transform::{
    ArgRewrite, Namespace, Pipeline, Rewrite, RewriteConfig, Selector, Transform, Visibility,
    VisibilityAction,
};

// Re-exports — execution
pub use middleware::{CallRequest, LoggingMiddleware, Middleware};
pub use tasks::{TaskManager, TaskOutcome, TaskSettings};

// Re-exports — rmcp bridge
pub use bridge::{ServerTools, ToolRegistry, ToolResult};
pub use error::McpErrorExt;

// Re-exports — built-in tools
pub use tools::{ComponentCounts, HealthResponse, handle_health};
