//! Built-in MCP tools.
//!
//! Tools provided by the core `sklad-mcp` crate, available to every
//! Sklad server.

pub mod health;

pub use health::{ComponentCounts, HEALTH_TOOL, HealthResponse, handle_health, health_component};
