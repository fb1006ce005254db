//! The rmcp bridge, error masking and the health tool.

use serde_json::{Value, json};
use sklad_core::{Callable, Component, ServerConfig, ToolError};
use sklad_mcp::model::ErrorCode;
use sklad_mcp::{HandlerCatalog, HealthResponse, Server, ServerTools, ToolRegistry};

use crate::common::constant;

fn failing_server(mask: bool) -> Server {
    let config = ServerConfig {
        name: "masking".to_string(),
        mask_error_details: mask,
        ..ServerConfig::default()
    };
    let server = Server::from_config(&config, HandlerCatalog::new()).unwrap();
    server
        .register(Component::tool(
            "internal",
            Callable::from_async(|_args, _ctx| async move {
                Err(ToolError::internal("connection string postgres://admin:pw@db"))
            }),
        ))
        .unwrap();
    server
        .register(Component::tool(
            "visible",
            Callable::from_async(|_args, _ctx| async move {
                Err(ToolError::visible("Quota exceeded, retry tomorrow"))
            }),
        ))
        .unwrap();
    server
}

fn text_of(result: &sklad_mcp::model::CallToolResult) -> String {
    serde_json::to_string(&result.content).unwrap()
}

#[tokio::test]
async fn test_masking_hides_internal_details() {
    let tools = ServerTools::new(failing_server(true));

    let result = tools.call("internal", json!({})).unwrap().await.unwrap();
    assert_eq!(result.is_error, Some(true));
    assert!(!text_of(&result).contains("postgres://"));

    let result = tools.call("visible", json!({})).unwrap().await.unwrap();
    assert_eq!(result.is_error, Some(true));
    assert!(text_of(&result).contains("Quota exceeded"));
}

#[tokio::test]
async fn test_unmasked_server_shows_details() {
    let tools = ServerTools::new(failing_server(false));
    let result = tools.call("internal", json!({})).unwrap().await.unwrap();
    assert!(text_of(&result).contains("postgres://"));
}

#[tokio::test]
async fn test_bad_arguments_are_protocol_errors() {
    let server = Server::new("main");
    server
        .register(
            constant("typed", json!(1)).with_signature(sklad_core::Signature::new(vec![
                sklad_core::Param::required("n", sklad_core::ParamType::Integer),
            ])),
        )
        .unwrap();
    let tools = ServerTools::new(server);

    let err = tools
        .call("typed", json!({"n": "not a number"}))
        .unwrap()
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
}

#[tokio::test]
async fn test_health_tool_through_bridge() {
    let server = Server::new("healthy")
        .with_version("1.2.3")
        .with_health_tool()
        .unwrap();
    server.register(constant("a", json!(1))).unwrap();
    let tools = ServerTools::new(server);

    assert!(tools.has_tool("health"));
    let health = tools
        .tools()
        .into_iter()
        .find(|tool| tool.name == "health")
        .unwrap();
    assert_eq!(
        health.annotations.and_then(|a| a.read_only_hint),
        Some(true)
    );

    let result = tools.call("health", json!({})).unwrap().await.unwrap();
    assert_eq!(result.is_error, Some(false));
    let text = result.content[0].as_text().unwrap().text.clone();
    let response: HealthResponse = serde_json::from_str(&text).unwrap();
    assert_eq!(response.status, "healthy");
    assert_eq!(response.server_name, "healthy");
    assert_eq!(response.version, "1.2.3");
    assert_eq!(response.components.tools, 2);
}

#[test]
fn test_tool_listing_skips_disabled() {
    let server = Server::new("main");
    server.register(constant("shown", Value::Null)).unwrap();
    server
        .register(constant("hidden", Value::Null).with_enabled(false))
        .unwrap();
    let tools = ServerTools::new(server);
    assert_eq!(tools.tool_count(), 1);
    assert!(tools.call("hidden", json!({})).is_none());
}
