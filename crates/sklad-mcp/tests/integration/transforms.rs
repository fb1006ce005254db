//! Provider-level and server-level transforms.

use std::sync::Arc;

use serde_json::json;
use sklad_core::{Component, ComponentKey, ComponentKind, Param, ParamType, Signature};
use sklad_mcp::{
    ArgRewrite, AsTools, LocalProvider, MountedProvider, Namespace, Provider, Rewrite,
    RewriteConfig, Selector, Server, TransformedProvider,
};

use crate::common::{constant, echo_args, names};

#[tokio::test]
async fn test_argument_rename_reaches_body_under_original_name() {
    let server = Server::new("main");
    server
        .register(echo_args("search").with_signature(Signature::new(vec![
            Param::required("q", ParamType::String),
            Param::optional("limit", ParamType::Integer),
        ])))
        .unwrap();
    server.add_transform(Rewrite::new().target(
        ComponentKey::tool("search"),
        RewriteConfig::new().argument("q", ArgRewrite::rename("query").describe("Search text")),
    ));

    let tool = server.resolve(ComponentKind::Tool, "search").unwrap();
    assert!(tool.signature().param("query").is_some());
    assert!(tool.signature().param("q").is_none());
    assert_eq!(
        tool.signature().param("query").unwrap().description.as_deref(),
        Some("Search text")
    );

    let echoed = server
        .call_tool("search", json!({"query": "rust", "limit": 3}))
        .await
        .unwrap();
    assert_eq!(echoed, json!({"q": "rust", "limit": 3}));

    // The old name is no longer part of the exposed signature.
    let err = server
        .call_tool("search", json!({"q": "rust"}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_arguments");
}

#[test]
fn test_provider_transforms_run_before_server_transforms() {
    let provider = LocalProvider::new("plugins");
    provider.add(constant("fetch", json!(1))).unwrap();
    let transformed = TransformedProvider::new(Arc::new(provider)).with_transform(
        Rewrite::new().target(ComponentKey::tool("fetch"), RewriteConfig::new().name("get")),
    );

    let server = Server::new("main");
    server.add_provider(transformed);
    // Targets the provider-level name, so it only matches after that rewrite.
    server.add_transform(Rewrite::new().target(
        ComponentKey::tool("get"),
        RewriteConfig::new().description("renamed twice"),
    ));

    let tool = server.resolve(ComponentKind::Tool, "get").unwrap();
    assert_eq!(tool.description(), Some("renamed twice"));
    assert!(server.resolve(ComponentKind::Tool, "fetch").is_err());
}

#[test]
fn test_server_rewrite_of_same_field_is_last_applied() {
    let provider = LocalProvider::new("plugins");
    provider
        .add(constant("t", json!(1)).with_description("original"))
        .unwrap();
    let transformed = TransformedProvider::new(Arc::new(provider)).with_transform(
        Rewrite::new().target(
            ComponentKey::tool("t"),
            RewriteConfig::new().description("provider"),
        ),
    );

    let server = Server::new("main");
    server.add_provider(transformed);
    server.add_transform(
        Rewrite::new().target(ComponentKey::tool("t"), RewriteConfig::new().description("server")),
    );

    let tool = server.resolve(ComponentKind::Tool, "t").unwrap();
    assert_eq!(tool.description(), Some("server"));
}

#[test]
fn test_enable_only_allowlist() {
    let server = Server::new("main");
    for name in ["read", "write", "delete"] {
        server.register(constant(name, json!(name))).unwrap();
    }
    server
        .register(constant("search", json!(1)).with_tag("public"))
        .unwrap();

    server.enable_only(
        Selector::tags(["public"]).key(ComponentKey::tool("read")),
    );

    assert_eq!(names(&server.list_tools().unwrap()), vec!["read", "search"]);
    assert!(server.resolve(ComponentKind::Tool, "write").is_err());
}

#[test]
fn test_components_disabled_at_definition_stay_hidden() {
    let server = Server::new("main");
    server
        .register(constant("draft", json!(1)).with_enabled(false))
        .unwrap();
    assert!(server.list_tools().unwrap().is_empty());

    server.enable(Selector::new().key(ComponentKey::tool("draft")));
    assert_eq!(names(&server.list_tools().unwrap()), vec!["draft"]);
}

#[test]
fn test_server_namespace_transform() {
    let server = Server::new("main");
    server.register(constant("ping", json!("pong"))).unwrap();
    server.add_transform(Namespace::new("net"));

    assert_eq!(names(&server.list_tools().unwrap()), vec!["net.ping"]);
    assert!(server.resolve(ComponentKind::Tool, "ping").is_err());
}

#[tokio::test]
async fn test_tools_only_client_reads_resources_and_prompts() {
    let docs = Arc::new(Server::new("docs"));
    let guide = constant("guide", json!("# Guide")).callable().clone();
    docs.register(Component::resource("file://guide", guide).with_description("User guide"))
        .unwrap();
    let summarize = echo_args("summarize").callable().clone();
    docs.register(
        Component::prompt("summarize", summarize)
            .with_signature(Signature::new(vec![Param::required("topic", ParamType::String)])),
    )
    .unwrap();

    let mounted: Arc<dyn Provider> = Arc::new(MountedProvider::new(docs, None));
    let server = Server::new("main");
    server.add_provider(AsTools::resources(Arc::clone(&mounted)));
    server.add_provider(AsTools::prompts(mounted));

    assert_eq!(
        names(&server.list_tools().unwrap()),
        vec!["list_resources", "read_resource", "list_prompts", "get_prompt"]
    );
    assert_eq!(names(&server.list_resources().unwrap()), vec!["file://guide"]);

    let listed = server.call_tool("list_resources", json!({})).await.unwrap();
    assert_eq!(listed[0]["description"], json!("User guide"));
    assert_eq!(
        server
            .call_tool("read_resource", json!({"uri": "file://guide"}))
            .await
            .unwrap(),
        json!("# Guide")
    );
    assert_eq!(
        server
            .call_tool("get_prompt", json!({"name": "summarize", "arguments": {"topic": "rust"}}))
            .await
            .unwrap(),
        json!({"topic": "rust"})
    );

    let err = server
        .call_tool("read_resource", json!({"uri": "file://missing"}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "execution");

    let err = server.call_tool("read_resource", json!({})).await.unwrap_err();
    assert_eq!(err.code(), "invalid_arguments");
}
