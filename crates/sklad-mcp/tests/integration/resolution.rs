//! Provider chain resolution through a full server.

use proptest::prelude::*;
use serde_json::json;
use sklad_core::{ComponentKind, ServerConfig};
use sklad_mcp::{FilesystemProvider, FnProvider, HandlerCatalog, Rewrite, RewriteConfig, Selector, Server};

use crate::common::{TestHarness, catalog, constant, names};

const ADD_MANIFEST: &str = r#"
[[tool]]
name = "add"
handler = "from_fs"
description = "discovered"

[[tool]]
name = "only_on_disk"
handler = "from_fs"
"#;

#[tokio::test]
async fn test_local_add_beats_filesystem_add() {
    let harness = TestHarness::new();
    harness.write("tools/math.toml", ADD_MANIFEST);

    let server = Server::new("main");
    server.add_provider(FilesystemProvider::new(harness.root(), catalog()));
    server
        .register(constant("add", json!("local")).with_description("local"))
        .unwrap();

    let resolved = server.resolve(ComponentKind::Tool, "add").unwrap();
    assert_eq!(resolved.description(), Some("local"));
    assert_eq!(server.call_tool("add", json!({})).await.unwrap(), json!("local"));

    // Discovered components that do not collide remain reachable.
    assert_eq!(
        server.call_tool("only_on_disk", json!({})).await.unwrap(),
        json!("filesystem")
    );
    assert_eq!(names(&server.list_tools().unwrap()), vec!["add", "only_on_disk"]);
}

#[tokio::test]
async fn test_failing_later_provider_leaves_local_tools_callable() {
    let server = Server::new("s");
    server.register(constant("add", json!(5))).unwrap();
    server.add_provider(FnProvider::new("db", |_kind| Err("db down".to_string())));

    let resolved = server.resolve(ComponentKind::Tool, "add").unwrap();
    assert_eq!(resolved.name(), "add");
    assert_eq!(server.call_tool("add", json!({})).await.unwrap(), json!(5));

    // Names only the failing provider could answer surface its failure.
    let err = server.call_tool("other", json!({})).await.unwrap_err();
    assert_eq!(err.code(), "provider_unavailable");
    assert!(err.to_string().contains("db down"));
    assert!(server.list_tools().is_err());
}

proptest! {
    #[test]
    fn prop_local_never_shadowed(register_first in any::<bool>(), extra in 0usize..4) {
        let harness = TestHarness::new();
        harness.write("a.toml", ADD_MANIFEST);

        let server = Server::new("main");
        let local = || constant("add", json!("local")).with_description("local");
        if register_first {
            server.register(local()).unwrap();
        }
        for _ in 0..extra {
            server.add_provider(FilesystemProvider::new(harness.root(), catalog()));
        }
        if !register_first {
            server.register(local()).unwrap();
        }
        server.add_provider(FilesystemProvider::new(harness.root(), catalog()));

        let resolved = server.resolve(ComponentKind::Tool, "add").unwrap();
        prop_assert_eq!(resolved.description(), Some("local"));
    }
}

#[tokio::test]
async fn test_disable_admin_tag_leaves_get_status() {
    let server = Server::new("ops");
    server.register(constant("get_status", json!("ok"))).unwrap();
    server
        .register(constant("delete_everything", json!("gone")).with_tag("admin"))
        .unwrap();
    server
        .register(constant("reset_system", json!("reset")).with_tags(["admin", "dangerous"]))
        .unwrap();

    server.disable(Selector::tags(["admin"]));

    assert_eq!(names(&server.list_tools().unwrap()), vec!["get_status"]);
    for hidden in ["delete_everything", "reset_system"] {
        let err = server.call_tool(hidden, json!({})).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.to_string(), format!("Unknown tool: {hidden}"));
    }
}

#[test]
fn test_listing_and_resolution_agree_under_visibility() {
    let harness = TestHarness::new();
    harness.write("tools.toml", ADD_MANIFEST);

    let server = Server::new("main");
    server.add_provider(FilesystemProvider::new(harness.root(), catalog()));
    server.register(constant("a", json!(1)).with_tag("x")).unwrap();
    server.register(constant("b", json!(2))).unwrap();
    server.disable(Selector::tags(["x"]).key(sklad_core::ComponentKey::tool("only_on_disk")));

    let listed = names(&server.list_tools().unwrap());
    for candidate in ["a", "b", "add", "only_on_disk", "missing"] {
        let resolvable = server.resolve(ComponentKind::Tool, candidate).is_ok();
        assert_eq!(
            resolvable,
            listed.iter().any(|n| n == candidate),
            "{candidate} listed and resolvable must agree"
        );
    }
}

#[tokio::test]
async fn test_rewrite_keeps_callable_behaviour() {
    let server = Server::new("main");
    server.register(constant("compute", json!(42))).unwrap();
    let before = server.call_tool("compute", json!({})).await.unwrap();

    server.add_transform(Rewrite::new().target(
        sklad_core::ComponentKey::tool("compute"),
        RewriteConfig::new()
            .name("answer")
            .description("The answer")
            .add_tag("trivia"),
    ));

    let resolved = server.resolve(ComponentKind::Tool, "answer").unwrap();
    assert_eq!(resolved.description(), Some("The answer"));
    assert!(resolved.has_tag("trivia"));
    assert_eq!(server.call_tool("answer", json!({})).await.unwrap(), before);
}

#[tokio::test]
async fn test_server_from_config_file() {
    let harness = TestHarness::new();
    harness.write("components/motd.toml", r#"
[[resource]]
uri = "data://motd"
handler = "motd"
mime_type = "text/plain"
"#);
    harness.write("skills/review/SKILL.md", "# Review\nRead carefully.");
    harness.write("skills/review/checklist.txt", "1. tests");

    let config_toml = format!(
        r#"
name = "configured"
version = "9.9.9"
on_duplicate = "replace"

[[filesystem]]
root = "{}"

[[skills]]
root = "{}"
"#,
        harness.root().join("components").display(),
        harness.root().join("skills").display(),
    );
    harness.write("sklad.toml", &config_toml);

    let config = ServerConfig::load(harness.root().join("sklad.toml")).unwrap();
    let server = Server::from_config(&config, catalog()).unwrap();
    assert_eq!(server.name(), "configured");
    assert_eq!(server.version(), "9.9.9");
    assert_eq!(server.provider_names().len(), 3);

    let resources = names(&server.list_resources().unwrap());
    assert!(resources.contains(&"data://motd".to_string()));
    assert!(resources.contains(&"skill://review/SKILL.md".to_string()));
    assert!(resources.contains(&"skill://review/checklist.txt".to_string()));

    let motd = server
        .handle(ComponentKind::Resource, "data://motd", json!({}))
        .await
        .unwrap();
    assert_eq!(motd, json!("hello from disk"));

    // The replace policy from configuration applies to local registration.
    server.register(constant("t", json!(1))).unwrap();
    server.register(constant("t", json!(2))).unwrap();
    assert_eq!(server.call_tool("t", json!({})).await.unwrap(), json!(2));
}

#[test]
fn test_broken_manifest_does_not_hide_good_ones() {
    let harness = TestHarness::new();
    harness.write("a_broken.toml", "[[tool]\nname = ");
    harness.write("b_good.toml", ADD_MANIFEST);

    let server = Server::new("main");
    server.add_provider(FilesystemProvider::new(harness.root(), HandlerCatalog::new().with(
        "from_fs",
        sklad_core::Callable::from_async(|_args, _ctx| async move { Ok(json!(null)) }),
    )));
    assert_eq!(names(&server.list_tools().unwrap()), vec!["add", "only_on_disk"]);
}
