//! Mounting child servers.

use std::sync::Arc;

use serde_json::json;
use sklad_core::{ComponentKey, ComponentKind};
use sklad_mcp::{Namespace, Selector, Server};

use crate::common::{Recorder, constant, entries, names, new_log};

#[tokio::test]
async fn test_second_mount_wins_collisions() {
    let first = Server::new("first");
    first.register(constant("shared", json!("first"))).unwrap();
    first.register(constant("only_first", json!("first"))).unwrap();

    let second = Server::new("second");
    second.register(constant("shared", json!("second"))).unwrap();

    let parent = Server::new("parent");
    parent.mount(first, Some("ns")).unwrap();
    parent.mount(second, Some("ns")).unwrap();

    assert_eq!(
        parent.call_tool("ns.shared", json!({})).await.unwrap(),
        json!("second")
    );
    assert_eq!(
        parent.call_tool("ns.only_first", json!({})).await.unwrap(),
        json!("first")
    );

    let listed = names(&parent.list_tools().unwrap());
    assert_eq!(listed.iter().filter(|n| *n == "ns.shared").count(), 1);
}

#[tokio::test]
async fn test_parent_local_beats_mounted_child() {
    let child = Server::new("child");
    child.register(constant("status", json!("child"))).unwrap();

    let parent = Server::new("parent");
    parent.mount(child, None).unwrap();
    parent.register(constant("status", json!("parent"))).unwrap();

    assert_eq!(
        parent.call_tool("status", json!({})).await.unwrap(),
        json!("parent")
    );
}

#[test]
fn test_namespace_is_not_doubled() {
    let child = Server::new("weather");
    child.register(constant("get_data", json!({}))).unwrap();
    child.add_transform(Namespace::new("weather"));

    let parent = Server::new("parent");
    parent.mount(child, Some("weather")).unwrap();

    assert_eq!(names(&parent.list_tools().unwrap()), vec!["weather.get_data"]);
}

#[test]
fn test_resource_uris_are_namespaced() {
    let child = Server::new("docs");
    child
        .register(sklad_core::Component::resource(
            "file://readme",
            sklad_core::Callable::from_async(|_args, _ctx| async move { Ok(json!("readme")) }),
        ))
        .unwrap();

    let parent = Server::new("parent");
    parent.mount(child, Some("docs")).unwrap();

    assert_eq!(
        names(&parent.list_resources().unwrap()),
        vec!["file://docs/readme"]
    );
}

#[test]
fn test_child_changes_visible_through_mount() {
    let child = Arc::new(Server::new("child"));
    let parent = Server::new("parent");
    parent.mount(Arc::clone(&child), Some("c")).unwrap();
    assert!(parent.list_tools().unwrap().is_empty());

    child.register(constant("late", json!(1))).unwrap();
    assert!(parent.resolve(ComponentKind::Tool, "c.late").is_ok());

    child.disable(Selector::new().key(ComponentKey::tool("late")));
    assert!(parent.resolve(ComponentKind::Tool, "c.late").is_err());
}

#[tokio::test]
async fn test_child_middleware_sees_only_child_requests() {
    let log = new_log();
    let child = Server::new("child");
    child.register(constant("inner", json!("inner"))).unwrap();
    child.add_middleware(Recorder::new("child", &log));

    let parent = Server::new("parent");
    parent.register(constant("outer", json!("outer"))).unwrap();
    parent.add_middleware(Recorder::new("parent", &log));
    parent.mount(child, Some("c")).unwrap();

    parent.call_tool("outer", json!({})).await.unwrap();
    parent.call_tool("c.inner", json!({})).await.unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "parent:request:outer",
            "parent:response:outer:ok",
            "parent:request:c.inner",
            "child:request:inner",
            "child:response:inner:ok",
            "parent:response:c.inner:ok",
        ]
    );
}

#[tokio::test]
async fn test_child_middleware_rejection_surfaces_as_error() {
    let log = new_log();
    let child = Server::new("child");
    child.register(constant("inner", json!("inner"))).unwrap();
    child.add_middleware(Recorder::new("gate", &log).rejecting());

    let parent = Server::new("parent");
    parent.mount(child, Some("c")).unwrap();

    let err = parent.call_tool("c.inner", json!({})).await.unwrap_err();
    assert_eq!(err.code(), "execution");
    assert!(err.to_string().contains("rejected by gate"));
}

#[test]
fn test_mount_cycle_through_grandchild_is_refused() {
    let top = Arc::new(Server::new("top"));
    let middle = Arc::new(Server::new("middle"));
    let leaf = Arc::new(Server::new("leaf"));
    leaf.register(constant("ping", json!("pong"))).unwrap();

    top.mount(Arc::clone(&middle), Some("m")).unwrap();
    middle.mount(Arc::clone(&leaf), Some("l")).unwrap();

    let err = leaf.mount(Arc::clone(&top), Some("t")).unwrap_err();
    assert_eq!(err.code(), "config");
    assert!(leaf.provider_names().iter().all(|name| !name.contains("top")));
    assert_eq!(names(&top.list_tools().unwrap()), vec!["m.l.ping"]);
}
