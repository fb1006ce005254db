//! Task modes, background execution, cancellation and timeouts.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sklad_core::{Callable, Component, ComponentKind, Invocation, TaskMode, TaskState, ToolError};
use sklad_mcp::{Invoked, Server};
use tokio::sync::Notify;

use crate::common::constant;

const WAIT: Duration = Duration::from_secs(5);

fn server_with_modes() -> Server {
    let server = Server::new("tasks");
    server
        .register(constant("forbidden", json!("f")).with_task_mode(TaskMode::Forbidden))
        .unwrap();
    server
        .register(constant("optional", json!("o")).with_task_mode(TaskMode::Optional))
        .unwrap();
    server
        .register(constant("required", json!("r")).with_task_mode(TaskMode::Required))
        .unwrap();
    server
}

#[tokio::test]
async fn test_task_mode_matrix() {
    let server = server_with_modes();
    let cases = [
        ("forbidden", Invocation::Sync, true),
        ("forbidden", Invocation::Background, false),
        ("optional", Invocation::Sync, true),
        ("optional", Invocation::Background, true),
        ("required", Invocation::Sync, false),
        ("required", Invocation::Background, true),
    ];

    for (name, invocation, allowed) in cases {
        let outcome = server
            .invoke(ComponentKind::Tool, name, json!({}), invocation)
            .await;
        match (outcome, allowed) {
            (Ok(Invoked::Completed(_)), true) => assert_eq!(invocation, Invocation::Sync),
            (Ok(Invoked::Started(task)), true) => {
                assert_eq!(invocation, Invocation::Background);
                let snapshot = task.wait(WAIT).await.unwrap();
                assert_eq!(snapshot.state, TaskState::Succeeded);
            }
            (Err(err), false) => {
                assert_eq!(err.code(), "mode_violation", "{name} {invocation}");
            }
            (outcome, allowed) => {
                assert!(allowed != outcome.is_ok(), "{name} {invocation}: unexpected outcome");
            }
        }
    }
}

#[test]
fn test_blocking_body_cannot_be_background_capable() {
    let server = Server::new("tasks");
    let err = server
        .register(
            Component::tool(
                "heavy",
                Callable::from_blocking(|_args, _ctx| Ok(json!(null))),
            )
            .with_task_mode(TaskMode::Optional),
        )
        .unwrap_err();
    assert_eq!(err.code(), "mode_violation");
}

#[tokio::test]
async fn test_background_progress_is_observable() {
    let gate = Arc::new(Notify::new());
    let release = Arc::clone(&gate);
    let server = Server::new("tasks");
    server
        .register(
            Component::tool(
                "crunch",
                Callable::from_async(move |_args, ctx| {
                    let release = Arc::clone(&release);
                    async move {
                        ctx.set_total(3.0);
                        ctx.increment(1.0);
                        ctx.set_message("first chunk");
                        release.notified().await;
                        ctx.increment(2.0);
                        Ok(json!("done"))
                    }
                }),
            )
            .with_task_mode(TaskMode::Required),
        )
        .unwrap();

    let task = server
        .submit(ComponentKind::Tool, "crunch", json!({}))
        .await
        .unwrap();

    let mut updates = task.subscribe();
    let running = updates
        .wait_for(|s| s.progress.message.as_deref() == Some("first chunk"))
        .await
        .unwrap()
        .clone();
    assert_eq!(running.state, TaskState::Running);
    assert_eq!(running.progress.current, 1.0);
    assert_eq!(running.progress.total, Some(3.0));

    gate.notify_one();
    let finished = task.wait(WAIT).await.unwrap();
    assert_eq!(finished.state, TaskState::Succeeded);
    assert_eq!(finished.progress.current, 3.0);
    assert_eq!(finished.result, Some(json!("done")));

    let listed = server.tasks().list();
    assert_eq!(listed.len(), 1);
    assert_eq!(server.tasks().status(task.id()).unwrap(), TaskState::Succeeded);
}

#[tokio::test]
async fn test_cancel_background_task() {
    let server = Server::new("tasks");
    server
        .register(
            Component::tool(
                "forever",
                Callable::from_async(|_args, _ctx| async move {
                    std::future::pending::<()>().await;
                    Ok(json!(null))
                }),
            )
            .with_task_mode(TaskMode::Required),
        )
        .unwrap();

    let task = server
        .submit(ComponentKind::Tool, "forever", json!({}))
        .await
        .unwrap();
    assert!(server.tasks().cancel(task.id()).unwrap());

    let snapshot = task.wait(WAIT).await.unwrap();
    assert_eq!(snapshot.state, TaskState::Cancelled);
    assert_eq!(snapshot.error.unwrap().code, "cancelled");

    // Cancelling again reports that the task already finished.
    assert!(!server.tasks().cancel(task.id()).unwrap());
    // The component itself is untouched.
    assert!(server.resolve(ComponentKind::Tool, "forever").is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_sync_timeout() {
    let server = Server::new("tasks");
    server
        .register(
            Component::tool(
                "slow",
                Callable::from_async(|_args, _ctx| async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(json!(null))
                }),
            )
            .with_timeout(Duration::from_millis(1500)),
        )
        .unwrap();

    let err = server.call_tool("slow", json!({})).await.unwrap_err();
    assert_eq!(err.code(), "timeout");
    assert_eq!(err.to_string(), "tool:slow timed out after 1500ms");
}

#[tokio::test(start_paused = true)]
async fn test_background_timeout_cancels_task() {
    let server = Server::new("tasks");
    server
        .register(
            Component::tool(
                "slow",
                Callable::from_async(|_args, _ctx| async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(json!(null))
                }),
            )
            .with_timeout(Duration::from_millis(100))
            .with_task_mode(TaskMode::Required),
        )
        .unwrap();

    let task = server
        .submit(ComponentKind::Tool, "slow", json!({}))
        .await
        .unwrap();
    let snapshot = task.wait(Duration::from_secs(120)).await.unwrap();
    assert_eq!(snapshot.state, TaskState::Cancelled);
    assert_eq!(snapshot.error.unwrap().code, "timeout");
}

#[tokio::test]
async fn test_failed_task_records_error() {
    let server = Server::new("tasks");
    server
        .register(
            Component::tool(
                "fails",
                Callable::from_async(|_args, _ctx| async move {
                    Err(ToolError::visible("disk full"))
                }),
            )
            .with_task_mode(TaskMode::Optional),
        )
        .unwrap();

    let task = server
        .submit(ComponentKind::Tool, "fails", json!({}))
        .await
        .unwrap();
    let snapshot = task.wait(WAIT).await.unwrap();
    assert_eq!(snapshot.state, TaskState::Failed);
    let error = snapshot.error.unwrap();
    assert_eq!(error.code, "execution");
    assert!(error.message.contains("disk full"));
}

#[tokio::test]
async fn test_submit_unknown_component() {
    let server = Server::new("tasks");
    let err = server
        .submit(ComponentKind::Tool, "ghost", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
    assert!(server.tasks().is_empty());
}
