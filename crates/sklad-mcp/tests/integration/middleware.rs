//! Server middleware ordering and rejection.

use serde_json::json;
use sklad_core::{ComponentKind, TaskMode};
use sklad_mcp::{LoggingMiddleware, Server};

use crate::common::{Recorder, constant, entries, new_log};

#[tokio::test]
async fn test_requests_in_order_responses_reversed() {
    let log = new_log();
    let server = Server::new("main");
    server.register(constant("t", json!(1))).unwrap();
    server.add_middleware(Recorder::new("auth", &log));
    server.add_middleware(LoggingMiddleware::new().with_arguments());
    server.add_middleware(Recorder::new("metrics", &log));

    server.call_tool("t", json!({"x": 1})).await.unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "auth:request:t",
            "metrics:request:t",
            "metrics:response:t:ok",
            "auth:response:t:ok",
        ]
    );
}

#[tokio::test]
async fn test_rejection_stops_later_middleware() {
    let log = new_log();
    let server = Server::new("main");
    server.register(constant("t", json!(1))).unwrap();
    server.add_middleware(Recorder::new("first", &log));
    server.add_middleware(Recorder::new("gate", &log).rejecting());
    server.add_middleware(Recorder::new("never", &log));

    let err = server.call_tool("t", json!({})).await.unwrap_err();
    assert!(err.to_string().contains("rejected by gate"));
    assert_eq!(
        entries(&log),
        vec![
            "first:request:t",
            "gate:request:t",
            "gate:response:t:error",
            "first:response:t:error",
        ]
    );
}

#[tokio::test]
async fn test_unknown_component_is_observed_as_error() {
    let log = new_log();
    let server = Server::new("main");
    server.add_middleware(Recorder::new("audit", &log));

    assert!(server.call_tool("nope", json!({})).await.is_err());
    assert_eq!(
        entries(&log),
        vec!["audit:request:nope", "audit:response:nope:error"]
    );
}

#[tokio::test]
async fn test_background_submission_is_observed() {
    let log = new_log();
    let server = Server::new("main");
    server
        .register(constant("job", json!(1)).with_task_mode(TaskMode::Required))
        .unwrap();
    server.add_middleware(Recorder::new("audit", &log));

    server
        .submit(ComponentKind::Tool, "job", json!({}))
        .await
        .unwrap();
    assert_eq!(
        entries(&log),
        vec!["audit:request:job", "audit:response:job:ok"]
    );
}
