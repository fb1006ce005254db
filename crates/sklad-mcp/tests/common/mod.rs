//! Common test utilities and harness for sklad-mcp integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use sklad_core::{Callable, Component, Error, Result};
use sklad_mcp::{CallRequest, HandlerCatalog, Middleware};
use tempfile::TempDir;

/// Test harness owning a scratch directory for manifests and skills.
pub struct TestHarness {
    /// Scratch directory, removed on drop.
    pub dir: TempDir,
}

impl TestHarness {
    /// Creates a harness with an empty scratch directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// Root of the scratch directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(path, content).expect("write file");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A tool that always returns `value`.
pub fn constant(name: &str, value: Value) -> Component {
    Component::tool(
        name,
        Callable::from_async(move |_args, _ctx| {
            let value = value.clone();
            async move { Ok(value) }
        }),
    )
}

/// A tool that returns its arguments.
pub fn echo_args(name: &str) -> Component {
    Component::tool(
        name,
        Callable::from_async(|args, _ctx| async move { Ok(args) }),
    )
}

/// Handlers that filesystem manifests in these tests refer to.
pub fn catalog() -> HandlerCatalog {
    HandlerCatalog::new()
        .with(
            "from_fs",
            Callable::from_async(|_args, _ctx| async move { Ok(json!("filesystem")) }),
        )
        .with(
            "motd",
            Callable::from_async(|_args, _ctx| async move { Ok(json!("hello from disk")) }),
        )
}

/// Exposed names, in listing order.
pub fn names(components: &[Component]) -> Vec<String> {
    components.iter().map(|c| c.name().to_string()).collect()
}

/// Middleware that records every hook call and can reject requests.
pub struct Recorder {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    reject: bool,
}

impl Recorder {
    /// A recorder writing into `log`.
    pub fn new(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label,
            log: Arc::clone(log),
            reject: false,
        }
    }

    /// Rejects every request.
    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }
}

impl Middleware for Recorder {
    fn name(&self) -> &str {
        self.label
    }

    fn on_request(&self, request: &CallRequest) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:request:{}", self.label, request.key.name));
        if self.reject {
            return Err(Error::InvalidArguments {
                component: request.key.to_string(),
                message: format!("rejected by {}", self.label),
            });
        }
        Ok(())
    }

    fn on_response(
        &self,
        request: &CallRequest,
        outcome: std::result::Result<&Value, &Error>,
        _elapsed: Duration,
    ) {
        let status = if outcome.is_ok() { "ok" } else { "error" };
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:response:{}:{status}", self.label, request.key.name));
    }
}

/// A fresh shared log.
pub fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

/// Contents of a shared log.
pub fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}
