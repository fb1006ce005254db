//! Component bodies and their execution context.
//!
//! A [`Callable`] is either an async body returning a boxed future or a
//! blocking body that runs on the blocking pool. Bodies receive JSON
//! arguments and a [`Context`] carrying progress reporting and the
//! cooperative cancellation signal. State is captured explicitly by the
//! closure; nothing is shared through process globals.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;

use crate::component::ComponentKey;
use crate::task::{TaskHandle, TaskId};

/// Boxed future returned by async bodies.
pub type BodyFuture = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>;

/// Async body signature.
pub type AsyncBody = dyn Fn(Value, Context) -> BodyFuture + Send + Sync;

/// Blocking body signature.
pub type BlockingBody = dyn Fn(Value, Context) -> Result<Value, ToolError> + Send + Sync;

// ============================================================================
// ToolError
// ============================================================================

/// Error raised from inside a component body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// Message meant for the caller; shown even when masking is on.
    #[error("{0}")]
    Visible(String),
    /// Internal failure; replaced by a generic message under masking.
    #[error("{0}")]
    Internal(String),
    /// Arguments could not be decoded into the body's parameter type.
    #[error("{0}")]
    InvalidArguments(String),
}

impl ToolError {
    /// Caller-visible error.
    pub fn visible(message: impl Into<String>) -> Self {
        ToolError::Visible(message.into())
    }

    /// Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ToolError::Internal(message.into())
    }

    /// Wraps any error as internal.
    pub fn from_error<E: std::error::Error>(err: E) -> Self {
        ToolError::Internal(err.to_string())
    }
}

// ============================================================================
// CancelSignal
// ============================================================================

/// Cooperative cancellation flag shared between a runner and a body.
///
/// Cheap to clone; every clone observes the same flag.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    /// Creates an unset signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes when cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Context
// ============================================================================

/// Per-invocation context handed to component bodies.
#[derive(Clone, Debug)]
pub struct Context {
    key: ComponentKey,
    task: Option<TaskHandle>,
    cancel: CancelSignal,
}

impl Context {
    /// Context for a synchronous invocation: no task, fresh cancel signal.
    pub fn new(key: ComponentKey) -> Self {
        Self {
            key,
            task: None,
            cancel: CancelSignal::new(),
        }
    }

    /// Context bound to a background task.
    pub fn for_task(task: TaskHandle) -> Self {
        Self {
            key: task.component().clone(),
            cancel: task.cancel_signal(),
            task: Some(task),
        }
    }

    /// Key of the component being executed (as exposed to the caller).
    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    /// Id of the backing task, if running in the background.
    pub fn task_id(&self) -> Option<TaskId> {
        self.task.as_ref().map(TaskHandle::id)
    }

    /// The cancellation signal.
    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Cooperative checkpoint: `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sets the expected total. No-op outside a running task.
    pub fn set_total(&self, total: f64) {
        if let Some(task) = &self.task {
            task.set_total(total);
        }
    }

    /// Advances progress by `amount`. No-op outside a running task.
    pub fn increment(&self, amount: f64) {
        if let Some(task) = &self.task {
            task.increment(amount);
        }
    }

    /// Sets the status message. No-op outside a running task.
    pub fn set_message(&self, message: impl Into<String>) {
        if let Some(task) = &self.task {
            task.set_message(message);
        }
    }

    /// Reports absolute progress. No-op outside a running task.
    pub fn report(&self, current: f64, total: Option<f64>, message: Option<String>) {
        if let Some(task) = &self.task {
            task.report(current, total, message);
        }
    }
}

// ============================================================================
// Callable
// ============================================================================

/// The executable body of a component.
#[derive(Clone)]
pub enum Callable {
    /// Cooperative async body.
    Async(Arc<AsyncBody>),
    /// Blocking body, run on the blocking thread pool.
    Blocking(Arc<BlockingBody>),
}

impl Callable {
    /// Wraps an async closure.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Callable::Async(Arc::new(move |args: Value, ctx: Context| -> BodyFuture {
            Box::pin(f(args, ctx))
        }))
    }

    /// Wraps a blocking closure.
    pub fn from_blocking<F>(f: F) -> Self
    where
        F: Fn(Value, Context) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        Callable::Blocking(Arc::new(f))
    }

    /// Adapts a typed async function: arguments are decoded into `A` and the
    /// result is encoded from `R`.
    pub fn typed<A, R, F, Fut>(f: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
    {
        let f = Arc::new(f);
        Callable::from_async(move |args, ctx| {
            let f = Arc::clone(&f);
            async move {
                let decoded = decode_args::<A>(args)?;
                let output = f(decoded, ctx).await?;
                serde_json::to_value(output).map_err(ToolError::from_error)
            }
        })
    }

    /// Adapts a typed blocking function.
    pub fn typed_blocking<A, R, F>(f: F) -> Self
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(A, Context) -> Result<R, ToolError> + Send + Sync + 'static,
    {
        Callable::from_blocking(move |args, ctx| {
            let output = f(decode_args::<A>(args)?, ctx)?;
            serde_json::to_value(output).map_err(ToolError::from_error)
        })
    }

    /// Returns `true` for blocking bodies.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Callable::Blocking(_))
    }

    /// Returns a callable that rewrites arguments before delegating.
    pub fn map_args<M>(self, map: M) -> Self
    where
        M: Fn(Value) -> Value + Send + Sync + 'static,
    {
        let map = Arc::new(map);
        match self {
            Callable::Async(body) => {
                Callable::Async(Arc::new(move |args: Value, ctx: Context| body(map(args), ctx)))
            }
            Callable::Blocking(body) => {
                Callable::Blocking(Arc::new(move |args: Value, ctx: Context| {
                    body(map(args), ctx)
                }))
            }
        }
    }

    /// Runs the body to completion.
    ///
    /// Blocking bodies are moved to the blocking pool; if the returned future
    /// is dropped they keep running until their next cancellation checkpoint.
    pub async fn invoke(&self, args: Value, ctx: Context) -> Result<Value, ToolError> {
        match self {
            Callable::Async(body) => body(args, ctx).await,
            Callable::Blocking(body) => {
                let body = Arc::clone(body);
                tokio::task::spawn_blocking(move || body(args, ctx))
                    .await
                    .map_err(|e| ToolError::internal(format!("blocking body failed: {e}")))?
            }
        }
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::Async(_) => f.write_str("Callable::Async"),
            Callable::Blocking(_) => f.write_str("Callable::Blocking"),
        }
    }
}

fn decode_args<A: DeserializeOwned>(args: Value) -> Result<A, ToolError> {
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}
