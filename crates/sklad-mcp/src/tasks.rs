//! Task execution controller.
//!
//! Runs resolved components either synchronously (the caller awaits the
//! result) or in the background as tracked tasks. Background tasks are
//! spawned onto the Tokio runtime behind a semaphore, so at most
//! `max_concurrent_tasks` bodies run at once; the rest wait as `pending`.
//!
//! # Execution rules
//!
//! - The component's effective task mode decides which invocations are
//!   allowed; a violation is reported before anything runs.
//! - Arguments are checked against the component signature first.
//! - A sync call that exceeds the component timeout fails with `Timeout`;
//!   the body future is dropped. A background task that exceeds it ends
//!   `cancelled`, with the timeout recorded as the reason.
//! - Cancellation is cooperative: the task is marked `cancelled` at once
//!   and the body is dropped at its next await point.
//! - Body errors become `Execution` errors; with masking on, only
//!   [`ToolError::Visible`] messages reach the caller.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use sklad_core::config::{DEFAULT_MAX_CONCURRENT_TASKS, DEFAULT_TASK_RETENTION_SECS};
use sklad_core::error::MASKED_MESSAGE;
use sklad_core::{
    Component, ComponentKey, Context, Error, Invocation, Result, ServerConfig, StructuredError,
    TaskHandle, TaskId, TaskMode, TaskSnapshot, TaskState, ToolError,
};
use tokio::sync::Semaphore;

// ============================================================================
// Settings
// ============================================================================

/// Execution settings shared by every call of one server.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSettings {
    /// Task mode for components that declare none.
    pub default_task_mode: TaskMode,
    /// Replace internal error details with a generic message.
    pub mask_error_details: bool,
    /// Background concurrency limit.
    pub max_concurrent_tasks: usize,
    /// How long finished tasks stay queryable.
    pub retention: Duration,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            default_task_mode: TaskMode::default(),
            mask_error_details: false,
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            retention: Duration::from_secs(DEFAULT_TASK_RETENTION_SECS),
        }
    }
}

impl TaskSettings {
    /// Settings taken from a server configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            default_task_mode: config.default_task_mode,
            mask_error_details: config.mask_error_details,
            max_concurrent_tasks: config.max_concurrent_tasks.max(1),
            retention: Duration::from_secs(config.task_retention_secs),
        }
    }
}

// ============================================================================
// TaskOutcome
// ============================================================================

/// The result of a task, as far as it is known.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Still pending or running.
    InProgress(TaskState),
    /// Body returned a value.
    Succeeded(Value),
    /// Body failed.
    Failed(StructuredError),
    /// Cancelled by a caller or by timeout.
    Cancelled(StructuredError),
}

impl TaskOutcome {
    fn from_snapshot(snapshot: TaskSnapshot) -> Self {
        let error = || {
            snapshot.error.clone().unwrap_or_else(|| StructuredError {
                code: "unknown".to_string(),
                message: MASKED_MESSAGE.to_string(),
            })
        };
        match snapshot.state {
            TaskState::Succeeded => TaskOutcome::Succeeded(snapshot.result.clone().unwrap_or(Value::Null)),
            TaskState::Failed => TaskOutcome::Failed(error()),
            TaskState::Cancelled => TaskOutcome::Cancelled(error()),
            state => TaskOutcome::InProgress(state),
        }
    }
}

// ============================================================================
// TaskManager
// ============================================================================

/// Executes components and tracks background tasks.
///
/// Cheap to clone; clones share the task table and the semaphore.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

struct Inner {
    settings: TaskSettings,
    tasks: RwLock<HashMap<TaskId, TaskHandle>>,
    semaphore: Arc<Semaphore>,
}

impl TaskManager {
    /// Creates a manager.
    pub fn new(settings: TaskSettings) -> Self {
        let permits = settings.max_concurrent_tasks.max(1);
        Self {
            inner: Arc::new(Inner {
                settings,
                tasks: RwLock::new(HashMap::new()),
                semaphore: Arc::new(Semaphore::new(permits)),
            }),
        }
    }

    /// Execution settings.
    pub fn settings(&self) -> &TaskSettings {
        &self.inner.settings
    }

    /// Checks that `invocation` is allowed by the component's task mode.
    pub fn check_mode(&self, component: &Component, invocation: Invocation) -> Result<()> {
        let mode = component.effective_task_mode(self.inner.settings.default_task_mode);
        if mode.permits(invocation) {
            Ok(())
        } else {
            Err(Error::ModeViolation {
                component: component.key().to_string(),
                mode,
                requested: invocation.to_string(),
            })
        }
    }

    /// Runs a component and waits for its result.
    pub async fn execute(&self, component: &Component, args: Value) -> Result<Value> {
        self.check_mode(component, Invocation::Sync)?;
        check_arguments(component, &args)?;

        let key = component.key();
        let ctx = Context::new(key.clone());
        let cancel = ctx.cancel_signal().clone();
        let body = AssertUnwindSafe(component.callable().invoke(args, ctx)).catch_unwind();

        let outcome = match component.timeout() {
            Some(limit) => match tokio::time::timeout(limit, body).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    cancel.cancel();
                    let error = timeout_error(&key, limit);
                    tracing::warn!(component = %key, %error, "call timed out");
                    return Err(error);
                }
            },
            None => body.await,
        };

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(execution_error(&key, error, self.inner.settings.mask_error_details)),
            Err(_) => Err(panic_error(&key)),
        }
    }

    /// Starts a component as a background task.
    ///
    /// Mode and argument errors are returned immediately; everything after
    /// that is reported through the task. Must be called from within a
    /// Tokio runtime.
    pub fn spawn(&self, component: Component, args: Value) -> Result<TaskHandle> {
        self.check_mode(&component, Invocation::Background)?;
        check_arguments(&component, &args)?;

        let task = TaskHandle::new(component.key());
        self.inner
            .tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task.id(), task.clone());
        tracing::info!(task_id = %task.id(), component = %task.component(), "task submitted");

        let semaphore = Arc::clone(&self.inner.semaphore);
        let mask = self.inner.settings.mask_error_details;
        let runner = task.clone();
        tokio::spawn(async move {
            let cancel = runner.cancel_signal();
            let permit = tokio::select! {
                permit = semaphore.acquire_owned() => permit,
                () = cancel.cancelled() => return,
            };
            let Ok(_permit) = permit else {
                runner.cancel(Error::Cancelled { component: runner.component().to_string() }.to_structured(mask));
                return;
            };
            if runner.start() {
                run_task(runner, component, args, mask).await;
            }
        });

        Ok(task)
    }

    /// Looks up a task.
    pub fn get(&self, id: TaskId) -> Result<TaskHandle> {
        self.inner
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound { id: id.to_string() })
    }

    /// Current state of a task.
    pub fn status(&self, id: TaskId) -> Result<TaskState> {
        Ok(self.get(id)?.state())
    }

    /// Result of a task, or its state if it has not finished.
    pub fn result(&self, id: TaskId) -> Result<TaskOutcome> {
        Ok(TaskOutcome::from_snapshot(self.get(id)?.snapshot()))
    }

    /// Snapshots of every tracked task, oldest first.
    pub fn list(&self) -> Vec<TaskSnapshot> {
        let mut snapshots: Vec<TaskSnapshot> = self
            .inner
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(TaskHandle::snapshot)
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.created_at);
        snapshots
    }

    /// Requests cancellation. Returns `false` if the task already finished.
    pub fn cancel(&self, id: TaskId) -> Result<bool> {
        let task = self.get(id)?;
        let error = Error::Cancelled {
            component: task.component().to_string(),
        }
        .to_structured(self.inner.settings.mask_error_details);
        Ok(task.cancel(error))
    }

    /// Drops finished tasks older than the retention window.
    ///
    /// Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(retention) = chrono::Duration::from_std(self.inner.settings.retention) else {
            return 0;
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
            return 0;
        };
        let mut tasks = self.inner.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let before = tasks.len();
        tasks.retain(|_, task| {
            let snapshot = task.snapshot();
            !(snapshot.state.is_terminal() && snapshot.finished_at.is_some_and(|at| at <= cutoff))
        });
        let purged = before - tasks.len();
        if purged > 0 {
            tracing::debug!(purged, "purged expired tasks");
        }
        purged
    }

    /// Number of tracked tasks.
    pub fn len(&self) -> usize {
        self.inner.tasks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no task is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new(TaskSettings::default())
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("settings", &self.inner.settings)
            .field("tasks", &self.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Runner
// ----------------------------------------------------------------------------

async fn run_task(task: TaskHandle, component: Component, args: Value, mask: bool) {
    let key = component.key();
    let cancel = task.cancel_signal();
    let ctx = Context::for_task(task.clone());
    let body = AssertUnwindSafe(component.callable().invoke(args, ctx)).catch_unwind();
    let limit = component.timeout();
    let bounded = async move {
        match limit {
            Some(limit) => tokio::time::timeout(limit, body).await.ok(),
            None => Some(body.await),
        }
    };

    tokio::select! {
        outcome = bounded => match outcome {
            Some(Ok(Ok(value))) => {
                task.succeed(value);
            }
            Some(Ok(Err(error))) => {
                task.fail(execution_error(&key, error, mask).to_structured(mask));
            }
            Some(Err(_)) => {
                task.fail(panic_error(&key).to_structured(mask));
            }
            None => {
                let limit = limit.unwrap_or_default();
                task.cancel(timeout_error(&key, limit).to_structured(mask));
            }
        },
        () = cancel.cancelled() => {
            tracing::debug!(task_id = %task.id(), "dropping cancelled task body");
        }
    }
}

// ----------------------------------------------------------------------------
// Error translation
// ----------------------------------------------------------------------------

fn check_arguments(component: &Component, args: &Value) -> Result<()> {
    component
        .signature()
        .check(args)
        .map_err(|message| Error::invalid_arguments(component.key().to_string(), message))
}

fn execution_error(key: &ComponentKey, error: ToolError, mask: bool) -> Error {
    let component = key.to_string();
    match error {
        ToolError::Visible(message) => Error::Execution {
            component,
            message,
            visible: true,
        },
        ToolError::InvalidArguments(message) => Error::InvalidArguments { component, message },
        ToolError::Internal(message) => {
            tracing::warn!(component = %key, error = %message, "component body failed");
            Error::Execution {
                component,
                message: if mask { MASKED_MESSAGE.to_string() } else { message },
                visible: false,
            }
        }
    }
}

fn timeout_error(key: &ComponentKey, limit: Duration) -> Error {
    Error::Timeout {
        component: key.to_string(),
        millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
    }
}

fn panic_error(key: &ComponentKey) -> Error {
    tracing::error!(component = %key, "component body panicked");
    Error::Execution {
        component: key.to_string(),
        message: "component body panicked".to_string(),
        visible: false,
    }
}

// ============================================================================
// Tests
// ============================================================================
