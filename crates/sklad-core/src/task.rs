//! Background task state and progress.
//!
//! Provides [`TaskState`] and [`TaskHandle`] for tracking a component
//! invocation that runs in the background.
//!
//! # State machine
//!
//! ```text
//! pending ──► running ──► succeeded
//!    │           ├──────► failed
//!    └───────────┴──────► cancelled
//! ```
//!
//! # Usage
//!
//! ```rust
//! use sklad_core::component::ComponentKey;
//! use sklad_core::task::{TaskHandle, TaskState};
//!
//! let handle = TaskHandle::new(ComponentKey::tool("process_files"));
//! assert_eq!(handle.state(), TaskState::Pending);
//!
//! assert!(handle.start());
//! handle.set_total(4.0);
//! handle.increment(1.0);
//! assert_eq!(handle.snapshot().progress.current, 1.0);
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use crate::callable::CancelSignal;
use crate::component::ComponentKey;
use crate::error::{Error, Result, StructuredError};

// ============================================================================
// TaskMode / Invocation
// ============================================================================

/// Whether a component may, must, or must not run as a background task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    /// Synchronous invocation only.
    #[default]
    Forbidden,
    /// Caller chooses.
    Optional,
    /// Background invocation only.
    Required,
}

impl TaskMode {
    /// Returns `true` if background execution may be requested.
    pub fn allows_background(&self) -> bool {
        matches!(self, TaskMode::Optional | TaskMode::Required)
    }

    /// Returns `true` if synchronous execution may be requested.
    pub fn allows_sync(&self) -> bool {
        matches!(self, TaskMode::Forbidden | TaskMode::Optional)
    }

    /// Returns `true` if `invocation` is permitted under this mode.
    pub fn permits(&self, invocation: Invocation) -> bool {
        match invocation {
            Invocation::Sync => self.allows_sync(),
            Invocation::Background => self.allows_background(),
        }
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskMode::Forbidden => write!(f, "forbidden"),
            TaskMode::Optional => write!(f, "optional"),
            TaskMode::Required => write!(f, "required"),
        }
    }
}

impl FromStr for TaskMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "forbidden" => Ok(TaskMode::Forbidden),
            "optional" => Ok(TaskMode::Optional),
            "required" => Ok(TaskMode::Required),
            other => Err(Error::config(format!("unknown task mode '{other}'"))),
        }
    }
}

/// How a caller asks for a component to be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Invocation {
    /// Wait for the result in the request.
    Sync,
    /// Start a task and return its id immediately.
    Background,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Sync => write!(f, "synchronously"),
            Invocation::Background => write!(f, "as a background task"),
        }
    }
}

// ============================================================================
// TaskId
// ============================================================================

/// Unique identifier for a background task.
///
/// Internally represented as a UUID v4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ============================================================================
// TaskState
// ============================================================================

/// State of a task in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Created, waiting for a worker.
    Pending,
    /// Body is executing.
    Running,
    /// Body returned a value.
    Succeeded,
    /// Body raised an error.
    Failed,
    /// Cancelled by the caller or by timeout.
    Cancelled,
}

impl TaskState {
    /// Returns `true` if the task finished (succeeded, failed or cancelled).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Returns `true` if the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Pending, TaskState::Running)
                | (TaskState::Pending, TaskState::Cancelled)
                | (TaskState::Running, TaskState::Succeeded)
                | (TaskState::Running, TaskState::Failed)
                | (TaskState::Running, TaskState::Cancelled)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Running => write!(f, "running"),
            TaskState::Succeeded => write!(f, "succeeded"),
            TaskState::Failed => write!(f, "failed"),
            TaskState::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Progress of a running task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Work completed so far.
    pub current: f64,
    /// Expected total, if known.
    pub total: Option<f64>,
    /// Latest status message.
    pub message: Option<String>,
}

/// Point-in-time view of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task id.
    pub id: TaskId,
    /// Key of the component being executed.
    pub component: ComponentKey,
    /// Current state.
    pub state: TaskState,
    /// Current progress.
    pub progress: TaskProgress,
    /// Result value once succeeded.
    pub result: Option<Value>,
    /// Error once failed or cancelled.
    pub error: Option<StructuredError>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time the body started.
    pub started_at: Option<DateTime<Utc>>,
    /// Time the task reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

// ============================================================================
// TaskHandle
// ============================================================================

/// Thread-safe handle for observing and driving a task.
///
/// Cheap to clone (Arc internals). State changes are broadcast to all
/// subscribers via a watch channel.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<TaskHandleInner>,
}

struct TaskHandleInner {
    id: TaskId,
    component: ComponentKey,
    tx: watch::Sender<TaskSnapshot>,
    cancel: CancelSignal,
}

impl TaskHandle {
    /// Creates a pending task for `component`.
    pub fn new(component: ComponentKey) -> Self {
        let id = TaskId::new();
        let (tx, _rx) = watch::channel(TaskSnapshot {
            id,
            component: component.clone(),
            state: TaskState::Pending,
            progress: TaskProgress::default(),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        });
        Self {
            inner: Arc::new(TaskHandleInner {
                id,
                component,
                tx,
                cancel: CancelSignal::new(),
            }),
        }
    }

    /// Task id.
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Component key.
    pub fn component(&self) -> &ComponentKey {
        &self.inner.component
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        self.inner.tx.borrow().state
    }

    /// Full snapshot.
    pub fn snapshot(&self) -> TaskSnapshot {
        self.inner.tx.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.inner.tx.subscribe()
    }

    /// Cancellation signal observed by the body.
    pub fn cancel_signal(&self) -> CancelSignal {
        self.inner.cancel.clone()
    }

    /// `pending → running`. Returns `false` if the transition is not allowed.
    pub fn start(&self) -> bool {
        self.transition(TaskState::Running, |snapshot| {
            snapshot.started_at = Some(Utc::now());
        })
    }

    /// `running → succeeded`.
    pub fn succeed(&self, value: Value) -> bool {
        self.transition(TaskState::Succeeded, |snapshot| {
            snapshot.result = Some(value);
            snapshot.finished_at = Some(Utc::now());
        })
    }

    /// `running → failed`.
    pub fn fail(&self, error: StructuredError) -> bool {
        self.transition(TaskState::Failed, |snapshot| {
            snapshot.error = Some(error);
            snapshot.finished_at = Some(Utc::now());
        })
    }

    /// `pending|running → cancelled`, signalling the body.
    pub fn cancel(&self, error: StructuredError) -> bool {
        self.inner.cancel.cancel();
        self.transition(TaskState::Cancelled, |snapshot| {
            snapshot.error = Some(error);
            snapshot.finished_at = Some(Utc::now());
        })
    }

    /// Sets the expected total. Ignored unless running.
    pub fn set_total(&self, total: f64) {
        self.update_progress(|progress| progress.total = Some(total));
    }

    /// Advances progress. Ignored unless running.
    pub fn increment(&self, amount: f64) {
        self.update_progress(|progress| progress.current += amount);
    }

    /// Sets the status message. Ignored unless running.
    pub fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.update_progress(|progress| progress.message = Some(message));
    }

    /// Reports absolute progress. Ignored unless running.
    pub fn report(&self, current: f64, total: Option<f64>, message: Option<String>) {
        self.update_progress(|progress| {
            progress.current = current;
            if total.is_some() {
                progress.total = total;
            }
            if message.is_some() {
                progress.message = message;
            }
        });
    }

    /// Wait until the task reaches a terminal state, or timeout.
    pub async fn wait(&self, timeout: Duration) -> Result<TaskSnapshot> {
        let mut rx = self.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|s| s.state.is_terminal())).await;
        match waited {
            Ok(Ok(snapshot)) => Ok(TaskSnapshot::clone(&snapshot)),
            Ok(Err(_)) => Err(Error::TaskNotFound {
                id: self.inner.id.to_string(),
            }),
            Err(_) => Err(Error::Timeout {
                component: self.inner.component.to_string(),
                millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    fn transition(&self, next: TaskState, apply: impl FnOnce(&mut TaskSnapshot)) -> bool {
        let changed = self.inner.tx.send_if_modified(|snapshot| {
            if !snapshot.state.can_transition_to(next) {
                return false;
            }
            snapshot.state = next;
            apply(snapshot);
            true
        });
        if changed {
            tracing::info!(
                task_id = %self.inner.id,
                component = %self.inner.component,
                state = %next,
                "task state changed"
            );
        } else {
            tracing::debug!(
                task_id = %self.inner.id,
                state = %self.state(),
                requested = %next,
                "ignored task transition"
            );
        }
        changed
    }

    fn update_progress(&self, apply: impl FnOnce(&mut TaskProgress)) {
        self.inner.tx.send_if_modified(|snapshot| {
            if snapshot.state != TaskState::Running {
                return false;
            }
            apply(&mut snapshot.progress);
            true
        });
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.inner.id)
            .field("component", &self.inner.component)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handle() -> TaskHandle {
        TaskHandle::new(ComponentKey::tool("long_running_operation"))
    }

    fn structured(code: &str) -> StructuredError {
        StructuredError {
            code: code.to_string(),
            message: code.to_string(),
        }
    }

    #[test]
    fn test_task_mode_permits() {
        assert!(TaskMode::Forbidden.permits(Invocation::Sync));
        assert!(!TaskMode::Forbidden.permits(Invocation::Background));
        assert!(TaskMode::Optional.permits(Invocation::Sync));
        assert!(TaskMode::Optional.permits(Invocation::Background));
        assert!(!TaskMode::Required.permits(Invocation::Sync));
        assert!(TaskMode::Required.permits(Invocation::Background));
    }

    #[test]
    fn test_task_mode_parse() {
        assert_eq!("optional".parse::<TaskMode>().unwrap(), TaskMode::Optional);
        assert!("sometimes".parse::<TaskMode>().is_err());
        assert_eq!(TaskMode::default(), TaskMode::Forbidden);
    }

    #[test]
    fn test_task_state_terminal() {
        assert!(TaskState::Succeeded.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn test_task_state_display() {
        assert_eq!(TaskState::Pending.to_string(), "pending");
        assert_eq!(TaskState::Running.to_string(), "running");
        assert_eq!(TaskState::Succeeded.to_string(), "succeeded");
        assert_eq!(TaskState::Failed.to_string(), "failed");
        assert_eq!(TaskState::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_happy_path_transitions() {
        let handle = handle();
        assert!(handle.start());
        assert_eq!(handle.state(), TaskState::Running);
        assert!(handle.succeed(json!("done")));

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, TaskState::Succeeded);
        assert_eq!(snapshot.result, Some(json!("done")));
        assert!(snapshot.started_at.is_some());
        assert!(snapshot.finished_at.is_some());
    }

    #[test]
    fn test_illegal_transitions_are_rejected() {
        let handle = handle();
        assert!(!handle.succeed(json!(1)));
        assert!(!handle.fail(structured("execution")));
        assert_eq!(handle.state(), TaskState::Pending);

        assert!(handle.start());
        assert!(!handle.start());
        assert!(handle.fail(structured("execution")));
        assert!(!handle.cancel(structured("cancelled")));
        assert_eq!(handle.state(), TaskState::Failed);
    }

    #[test]
    fn test_cancel_signals_body() {
        let handle = handle();
        let signal = handle.cancel_signal();
        assert!(handle.cancel(structured("cancelled")));
        assert!(signal.is_cancelled());
        assert_eq!(handle.state(), TaskState::Cancelled);
    }

    #[test]
    fn test_progress_only_while_running() {
        let handle = handle();
        handle.set_total(10.0);
        handle.increment(3.0);
        assert_eq!(handle.snapshot().progress, TaskProgress::default());

        handle.start();
        handle.set_total(10.0);
        handle.increment(3.0);
        handle.increment(2.0);
        handle.set_message("Processing b.txt");
        let progress = handle.snapshot().progress;
        assert_eq!(progress.current, 5.0);
        assert_eq!(progress.total, Some(10.0));
        assert_eq!(progress.message.as_deref(), Some("Processing b.txt"));

        handle.succeed(json!(null));
        handle.increment(1.0);
        assert_eq!(handle.snapshot().progress.current, 5.0);
    }

    #[test]
    fn test_report_absolute_progress() {
        let handle = handle();
        handle.start();
        handle.report(40.0, Some(100.0), Some("Step 4 of 10".to_string()));
        handle.report(50.0, None, None);
        let progress = handle.snapshot().progress;
        assert_eq!(progress.current, 50.0);
        assert_eq!(progress.total, Some(100.0));
        assert_eq!(progress.message.as_deref(), Some("Step 4 of 10"));
    }

    #[tokio::test]
    async fn test_wait_for_terminal_state() {
        let handle = handle();
        let h = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            h.start();
            tokio::time::sleep(Duration::from_millis(10)).await;
            h.succeed(json!(42));
        });

        let snapshot = handle.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(snapshot.state, TaskState::Succeeded);
        assert_eq!(snapshot.result, Some(json!(42)));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let handle = handle();
        handle.start();
        let err = handle.wait(Duration::from_millis(20)).await.unwrap_err();
        assert_eq!(err.code(), "timeout");
    }

    #[test]
    fn test_task_id_parse_roundtrip() {
        let id = TaskId::new();
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_snapshot_serializes_lowercase_state() {
        let json = serde_json::to_value(handle().snapshot()).unwrap();
        assert_eq!(json["state"], "pending");
        assert_eq!(json["component"]["kind"], "tool");
    }

    fn _assert_send_sync<T: Send + Sync>() {}
    #[test]
    fn test_task_handle_send_sync() {
        _assert_send_sync::<TaskHandle>();
        _assert_send_sync::<TaskSnapshot>();
    }
}
