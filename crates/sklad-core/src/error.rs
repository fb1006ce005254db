//! Error types for sklad-core.
//!
//! One taxonomy is shared by every crate in the workspace. Administrative
//! errors (duplicates, discovery failures) are recovered by the caller that
//! produced them; execution errors are always returned to the requester as a
//! [`StructuredError`] value.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::component::ComponentKind;
use crate::task::TaskMode;

/// Result type alias for sklad operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while registering, resolving or executing components.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No provider resolves the requested component, or it is disabled.
    #[error("Unknown {kind}: {name}")]
    NotFound {
        /// Kind of the requested component.
        kind: ComponentKind,
        /// Requested (exposed) name.
        name: String,
    },

    /// Registration collided with an existing component under the `error` policy.
    #[error("Duplicate {kind}: {name}")]
    DuplicateName {
        /// Kind of the colliding component.
        kind: ComponentKind,
        /// Colliding name.
        name: String,
    },

    /// A single file or definition failed during filesystem discovery.
    #[error("Discovery error in {}: {message}", path.display())]
    Discovery {
        /// File that failed.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// A dynamic or custom provider failed to answer.
    #[error("Provider '{provider}' unavailable: {message}")]
    ProviderUnavailable {
        /// Provider name.
        provider: String,
        /// Failure description.
        message: String,
    },

    /// Requested execution mode is incompatible with the component's task mode.
    #[error("Component '{component}' has task mode '{mode}' and cannot run {requested}")]
    ModeViolation {
        /// Component key (`kind:name`).
        component: String,
        /// Declared task mode.
        mode: TaskMode,
        /// Human-readable description of the rejected request.
        requested: String,
    },

    /// The component body raised an error.
    #[error("Error calling {component}: {message}")]
    Execution {
        /// Component key (`kind:name`).
        component: String,
        /// Error message produced by the body.
        message: String,
        /// Whether the body marked the message as safe to show callers.
        visible: bool,
    },

    /// Execution exceeded the declared timeout.
    #[error("{component} timed out after {millis}ms")]
    Timeout {
        /// Component key (`kind:name`).
        component: String,
        /// Timeout that elapsed, in milliseconds.
        millis: u64,
    },

    /// Execution was cancelled before completion.
    #[error("{component} was cancelled")]
    Cancelled {
        /// Component key (`kind:name`).
        component: String,
    },

    /// Call arguments do not match the component signature.
    #[error("Invalid arguments for {component}: {message}")]
    InvalidArguments {
        /// Component key (`kind:name`).
        component: String,
        /// What is wrong with the arguments.
        message: String,
    },

    /// A component definition failed validation at registration.
    #[error("Invalid definition for '{name}': {message}")]
    InvalidDefinition {
        /// Component name.
        name: String,
        /// What is wrong with the definition.
        message: String,
    },

    /// No task with the given id is tracked.
    #[error("Task not found: {id}")]
    TaskNotFound {
        /// Task id.
        id: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Generic message used in place of masked execution details.
pub const MASKED_MESSAGE: &str = "An internal error occurred";

impl Error {
    /// Creates a `NotFound` error.
    pub fn not_found(kind: ComponentKind, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates a `Discovery` error for a path.
    pub fn discovery(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Discovery {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a `ProviderUnavailable` error.
    pub fn provider_unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates an `InvalidDefinition` error.
    pub fn invalid_definition(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidDefinition {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an `InvalidArguments` error.
    pub fn invalid_arguments(component: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidArguments {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::DuplicateName { .. } => "duplicate_name",
            Error::Discovery { .. } => "discovery",
            Error::ProviderUnavailable { .. } => "provider_unavailable",
            Error::ModeViolation { .. } => "mode_violation",
            Error::Execution { .. } => "execution",
            Error::Timeout { .. } => "timeout",
            Error::Cancelled { .. } => "cancelled",
            Error::InvalidArguments { .. } => "invalid_arguments",
            Error::InvalidDefinition { .. } => "invalid_definition",
            Error::TaskNotFound { .. } => "task_not_found",
            Error::Config { .. } => "config",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Toml(_) => "toml",
        }
    }

    /// Returns `true` for errors produced by administrative calls
    /// (registration, discovery, configuration) rather than by a request.
    pub fn is_administrative(&self) -> bool {
        matches!(
            self,
            Error::DuplicateName { .. }
                | Error::Discovery { .. }
                | Error::InvalidDefinition { .. }
                | Error::Config { .. }
        )
    }

    /// Returns `true` if the message may be shown to callers under masking.
    ///
    /// Only execution failures carry details from inside a component body;
    /// those are visible only when the body raised [`ToolError::Visible`].
    ///
    /// [`ToolError::Visible`]: crate::callable::ToolError::Visible
    pub fn is_caller_visible(&self) -> bool {
        match self {
            Error::Execution { visible, .. } => *visible,
            Error::Io(_) | Error::Serialization(_) | Error::ProviderUnavailable { .. } => false,
            _ => true,
        }
    }

    /// Converts into the structured form returned to callers.
    ///
    /// With `mask_details` set, messages that are not caller-visible are
    /// replaced by a generic message naming the component when known.
    pub fn to_structured(&self, mask_details: bool) -> StructuredError {
        let message = if mask_details && !self.is_caller_visible() {
            match self {
                Error::Execution { component, .. } => {
                    format!("Error calling {component}: {MASKED_MESSAGE}")
                }
                _ => MASKED_MESSAGE.to_string(),
            }
        } else {
            self.to_string()
        };
        StructuredError {
            code: self.code().to_string(),
            message,
        }
    }
}

/// Error as delivered to a caller through the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code (see [`Error::code`]).
    pub code: String,
    /// Message, possibly masked.
    pub message: String,
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
