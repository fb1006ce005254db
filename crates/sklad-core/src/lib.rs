#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Sklad Core
//!
//! Component model, registry, task primitives, configuration and errors
//! shared by every Sklad crate.
//!
//! # Modules
//!
//! - [`component`]: Tools, resources and prompts
//! - [`signature`]: Typed parameter descriptors
//! - [`callable`]: Component bodies and their execution context
//! - [`registry`]: Per-provider component storage and duplicate policy
//! - [`task`]: Task modes, states, progress and handles
//! - [`config`]: TOML server configuration
//! - [`error`]: Error types and Result alias

pub mod callable;
pub mod component;
pub mod config;
pub mod error;
pub mod registry;
pub mod signature;
pub mod task;

mod proptests;

// Re-exports for convenience
pub use callable::{CancelSignal, Callable, Context, ToolError};
pub use component::{Component, ComponentKey, ComponentKind};
pub use config::{FilesystemSource, ServerConfig, SkillsSource};
pub use error::{Error, Result, StructuredError};
pub use registry::{ComponentRegistry, DuplicatePolicy, Registration};
pub use signature::{Param, ParamType, Signature};
pub use task::{Invocation, TaskHandle, TaskId, TaskMode, TaskProgress, TaskSnapshot, TaskState};
