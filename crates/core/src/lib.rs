//! Core types shared by the gameplay task and pawn action schedulers.
//!
//! This crate defines resource sets, priority-keyed resource locks, entity
//! handles and the runtime configuration.

#![warn(missing_docs)]

mod id;
mod resource;
mod lock;
mod config;

pub use id::{OwnerId, TaskHandle, ActionHandle, HandleAllocator};
pub use resource::{ResourceId, ResourceSet, ResourceRegistry, ResourceError, MAX_RESOURCES};
pub use lock::{AiRequestPriority, ResourceLock};
pub use config::{
    RuntimeConfig, TasksConfig, ActionsConfig, HarnessConfig, ResourceDecl, ConfigError,
    DEFAULT_TASK_PRIORITY,
};
