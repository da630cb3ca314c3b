//! Gameplay task scheduling.
//!
//! Tasks that need resources (or ask for priority management) are queued by
//! priority; the highest priority task whose resources are free runs, the
//! rest are paused until their resources come back.

#![warn(missing_docs)]

mod task;
mod owner;
mod component;
pub mod builtin;

pub use task::{GameplayTask, TaskContext, TaskInfo, TaskSpec, TaskState, ResourceOverlapPolicy};
pub use owner::{GameplayTaskOwner, TaskOwnerRef, TaskError};
pub use component::{GameplayTasksComponent, ClaimedResourcesListener};
pub use builtin::{WaitDelay, ClaimResource};
