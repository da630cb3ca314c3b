//! Task owners and errors at the task creation boundary.

use crate::task::TaskInfo;
use gametask_core::{OwnerId, TaskHandle, DEFAULT_TASK_PRIORITY};
use serde::{Deserialize, Serialize};

/// Who owns a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskOwnerRef {
    /// The tasks component itself
    Component,
    /// A registered [`GameplayTaskOwner`]
    Owner(OwnerId),
    /// Another task (the new task becomes its child)
    Task(TaskHandle),
}

impl std::fmt::Display for TaskOwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Component => f.write_str("component"),
            Self::Owner(id) => write!(f, "owner {}", id),
            Self::Task(handle) => write!(f, "{}", handle),
        }
    }
}

/// Something that creates tasks and wants to hear about their lifecycle.
///
/// Owners are registered with the component and referenced by [`OwnerId`].
pub trait GameplayTaskOwner {
    /// Priority for tasks that do not ask for one.
    fn default_priority(&self) -> u8 {
        DEFAULT_TASK_PRIORITY
    }

    /// Name of the avatar (the in-world entity) acting for this owner.
    fn avatar(&self) -> Option<&str> {
        None
    }

    /// A task owned by this owner was initialized.
    fn on_task_initialized(&mut self, _task: &TaskInfo) {}

    /// A task owned by this owner became active (started or resumed).
    fn on_task_activated(&mut self, _task: &TaskInfo) {}

    /// A task owned by this owner was paused or finished.
    fn on_task_deactivated(&mut self, _task: &TaskInfo) {}
}

/// Errors when creating or initializing tasks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Handle does not resolve
    #[error("unknown task {0}")]
    UnknownTask(TaskHandle),

    /// Owner is not registered
    #[error("unknown task owner {0}")]
    UnknownOwner(OwnerId),

    /// `init_task` called twice
    #[error("task {0} is already initialized")]
    AlreadyInitialized(TaskHandle),

    /// Parent task has already ended
    #[error("parent task {0} is finished")]
    ParentFinished(TaskHandle),

    /// A task cannot own itself
    #[error("task {0} cannot own itself")]
    SelfOwned(TaskHandle),
}
