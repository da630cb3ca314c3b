//! Gameplay task model - state machine, spec and callback interface.

use crate::owner::TaskOwnerRef;
use gametask_core::{HandleAllocator, ResourceSet, TaskHandle};
use serde::{Deserialize, Serialize};

/// Lifecycle of a gameplay task.
///
/// ```text
/// Uninitialized -> AwaitingActivation -> Active <-> Paused -> Finished
/// ```
/// `AwaitingActivation` may also go straight to `Finished` when the owner
/// goes away before the task ever ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Created, `init_task` not called yet
    Uninitialized,
    /// Initialized, waiting for the scheduler
    AwaitingActivation,
    /// Running
    Active,
    /// Suspended because a higher priority task took its resources
    Paused,
    /// Ended; never runs again
    Finished,
}

impl TaskState {
    /// Get string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::AwaitingActivation => "AwaitingActivation",
            Self::Active => "Active",
            Self::Paused => "Paused",
            Self::Finished => "Finished",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a new task is placed among queued tasks of the same priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceOverlapPolicy {
    /// New task goes in front of tasks with the same priority
    #[default]
    StartOnTop,
    /// New task goes behind tasks with the same priority
    StartAtEnd,
}

/// Static description of a task, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Instance name, used for lookups and logs
    pub name: String,

    /// Explicit priority; `None` takes the owner's default
    pub priority: Option<u8>,

    /// Resources the task needs to run
    pub required_resources: ResourceSet,

    /// Resources the task reserves to block lower priority tasks
    pub claimed_resources: ResourceSet,

    /// Add the required resources to the claimed ones at init
    pub claim_required_resources: bool,

    /// Whether the task wants `tick_task` calls while active
    pub ticking: bool,

    /// Go through the priority queue even without resources
    pub cares_about_priority: bool,

    /// Placement among same-priority tasks
    pub overlap_policy: ResourceOverlapPolicy,
}

impl TaskSpec {
    /// Create a spec with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: None,
            required_resources: ResourceSet::EMPTY,
            claimed_resources: ResourceSet::EMPTY,
            claim_required_resources: true,
            ticking: false,
            cares_about_priority: false,
            overlap_policy: ResourceOverlapPolicy::StartOnTop,
        }
    }

    /// Set an explicit priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the required resources.
    pub fn with_required(mut self, resources: ResourceSet) -> Self {
        self.required_resources = resources;
        self
    }

    /// Add extra claimed resources.
    pub fn with_claimed(mut self, resources: ResourceSet) -> Self {
        self.claimed_resources.add_set(resources);
        self
    }

    /// Control whether required resources are also claimed.
    pub fn with_claim_required(mut self, claim: bool) -> Self {
        self.claim_required_resources = claim;
        self
    }

    /// Make the task tick while active.
    pub fn ticking(mut self) -> Self {
        self.ticking = true;
        self
    }

    /// Force priority queue management.
    pub fn caring_about_priority(mut self) -> Self {
        self.cares_about_priority = true;
        self
    }

    /// Set the overlap policy.
    pub fn with_overlap_policy(mut self, policy: ResourceOverlapPolicy) -> Self {
        self.overlap_policy = policy;
        self
    }
}

/// Runtime view of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Handle of the task
    pub handle: TaskHandle,

    /// Instance name
    pub name: String,

    /// Effective priority (0-255, higher wins)
    pub priority: u8,

    /// Current state
    pub state: TaskState,

    /// Resources needed to run
    pub required_resources: ResourceSet,

    /// Resources reserved while active
    pub claimed_resources: ResourceSet,

    /// Same-priority placement
    pub overlap_policy: ResourceOverlapPolicy,

    /// Who owns the task
    pub owner: TaskOwnerRef,

    /// Ticks while active
    pub ticking: bool,

    /// Managed by the priority queue even without resources
    pub cares_about_priority: bool,

    /// Ended because its owner went away
    pub owner_finished: bool,

    /// Current child task, if any
    pub child: Option<TaskHandle>,
}

impl TaskInfo {
    pub(crate) fn from_spec(handle: TaskHandle, spec: &TaskSpec) -> Self {
        Self {
            handle,
            name: spec.name.clone(),
            priority: spec.priority.unwrap_or(gametask_core::DEFAULT_TASK_PRIORITY),
            state: TaskState::Uninitialized,
            required_resources: spec.required_resources,
            claimed_resources: spec.claimed_resources,
            overlap_policy: spec.overlap_policy,
            owner: TaskOwnerRef::Component,
            ticking: spec.ticking,
            cares_about_priority: spec.cares_about_priority,
            owner_finished: false,
            child: None,
        }
    }

    /// Whether activation has to go through the component's priority queue.
    pub fn requires_priority_or_resource_management(&self) -> bool {
        self.cares_about_priority
            || !self.required_resources.is_empty()
            || !self.claimed_resources.is_empty()
    }

    /// Whether the task is running.
    pub fn is_active(&self) -> bool {
        self.state == TaskState::Active
    }

    /// Whether the task is paused.
    pub fn is_paused(&self) -> bool {
        self.state == TaskState::Paused
    }

    /// Whether the task has ended.
    pub fn is_finished(&self) -> bool {
        self.state == TaskState::Finished
    }
}

/// Behavior of a gameplay task.
///
/// The component owns the state machine; implementations only react to the
/// transitions. Every callback gets a [`TaskContext`] through which the task
/// can end itself or other tasks and spawn children. Those requests are
/// applied as soon as the callback returns.
pub trait GameplayTask {
    /// Called once when the task becomes active for the first time.
    fn activate(&mut self, _ctx: &mut TaskContext<'_>) {}

    /// Called every component tick while active, for ticking tasks.
    fn tick_task(&mut self, _ctx: &mut TaskContext<'_>, _delta_time: f32) {}

    /// Called when a higher priority task takes over the resources.
    fn on_pause(&mut self, _ctx: &mut TaskContext<'_>) {}

    /// Called when the resources become available again.
    fn on_resume(&mut self, _ctx: &mut TaskContext<'_>) {}

    /// Called once when the task ends, for whatever reason.
    fn on_destroy(&mut self, _ctx: &mut TaskContext<'_>, _owner_finished: bool) {}

    /// External confirmation, ends the task if asked to.
    fn external_confirm(&mut self, ctx: &mut TaskContext<'_>, end_task: bool) {
        if end_task {
            ctx.end_task();
        }
    }

    /// External cancellation, ends the task.
    fn external_cancel(&mut self, ctx: &mut TaskContext<'_>) {
        ctx.end_task();
    }

    /// Extra text for debug dumps.
    fn debug_string(&self) -> String {
        String::new()
    }
}

/// Deferred request issued from inside a task callback.
pub(crate) enum TaskCommand {
    End(TaskHandle),
    Confirm(TaskHandle, bool),
    Cancel(TaskHandle),
    Ready(TaskHandle),
    Spawn {
        handle: TaskHandle,
        owner: TaskOwnerRef,
        body: Box<dyn GameplayTask>,
        spec: TaskSpec,
        activate: bool,
    },
}

/// Access to the scheduler from inside a task callback.
pub struct TaskContext<'a> {
    info: TaskInfo,
    handles: &'a mut HandleAllocator,
    commands: Vec<TaskCommand>,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(info: TaskInfo, handles: &'a mut HandleAllocator) -> Self {
        Self {
            info,
            handles,
            commands: Vec::new(),
        }
    }

    pub(crate) fn into_commands(self) -> Vec<TaskCommand> {
        self.commands
    }

    /// Handle of the task being called.
    pub fn handle(&self) -> TaskHandle {
        self.info.handle
    }

    /// Snapshot of the task taken right before the callback.
    pub fn info(&self) -> &TaskInfo {
        &self.info
    }

    /// State of the task when the callback started.
    pub fn state(&self) -> TaskState {
        self.info.state
    }

    /// Priority of the task.
    pub fn priority(&self) -> u8 {
        self.info.priority
    }

    /// End this task.
    pub fn end_task(&mut self) {
        self.commands.push(TaskCommand::End(self.info.handle));
    }

    /// End another task.
    pub fn end_other(&mut self, other: TaskHandle) {
        self.commands.push(TaskCommand::End(other));
    }

    /// Forward an external confirmation to another task.
    pub fn confirm_other(&mut self, other: TaskHandle, end_task: bool) {
        self.commands.push(TaskCommand::Confirm(other, end_task));
    }

    /// Forward an external cancellation to another task.
    pub fn cancel_other(&mut self, other: TaskHandle) {
        self.commands.push(TaskCommand::Cancel(other));
    }

    /// Request activation of an initialized task.
    pub fn ready_for_activation(&mut self, other: TaskHandle) {
        self.commands.push(TaskCommand::Ready(other));
    }

    /// Create and initialize a child task owned by this task.
    ///
    /// Any previous child is ended. The child is not activated.
    pub fn spawn_child(&mut self, body: Box<dyn GameplayTask>, spec: TaskSpec) -> TaskHandle {
        self.spawn(body, spec, false)
    }

    /// Create, initialize and activate a child task owned by this task.
    pub fn run_child(&mut self, body: Box<dyn GameplayTask>, spec: TaskSpec) -> TaskHandle {
        self.spawn(body, spec, true)
    }

    fn spawn(&mut self, body: Box<dyn GameplayTask>, spec: TaskSpec, activate: bool) -> TaskHandle {
        let handle = self.handles.next_task();
        self.commands.push(TaskCommand::Spawn {
            handle,
            owner: TaskOwnerRef::Task(self.info.handle),
            body,
            spec,
            activate,
        });
        handle
    }
}
