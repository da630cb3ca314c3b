//! Logging mock tasks, owners and actions.

use crate::logger::TestLogger;
use gametask_actions::{ActionContext, ActionResult, ActionSpec, PawnAction};
use gametask_core::{ActionHandle, DEFAULT_TASK_PRIORITY};
use gametask_tasks::{GameplayTask, GameplayTaskOwner, TaskContext, TaskInfo};

/// What a [`MockTask`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMessage {
    /// `activate` was called
    Activate,
    /// `tick_task` was called
    Tick,
    /// Paused by a higher priority task
    Pause,
    /// Resumed
    Resume,
    /// External confirmation received
    ExternalConfirm,
    /// External cancellation received
    ExternalCancel,
    /// `on_destroy` was called
    Ended,
}

/// Log entry of a mock task: `(task name, message)`.
pub type TaskLog = TestLogger<(String, TaskMessage)>;

/// Task that logs every callback.
pub struct MockTask {
    name: String,
    log: TaskLog,
    end_on_activate: bool,
    end_after_ticks: Option<u32>,
    ticks: u32,
}

impl MockTask {
    /// Create a mock task.
    pub fn new(name: impl Into<String>, log: &TaskLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            end_on_activate: false,
            end_after_ticks: None,
            ticks: 0,
        }
    }

    /// End the task from inside `activate`.
    pub fn instant_finish(mut self) -> Self {
        self.end_on_activate = true;
        self
    }

    /// End the task after `ticks` ticks.
    pub fn end_after_ticks(mut self, ticks: u32) -> Self {
        self.end_after_ticks = Some(ticks);
        self
    }

    /// Box the task.
    pub fn boxed(self) -> Box<dyn GameplayTask> {
        Box::new(self)
    }

    fn log(&self, message: TaskMessage) {
        self.log.log((self.name.clone(), message));
    }
}

impl GameplayTask for MockTask {
    fn activate(&mut self, ctx: &mut TaskContext<'_>) {
        self.log(TaskMessage::Activate);
        if self.end_on_activate {
            ctx.end_task();
        }
    }

    fn tick_task(&mut self, ctx: &mut TaskContext<'_>, _delta_time: f32) {
        self.log(TaskMessage::Tick);
        self.ticks += 1;
        if self.end_after_ticks.map_or(false, |limit| self.ticks >= limit) {
            ctx.end_task();
        }
    }

    fn on_pause(&mut self, _ctx: &mut TaskContext<'_>) {
        self.log(TaskMessage::Pause);
    }

    fn on_resume(&mut self, _ctx: &mut TaskContext<'_>) {
        self.log(TaskMessage::Resume);
    }

    fn on_destroy(&mut self, _ctx: &mut TaskContext<'_>, _owner_finished: bool) {
        self.log(TaskMessage::Ended);
    }

    fn external_confirm(&mut self, ctx: &mut TaskContext<'_>, end_task: bool) {
        self.log(TaskMessage::ExternalConfirm);
        if end_task {
            ctx.end_task();
        }
    }

    fn external_cancel(&mut self, ctx: &mut TaskContext<'_>) {
        self.log(TaskMessage::ExternalCancel);
        ctx.end_task();
    }

    fn debug_string(&self) -> String {
        format!("(ticks: {})", self.ticks)
    }
}

/// What a [`MockOwner`] hears about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerMessage {
    /// A task was initialized
    Initialized,
    /// A task became active
    Activated,
    /// A task was paused or ended
    Deactivated,
}

/// Log entry of a mock owner: `(task name, message)`.
pub type OwnerLog = TestLogger<(String, OwnerMessage)>;

/// Owner that logs lifecycle notifications.
pub struct MockOwner {
    log: OwnerLog,
    default_priority: u8,
}

impl MockOwner {
    /// Create an owner with the default task priority.
    pub fn new(log: &OwnerLog) -> Self {
        Self {
            log: log.clone(),
            default_priority: DEFAULT_TASK_PRIORITY,
        }
    }

    /// Use another default priority.
    pub fn with_default_priority(mut self, priority: u8) -> Self {
        self.default_priority = priority;
        self
    }
}

impl GameplayTaskOwner for MockOwner {
    fn default_priority(&self) -> u8 {
        self.default_priority
    }

    fn on_task_initialized(&mut self, task: &TaskInfo) {
        self.log.log((task.name.clone(), OwnerMessage::Initialized));
    }

    fn on_task_activated(&mut self, task: &TaskInfo) {
        self.log.log((task.name.clone(), OwnerMessage::Activated));
    }

    fn on_task_deactivated(&mut self, task: &TaskInfo) {
        self.log.log((task.name.clone(), OwnerMessage::Deactivated));
    }
}

/// What a [`TestPawnAction`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMessage {
    /// Started
    Started,
    /// Paused
    Paused,
    /// Resumed
    Resumed,
    /// Left its stack
    Finished,
    /// Its child left the stack
    ChildFinished,
}

/// Log entry of a test action: `(action name, message)`.
pub type ActionLog = TestLogger<(String, ActionMessage)>;

/// Action that logs every callback.
pub struct TestPawnAction {
    name: String,
    log: ActionLog,
    child_on_start: Option<String>,
}

impl TestPawnAction {
    /// Create a test action.
    pub fn new(name: impl Into<String>, log: &ActionLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            child_on_start: None,
        }
    }

    /// Push a child test action with the given name when started.
    pub fn with_child_on_start(mut self, child: impl Into<String>) -> Self {
        self.child_on_start = Some(child.into());
        self
    }

    /// Spec named after the action.
    pub fn spec(&self) -> ActionSpec {
        ActionSpec::new(self.name.clone())
    }

    /// Box the action together with its spec.
    pub fn into_parts(self) -> (Box<dyn PawnAction>, ActionSpec) {
        let spec = self.spec();
        (Box::new(self), spec)
    }

    fn log(&self, message: ActionMessage) {
        self.log.log((self.name.clone(), message));
    }
}

impl PawnAction for TestPawnAction {
    fn start(&mut self, ctx: &mut ActionContext<'_>) -> bool {
        self.log(ActionMessage::Started);
        if let Some(child) = self.child_on_start.take() {
            let (body, spec) = TestPawnAction::new(child, &self.log).into_parts();
            ctx.push_child(body, spec);
        }
        true
    }

    fn pause(&mut self, _ctx: &mut ActionContext<'_>, _paused_by: Option<ActionHandle>) {
        self.log(ActionMessage::Paused);
    }

    fn resume(&mut self, _ctx: &mut ActionContext<'_>) {
        self.log(ActionMessage::Resumed);
    }

    fn on_finished(&mut self, _ctx: &mut ActionContext<'_>, _result: ActionResult) {
        self.log(ActionMessage::Finished);
    }

    fn on_child_finished(&mut self, _ctx: &mut ActionContext<'_>, _child: ActionHandle, _result: ActionResult) {
        self.log(ActionMessage::ChildFinished);
    }
}
