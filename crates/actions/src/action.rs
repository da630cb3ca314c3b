//! Pawn action model - results, abort states and the callback interface.

use gametask_core::{ActionHandle, AiRequestPriority, HandleAllocator, OwnerId, ResourceSet};
use serde::{Deserialize, Serialize};

/// Outcome of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionResult {
    /// Never started
    NotStarted,
    /// Running, possibly paused
    InProgress,
    /// Finished successfully
    Success,
    /// Finished with a failure, or failed to start
    Failed,
    /// Aborted
    Aborted,
}

impl ActionResult {
    /// Whether this is a terminal result.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Aborted)
    }

    /// Get string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::InProgress => "InProgress",
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Aborted => "Aborted",
        }
    }
}

impl std::fmt::Display for ActionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abort progress of an action. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AbortState {
    /// Not started yet
    NeverStarted,
    /// Running normally
    NotBeingAborted,
    /// Abort requested, children are being aborted
    MarkPendingAbort,
    /// The action is winding down and will report when done
    LatentAbortInProgress,
    /// Abort completed
    AbortDone,
}

impl AbortState {
    /// Get string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NeverStarted => "NeverStarted",
            Self::NotBeingAborted => "NotBeingAborted",
            Self::MarkPendingAbort => "MarkPendingAbort",
            Self::LatentAbortInProgress => "LatentAbortInProgress",
            Self::AbortDone => "AbortDone",
        }
    }
}

impl std::fmt::Display for AbortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Name used in logs and dumps
    pub name: String,

    /// Resources locked while the action is current
    pub required_resources: ResourceSet,

    /// Call `on_finished` even when the action never started
    pub always_notify_on_finished: bool,
}

impl ActionSpec {
    /// Create a spec with no resources.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_resources: ResourceSet::EMPTY,
            always_notify_on_finished: false,
        }
    }

    /// Set the required resources.
    pub fn with_required(mut self, resources: ResourceSet) -> Self {
        self.required_resources = resources;
        self
    }

    /// Always report `on_finished`.
    pub fn always_notify(mut self) -> Self {
        self.always_notify_on_finished = true;
        self
    }
}

/// Runtime view of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInfo {
    /// Handle of the action
    pub handle: ActionHandle,

    /// Name
    pub name: String,

    /// Stack the action was pushed to
    pub priority: Option<AiRequestPriority>,

    /// Resources locked while current
    pub required_resources: ResourceSet,

    /// Who pushed the action
    pub instigator: Option<OwnerId>,

    /// Outcome so far
    pub result: ActionResult,

    /// Abort progress
    pub abort_state: AbortState,

    /// `start` was called at some point
    pub started: bool,

    /// Paused by a newer or more important action
    pub paused: bool,

    /// `start` returned false
    pub failed_to_start: bool,

    /// Report `on_finished` even without a start
    pub always_notify_on_finished: bool,

    /// Action right below on the stack
    pub parent: Option<ActionHandle>,

    /// Action right above on the stack
    pub child: Option<ActionHandle>,

    /// Currently sitting on a stack
    pub on_stack: bool,

    /// Abort is waiting for the child to finish aborting
    pub(crate) abort_waits_for_child: bool,
}

impl ActionInfo {
    pub(crate) fn from_spec(handle: ActionHandle, spec: ActionSpec) -> Self {
        Self {
            handle,
            name: spec.name,
            priority: None,
            required_resources: spec.required_resources,
            instigator: None,
            result: ActionResult::NotStarted,
            abort_state: AbortState::NeverStarted,
            started: false,
            paused: false,
            failed_to_start: false,
            always_notify_on_finished: spec.always_notify_on_finished,
            parent: None,
            child: None,
            on_stack: false,
            abort_waits_for_child: false,
        }
    }

    /// Whether `start` was ever called.
    pub fn has_been_started(&self) -> bool {
        self.started
    }

    /// Whether the action reached a terminal result.
    pub fn is_finished(&self) -> bool {
        self.result.is_finished()
    }

    /// Whether an abort was requested.
    pub fn is_being_aborted(&self) -> bool {
        self.abort_state > AbortState::NotBeingAborted
    }

    /// Whether the action is running and not paused.
    pub fn is_active(&self) -> bool {
        self.result == ActionResult::InProgress
            && !self.paused
            && self.abort_state == AbortState::NotBeingAborted
    }

    /// Whether the action gets ticks when current. Latent aborts keep ticking.
    pub fn wants_tick(&self) -> bool {
        self.started && !self.paused && self.result == ActionResult::InProgress
    }

    /// Whether `on_finished` is due when the action leaves its stack.
    pub fn notifies_on_finished(&self) -> bool {
        (self.started && !self.failed_to_start) || self.always_notify_on_finished
    }
}

/// Behavior of a pawn action.
///
/// The component owns the lifecycle; implementations react to it and use the
/// [`ActionContext`] to finish, or to push child actions.
pub trait PawnAction {
    /// Start the action. Returning false fails it.
    fn start(&mut self, _ctx: &mut ActionContext<'_>) -> bool {
        true
    }

    /// Called when a newer or more important action takes over.
    fn pause(&mut self, _ctx: &mut ActionContext<'_>, _paused_by: Option<ActionHandle>) {}

    /// Called when the action is current again.
    fn resume(&mut self, _ctx: &mut ActionContext<'_>) {}

    /// Called every component tick while the action is current and not paused.
    fn tick(&mut self, _ctx: &mut ActionContext<'_>, _delta_time: f32) {}

    /// Called once when the action leaves its stack.
    fn on_finished(&mut self, _ctx: &mut ActionContext<'_>, _result: ActionResult) {}

    /// Called when the action pushed on top of this one left the stack.
    fn on_child_finished(
        &mut self,
        _ctx: &mut ActionContext<'_>,
        _child: ActionHandle,
        _result: ActionResult,
    ) {
    }

    /// Wind the action down.
    ///
    /// Return [`AbortState::AbortDone`] when done right away, or
    /// [`AbortState::LatentAbortInProgress`] and call
    /// [`ActionContext::finish`] later. The result is ignored for forced aborts.
    fn perform_abort(&mut self, _ctx: &mut ActionContext<'_>, _forced: bool) -> AbortState {
        AbortState::AbortDone
    }

    /// Extra text for debug dumps.
    fn debug_string(&self) -> String {
        String::new()
    }
}

pub(crate) enum ActionCommand {
    Finish(ActionHandle, ActionResult),
    PushChild {
        handle: ActionHandle,
        parent: ActionHandle,
        body: Box<dyn PawnAction>,
        spec: ActionSpec,
    },
    Abort(ActionHandle),
}

/// Access to the actions component from inside an action callback.
pub struct ActionContext<'a> {
    info: ActionInfo,
    handles: &'a mut HandleAllocator,
    commands: Vec<ActionCommand>,
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(info: ActionInfo, handles: &'a mut HandleAllocator) -> Self {
        Self {
            info,
            handles,
            commands: Vec::new(),
        }
    }

    pub(crate) fn into_commands(self) -> Vec<ActionCommand> {
        self.commands
    }

    /// Handle of the action being called.
    pub fn handle(&self) -> ActionHandle {
        self.info.handle
    }

    /// Snapshot of the action taken right before the callback.
    pub fn info(&self) -> &ActionInfo {
        &self.info
    }

    /// Stack the action runs on.
    pub fn priority(&self) -> Option<AiRequestPriority> {
        self.info.priority
    }

    /// Finish this action.
    ///
    /// During a latent abort this completes the abort, whatever the result.
    pub fn finish(&mut self, result: ActionResult) {
        self.commands.push(ActionCommand::Finish(self.info.handle, result));
    }

    /// Push a child action on this action's stack, with the same instigator.
    pub fn push_child(&mut self, body: Box<dyn PawnAction>, spec: ActionSpec) -> ActionHandle {
        let handle = self.handles.next_action();
        self.commands.push(ActionCommand::PushChild {
            handle,
            parent: self.info.handle,
            body,
            spec,
        });
        handle
    }

    /// Abort another action, e.g. a running child.
    pub fn abort_other(&mut self, other: ActionHandle) {
        self.commands.push(ActionCommand::Abort(other));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_terminal_states() {
        assert!(!ActionResult::NotStarted.is_finished());
        assert!(!ActionResult::InProgress.is_finished());
        assert!(ActionResult::Success.is_finished());
        assert!(ActionResult::Failed.is_finished());
        assert!(ActionResult::Aborted.is_finished());
    }

    #[test]
    fn test_abort_state_ordering() {
        assert!(AbortState::NeverStarted < AbortState::NotBeingAborted);
        assert!(AbortState::MarkPendingAbort < AbortState::LatentAbortInProgress);
        assert!(AbortState::LatentAbortInProgress < AbortState::AbortDone);
    }

    #[test]
    fn test_info_flags() {
        let handle = HandleAllocator::new().next_action();
        let mut info = ActionInfo::from_spec(handle, ActionSpec::new("Move").always_notify());
        assert!(!info.has_been_started());
        assert!(!info.is_active());
        assert!(info.always_notify_on_finished);

        info.started = true;
        info.abort_state = AbortState::NotBeingAborted;
        info.result = ActionResult::InProgress;
        assert!(info.is_active());
        assert!(info.has_been_started());

        info.paused = true;
        assert!(!info.is_active());

        info.paused = false;
        info.abort_state = AbortState::LatentAbortInProgress;
        assert!(info.is_being_aborted());
        assert!(!info.is_active());
        assert!(info.wants_tick());
    }
}
