//! The pawn actions component.
//!
//! Requests (push, abort, finish) are turned into events and applied on the
//! next tick, ordered by priority then arrival. After the events the top of
//! the most important non-empty stack becomes the current action.

use crate::action::{
    AbortState, ActionCommand, ActionContext, ActionInfo, ActionResult, ActionSpec, PawnAction,
};
use crate::stack::ActionStack;
use gametask_core::{
    ActionHandle, ActionsConfig, AiRequestPriority, HandleAllocator, OwnerId, ResourceId,
    ResourceLock, ResourceSet, MAX_RESOURCES,
};
use std::collections::HashMap;
use tracing::{debug, error, trace, warn};

/// Kind of a queued action event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ActionEventKind {
    /// Put the action on its stack
    Push,
    /// Force-abort and pop the action
    InstantAbort,
    /// Abort completed, pop the action
    FinishedAborting,
    /// Action finished, pop it
    FinishedExecution,
    /// `start` failed, pop the action
    FailedToStart,
}

#[derive(Debug, Clone, Copy)]
struct ActionEvent {
    kind: ActionEventKind,
    action: ActionHandle,
    priority: AiRequestPriority,
    index: u64,
    cancelled: bool,
}

struct ActionEntry {
    info: ActionInfo,
    body: Option<Box<dyn PawnAction>>,
}

#[derive(Debug, Clone, Copy)]
struct HeldLocks {
    holder: ActionHandle,
    priority: AiRequestPriority,
    resources: ResourceSet,
}

/// Runs pawn actions on per-priority stacks.
pub struct PawnActionsComponent {
    config: ActionsConfig,
    handles: HandleAllocator,
    actions: HashMap<ActionHandle, ActionEntry>,
    stacks: [ActionStack; AiRequestPriority::COUNT],
    events: Vec<ActionEvent>,
    next_event_index: u64,
    processing_events: bool,
    current: Option<ActionHandle>,
    resource_locks: [ResourceLock; MAX_RESOURCES],
    held_locks: Option<HeldLocks>,
}

impl PawnActionsComponent {
    /// Create a component with default settings.
    pub fn new() -> Self {
        Self::with_config(ActionsConfig::default())
    }

    /// Create a component with the given settings.
    pub fn with_config(config: ActionsConfig) -> Self {
        Self {
            config,
            handles: HandleAllocator::new(),
            actions: HashMap::new(),
            stacks: std::array::from_fn(|_| ActionStack::new()),
            events: Vec::new(),
            next_event_index: 0,
            processing_events: false,
            current: None,
            resource_locks: [ResourceLock::new(); MAX_RESOURCES],
            held_locks: None,
        }
    }

    /// Store a new action. It does nothing until pushed.
    pub fn create_action(&mut self, body: Box<dyn PawnAction>, spec: ActionSpec) -> ActionHandle {
        let handle = self.handles.next_action();
        self.insert_action(handle, body, spec);
        handle
    }

    fn insert_action(&mut self, handle: ActionHandle, body: Box<dyn PawnAction>, spec: ActionSpec) {
        trace!("Created {} '{}'", handle, spec.name);
        self.actions.insert(
            handle,
            ActionEntry {
                info: ActionInfo::from_spec(handle, spec),
                body: Some(body),
            },
        );
    }

    /// Request `action` to be pushed on the `priority` stack on the next tick.
    ///
    /// Returns false when the action already ran, is finished, sits on a
    /// stack or is waiting to be pushed.
    pub fn push_action(
        &mut self,
        action: ActionHandle,
        priority: AiRequestPriority,
        instigator: Option<OwnerId>,
    ) -> bool {
        let pending_push = self.has_pending_event(action, ActionEventKind::Push);
        let Some(entry) = self.actions.get_mut(&action) else {
            warn!("push_action called for unknown {}", action);
            return false;
        };
        let info = &mut entry.info;

        if info.started || info.is_finished() || info.on_stack || pending_push {
            warn!(
                "Refusing to push {} '{}' (started: {}, result: {}, on stack: {}, pending: {})",
                action, info.name, info.started, info.result, info.on_stack, pending_push
            );
            return false;
        }

        info.priority = Some(priority);
        info.instigator = instigator;
        debug!("Pushing {} '{}' at {}", action, info.name, priority);
        self.send_event(action, ActionEventKind::Push)
    }

    /// Create an action and push it.
    pub fn push_new_action(
        &mut self,
        body: Box<dyn PawnAction>,
        spec: ActionSpec,
        priority: AiRequestPriority,
        instigator: Option<OwnerId>,
    ) -> ActionHandle {
        let handle = self.create_action(body, spec);
        self.push_action(handle, priority, instigator);
        handle
    }

    /// Ask an action to abort.
    ///
    /// An action that never started is dropped quietly and
    /// [`AbortState::NeverStarted`] is returned.
    pub fn abort_action(&mut self, action: ActionHandle) -> AbortState {
        self.abort(action, false)
    }

    /// Abort an action right away, ignoring latent aborts.
    pub fn force_abort_action(&mut self, action: ActionHandle) -> AbortState {
        self.abort(action, true)
    }

    /// Finish an action from outside.
    pub fn finish_action(&mut self, action: ActionHandle, result: ActionResult) {
        self.finish(action, result);
    }

    /// Abort every action pushed by `instigator` at `priority`, or at every
    /// priority when `None`. Returns how many were affected.
    pub fn abort_actions_instigated_by(
        &mut self,
        instigator: OwnerId,
        priority: Option<AiRequestPriority>,
    ) -> usize {
        let Some(priority) = priority else {
            return AiRequestPriority::ALL
                .iter()
                .map(|p| self.abort_actions_instigated_by(instigator, Some(*p)))
                .sum();
        };

        let on_stack: Vec<ActionHandle> = self.stacks[priority.index()]
            .as_slice()
            .iter()
            .rev()
            .copied()
            .filter(|a| self.instigated_by(*a, instigator))
            .collect();
        let mut count = 0;
        for action in on_stack {
            if self.send_event(action, ActionEventKind::InstantAbort) {
                count += 1;
            }
        }

        let pending: Vec<ActionHandle> = self
            .events
            .iter()
            .filter(|e| {
                !e.cancelled
                    && e.kind == ActionEventKind::Push
                    && e.priority == priority
                    && self.instigated_by(e.action, instigator)
            })
            .map(|e| e.action)
            .collect();
        for action in pending {
            self.remove_events_for(action);
            self.mark_unstarted_aborted(action);
            count += 1;
        }

        if count > 0 {
            debug!("Aborting {} actions instigated by {} at {}", count, instigator, priority);
        }
        count
    }

    fn instigated_by(&self, action: ActionHandle, instigator: OwnerId) -> bool {
        self.actions
            .get(&action)
            .map_or(false, |e| e.info.instigator == Some(instigator))
    }

    // === Ticking ===

    /// Apply queued events, pick the current action and tick it.
    pub fn tick(&mut self, delta_time: f32) {
        if !self.events.is_empty() {
            self.process_events();
            self.update_current_action();
        }

        if let Some(current) = self.current {
            if self.actions.get(&current).map_or(false, |e| e.info.wants_tick()) {
                self.with_body(current, |body, ctx| body.tick(ctx, delta_time));
            }
        }
    }

    /// Whether the component has anything to do on tick.
    pub fn wants_tick(&self) -> bool {
        !self.events.is_empty()
            || self
                .current
                .and_then(|c| self.actions.get(&c))
                .map_or(false, |e| e.info.wants_tick())
    }

    fn process_events(&mut self) {
        self.events.sort_by_key(|e| (e.priority, e.index));
        self.processing_events = true;

        let mut processed = 0;
        let mut index = 0;
        while index < self.events.len() {
            if processed >= self.config.max_events_per_tick {
                error!(
                    "Processed {} action events in one tick, dropping {}. Check actions for logic loops!",
                    processed,
                    self.events.len() - index
                );
                break;
            }

            let event = self.events[index];
            index += 1;
            if event.cancelled {
                continue;
            }
            processed += 1;
            trace!("Processing {:?} for {}", event.kind, event.action);

            match event.kind {
                ActionEventKind::Push => self.push_on_stack(event.action, event.priority),
                ActionEventKind::InstantAbort => {
                    // nothing may linger on the stack after this, skip latent aborts
                    match self.actions.get(&event.action).map(|e| e.info.clone()) {
                        Some(info) if !info.started => self.mark_unstarted_aborted(event.action),
                        Some(info) if !info.is_finished() => {
                            self.abort(event.action, true);
                        }
                        _ => {}
                    }
                    self.pop_action(event.action, event.priority);
                }
                ActionEventKind::FinishedAborting
                | ActionEventKind::FinishedExecution
                | ActionEventKind::FailedToStart => self.pop_action(event.action, event.priority),
            }
        }

        self.events.clear();
        self.processing_events = false;
    }

    fn update_current_action(&mut self) {
        let new_current = AiRequestPriority::ALL
            .iter()
            .rev()
            .find_map(|p| self.stacks[p.index()].top());

        if new_current == self.current {
            return;
        }

        if let Some(old) = self.current {
            if self.actions.get(&old).map_or(false, |e| e.info.is_active()) {
                self.pause(old, new_current);
            }
        }

        self.current = new_current;
        if let Some(action) = new_current {
            debug!("Current action is now {}", action);
            if !self.activate(action) {
                warn!("{} failed to activate, no current action until next tick", action);
                self.current = None;
            }
        }
    }

    // === Stack operations ===

    fn push_on_stack(&mut self, action: ActionHandle, priority: AiRequestPriority) {
        if self.actions.get(&action).map_or(true, |e| e.info.is_finished()) {
            debug!("Not pushing finished or unknown {}", action);
            return;
        }

        if let Some(top) = self.stacks[priority.index()].top() {
            let pause_top = self
                .actions
                .get(&top)
                .map_or(false, |e| e.info.started && !e.info.paused);
            if pause_top {
                self.pause(top, Some(action));
            }
            if let Some(entry) = self.actions.get_mut(&top) {
                entry.info.child = Some(action);
            }
            if let Some(entry) = self.actions.get_mut(&action) {
                entry.info.parent = Some(top);
            }
        }

        self.stacks[priority.index()].push(action);
        if let Some(entry) = self.actions.get_mut(&action) {
            entry.info.on_stack = true;
        }
        trace!("{} on top of the {} stack", action, priority);
    }

    /// Remove `action` and everything above it from its stack.
    fn pop_action(&mut self, action: ActionHandle, priority: AiRequestPriority) {
        let removed = self.stacks[priority.index()].cut_at(action);
        if removed.is_empty() {
            trace!("{} is not on the {} stack anymore", action, priority);
            return;
        }

        for popped in removed {
            if let Some(entry) = self.actions.get_mut(&popped) {
                entry.info.on_stack = false;
            }
            if self.actions.get(&popped).map_or(false, |e| !e.info.is_finished()) {
                self.abort(popped, true);
            }
            self.on_popped(popped);
        }
    }

    fn on_popped(&mut self, action: ActionHandle) {
        self.release_locks(action);

        let Some(info) = self.actions.get(&action).map(|e| e.info.clone()) else {
            return;
        };
        debug!("{} '{}' popped with {}", action, info.name, info.result);

        if info.notifies_on_finished() {
            self.with_body(action, |body, ctx| body.on_finished(ctx, info.result));
        }

        let Some(parent) = info.parent else {
            return;
        };
        if let Some(entry) = self.actions.get_mut(&parent) {
            if entry.info.child == Some(action) {
                entry.info.child = None;
            }
        }
        self.with_body(parent, |body, ctx| body.on_child_finished(ctx, action, info.result));

        let resume_abort = self.actions.get(&parent).map_or(false, |e| {
            e.info.abort_waits_for_child && e.info.abort_state == AbortState::LatentAbortInProgress
        });
        if resume_abort {
            self.continue_abort(parent);
        }
    }

    // === Lifecycle ===

    fn activate(&mut self, action: ActionHandle) -> bool {
        let Some(info) = self.actions.get(&action).map(|e| e.info.clone()) else {
            return false;
        };

        if info.is_finished() {
            return false;
        }
        if info.paused {
            return self.resume(action);
        }
        if info.started {
            return info.result == ActionResult::InProgress;
        }

        if let Some(entry) = self.actions.get_mut(&action) {
            entry.info.started = true;
            entry.info.abort_state = AbortState::NotBeingAborted;
            entry.info.result = ActionResult::InProgress;
        }
        debug!("{} '{}' starting", action, info.name);

        let started = self
            .with_body(action, |body, ctx| body.start(ctx))
            .unwrap_or(false);
        if !started {
            if let Some(entry) = self.actions.get_mut(&action) {
                entry.info.failed_to_start = true;
                entry.info.result = ActionResult::Failed;
            }
            warn!("{} '{}' failed to start", action, info.name);
            self.send_event(action, ActionEventKind::FailedToStart);
            return false;
        }

        self.acquire_locks(action);
        true
    }

    fn pause(&mut self, action: ActionHandle, paused_by: Option<ActionHandle>) {
        let Some(entry) = self.actions.get_mut(&action) else {
            return;
        };
        let info = &mut entry.info;
        if info.paused || info.is_finished() || info.abort_state >= AbortState::LatentAbortInProgress {
            return;
        }

        info.paused = true;
        debug!("{} '{}' paused", action, info.name);
        self.release_locks(action);
        self.with_body(action, |body, ctx| body.pause(ctx, paused_by));
    }

    fn resume(&mut self, action: ActionHandle) -> bool {
        let Some(entry) = self.actions.get_mut(&action) else {
            return false;
        };
        if !entry.info.paused {
            return false;
        }

        entry.info.paused = false;
        debug!("{} '{}' resumed", action, entry.info.name);
        self.with_body(action, |body, ctx| body.resume(ctx));
        self.acquire_locks(action);
        true
    }

    fn finish(&mut self, action: ActionHandle, result: ActionResult) {
        let Some(info) = self.actions.get(&action).map(|e| e.info.clone()) else {
            warn!("finish called for unknown {}", action);
            return;
        };

        if !result.is_finished() {
            warn!("Cannot finish {} with {}", action, result);
            return;
        }
        if info.is_finished() {
            trace!("{} already finished with {}", action, info.result);
            return;
        }
        if !info.started {
            warn!("{} '{}' finished before it started, ignoring", action, info.name);
            return;
        }

        if info.is_being_aborted() {
            self.complete_abort(action);
            return;
        }

        if let Some(entry) = self.actions.get_mut(&action) {
            entry.info.result = result;
        }
        debug!("{} '{}' finished with {}", action, info.name, result);
        self.release_locks(action);
        self.send_event(action, ActionEventKind::FinishedExecution);
    }

    // === Aborting ===

    fn abort(&mut self, action: ActionHandle, forced: bool) -> AbortState {
        let Some(info) = self.actions.get(&action).map(|e| e.info.clone()) else {
            warn!("abort called for unknown {}", action);
            return AbortState::AbortDone;
        };

        if info.is_finished() {
            return AbortState::AbortDone;
        }

        if !info.started {
            self.remove_events_for(action);
            self.mark_unstarted_aborted(action);
            if info.on_stack {
                if let Some(priority) = info.priority {
                    self.send_event_at(action, ActionEventKind::InstantAbort, priority);
                }
            }
            debug!("{} '{}' aborted before it started", action, info.name);
            return if forced {
                AbortState::AbortDone
            } else {
                AbortState::NeverStarted
            };
        }

        if info.is_being_aborted() && !forced {
            return info.abort_state;
        }

        if let Some(entry) = self.actions.get_mut(&action) {
            entry.info.abort_state = AbortState::MarkPendingAbort;
            entry.info.abort_waits_for_child = false;
        }
        debug!("{} '{}' aborting (forced: {})", action, info.name, forced);

        let child_state = match info.child {
            Some(child) => self.abort(child, forced),
            None => AbortState::AbortDone,
        };

        let state = if forced {
            self.with_body(action, |body, ctx| body.perform_abort(ctx, true));
            AbortState::AbortDone
        } else if matches!(child_state, AbortState::AbortDone | AbortState::NeverStarted) {
            self.perform_abort(action)
        } else {
            if let Some(entry) = self.actions.get_mut(&action) {
                entry.info.abort_waits_for_child = true;
            }
            AbortState::LatentAbortInProgress
        };

        self.settle_abort(action, state)
    }

    fn perform_abort(&mut self, action: ActionHandle) -> AbortState {
        match self.with_body(action, |body, ctx| body.perform_abort(ctx, false)) {
            Some(state @ (AbortState::AbortDone | AbortState::LatentAbortInProgress)) => state,
            Some(other) => {
                error!(
                    "{} returned {} from perform_abort, treating as latent abort",
                    action, other
                );
                AbortState::LatentAbortInProgress
            }
            None => AbortState::AbortDone,
        }
    }

    /// Record the abort outcome unless a callback already completed it.
    fn settle_abort(&mut self, action: ActionHandle, state: AbortState) -> AbortState {
        let already_done = self
            .actions
            .get(&action)
            .map_or(true, |e| e.info.abort_state == AbortState::AbortDone);
        if already_done {
            return AbortState::AbortDone;
        }

        if state == AbortState::AbortDone {
            self.complete_abort(action);
        } else if let Some(entry) = self.actions.get_mut(&action) {
            entry.info.abort_state = state;
        }
        state
    }

    fn continue_abort(&mut self, action: ActionHandle) {
        if let Some(entry) = self.actions.get_mut(&action) {
            entry.info.abort_waits_for_child = false;
        }
        trace!("{} child done aborting, resuming abort", action);
        let state = self.perform_abort(action);
        self.settle_abort(action, state);
    }

    fn complete_abort(&mut self, action: ActionHandle) {
        if let Some(entry) = self.actions.get_mut(&action) {
            entry.info.abort_state = AbortState::AbortDone;
            entry.info.abort_waits_for_child = false;
            entry.info.result = ActionResult::Aborted;
            debug!("{} '{}' done aborting", action, entry.info.name);
        }
        self.release_locks(action);
        self.send_event(action, ActionEventKind::FinishedAborting);
    }

    fn mark_unstarted_aborted(&mut self, action: ActionHandle) {
        if let Some(entry) = self.actions.get_mut(&action) {
            entry.info.abort_state = AbortState::AbortDone;
            entry.info.result = ActionResult::Aborted;
        }
    }

    // === Events ===

    fn send_event(&mut self, action: ActionHandle, kind: ActionEventKind) -> bool {
        match self.actions.get(&action).and_then(|e| e.info.priority) {
            Some(priority) => self.send_event_at(action, kind, priority),
            None => {
                error!("{:?} for {} which was never pushed, dropping", kind, action);
                false
            }
        }
    }

    fn send_event_at(
        &mut self,
        action: ActionHandle,
        kind: ActionEventKind,
        priority: AiRequestPriority,
    ) -> bool {
        let duplicate = self
            .events
            .iter()
            .any(|e| !e.cancelled && e.action == action && e.kind == kind && e.priority == priority);
        if duplicate {
            warn!("Ignoring duplicate {:?} for {}", kind, action);
            return false;
        }

        self.events.push(ActionEvent {
            kind,
            action,
            priority,
            index: self.next_event_index,
            cancelled: false,
        });
        self.next_event_index += 1;
        true
    }

    fn has_pending_event(&self, action: ActionHandle, kind: ActionEventKind) -> bool {
        self.events
            .iter()
            .any(|e| !e.cancelled && e.action == action && e.kind == kind)
    }

    fn remove_events_for(&mut self, action: ActionHandle) {
        if self.processing_events {
            // the event loop is indexing into the list, keep it stable
            for event in self.events.iter_mut().filter(|e| e.action == action) {
                event.cancelled = true;
            }
        } else {
            self.events.retain(|e| e.action != action);
        }
    }

    // === Resource locks ===

    fn acquire_locks(&mut self, action: ActionHandle) {
        // start or resume may already have finished or aborted the action
        let Some((priority, resources)) = self
            .actions
            .get(&action)
            .filter(|e| e.info.result == ActionResult::InProgress && !e.info.is_being_aborted())
            .and_then(|e| e.info.priority.map(|p| (p, e.info.required_resources)))
        else {
            return;
        };

        if let Some(held) = self.held_locks {
            self.release_locks(held.holder);
        }
        for id in resources.iter() {
            self.resource_locks[id.index() as usize].set_lock(priority);
        }
        self.held_locks = Some(HeldLocks {
            holder: action,
            priority,
            resources,
        });
        if !resources.is_empty() {
            trace!("{} locked {} at {}", action, resources, priority);
        }
    }

    fn release_locks(&mut self, action: ActionHandle) {
        let Some(held) = self.held_locks.filter(|h| h.holder == action) else {
            return;
        };
        for id in held.resources.iter() {
            self.resource_locks[id.index() as usize].clear_lock(held.priority);
        }
        self.held_locks = None;
    }

    /// Lock state of a resource.
    pub fn resource_lock(&self, id: ResourceId) -> ResourceLock {
        self.resource_locks[id.index() as usize]
    }

    /// Whether a request at `priority` may use the resource.
    pub fn is_resource_available_for(&self, id: ResourceId, priority: AiRequestPriority) -> bool {
        self.resource_lock(id).is_available_for(priority)
    }

    // === Callbacks ===

    fn with_body<R>(
        &mut self,
        action: ActionHandle,
        f: impl FnOnce(&mut dyn PawnAction, &mut ActionContext<'_>) -> R,
    ) -> Option<R> {
        let entry = self.actions.get_mut(&action)?;
        let Some(mut body) = entry.body.take() else {
            trace!("{} is already inside a callback, skipping nested call", action);
            return None;
        };
        let info = entry.info.clone();

        let (result, commands) = {
            let mut ctx = ActionContext::new(info, &mut self.handles);
            let result = f(body.as_mut(), &mut ctx);
            (result, ctx.into_commands())
        };

        if let Some(entry) = self.actions.get_mut(&action) {
            entry.body = Some(body);
        }
        self.apply_commands(commands);
        Some(result)
    }

    fn apply_commands(&mut self, commands: Vec<ActionCommand>) {
        for command in commands {
            match command {
                ActionCommand::Finish(action, result) => self.finish(action, result),
                ActionCommand::Abort(action) => {
                    self.abort(action, false);
                }
                ActionCommand::PushChild { handle, parent, body, spec } => {
                    self.insert_action(handle, body, spec);
                    let parent_info = self
                        .actions
                        .get(&parent)
                        .and_then(|e| e.info.priority.map(|p| (p, e.info.instigator)));
                    match parent_info {
                        Some((priority, instigator)) => {
                            self.push_action(handle, priority, instigator);
                        }
                        None => warn!("{} pushed child {} without being on a stack", parent, handle),
                    }
                }
            }
        }
    }

    // === Queries ===

    /// Get an action's runtime info.
    pub fn action(&self, action: ActionHandle) -> Option<&ActionInfo> {
        self.actions.get(&action).map(|e| &e.info)
    }

    /// The running (or latently aborting) action, if any.
    pub fn current_action(&self) -> Option<ActionHandle> {
        self.current
    }

    /// Stack for a priority level.
    pub fn action_stack(&self, priority: AiRequestPriority) -> &ActionStack {
        &self.stacks[priority.index()]
    }

    /// Number of actions on a priority level's stack.
    pub fn action_stack_size(&self, priority: AiRequestPriority) -> usize {
        self.stacks[priority.index()].len()
    }

    /// Number of events waiting for the next tick.
    pub fn action_events_queue_size(&self) -> usize {
        self.events.iter().filter(|e| !e.cancelled).count()
    }

    /// Drop finished actions that left their stacks. Returns how many went.
    pub fn prune_finished(&mut self) -> usize {
        let before = self.actions.len();
        let events = &self.events;
        self.actions.retain(|handle, entry| {
            !entry.info.is_finished()
                || entry.info.on_stack
                || events.iter().any(|e| e.action == *handle)
        });
        let pruned = before - self.actions.len();
        if pruned > 0 {
            debug!("Pruned {} finished actions", pruned);
        }
        pruned
    }

    /// Multi-line dump of the stacks, top first.
    pub fn debug_description(&self) -> String {
        let mut out = format!(
            "Current: {}, pending events: {}\n",
            self.current
                .map_or_else(|| "-".to_string(), |c| c.to_string()),
            self.action_events_queue_size()
        );
        for priority in AiRequestPriority::ALL.iter().rev() {
            let stack = &self.stacks[priority.index()];
            if stack.is_empty() {
                continue;
            }
            out.push_str(&format!("  {}:\n", priority));
            for action in stack.as_slice().iter().rev() {
                let Some(entry) = self.actions.get(action) else {
                    continue;
                };
                let extra = entry
                    .body
                    .as_ref()
                    .map(|b| b.debug_string())
                    .unwrap_or_default();
                out.push_str(&format!(
                    "    {} '{}' {}{} abort: {}{}{}\n",
                    action,
                    entry.info.name,
                    entry.info.result,
                    if entry.info.paused { " (paused)" } else { "" },
                    entry.info.abort_state,
                    if extra.is_empty() { "" } else { " " },
                    extra
                ));
            }
        }
        out
    }
}

impl Default for PawnActionsComponent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Logged {
        name: &'static str,
        log: Log,
        start_ok: bool,
        latent_abort: bool,
        finish_on_start: bool,
    }

    impl Logged {
        fn new(name: &'static str, log: &Log) -> Self {
            Self { name, log: log.clone(), start_ok: true, latent_abort: false, finish_on_start: false }
        }

        fn push(&self, what: &str) {
            self.log.borrow_mut().push(format!("{}:{}", self.name, what));
        }
    }

    impl PawnAction for Logged {
        fn start(&mut self, ctx: &mut ActionContext<'_>) -> bool {
            self.push("Started");
            if self.finish_on_start {
                ctx.finish(ActionResult::Success);
            }
            self.start_ok
        }

        fn pause(&mut self, _ctx: &mut ActionContext<'_>, _paused_by: Option<ActionHandle>) {
            self.push("Paused");
        }

        fn resume(&mut self, _ctx: &mut ActionContext<'_>) {
            self.push("Resumed");
        }

        fn on_finished(&mut self, _ctx: &mut ActionContext<'_>, result: ActionResult) {
            self.push(&format!("Finished({})", result));
        }

        fn on_child_finished(&mut self, _ctx: &mut ActionContext<'_>, _child: ActionHandle, _result: ActionResult) {
            self.push("ChildFinished");
        }

        fn perform_abort(&mut self, _ctx: &mut ActionContext<'_>, forced: bool) -> AbortState {
            if self.latent_abort && !forced {
                AbortState::LatentAbortInProgress
            } else {
                AbortState::AbortDone
            }
        }
    }

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn push(
        component: &mut PawnActionsComponent,
        action: Logged,
        priority: AiRequestPriority,
    ) -> ActionHandle {
        let name = action.name;
        component.push_new_action(Box::new(action), ActionSpec::new(name), priority, None)
    }

    #[test]
    fn test_same_priority_pauses_previous() {
        let log = log();
        let mut component = PawnActionsComponent::new();

        let a = push(&mut component, Logged::new("A", &log), AiRequestPriority::Logic);
        component.tick(0.1);
        let b = push(&mut component, Logged::new("B", &log), AiRequestPriority::Logic);
        component.tick(0.1);

        assert_eq!(component.current_action(), Some(b));
        assert_eq!(component.action(b).unwrap().parent, Some(a));
        assert!(component.action(a).unwrap().paused);

        component.finish_action(b, ActionResult::Success);
        component.tick(0.1);

        assert_eq!(component.current_action(), Some(a));
        assert_eq!(
            *log.borrow(),
            vec![
                "A:Started",
                "A:Paused",
                "B:Started",
                "B:Finished(Success)",
                "A:ChildFinished",
                "A:Resumed"
            ]
        );
    }

    #[test]
    fn test_last_pushed_wins_within_tick() {
        let log = log();
        let mut component = PawnActionsComponent::new();
        let handles: Vec<ActionHandle> = ["A", "B", "C", "D"]
            .into_iter()
            .map(|n| push(&mut component, Logged::new(n, &log), AiRequestPriority::Logic))
            .collect();
        assert_eq!(component.action_events_queue_size(), 4);

        component.tick(0.1);
        assert_eq!(component.current_action(), Some(handles[3]));
        assert_eq!(component.action_stack_size(AiRequestPriority::Logic), 4);
        assert_eq!(component.action_events_queue_size(), 0);
        assert_eq!(*log.borrow(), vec!["D:Started"]);
    }

    #[test]
    fn test_push_and_abort_is_silent() {
        let log = log();
        let mut component = PawnActionsComponent::new();
        let a = push(&mut component, Logged::new("A", &log), AiRequestPriority::Logic);

        assert_eq!(component.abort_action(a), AbortState::NeverStarted);
        assert_eq!(component.action_events_queue_size(), 0);
        component.tick(0.1);

        assert_eq!(component.action_stack_size(AiRequestPriority::Logic), 0);
        assert!(component.current_action().is_none());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_pushing_same_action_twice() {
        let log = log();
        let mut component = PawnActionsComponent::new();
        let a = push(&mut component, Logged::new("A", &log), AiRequestPriority::Logic);

        assert!(!component.push_action(a, AiRequestPriority::Logic, None));
        assert!(!component.push_action(a, AiRequestPriority::HardScript, None));
        component.tick(0.1);
        assert!(!component.push_action(a, AiRequestPriority::Logic, None));
        assert_eq!(component.action_stack_size(AiRequestPriority::Logic), 1);
    }

    #[test]
    fn test_high_priority_keeps_running() {
        let log = log();
        let mut component = PawnActionsComponent::new();
        let high = push(&mut component, Logged::new("High", &log), AiRequestPriority::HardScript);
        component.tick(0.1);
        push(&mut component, Logged::new("Low", &log), AiRequestPriority::Logic);
        component.tick(0.1);

        assert_eq!(component.current_action(), Some(high));
        assert_eq!(*log.borrow(), vec!["High:Started"]);

        component.finish_action(high, ActionResult::Success);
        component.tick(0.1);
        assert_eq!(
            *log.borrow(),
            vec!["High:Started", "High:Finished(Success)", "Low:Started"]
        );
    }

    #[test]
    fn test_failed_start_pops_on_next_tick() {
        let log = log();
        let mut component = PawnActionsComponent::new();
        let a = push(&mut component, Logged::new("A", &log), AiRequestPriority::Logic);
        component.tick(0.1);

        let mut failing = Logged::new("F", &log);
        failing.start_ok = false;
        let f = push(&mut component, failing, AiRequestPriority::Logic);
        component.tick(0.1);
        assert!(component.current_action().is_none());
        assert!(component.action(f).unwrap().failed_to_start);

        component.tick(0.1);
        assert_eq!(component.current_action(), Some(a));
        assert_eq!(
            *log.borrow(),
            vec!["A:Started", "A:Paused", "F:Started", "A:ChildFinished", "A:Resumed"]
        );
    }

    #[test]
    fn test_latent_abort_completes_on_finish() {
        let log = log();
        let mut component = PawnActionsComponent::new();
        let mut slow = Logged::new("Slow", &log);
        slow.latent_abort = true;
        let a = push(&mut component, slow, AiRequestPriority::Logic);
        component.tick(0.1);

        assert_eq!(component.abort_action(a), AbortState::LatentAbortInProgress);
        component.tick(0.1);
        assert_eq!(component.action_stack_size(AiRequestPriority::Logic), 1);

        component.finish_action(a, ActionResult::Success);
        assert_eq!(component.action(a).unwrap().abort_state, AbortState::AbortDone);
        component.tick(0.1);

        assert_eq!(component.action_stack_size(AiRequestPriority::Logic), 0);
        assert_eq!(*log.borrow(), vec!["Slow:Started", "Slow:Finished(Aborted)"]);
    }

    #[test]
    fn test_force_abort_skips_latent() {
        let log = log();
        let mut component = PawnActionsComponent::new();
        let mut slow = Logged::new("Slow", &log);
        slow.latent_abort = true;
        let a = push(&mut component, slow, AiRequestPriority::Logic);
        component.tick(0.1);

        assert_eq!(component.force_abort_action(a), AbortState::AbortDone);
        component.tick(0.1);
        assert!(component.current_action().is_none());
        assert_eq!(component.action(a).unwrap().result, ActionResult::Aborted);
    }

    #[test]
    fn test_resource_locks_follow_current_action() {
        let movement = ResourceId::new(0).unwrap();
        let log = log();
        let mut component = PawnActionsComponent::new();
        component.push_new_action(
            Box::new(Logged::new("Move", &log)),
            ActionSpec::new("Move").with_required(ResourceSet::from_ids(&[movement])),
            AiRequestPriority::Logic,
            None,
        );
        component.tick(0.1);

        assert!(!component.is_resource_available_for(movement, AiRequestPriority::Logic));
        assert!(component.is_resource_available_for(movement, AiRequestPriority::HardScript));

        push(&mut component, Logged::new("Stun", &log), AiRequestPriority::Ultimate);
        component.tick(0.1);
        assert!(component.is_resource_available_for(movement, AiRequestPriority::SoftScript));
        assert!(!component.resource_lock(movement).is_locked());
    }

    #[test]
    fn test_abort_instigated_by() {
        let log = log();
        let brain = OwnerId::new();
        let mut component = PawnActionsComponent::new();

        let running = component.push_new_action(
            Box::new(Logged::new("A", &log)),
            ActionSpec::new("A"),
            AiRequestPriority::Logic,
            Some(brain),
        );
        component.tick(0.1);
        let pending = component.push_new_action(
            Box::new(Logged::new("B", &log)),
            ActionSpec::new("B"),
            AiRequestPriority::Logic,
            Some(brain),
        );

        assert_eq!(component.abort_actions_instigated_by(brain, None), 2);
        component.tick(0.1);

        assert_eq!(component.action_stack_size(AiRequestPriority::Logic), 0);
        assert_eq!(component.action(running).unwrap().result, ActionResult::Aborted);
        assert_eq!(component.action(pending).unwrap().result, ActionResult::Aborted);
        assert_eq!(*log.borrow(), vec!["A:Started", "A:Finished(Aborted)"]);
    }

    #[test]
    fn test_prune_and_description() {
        let log = log();
        let mut component = PawnActionsComponent::new();
        let a = push(&mut component, Logged::new("A", &log), AiRequestPriority::Logic);
        component.tick(0.1);
        assert!(component.debug_description().contains("'A' InProgress"));

        component.finish_action(a, ActionResult::Success);
        assert_eq!(component.prune_finished(), 0);
        component.tick(0.1);
        assert_eq!(component.prune_finished(), 1);
        assert!(component.action(a).is_none());
    }

    #[test]
    fn test_finishing_in_start_takes_no_locks() {
        let movement = ResourceId::new(0).unwrap();
        let log = log();
        let mut component = PawnActionsComponent::new();
        let mut action = Logged::new("Instant", &log);
        action.finish_on_start = true;
        let instant = component.push_new_action(
            Box::new(action),
            ActionSpec::new("Instant").with_required(ResourceSet::from_ids(&[movement])),
            AiRequestPriority::Logic,
            None,
        );

        component.tick(0.1);
        assert_eq!(component.action(instant).unwrap().result, ActionResult::Success);
        assert!(!component.resource_lock(movement).is_locked());
        assert!(component.is_resource_available_for(movement, AiRequestPriority::Logic));

        component.tick(0.1);
        assert_eq!(component.action_stack_size(AiRequestPriority::Logic), 0);
        assert!(!component.resource_lock(movement).is_locked());
        assert_eq!(*log.borrow(), vec!["Instant:Started", "Instant:Finished(Success)"]);
    }

    #[test]
    fn test_abort_parent_aborts_child_first() {
        let log = log();
        let mut component = PawnActionsComponent::new();

        let parent = push(&mut component, Logged::new("P", &log), AiRequestPriority::Logic);
        component.tick(0.1);
        let child = push(&mut component, Logged::new("C", &log), AiRequestPriority::Logic);
        component.tick(0.1);
        assert_eq!(component.current_action(), Some(child));

        assert_eq!(component.abort_action(parent), AbortState::AbortDone);
        assert_eq!(component.action(child).unwrap().result, ActionResult::Aborted);
        component.tick(0.1);

        assert_eq!(component.action(parent).unwrap().result, ActionResult::Aborted);
        assert_eq!(component.action_stack_size(AiRequestPriority::Logic), 0);
        assert!(component.current_action().is_none());
        assert_eq!(
            *log.borrow(),
            vec![
                "P:Started",
                "P:Paused",
                "C:Started",
                "C:Finished(Aborted)",
                "P:ChildFinished",
                "P:Finished(Aborted)",
            ]
        );
    }

    #[test]
    fn test_events_over_tick_limit_are_dropped() {
        let log = log();
        let mut component = PawnActionsComponent::with_config(ActionsConfig { max_events_per_tick: 2 });

        let pushed: Vec<ActionHandle> = ["A", "B", "C", "D"]
            .into_iter()
            .map(|name| push(&mut component, Logged::new(name, &log), AiRequestPriority::Logic))
            .collect();
        assert_eq!(component.action_events_queue_size(), 4);
        component.tick(0.1);

        assert_eq!(component.action_events_queue_size(), 0);
        assert_eq!(component.action_stack(AiRequestPriority::Logic).as_slice(), &pushed[..2]);
        assert_eq!(component.current_action(), Some(pushed[1]));
        assert!(!component.action(pushed[3]).unwrap().on_stack);
        assert_eq!(*log.borrow(), vec!["B:Started"]);
    }

    #[test]
    fn test_duplicate_events_are_ignored() {
        let log = log();
        let brain = OwnerId::new();
        let mut component = PawnActionsComponent::new();
        let a = component.push_new_action(
            Box::new(Logged::new("A", &log)),
            ActionSpec::new("A"),
            AiRequestPriority::Logic,
            Some(brain),
        );
        component.tick(0.1);

        assert_eq!(component.abort_actions_instigated_by(brain, Some(AiRequestPriority::Logic)), 1);
        assert_eq!(component.abort_actions_instigated_by(brain, Some(AiRequestPriority::Logic)), 0);
        assert_eq!(component.action_events_queue_size(), 1);

        component.tick(0.1);
        assert_eq!(component.action(a).unwrap().result, ActionResult::Aborted);
        assert_eq!(*log.borrow(), vec!["A:Started", "A:Finished(Aborted)"]);
    }
}
