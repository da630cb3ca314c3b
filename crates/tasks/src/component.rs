//! The gameplay tasks component - priority queue and resource arbitration.
//!
//! Resource consuming tasks are kept in a queue ordered by priority. Every
//! change to the queue goes through the event list and is followed by an
//! activation pass:
//! ```text
//! walk queue (highest first) -> runnable? activate/resume : pause -> update claimed set
//! ```
//! Requests made while a pass is running, or while the event lock is held,
//! are queued and processed once the current work is done.

use crate::owner::{GameplayTaskOwner, TaskError, TaskOwnerRef};
use crate::task::{GameplayTask, TaskCommand, TaskContext, TaskInfo, TaskSpec, TaskState};
use gametask_core::{HandleAllocator, OwnerId, ResourceSet, TaskHandle, TasksConfig};
use std::collections::HashMap;
use tracing::{debug, error, trace, warn};

/// Callback fired when the aggregate claimed set changes: `(claimed, released)`.
pub type ClaimedResourcesListener = Box<dyn FnMut(ResourceSet, ResourceSet)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskEventKind {
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy)]
struct TaskEvent {
    kind: TaskEventKind,
    task: TaskHandle,
}

struct TaskEntry {
    info: TaskInfo,
    requested_priority: Option<u8>,
    claim_required: bool,
    body: Option<Box<dyn GameplayTask>>,
}

/// Owns gameplay tasks and schedules the resource consuming ones.
pub struct GameplayTasksComponent {
    config: TasksConfig,
    handles: HandleAllocator,
    /// Every task still known to the component, finished ones included
    tasks: HashMap<TaskHandle, TaskEntry>,
    owners: HashMap<OwnerId, Box<dyn GameplayTaskOwner>>,
    priority_queue: Vec<TaskHandle>,
    task_events: Vec<TaskEvent>,
    ticking_tasks: Vec<TaskHandle>,
    currently_claimed: ResourceSet,
    top_active_priority: Option<u8>,
    event_lock_counter: u32,
    in_event_processing: bool,
    should_tick: bool,
    claimed_listeners: Vec<ClaimedResourcesListener>,
}

impl GameplayTasksComponent {
    /// Create a component with default settings.
    pub fn new() -> Self {
        Self::with_config(TasksConfig::default())
    }

    /// Create a component with the given settings.
    pub fn with_config(config: TasksConfig) -> Self {
        Self {
            config,
            handles: HandleAllocator::new(),
            tasks: HashMap::new(),
            owners: HashMap::new(),
            priority_queue: Vec::new(),
            task_events: Vec::new(),
            ticking_tasks: Vec::new(),
            currently_claimed: ResourceSet::EMPTY,
            top_active_priority: None,
            event_lock_counter: 0,
            in_event_processing: false,
            should_tick: false,
            claimed_listeners: Vec::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &TasksConfig {
        &self.config
    }

    // === Owners ===

    /// Register a task owner.
    pub fn add_owner(&mut self, owner: Box<dyn GameplayTaskOwner>) -> OwnerId {
        let id = OwnerId::new();
        self.owners.insert(id, owner);
        debug!("Registered task owner {}", id);
        id
    }

    /// Unregister an owner, ending every task it owns.
    pub fn remove_owner(&mut self, id: OwnerId) -> Option<Box<dyn GameplayTaskOwner>> {
        if !self.owners.contains_key(&id) {
            warn!("remove_owner called for unknown owner {}", id);
            return None;
        }

        self.lock_events();
        let owner = TaskOwnerRef::Owner(id);
        self.end_all_resource_consuming_tasks_owned_by(owner);
        let remaining: Vec<TaskHandle> = self
            .tasks
            .values()
            .filter(|e| e.info.owner == owner && !e.info.is_finished())
            .map(|e| e.info.handle)
            .collect();
        for handle in remaining {
            self.task_owner_ended(handle);
        }
        let removed = self.owners.remove(&id);
        self.unlock_events();

        debug!("Removed task owner {}", id);
        removed
    }

    /// Get a registered owner.
    pub fn owner(&self, id: OwnerId) -> Option<&dyn GameplayTaskOwner> {
        self.owners.get(&id).map(|o| o.as_ref())
    }

    // === Task creation ===

    /// Store a new, uninitialized task.
    pub fn create_task(&mut self, body: Box<dyn GameplayTask>, spec: TaskSpec) -> TaskHandle {
        let handle = self.handles.next_task();
        self.insert_task(handle, body, spec);
        handle
    }

    fn insert_task(&mut self, handle: TaskHandle, body: Box<dyn GameplayTask>, spec: TaskSpec) {
        trace!("Created {} '{}'", handle, spec.name);
        self.tasks.insert(
            handle,
            TaskEntry {
                info: TaskInfo::from_spec(handle, &spec),
                requested_priority: spec.priority,
                claim_required: spec.claim_required_resources,
                body: Some(body),
            },
        );
    }

    /// Bind a created task to its owner and move it to `AwaitingActivation`.
    pub fn init_task(&mut self, handle: TaskHandle, owner: TaskOwnerRef) -> Result<(), TaskError> {
        let default_priority = self.default_priority_for(handle, owner)?;

        let entry = self
            .tasks
            .get_mut(&handle)
            .ok_or(TaskError::UnknownTask(handle))?;
        if entry.info.state != TaskState::Uninitialized {
            return Err(TaskError::AlreadyInitialized(handle));
        }

        entry.info.priority = entry.requested_priority.unwrap_or(default_priority);
        entry.info.owner = owner;
        entry.info.state = TaskState::AwaitingActivation;
        if entry.claim_required {
            let required = entry.info.required_resources;
            entry.info.claimed_resources.add_set(required);
        }
        debug!(
            "Initialized {} '{}' (owner: {}, priority: {}, required: {}, claimed: {})",
            handle,
            entry.info.name,
            owner,
            entry.info.priority,
            entry.info.required_resources,
            entry.info.claimed_resources
        );

        match owner {
            TaskOwnerRef::Component => {}
            TaskOwnerRef::Owner(id) => {
                if let (Some(entry), Some(owner)) = (self.tasks.get(&handle), self.owners.get_mut(&id)) {
                    owner.on_task_initialized(&entry.info);
                }
            }
            TaskOwnerRef::Task(parent) => self.attach_child(parent, handle),
        }

        Ok(())
    }

    fn default_priority_for(&self, handle: TaskHandle, owner: TaskOwnerRef) -> Result<u8, TaskError> {
        match owner {
            TaskOwnerRef::Component => Ok(self.config.default_priority),
            TaskOwnerRef::Owner(id) => self
                .owners
                .get(&id)
                .map(|o| o.default_priority())
                .ok_or(TaskError::UnknownOwner(id)),
            TaskOwnerRef::Task(parent) if parent == handle => Err(TaskError::SelfOwned(handle)),
            TaskOwnerRef::Task(parent) => {
                let parent_entry = self.tasks.get(&parent).ok_or(TaskError::UnknownTask(parent))?;
                if parent_entry.info.is_finished() {
                    return Err(TaskError::ParentFinished(parent));
                }
                Ok(parent_entry.info.priority)
            }
        }
    }

    /// Only one child per task: a new child ends the previous one.
    fn attach_child(&mut self, parent: TaskHandle, child: TaskHandle) {
        let previous = self
            .tasks
            .get_mut(&parent)
            .and_then(|p| p.info.child.replace(child));

        if let Some(previous) = previous.filter(|p| *p != child) {
            debug!("{} replaces child {} with {}", parent, previous, child);
            self.end_task(previous);
        }
    }

    /// Create and initialize a task.
    pub fn new_task(
        &mut self,
        owner: TaskOwnerRef,
        body: Box<dyn GameplayTask>,
        spec: TaskSpec,
    ) -> Result<TaskHandle, TaskError> {
        let handle = self.create_task(body, spec);
        if let Err(err) = self.init_task(handle, owner) {
            self.tasks.remove(&handle);
            return Err(err);
        }
        Ok(handle)
    }

    /// Create, initialize and activate a task.
    pub fn run_task(
        &mut self,
        owner: TaskOwnerRef,
        body: Box<dyn GameplayTask>,
        spec: TaskSpec,
    ) -> Result<TaskHandle, TaskError> {
        let handle = self.new_task(owner, body, spec)?;
        self.ready_for_activation(handle);
        Ok(handle)
    }

    /// Claim extra resources before the task is queued.
    pub fn add_claimed_resources(&mut self, handle: TaskHandle, resources: ResourceSet) {
        let queued = self.is_queued(handle);
        let Some(entry) = self.tasks.get_mut(&handle) else {
            warn!("add_claimed_resources called for unknown {}", handle);
            return;
        };

        match entry.info.state {
            TaskState::Uninitialized | TaskState::AwaitingActivation if !queued => {
                entry.info.claimed_resources.add_set(resources);
            }
            state => {
                warn!(
                    "Ignoring claimed resources change for {} '{}' in state {}",
                    handle, entry.info.name, state
                );
            }
        }
    }

    // === Activation ===

    /// Ask for the task to be started.
    ///
    /// Tasks without resources or priority requirements start right away,
    /// everything else goes through the priority queue.
    pub fn ready_for_activation(&mut self, handle: TaskHandle) {
        let Some(entry) = self.tasks.get(&handle) else {
            warn!("ready_for_activation called for unknown {}", handle);
            return;
        };

        match entry.info.state {
            TaskState::Uninitialized => {
                error!(
                    "ready_for_activation called on {} '{}' before init_task, ignoring",
                    handle, entry.info.name
                );
                return;
            }
            TaskState::Finished => {
                warn!("{} '{}' is already finished, not activating", handle, entry.info.name);
                return;
            }
            TaskState::Active | TaskState::Paused => {
                debug!("{} '{}' is already running", handle, entry.info.name);
                return;
            }
            TaskState::AwaitingActivation => {}
        }

        if entry.info.requires_priority_or_resource_management() {
            if self.is_queued(handle) {
                debug!("{} '{}' already waiting in the task queue", handle, entry.info.name);
                return;
            }
            self.add_task_ready_for_activation(handle);
        } else {
            self.perform_activation(handle);
        }
    }

    fn is_queued(&self, handle: TaskHandle) -> bool {
        self.priority_queue.contains(&handle)
            || self
                .task_events
                .iter()
                .any(|e| e.task == handle && e.kind == TaskEventKind::Add)
    }

    fn perform_activation(&mut self, handle: TaskHandle) {
        let Some(entry) = self.tasks.get_mut(&handle) else {
            return;
        };
        if entry.info.state == TaskState::Active {
            warn!(
                "perform_activation called while {} '{}' is already active, bailing out",
                handle, entry.info.name
            );
            return;
        }

        entry.info.state = TaskState::Active;
        debug!("{} '{}' activating", handle, entry.info.name);
        self.with_body(handle, |body, ctx| body.activate(ctx));

        // activation may have ended the task already, nothing left to report then
        if !self.is_finished(handle) {
            self.on_task_activated(handle);
        }
    }

    fn activate_in_task_queue(&mut self, handle: TaskHandle) {
        let Some(state) = self.task_state(handle) else {
            return;
        };

        match state {
            TaskState::Uninitialized => {
                error!("{} reached the task queue without init_task", handle);
            }
            TaskState::AwaitingActivation => self.perform_activation(handle),
            TaskState::Paused => self.resume(handle),
            TaskState::Active => {}
            // same as a fresh activation
            TaskState::Finished => self.perform_activation(handle),
        }
    }

    fn pause_in_task_queue(&mut self, handle: TaskHandle) {
        let Some(state) = self.task_state(handle) else {
            return;
        };

        match state {
            TaskState::Uninitialized => {
                error!("{} paused in the task queue without init_task", handle);
            }
            // never run yet, keep it that way
            TaskState::AwaitingActivation | TaskState::Paused => {}
            TaskState::Active => self.pause(handle),
            TaskState::Finished => {
                debug!("{} being paused while already finished", handle);
            }
        }
    }

    fn pause(&mut self, handle: TaskHandle) {
        self.set_state(handle, TaskState::Paused);
        debug!("{} paused", handle);
        self.with_body(handle, |body, ctx| body.on_pause(ctx));
        if self.task_state(handle) == Some(TaskState::Paused) {
            self.on_task_deactivated(handle);
        }
    }

    fn resume(&mut self, handle: TaskHandle) {
        self.set_state(handle, TaskState::Active);
        debug!("{} resumed", handle);
        self.with_body(handle, |body, ctx| body.on_resume(ctx));
        if self.task_state(handle) == Some(TaskState::Active) {
            self.on_task_activated(handle);
        }
    }

    // === Ending ===

    /// End a task. Calling it on a finished task does nothing.
    pub fn end_task(&mut self, handle: TaskHandle) {
        match self.task_state(handle) {
            None => trace!("end_task called for unknown {}", handle),
            Some(TaskState::Finished) => trace!("{} already finished", handle),
            Some(_) => self.on_destroy(handle, false),
        }
    }

    /// End a task because its owner went away.
    ///
    /// The owner is not notified and the child is ended the same way.
    pub fn task_owner_ended(&mut self, handle: TaskHandle) {
        let Some(entry) = self.tasks.get_mut(&handle) else {
            return;
        };
        if entry.info.is_finished() {
            return;
        }
        entry.info.owner_finished = true;
        self.on_destroy(handle, true);
    }

    /// External confirmation; the task decides whether it ends.
    pub fn external_confirm(&mut self, handle: TaskHandle, end_task: bool) {
        if self.task_state(handle).map_or(true, |s| s == TaskState::Finished) {
            return;
        }
        self.with_body(handle, |body, ctx| body.external_confirm(ctx, end_task));
    }

    /// External cancellation.
    pub fn external_cancel(&mut self, handle: TaskHandle) {
        if self.task_state(handle).map_or(true, |s| s == TaskState::Finished) {
            return;
        }
        self.with_body(handle, |body, ctx| body.external_cancel(ctx));
    }

    fn on_destroy(&mut self, handle: TaskHandle, owner_finished: bool) {
        self.set_state(handle, TaskState::Finished);
        debug!("{} finished (owner finished: {})", handle, owner_finished);
        self.with_body(handle, |body, ctx| body.on_destroy(ctx, owner_finished));
        self.on_task_deactivated(handle);
    }

    /// End every queued task owned by `owner`, then re-run activation.
    pub fn end_all_resource_consuming_tasks_owned_by(&mut self, owner: TaskOwnerRef) {
        self.lock_events();
        let owned: Vec<TaskHandle> = self
            .priority_queue
            .iter()
            .copied()
            .filter(|h| self.tasks.get(h).map_or(false, |e| e.info.owner == owner))
            .collect();
        debug!("Ending {} resource consuming tasks owned by {}", owned.len(), owner);
        for handle in owned {
            // removal events are processed once the lock is released
            self.task_owner_ended(handle);
        }
        self.unlock_events();
    }

    // === Component notifications ===

    fn on_task_activated(&mut self, handle: TaskHandle) {
        self.lock_events();

        if let Some(entry) = self.tasks.get(&handle) {
            if entry.info.ticking && !self.ticking_tasks.contains(&handle) {
                self.ticking_tasks.push(handle);
            }
            if let TaskOwnerRef::Owner(id) = entry.info.owner {
                if let Some(owner) = self.owners.get_mut(&id) {
                    owner.on_task_activated(&entry.info);
                }
            }
        }
        self.update_should_tick();

        self.unlock_events();
    }

    fn on_task_deactivated(&mut self, handle: TaskHandle) {
        self.lock_events();

        let Some(info) = self.tasks.get(&handle).map(|e| e.info.clone()) else {
            self.unlock_events();
            return;
        };
        let finished = info.is_finished();

        if finished {
            if let Some(child) = info.child {
                if info.owner_finished {
                    self.task_owner_ended(child);
                } else {
                    self.end_task(child);
                }
            }
        }

        if info.ticking {
            self.ticking_tasks.retain(|h| *h != handle);
        }

        if finished && info.requires_priority_or_resource_management() {
            self.remove_resource_consuming_task(handle);
        }

        match info.owner {
            TaskOwnerRef::Component => {}
            TaskOwnerRef::Owner(id) => {
                if !info.owner_finished {
                    if let (Some(entry), Some(owner)) = (self.tasks.get(&handle), self.owners.get_mut(&id)) {
                        owner.on_task_deactivated(&entry.info);
                    }
                }
            }
            TaskOwnerRef::Task(parent) => {
                if finished {
                    if let Some(parent_entry) = self.tasks.get_mut(&parent) {
                        if parent_entry.info.child == Some(handle) {
                            trace!("{} detached finished child {}", parent, handle);
                            parent_entry.info.child = None;
                        }
                    }
                }
            }
        }

        self.update_should_tick();
        self.unlock_events();
    }

    // === Event queue ===

    fn add_task_ready_for_activation(&mut self, handle: TaskHandle) {
        self.push_task_event(TaskEventKind::Add, handle);
    }

    fn remove_resource_consuming_task(&mut self, handle: TaskHandle) {
        self.push_task_event(TaskEventKind::Remove, handle);
    }

    fn push_task_event(&mut self, kind: TaskEventKind, task: TaskHandle) {
        self.task_events.push(TaskEvent { kind, task });
        // only the first event kicks off processing, later ones join the running batch
        if self.task_events.len() == 1 && self.can_process_events() {
            self.process_task_events();
        }
    }

    fn can_process_events(&self) -> bool {
        !self.in_event_processing && self.event_lock_counter == 0
    }

    fn lock_events(&mut self) {
        self.event_lock_counter += 1;
    }

    fn unlock_events(&mut self) {
        self.event_lock_counter = self.event_lock_counter.saturating_sub(1);
        if !self.task_events.is_empty() && self.can_process_events() {
            self.process_task_events();
        }
    }

    fn process_task_events(&mut self) {
        self.in_event_processing = true;

        let mut iterations = 0;
        while !self.task_events.is_empty() {
            iterations += 1;
            if iterations > self.config.max_event_iterations {
                error!(
                    "Task event processing exceeded {} iterations, dropping {} events. Check tasks for logic loops!",
                    self.config.max_event_iterations,
                    self.task_events.len()
                );
                self.task_events.clear();
                break;
            }

            let events = std::mem::take(&mut self.task_events);
            for event in events {
                trace!("Processing {:?} for {}", event.kind, event.task);
                let Some(state) = self.task_state(event.task) else {
                    self.remove_task_from_priority_queue(event.task);
                    continue;
                };

                match event.kind {
                    TaskEventKind::Add if state != TaskState::Finished => {
                        self.add_task_to_priority_queue(event.task);
                    }
                    TaskEventKind::Add => {
                        warn!("Trying to add finished {} to the priority queue", event.task);
                    }
                    TaskEventKind::Remove => self.remove_task_from_priority_queue(event.task),
                }
            }

            // activation changes may produce new events, loop until settled
            self.update_task_activations();
        }

        self.in_event_processing = false;
    }

    fn add_task_to_priority_queue(&mut self, handle: TaskHandle) {
        if self.priority_queue.contains(&handle) {
            debug!("{} is already in the priority queue", handle);
            return;
        }
        let Some(entry) = self.tasks.get(&handle) else {
            return;
        };

        let priority = entry.info.priority;
        let start_on_top = entry.info.overlap_policy == crate::ResourceOverlapPolicy::StartOnTop;
        let insertion_point = self.priority_queue.iter().position(|other| {
            self.tasks.get(other).map_or(false, |o| {
                if start_on_top {
                    o.info.priority <= priority
                } else {
                    o.info.priority < priority
                }
            })
        });

        match insertion_point {
            Some(index) => self.priority_queue.insert(index, handle),
            None => self.priority_queue.push(handle),
        }
        trace!("Queued {} at priority {}", handle, priority);
    }

    fn remove_task_from_priority_queue(&mut self, handle: TaskHandle) {
        match self.priority_queue.iter().position(|h| *h == handle) {
            Some(index) => {
                self.priority_queue.remove(index);
            }
            None => {
                debug!("{} is not in the priority queue, might have been removed already", handle);
            }
        }
    }

    /// Partition the queue into running and paused tasks.
    fn update_task_activations(&mut self) {
        let mut resources_claimed = ResourceSet::EMPTY;
        let mut resources_blocked = ResourceSet::EMPTY;
        let mut activation_list = Vec::with_capacity(self.priority_queue.len());
        let mut has_stale = false;

        let queue = self.priority_queue.clone();
        for handle in queue {
            let Some((required, claimed)) = self
                .tasks
                .get(&handle)
                .map(|e| (e.info.required_resources, e.info.claimed_resources))
            else {
                warn!("Stale entry {} in the priority queue", handle);
                has_stale = true;
                continue;
            };

            if required.union(claimed).overlap(resources_blocked).is_empty() {
                // activations wait until all pauses are done
                activation_list.push(handle);
                resources_claimed.add_set(claimed);
            } else {
                self.pause_in_task_queue(handle);
            }

            resources_blocked.add_set(claimed);
        }

        for handle in activation_list {
            // an earlier activation may have ended this one
            if !self.is_finished(handle) {
                self.activate_in_task_queue(handle);
            }
        }

        self.set_currently_claimed_resources(resources_claimed);
        self.top_active_priority = self
            .priority_queue
            .iter()
            .filter_map(|h| self.tasks.get(h))
            .find(|e| e.info.is_active())
            .map(|e| e.info.priority);

        if has_stale {
            self.priority_queue.retain(|h| self.tasks.contains_key(h));
        }
    }

    fn set_currently_claimed_resources(&mut self, new_claimed: ResourceSet) {
        if self.currently_claimed == new_claimed {
            return;
        }

        let released = self.currently_claimed.difference(new_claimed);
        let claimed = new_claimed.difference(self.currently_claimed);
        self.currently_claimed = new_claimed;
        debug!(
            "Claimed resources now {} (claimed {}, released {})",
            new_claimed, claimed, released
        );

        for listener in &mut self.claimed_listeners {
            listener(claimed, released);
        }
    }

    // === Ticking ===

    fn update_should_tick(&mut self) {
        let should_tick = self
            .ticking_tasks
            .iter()
            .any(|h| self.tasks.get(h).map_or(false, |e| e.info.is_active()));
        if should_tick != self.should_tick {
            trace!("Component should tick: {}", should_tick);
            self.should_tick = should_tick;
        }
    }

    /// Advance every active ticking task.
    pub fn tick(&mut self, delta_time: f32) {
        if !self.task_events.is_empty() && self.can_process_events() {
            self.process_task_events();
        }

        // ticking may end tasks, iterate over a copy
        let ticking = self.ticking_tasks.clone();
        let mut ticked = 0;
        for handle in ticking {
            if self.task_state(handle) != Some(TaskState::Active) {
                continue;
            }
            self.with_body(handle, |body, ctx| body.tick_task(ctx, delta_time));
            ticked += 1;
        }

        if ticked == 0 {
            self.ticking_tasks.clear();
        }
        self.update_should_tick();
    }

    // === Callbacks ===

    fn with_body(
        &mut self,
        handle: TaskHandle,
        f: impl FnOnce(&mut dyn GameplayTask, &mut TaskContext<'_>),
    ) {
        let Some(entry) = self.tasks.get_mut(&handle) else {
            return;
        };
        let Some(mut body) = entry.body.take() else {
            trace!("{} is already inside a callback, skipping nested call", handle);
            return;
        };
        let info = entry.info.clone();

        let commands = {
            let mut ctx = TaskContext::new(info, &mut self.handles);
            f(body.as_mut(), &mut ctx);
            ctx.into_commands()
        };

        if let Some(entry) = self.tasks.get_mut(&handle) {
            entry.body = Some(body);
        }
        self.apply_commands(commands);
    }

    fn apply_commands(&mut self, commands: Vec<TaskCommand>) {
        for command in commands {
            match command {
                TaskCommand::End(handle) => self.end_task(handle),
                TaskCommand::Confirm(handle, end_task) => self.external_confirm(handle, end_task),
                TaskCommand::Cancel(handle) => self.external_cancel(handle),
                TaskCommand::Ready(handle) => self.ready_for_activation(handle),
                TaskCommand::Spawn { handle, owner, body, spec, activate } => {
                    self.insert_task(handle, body, spec);
                    if let Err(err) = self.init_task(handle, owner) {
                        warn!("Failed to spawn {}: {}", handle, err);
                        self.tasks.remove(&handle);
                        continue;
                    }
                    if activate {
                        self.ready_for_activation(handle);
                    }
                }
            }
        }
    }

    fn set_state(&mut self, handle: TaskHandle, state: TaskState) {
        if let Some(entry) = self.tasks.get_mut(&handle) {
            entry.info.state = state;
        }
    }

    // === Queries ===

    /// Get a task's runtime info.
    pub fn task(&self, handle: TaskHandle) -> Option<&TaskInfo> {
        self.tasks.get(&handle).map(|e| &e.info)
    }

    /// Get a task's state.
    pub fn task_state(&self, handle: TaskHandle) -> Option<TaskState> {
        self.tasks.get(&handle).map(|e| e.info.state)
    }

    /// Whether the task is active.
    pub fn is_active(&self, handle: TaskHandle) -> bool {
        self.task_state(handle) == Some(TaskState::Active)
    }

    /// Whether the task is paused.
    pub fn is_paused(&self, handle: TaskHandle) -> bool {
        self.task_state(handle) == Some(TaskState::Paused)
    }

    /// Whether the task has finished.
    pub fn is_finished(&self, handle: TaskHandle) -> bool {
        self.task_state(handle) == Some(TaskState::Finished)
    }

    /// Resource consuming tasks, highest priority first.
    pub fn priority_queue(&self) -> &[TaskHandle] {
        &self.priority_queue
    }

    /// Union of claimed resources of the running tasks.
    pub fn currently_claimed_resources(&self) -> ResourceSet {
        self.currently_claimed
    }

    /// Priority of the highest running queued task.
    pub fn top_active_priority(&self) -> Option<u8> {
        self.top_active_priority
    }

    /// Whether an active task wants ticking.
    pub fn should_tick(&self) -> bool {
        self.should_tick
    }

    /// Number of tasks registered for ticking.
    pub fn ticking_task_count(&self) -> usize {
        self.ticking_tasks.len()
    }

    /// Number of queued, unprocessed add/remove events.
    pub fn pending_event_count(&self) -> usize {
        self.task_events.len()
    }

    /// Number of tasks the component still holds.
    pub fn known_task_count(&self) -> usize {
        self.tasks.len()
    }

    /// First queued task with the given instance name.
    pub fn find_resource_consuming_task_by_name(&self, name: &str) -> Option<TaskHandle> {
        self.priority_queue
            .iter()
            .copied()
            .find(|h| self.tasks.get(h).map_or(false, |e| e.info.name == name))
    }

    /// Whether any active task has the given instance name.
    pub fn has_active_tasks_named(&self, name: &str) -> bool {
        self.tasks
            .values()
            .any(|e| e.info.is_active() && e.info.name == name)
    }

    /// Subscribe to changes of the claimed resource aggregate.
    pub fn on_claimed_resources_change(&mut self, listener: ClaimedResourcesListener) {
        self.claimed_listeners.push(listener);
    }

    /// Drop finished tasks nobody references anymore. Returns how many went.
    pub fn prune_finished(&mut self) -> usize {
        let before = self.tasks.len();
        let queue = &self.priority_queue;
        let events = &self.task_events;
        self.tasks.retain(|handle, entry| {
            !entry.info.is_finished()
                || queue.contains(handle)
                || events.iter().any(|e| e.task == *handle)
        });
        let pruned = before - self.tasks.len();
        if pruned > 0 {
            debug!("Pruned {} finished tasks", pruned);
        }
        pruned
    }

    /// Multi-line dump of the queue and claimed resources.
    pub fn debug_description(&self) -> String {
        let mut out = format!(
            "Claimed: {}, top priority: {}, should tick: {}\n",
            self.currently_claimed,
            self.top_active_priority
                .map_or_else(|| "-".to_string(), |p| p.to_string()),
            self.should_tick
        );
        for (index, handle) in self.priority_queue.iter().enumerate() {
            let Some(entry) = self.tasks.get(handle) else {
                continue;
            };
            let extra = entry
                .body
                .as_ref()
                .map(|b| b.debug_string())
                .unwrap_or_default();
            out.push_str(&format!(
                "  {:>2}. {} '{}' [{}] priority {} required {} claimed {} owner {}{}{}\n",
                index,
                handle,
                entry.info.name,
                entry.info.state,
                entry.info.priority,
                entry.info.required_resources,
                entry.info.claimed_resources,
                entry.info.owner,
                if extra.is_empty() { "" } else { " " },
                extra
            ));
        }
        out
    }
}

impl Default for GameplayTasksComponent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResourceOverlapPolicy;
    use gametask_core::ResourceId;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
        end_on_activate: bool,
    }

    impl Recorder {
        fn boxed(name: &'static str, log: &Log) -> Box<dyn GameplayTask> {
            Box::new(Self { name, log: log.clone(), end_on_activate: false })
        }

        fn instant(name: &'static str, log: &Log) -> Box<dyn GameplayTask> {
            Box::new(Self { name, log: log.clone(), end_on_activate: true })
        }

        fn push(&self, what: &str) {
            self.log.borrow_mut().push(format!("{}:{}", self.name, what));
        }
    }

    impl GameplayTask for Recorder {
        fn activate(&mut self, ctx: &mut TaskContext<'_>) {
            self.push("activate");
            if self.end_on_activate {
                ctx.end_task();
            }
        }

        fn tick_task(&mut self, _ctx: &mut TaskContext<'_>, _delta_time: f32) {
            self.push("tick");
        }

        fn on_pause(&mut self, _ctx: &mut TaskContext<'_>) {
            self.push("pause");
        }

        fn on_resume(&mut self, _ctx: &mut TaskContext<'_>) {
            self.push("resume");
        }

        fn on_destroy(&mut self, _ctx: &mut TaskContext<'_>, _owner_finished: bool) {
            self.push("end");
        }
    }

    #[derive(Default)]
    struct CountingOwner {
        events: Rc<RefCell<Vec<String>>>,
    }

    impl GameplayTaskOwner for CountingOwner {
        fn default_priority(&self) -> u8 {
            42
        }

        fn on_task_initialized(&mut self, task: &TaskInfo) {
            self.events.borrow_mut().push(format!("init:{}", task.name));
        }

        fn on_task_activated(&mut self, task: &TaskInfo) {
            self.events.borrow_mut().push(format!("activated:{}", task.name));
        }

        fn on_task_deactivated(&mut self, task: &TaskInfo) {
            self.events.borrow_mut().push(format!("deactivated:{}", task.name));
        }
    }

    /// Runs a copy of itself as its child every time it activates.
    struct Respawner {
        log: Log,
    }

    impl Respawner {
        fn spec() -> TaskSpec {
            TaskSpec::new("respawner").with_priority(1).with_required(res(0))
        }
    }

    impl GameplayTask for Respawner {
        fn activate(&mut self, ctx: &mut TaskContext<'_>) {
            self.log.borrow_mut().push("respawner:activate".to_string());
            ctx.run_child(Box::new(Respawner { log: self.log.clone() }), Respawner::spec());
        }
    }

    fn res(i: u8) -> ResourceSet {
        ResourceSet::from_ids(&[ResourceId::new(i).unwrap()])
    }

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_unmanaged_task_activates_immediately() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let task = component
            .run_task(TaskOwnerRef::Component, Recorder::boxed("a", &log), TaskSpec::new("a"))
            .unwrap();

        assert!(component.is_active(task));
        assert!(component.priority_queue().is_empty());
        assert_eq!(component.task(task).unwrap().priority, 127);
        assert_eq!(*log.borrow(), vec!["a:activate"]);
    }

    #[test]
    fn test_ready_before_init_is_ignored() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let task = component.create_task(Recorder::boxed("a", &log), TaskSpec::new("a"));

        component.ready_for_activation(task);
        assert_eq!(component.task_state(task), Some(TaskState::Uninitialized));
        assert!(log.borrow().is_empty());

        component.init_task(task, TaskOwnerRef::Component).unwrap();
        assert_eq!(
            component.init_task(task, TaskOwnerRef::Component),
            Err(TaskError::AlreadyInitialized(task))
        );
    }

    #[test]
    fn test_same_priority_new_task_displaces_old() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let spec = |name: &str| TaskSpec::new(name).with_priority(1).with_required(res(0));

        let a = component
            .run_task(TaskOwnerRef::Component, Recorder::boxed("a", &log), spec("a"))
            .unwrap();
        assert!(component.is_active(a));

        let b = component
            .run_task(TaskOwnerRef::Component, Recorder::boxed("b", &log), spec("b"))
            .unwrap();
        assert!(component.is_paused(a));
        assert!(component.is_active(b));
        assert_eq!(component.currently_claimed_resources(), res(0));

        component.end_task(b);
        assert!(component.is_active(a));
        assert_eq!(
            *log.borrow(),
            vec!["a:activate", "a:pause", "b:activate", "b:end", "a:resume"]
        );
    }

    #[test]
    fn test_start_at_end_keeps_running_task() {
        let log = log();
        let mut component = GameplayTasksComponent::new();

        let a = component
            .run_task(
                TaskOwnerRef::Component,
                Recorder::boxed("a", &log),
                TaskSpec::new("a").with_priority(1).with_required(res(0)),
            )
            .unwrap();
        let b = component
            .run_task(
                TaskOwnerRef::Component,
                Recorder::boxed("b", &log),
                TaskSpec::new("b")
                    .with_priority(1)
                    .with_required(res(0))
                    .with_overlap_policy(ResourceOverlapPolicy::StartAtEnd),
            )
            .unwrap();

        assert!(component.is_active(a));
        assert_eq!(component.task_state(b), Some(TaskState::AwaitingActivation));
        assert_eq!(component.priority_queue(), &[a, b]);
    }

    #[test]
    fn test_lower_priority_waits() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let high = component
            .run_task(
                TaskOwnerRef::Component,
                Recorder::boxed("high", &log),
                TaskSpec::new("high").with_priority(10).with_required(res(0)),
            )
            .unwrap();
        let low = component
            .run_task(
                TaskOwnerRef::Component,
                Recorder::boxed("low", &log),
                TaskSpec::new("low").with_priority(1).with_required(res(0)),
            )
            .unwrap();

        assert!(component.is_active(high));
        assert_eq!(component.task_state(low), Some(TaskState::AwaitingActivation));
        assert_eq!(component.top_active_priority(), Some(10));

        component.end_task(high);
        assert!(component.is_active(low));
        assert_eq!(component.top_active_priority(), Some(1));
    }

    #[test]
    fn test_instant_finish_leaves_no_claims() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let task = component
            .run_task(
                TaskOwnerRef::Component,
                Recorder::instant("instant", &log),
                TaskSpec::new("instant").with_required(res(1)),
            )
            .unwrap();

        assert!(component.is_finished(task));
        assert!(component.priority_queue().is_empty());
        assert!(component.currently_claimed_resources().is_empty());
        assert_eq!(*log.borrow(), vec!["instant:activate", "instant:end"]);
    }

    #[test]
    fn test_end_task_twice_is_noop() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let owner_impl = CountingOwner::default();
        let events = owner_impl.events.clone();
        let owner = component.add_owner(Box::new(owner_impl));
        let task = component
            .run_task(TaskOwnerRef::Owner(owner), Recorder::boxed("a", &log), TaskSpec::new("a"))
            .unwrap();

        component.end_task(task);
        component.end_task(task);
        assert_eq!(component.task_state(task), Some(TaskState::Finished));
        assert_eq!(*log.borrow(), vec!["a:activate", "a:end"]);
        assert_eq!(
            *events.borrow(),
            vec!["init:a", "activated:a", "deactivated:a"]
        );
    }

    #[test]
    fn test_owner_notifications_and_default_priority() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let owner_impl = CountingOwner::default();
        let events = owner_impl.events.clone();
        let owner = component.add_owner(Box::new(owner_impl));

        let task = component
            .run_task(TaskOwnerRef::Owner(owner), Recorder::boxed("a", &log), TaskSpec::new("a"))
            .unwrap();
        assert_eq!(component.task(task).unwrap().priority, 42);

        component.end_task(task);
        assert_eq!(
            *events.borrow(),
            vec!["init:a", "activated:a", "deactivated:a"]
        );
    }

    #[test]
    fn test_unknown_owner_fails() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let stranger = OwnerId::new();
        let result = component.new_task(
            TaskOwnerRef::Owner(stranger),
            Recorder::boxed("a", &log),
            TaskSpec::new("a"),
        );
        assert_eq!(result, Err(TaskError::UnknownOwner(stranger)));
        assert_eq!(component.known_task_count(), 0);
    }

    #[test]
    fn test_remove_owner_ends_tasks_silently() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let owner_impl = CountingOwner::default();
        let events = owner_impl.events.clone();
        let owner = component.add_owner(Box::new(owner_impl));

        let queued = component
            .run_task(
                TaskOwnerRef::Owner(owner),
                Recorder::boxed("queued", &log),
                TaskSpec::new("queued").with_required(res(0)),
            )
            .unwrap();
        let waiting = component
            .new_task(TaskOwnerRef::Owner(owner), Recorder::boxed("waiting", &log), TaskSpec::new("waiting"))
            .unwrap();

        assert!(component.remove_owner(owner).is_some());
        assert!(component.is_finished(queued));
        assert!(component.is_finished(waiting));
        assert!(component.priority_queue().is_empty());
        assert!(component.currently_claimed_resources().is_empty());
        assert!(!events.borrow().iter().any(|e| e.starts_with("deactivated")));
    }

    #[test]
    fn test_child_task_replacement() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let parent = component
            .run_task(TaskOwnerRef::Component, Recorder::boxed("parent", &log), TaskSpec::new("parent"))
            .unwrap();

        let first = component
            .run_task(TaskOwnerRef::Task(parent), Recorder::boxed("first", &log), TaskSpec::new("first"))
            .unwrap();
        assert_eq!(component.task(parent).unwrap().child, Some(first));

        let second = component
            .new_task(TaskOwnerRef::Task(parent), Recorder::boxed("second", &log), TaskSpec::new("second"))
            .unwrap();
        assert!(component.is_finished(first));
        assert_eq!(component.task(parent).unwrap().child, Some(second));

        component.end_task(parent);
        assert!(component.is_finished(second));
        assert_eq!(
            component.new_task(TaskOwnerRef::Task(parent), Recorder::boxed("late", &log), TaskSpec::new("late")),
            Err(TaskError::ParentFinished(parent))
        );
    }

    #[test]
    fn test_ticking_only_while_active() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let ticking = component
            .run_task(
                TaskOwnerRef::Component,
                Recorder::boxed("tick", &log),
                TaskSpec::new("tick").with_priority(1).with_required(res(0)).ticking(),
            )
            .unwrap();
        assert!(component.should_tick());

        let blocker = component
            .run_task(
                TaskOwnerRef::Component,
                Recorder::boxed("block", &log),
                TaskSpec::new("block").with_priority(5).with_required(res(0)),
            )
            .unwrap();
        assert!(component.is_paused(ticking));
        assert!(!component.should_tick());

        component.tick(0.1);
        component.end_task(blocker);
        assert!(component.should_tick());
        component.tick(0.1);

        let ticks = log.borrow().iter().filter(|l| l.as_str() == "tick:tick").count();
        assert_eq!(ticks, 1);
    }

    #[test]
    fn test_claimed_listener_sees_changes() {
        let log = log();
        let changes: Rc<RefCell<Vec<(ResourceSet, ResourceSet)>>> = Rc::new(RefCell::new(Vec::new()));
        let mut component = GameplayTasksComponent::new();
        let sink = changes.clone();
        component.on_claimed_resources_change(Box::new(move |claimed, released| {
            sink.borrow_mut().push((claimed, released));
        }));

        let task = component
            .run_task(
                TaskOwnerRef::Component,
                Recorder::boxed("a", &log),
                TaskSpec::new("a").with_required(res(2)),
            )
            .unwrap();
        component.end_task(task);

        assert_eq!(
            *changes.borrow(),
            vec![(res(2), ResourceSet::EMPTY), (ResourceSet::EMPTY, res(2))]
        );
    }

    #[test]
    fn test_prune_finished() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let a = component
            .run_task(TaskOwnerRef::Component, Recorder::boxed("a", &log), TaskSpec::new("a"))
            .unwrap();
        let b = component
            .run_task(TaskOwnerRef::Component, Recorder::boxed("b", &log), TaskSpec::new("b"))
            .unwrap();
        component.end_task(a);

        assert_eq!(component.prune_finished(), 1);
        assert!(component.task(a).is_none());
        assert!(component.is_active(b));
    }

    #[test]
    fn test_find_by_name_and_description() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let task = component
            .run_task(
                TaskOwnerRef::Component,
                Recorder::boxed("mover", &log),
                TaskSpec::new("MoveTo").with_required(res(0)),
            )
            .unwrap();

        assert_eq!(component.find_resource_consuming_task_by_name("MoveTo"), Some(task));
        assert!(component.has_active_tasks_named("MoveTo"));
        assert!(component.debug_description().contains("'MoveTo' [Active]"));
    }

    #[test]
    fn test_external_confirm() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let task = component
            .run_task(TaskOwnerRef::Component, Recorder::boxed("a", &log), TaskSpec::new("a"))
            .unwrap();

        component.external_confirm(task, false);
        assert!(component.is_active(task));

        component.external_confirm(task, true);
        assert!(component.is_finished(task));

        component.external_confirm(task, true);
        assert_eq!(*log.borrow(), vec!["a:activate", "a:end"]);
    }

    #[test]
    fn test_unclaimed_required_resources_do_not_block() {
        let log = log();
        let mut component = GameplayTasksComponent::new();
        let shared = component
            .run_task(
                TaskOwnerRef::Component,
                Recorder::boxed("shared", &log),
                TaskSpec::new("shared")
                    .with_priority(2)
                    .with_required(res(0))
                    .with_claim_required(false),
            )
            .unwrap();
        assert!(component.task(shared).unwrap().claimed_resources.is_empty());
        assert!(component.currently_claimed_resources().is_empty());

        let low = component
            .run_task(
                TaskOwnerRef::Component,
                Recorder::boxed("low", &log),
                TaskSpec::new("low").with_priority(1).with_required(res(0)),
            )
            .unwrap();

        assert!(component.is_active(shared));
        assert!(component.is_active(low));
        assert_eq!(component.priority_queue(), &[shared, low]);
        assert_eq!(component.currently_claimed_resources(), res(0));
    }

    #[test]
    fn test_event_loop_is_bounded() {
        let log = log();
        let mut component = GameplayTasksComponent::with_config(TasksConfig {
            max_event_iterations: 3,
            ..TasksConfig::default()
        });

        let root = component
            .run_task(
                TaskOwnerRef::Component,
                Box::new(Respawner { log: log.clone() }),
                Respawner::spec(),
            )
            .unwrap();

        // root and two generations of children got queued, the third add was dropped
        assert_eq!(log.borrow().len(), 3);
        assert_eq!(component.known_task_count(), 4);
        assert_eq!(component.priority_queue().len(), 3);
        assert_eq!(component.pending_event_count(), 0);
        assert!(component.is_paused(root));
        assert_eq!(
            component
                .priority_queue()
                .iter()
                .filter(|h| component.is_active(**h))
                .count(),
            1
        );
    }
}
