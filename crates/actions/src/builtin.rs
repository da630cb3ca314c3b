//! Built-in pawn actions.

use crate::action::{AbortState, ActionContext, ActionResult, ActionSpec, PawnAction};
use gametask_core::ActionHandle;
use std::collections::VecDeque;
use tracing::debug;

/// Finishes with success after `duration` seconds of ticks.
#[derive(Debug, Clone)]
pub struct WaitAction {
    duration: f32,
    elapsed: f32,
}

impl WaitAction {
    /// Create a wait of `duration` seconds.
    pub fn new(duration: f32) -> Self {
        Self { duration, elapsed: 0.0 }
    }
}

impl PawnAction for WaitAction {
    fn start(&mut self, ctx: &mut ActionContext<'_>) -> bool {
        if self.duration <= 0.0 {
            ctx.finish(ActionResult::Success);
        }
        true
    }

    fn tick(&mut self, ctx: &mut ActionContext<'_>, delta_time: f32) {
        self.elapsed += delta_time;
        if self.elapsed >= self.duration {
            ctx.finish(ActionResult::Success);
        }
    }

    fn debug_string(&self) -> String {
        format!("(waited {:.2}/{:.2}s)", self.elapsed, self.duration)
    }
}

/// Runs its steps one after another as child actions.
///
/// Finishes with success after the last step, or with failure as soon as a
/// step does not succeed.
pub struct SequenceAction {
    steps: VecDeque<(Box<dyn PawnAction>, ActionSpec)>,
    running: Option<ActionHandle>,
    completed: usize,
}

impl SequenceAction {
    /// Create an empty sequence.
    pub fn new() -> Self {
        Self {
            steps: VecDeque::new(),
            running: None,
            completed: 0,
        }
    }

    /// Append a step.
    pub fn then(mut self, action: Box<dyn PawnAction>, spec: ActionSpec) -> Self {
        self.steps.push_back((action, spec));
        self
    }

    fn push_next(&mut self, ctx: &mut ActionContext<'_>) {
        match self.steps.pop_front() {
            Some((action, spec)) => {
                debug!("{} running step {} '{}'", ctx.handle(), self.completed + 1, spec.name);
                self.running = Some(ctx.push_child(action, spec));
            }
            None => {
                self.running = None;
                ctx.finish(ActionResult::Success);
            }
        }
    }
}

impl Default for SequenceAction {
    fn default() -> Self {
        Self::new()
    }
}

impl PawnAction for SequenceAction {
    fn start(&mut self, ctx: &mut ActionContext<'_>) -> bool {
        self.push_next(ctx);
        true
    }

    fn on_child_finished(&mut self, ctx: &mut ActionContext<'_>, child: ActionHandle, result: ActionResult) {
        if self.running != Some(child) {
            return;
        }
        self.running = None;

        if ctx.info().is_being_aborted() {
            return;
        }
        if result == ActionResult::Success {
            self.completed += 1;
            self.push_next(ctx);
        } else {
            debug!("{} step {} ended with {}", ctx.handle(), self.completed + 1, result);
            ctx.finish(ActionResult::Failed);
        }
    }

    fn perform_abort(&mut self, _ctx: &mut ActionContext<'_>, _forced: bool) -> AbortState {
        self.steps.clear();
        AbortState::AbortDone
    }

    fn debug_string(&self) -> String {
        format!("(step {}, {} left)", self.completed + 1, self.steps.len())
    }
}
