//! Built-in gameplay tasks.

use crate::task::{GameplayTask, TaskContext, TaskSpec};
use gametask_core::ResourceSet;
use tracing::debug;

/// Callback run when a [`WaitDelay`] runs out.
pub type WaitFinished = Box<dyn FnMut(&mut TaskContext<'_>)>;

/// Ticks until `duration` seconds of active time have passed, then ends.
///
/// Paused time does not count.
pub struct WaitDelay {
    duration: f32,
    elapsed: f32,
    on_finish: Option<WaitFinished>,
}

impl WaitDelay {
    /// Create a wait of `duration` seconds.
    pub fn new(duration: f32) -> Self {
        Self {
            duration,
            elapsed: 0.0,
            on_finish: None,
        }
    }

    /// Run a callback right before the task ends.
    pub fn with_on_finish(mut self, on_finish: WaitFinished) -> Self {
        self.on_finish = Some(on_finish);
        self
    }

    /// Spec for a ticking wait task.
    pub fn spec(name: impl Into<String>) -> TaskSpec {
        TaskSpec::new(name).ticking()
    }

    /// Seconds of active time so far.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    fn finish(&mut self, ctx: &mut TaskContext<'_>) {
        debug!("{} wait of {}s done", ctx.handle(), self.duration);
        if let Some(on_finish) = self.on_finish.as_mut() {
            on_finish(ctx);
        }
        ctx.end_task();
    }
}

impl GameplayTask for WaitDelay {
    fn activate(&mut self, ctx: &mut TaskContext<'_>) {
        if self.duration <= 0.0 {
            self.finish(ctx);
        }
    }

    fn tick_task(&mut self, ctx: &mut TaskContext<'_>, delta_time: f32) {
        self.elapsed += delta_time;
        if self.elapsed >= self.duration {
            self.finish(ctx);
        }
    }

    fn debug_string(&self) -> String {
        format!("(waited {:.2}/{:.2}s)", self.elapsed, self.duration)
    }
}

/// Holds resources until ended from outside.
///
/// Useful to keep lower priority tasks off a resource for a while.
#[derive(Debug, Default)]
pub struct ClaimResource;

impl ClaimResource {
    /// Create a claim task.
    pub fn new() -> Self {
        Self
    }

    /// Spec claiming `resources` without requiring them.
    pub fn spec(name: impl Into<String>, priority: u8, resources: ResourceSet) -> TaskSpec {
        TaskSpec::new(name)
            .with_priority(priority)
            .with_claimed(resources)
    }
}

impl GameplayTask for ClaimResource {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::GameplayTasksComponent;
    use crate::owner::TaskOwnerRef;
    use gametask_core::ResourceId;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_wait_delay_ends_after_duration() {
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let mut component = GameplayTasksComponent::new();
        let wait = WaitDelay::new(0.25).with_on_finish(Box::new(move |_| flag.set(true)));
        let task = component
            .run_task(TaskOwnerRef::Component, Box::new(wait), WaitDelay::spec("Wait"))
            .unwrap();

        component.tick(0.1);
        component.tick(0.1);
        assert!(component.is_active(task));
        assert!(!fired.get());

        component.tick(0.1);
        assert!(component.is_finished(task));
        assert!(fired.get());
        assert!(!component.should_tick());
    }

    #[test]
    fn test_zero_wait_ends_on_activate() {
        let mut component = GameplayTasksComponent::new();
        let task = component
            .run_task(TaskOwnerRef::Component, Box::new(WaitDelay::new(0.0)), WaitDelay::spec("Wait"))
            .unwrap();
        assert!(component.is_finished(task));
    }

    #[test]
    fn test_claim_resource_blocks_lower_priority() {
        let logic = ResourceSet::from_ids(&[ResourceId::new(1).unwrap()]);
        let mut component = GameplayTasksComponent::new();

        let claim = component
            .run_task(
                TaskOwnerRef::Component,
                Box::new(ClaimResource::new()),
                ClaimResource::spec("Claim", 50, logic),
            )
            .unwrap();
        let low = component
            .run_task(
                TaskOwnerRef::Component,
                Box::new(ClaimResource::new()),
                TaskSpec::new("Low").with_priority(10).with_required(logic),
            )
            .unwrap();

        assert!(component.is_active(claim));
        assert!(!component.is_active(low));

        component.end_task(claim);
        assert!(component.is_active(low));
    }
}
