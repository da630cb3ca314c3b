//! Pawn action stack scenarios.

use crate::harness::{AiTest, TestEnv, TestFailure};
use crate::mocks::{ActionLog, ActionMessage, TestPawnAction};
use crate::{ai_test_equal, ai_test_false, ai_test_true};
use gametask_actions::{AbortState, ActionResult, PawnActionsComponent};
use gametask_core::{ActionHandle, AiRequestPriority};

use ActionMessage::*;
use AiRequestPriority::{HardScript, Logic};

fn entry(name: &str, message: ActionMessage) -> (String, ActionMessage) {
    (name.to_string(), message)
}

#[derive(Default)]
struct Fixture {
    component: PawnActionsComponent,
    log: ActionLog,
    step: u32,
}

impl Fixture {
    fn new(env: &TestEnv) -> Self {
        Self {
            component: PawnActionsComponent::with_config(env.config.actions.clone()),
            log: ActionLog::new(),
            step: 0,
        }
    }

    fn push(&mut self, name: &str, priority: AiRequestPriority) -> ActionHandle {
        let (body, spec) = TestPawnAction::new(name, &self.log).into_parts();
        self.component.push_new_action(body, spec, priority, None)
    }

    fn create(&mut self, name: &str) -> ActionHandle {
        let (body, spec) = TestPawnAction::new(name, &self.log).into_parts();
        self.component.create_action(body, spec)
    }

    fn result(&self, action: ActionHandle) -> Option<ActionResult> {
        self.component.action(action).map(|a| a.result)
    }

    /// Tick once and return the step that was just completed.
    fn tick(&mut self, delta_time: f32) -> u32 {
        self.component.tick(delta_time);
        self.step += 1;
        self.step
    }
}

fn handle(slot: Option<ActionHandle>, what: &str) -> Result<ActionHandle, TestFailure> {
    slot.ok_or_else(|| TestFailure::Assertion(format!("{} was never pushed", what)))
}

#[derive(Default)]
pub struct PausingSamePriority {
    f: Fixture,
    actions: Vec<ActionHandle>,
}

impl AiTest for PausingSamePriority {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        self.f = Fixture::new(env);
        self.f.log.expect([
            entry("A", Started),
            entry("A", Paused),
            entry("B", Started),
            entry("B", Paused),
            entry("C", Started),
            entry("C", Finished),
            entry("B", Resumed),
            entry("B", Finished),
            entry("A", ChildFinished),
            entry("A", Resumed),
        ]);
        Ok(())
    }

    fn update(&mut self, delta_time: f32) -> Result<bool, TestFailure> {
        let f = &mut self.f;
        match f.step {
            0 => self.actions.push(f.push("A", Logic)),
            1 => self.actions.push(f.push("B", Logic)),
            2 => self.actions.push(f.push("C", HardScript)),
            3 => f.component.finish_action(self.actions[2], ActionResult::Success),
            _ => f.component.finish_action(self.actions[1], ActionResult::Success),
        }

        match f.tick(delta_time) {
            2 => {
                ai_test_equal!(f.component.current_action(), Some(self.actions[1]), "current after B");
                ai_test_equal!(f.component.action_stack_size(Logic), 2, "logic stack");
            }
            3 => {
                ai_test_equal!(f.component.current_action(), Some(self.actions[2]), "current after C");
            }
            4 => {
                ai_test_equal!(f.component.action_stack_size(HardScript), 0, "hard script stack");
                ai_test_equal!(f.component.current_action(), Some(self.actions[1]), "current after C finished");
            }
            5 => {
                ai_test_equal!(f.component.current_action(), Some(self.actions[0]), "current after B finished");
                ai_test_equal!(f.component.action_stack_size(Logic), 1, "logic stack");
                return Ok(true);
            }
            _ => {}
        }
        Ok(false)
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        self.f.log.verify()
    }
}

#[derive(Default)]
pub struct SamePriorityOrder {
    f: Fixture,
}

impl AiTest for SamePriorityOrder {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        self.f = Fixture::new(env);
        self.f.log.expect([entry("Fourth", Started)]);
        Ok(())
    }

    fn update(&mut self, delta_time: f32) -> Result<bool, TestFailure> {
        let f = &mut self.f;
        let pushed: Vec<ActionHandle> = ["First", "Second", "Third", "Fourth"]
            .into_iter()
            .map(|name| f.push(name, Logic))
            .collect();
        ai_test_equal!(f.component.action_events_queue_size(), 4, "queued pushes");

        f.tick(delta_time);
        ai_test_equal!(f.component.action_events_queue_size(), 0, "queued pushes after tick");
        ai_test_equal!(f.component.action_stack(Logic).as_slice(), pushed.as_slice(), "stack order");
        ai_test_equal!(f.component.current_action(), pushed.last().copied(), "current action");
        for earlier in &pushed[..3] {
            ai_test_false!(
                f.component.action(*earlier).map_or(true, |a| a.has_been_started()),
                "{} should not have started",
                earlier
            );
        }
        Ok(true)
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        self.f.log.verify()
    }
}

#[derive(Default)]
pub struct PushAndAbort {
    f: Fixture,
}

impl AiTest for PushAndAbort {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        self.f = Fixture::new(env);
        Ok(())
    }

    fn update(&mut self, delta_time: f32) -> Result<bool, TestFailure> {
        let f = &mut self.f;
        let action = f.push("Aborted", Logic);
        ai_test_equal!(f.component.abort_action(action), AbortState::NeverStarted, "abort state");
        ai_test_equal!(f.component.action_events_queue_size(), 0, "pending events");

        f.tick(delta_time);
        ai_test_equal!(f.component.action_stack_size(Logic), 0, "logic stack");
        ai_test_equal!(f.component.current_action(), None, "current action");
        ai_test_equal!(f.result(action), Some(ActionResult::Aborted), "result");
        Ok(true)
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        ai_test_true!(self.f.log.is_empty(), "aborted action should not log anything");
        self.f.log.verify()
    }
}

#[derive(Default)]
pub struct HighPriorityKeepRunning {
    f: Fixture,
    high: Option<ActionHandle>,
    low: Option<ActionHandle>,
}

impl AiTest for HighPriorityKeepRunning {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        self.f = Fixture::new(env);
        self.f.log.expect([
            entry("High", Started),
            entry("High", Finished),
            entry("Low", Started),
        ]);
        Ok(())
    }

    fn update(&mut self, delta_time: f32) -> Result<bool, TestFailure> {
        match self.f.step {
            0 => self.high = Some(self.f.push("High", HardScript)),
            1 => self.low = Some(self.f.push("Low", Logic)),
            _ => self
                .f
                .component
                .finish_action(handle(self.high, "High")?, ActionResult::Success),
        }

        let step = self.f.tick(delta_time);
        let (high, current) = (self.high, self.f.component.current_action());
        match step {
            1 => ai_test_equal!(current, high, "current after High"),
            2 => {
                ai_test_equal!(current, high, "current after Low");
                let low = handle(self.low, "Low")?;
                ai_test_equal!(self.f.result(low), Some(ActionResult::NotStarted), "Low result");
            }
            _ => {
                ai_test_equal!(current, self.low, "current after High finished");
                ai_test_equal!(self.f.result(handle(high, "High")?), Some(ActionResult::Success), "High result");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        self.f.log.verify()
    }
}

#[derive(Default)]
pub struct PushingSameAction {
    f: Fixture,
    action: Option<ActionHandle>,
}

impl AiTest for PushingSameAction {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        self.f = Fixture::new(env);
        self.f.log.expect([entry("Once", Started), entry("Once", Finished)]);
        Ok(())
    }

    fn instant_test(&mut self) -> Result<(), TestFailure> {
        let action = self.f.create("Once");
        self.action = Some(action);
        ai_test_true!(self.f.component.push_action(action, Logic, None), "first push");
        ai_test_false!(self.f.component.push_action(action, Logic, None), "push while pending");
        ai_test_false!(self.f.component.push_action(action, HardScript, None), "pending push at another priority");
        ai_test_equal!(self.f.component.action_events_queue_size(), 1, "queued pushes");
        Ok(())
    }

    fn update(&mut self, delta_time: f32) -> Result<bool, TestFailure> {
        let action = handle(self.action, "Once")?;
        let f = &mut self.f;

        if f.step == 0 {
            f.tick(delta_time);
            ai_test_equal!(f.component.action_stack_size(Logic), 1, "logic stack");
            ai_test_false!(f.component.push_action(action, Logic, None), "push while running");
            return Ok(false);
        }

        f.component.finish_action(action, ActionResult::Success);
        f.tick(delta_time);
        ai_test_equal!(f.component.action_stack_size(Logic), 0, "logic stack");
        ai_test_equal!(f.result(action), Some(ActionResult::Success), "result");
        ai_test_false!(f.component.push_action(action, Logic, None), "push after finishing");
        Ok(true)
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        self.f.log.verify()
    }
}

#[derive(Default)]
pub struct ChildActions {
    f: Fixture,
    parent: Option<ActionHandle>,
    child: Option<ActionHandle>,
}

impl AiTest for ChildActions {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        self.f = Fixture::new(env);
        self.f.log.expect([
            entry("Parent", Started),
            entry("Parent", Paused),
            entry("Child", Started),
            entry("Child", Finished),
            entry("Parent", ChildFinished),
            entry("Parent", Resumed),
            entry("Parent", Finished),
        ]);
        Ok(())
    }

    fn update(&mut self, delta_time: f32) -> Result<bool, TestFailure> {
        match self.f.step {
            0 => {
                let (body, spec) = TestPawnAction::new("Parent", &self.f.log)
                    .with_child_on_start("Child")
                    .into_parts();
                self.parent = Some(self.f.component.push_new_action(body, spec, Logic, None));
            }
            1 => {}
            2 => self
                .f
                .component
                .finish_action(handle(self.child, "Child")?, ActionResult::Success),
            _ => self
                .f
                .component
                .finish_action(handle(self.parent, "Parent")?, ActionResult::Success),
        }

        let parent = handle(self.parent, "Parent")?;
        match self.f.tick(delta_time) {
            1 => {
                ai_test_equal!(self.f.component.current_action(), Some(parent), "current after start");
                ai_test_equal!(self.f.component.action_events_queue_size(), 1, "queued child push");
            }
            2 => {
                let child = self.f.component.action_stack(Logic).top();
                ai_test_true!(child.is_some() && child != Some(parent), "child on top of the stack");
                ai_test_equal!(self.f.component.current_action(), child, "current after child push");
                ai_test_equal!(
                    self.f.component.action(parent).and_then(|a| a.child),
                    child,
                    "parent links the child"
                );
                self.child = child;
            }
            3 => {
                ai_test_equal!(self.f.component.current_action(), Some(parent), "current after child finished");
                ai_test_equal!(self.f.component.action_stack_size(Logic), 1, "logic stack");
            }
            _ => {
                ai_test_equal!(self.f.component.action_stack_size(Logic), 0, "logic stack");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        self.f.log.verify()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::TestRunner;

    fn run(test: &mut dyn AiTest) -> u32 {
        let runner = TestRunner::with_defaults().unwrap();
        let report = runner.run("scenario", test);
        assert!(report.passed, "{:?}", report.error);
        report.ticks
    }

    #[test]
    fn test_pausing_same_priority() {
        assert_eq!(run(&mut PausingSamePriority::default()), 5);
    }

    #[test]
    fn test_child_actions() {
        assert_eq!(run(&mut ChildActions::default()), 4);
    }

    #[test]
    fn test_push_and_abort() {
        assert_eq!(run(&mut PushAndAbort::default()), 1);
    }
}
