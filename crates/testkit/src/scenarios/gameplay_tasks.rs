//! Gameplay task scheduler scenarios.

use crate::harness::{AiTest, TestEnv, TestFailure};
use crate::mocks::{MockOwner, MockTask, OwnerLog, OwnerMessage, TaskLog, TaskMessage};
use crate::{ai_test_equal, ai_test_false, ai_test_true};
use gametask_core::{ResourceSet, TaskHandle};
use gametask_tasks::{GameplayTasksComponent, TaskOwnerRef, TaskSpec, TaskState};

use TaskMessage::*;

fn entry(name: &str, message: TaskMessage) -> (String, TaskMessage) {
    (name.to_string(), message)
}

/// Every resource is claimed by at most one active task, and the aggregate
/// matches the active tasks.
fn check_claims(component: &GameplayTasksComponent) -> Result<(), TestFailure> {
    let mut union = ResourceSet::EMPTY;
    for handle in component.priority_queue() {
        let Some(task) = component.task(*handle) else {
            continue;
        };
        if !task.is_active() {
            continue;
        }
        ai_test_true!(
            union.overlap(task.claimed_resources).is_empty(),
            "{} claims {} which another active task already holds",
            task.name,
            task.claimed_resources
        );
        union.add_set(task.claimed_resources);
    }
    ai_test_equal!(
        component.currently_claimed_resources(),
        union,
        "currently claimed resources"
    );
    Ok(())
}

struct Fixture {
    component: GameplayTasksComponent,
    log: TaskLog,
    movement: ResourceSet,
    animation: ResourceSet,
}

impl Fixture {
    fn new(env: &TestEnv) -> Result<Self, TestFailure> {
        Ok(Self {
            component: GameplayTasksComponent::with_config(env.config.tasks.clone()),
            log: TaskLog::new(),
            movement: env.resources(&["Movement"])?,
            animation: env.resources(&["Animation"])?,
        })
    }

    fn run(&mut self, name: &str, spec: TaskSpec) -> Result<TaskHandle, TestFailure> {
        let task = MockTask::new(name, &self.log).boxed();
        Ok(self.component.run_task(TaskOwnerRef::Component, task, spec)?)
    }

    fn state(&self, task: TaskHandle) -> Option<TaskState> {
        self.component.task_state(task)
    }
}

fn fixture(slot: &mut Option<Fixture>) -> Result<&mut Fixture, TestFailure> {
    slot.as_mut()
        .ok_or_else(|| TestFailure::SetUp("fixture missing".to_string()))
}

fn verify(slot: &Option<Fixture>) -> Result<(), TestFailure> {
    match slot {
        Some(f) => f.log.verify(),
        None => Ok(()),
    }
}

#[derive(Default)]
pub struct ComponentState {
    fixture: Option<Fixture>,
}

impl AiTest for ComponentState {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        let f = Fixture::new(env)?;
        f.log.expect([
            entry("Ticking", Activate),
            entry("Ticking", Pause),
            entry("Blocker", Activate),
            entry("Blocker", Ended),
            entry("Ticking", Resume),
            entry("Ticking", Ended),
        ]);
        self.fixture = Some(f);
        Ok(())
    }

    fn instant_test(&mut self) -> Result<(), TestFailure> {
        let f = fixture(&mut self.fixture)?;
        let movement = f.movement;

        let ticking = f.component.new_task(
            TaskOwnerRef::Component,
            MockTask::new("Ticking", &f.log).boxed(),
            TaskSpec::new("Ticking").with_priority(1).with_required(movement).ticking(),
        )?;
        ai_test_false!(f.component.should_tick(), "nothing active yet");

        f.component.ready_for_activation(ticking);
        ai_test_true!(f.component.should_tick(), "active ticking task");

        let blocker = f.run("Blocker", TaskSpec::new("Blocker").with_priority(2).with_required(movement))?;
        ai_test_equal!(f.state(ticking), Some(TaskState::Paused), "ticking task state");
        ai_test_false!(f.component.should_tick(), "ticking task is paused");

        f.component.end_task(blocker);
        ai_test_true!(f.component.should_tick(), "ticking task resumed");

        f.component.end_task(ticking);
        ai_test_false!(f.component.should_tick(), "ticking task ended");
        ai_test_equal!(f.component.ticking_task_count(), 0, "ticking tasks");
        Ok(())
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        verify(&self.fixture)
    }
}

#[derive(Default)]
pub struct ExternalCancelWithTick {
    fixture: Option<Fixture>,
    task: Option<TaskHandle>,
    ticks: u32,
}

impl ExternalCancelWithTick {
    const TICKS: u32 = 3;
}

impl AiTest for ExternalCancelWithTick {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        let mut f = Fixture::new(env)?;
        let mut expected = vec![entry("Ticking", Activate)];
        expected.extend((0..Self::TICKS).map(|_| entry("Ticking", Tick)));
        expected.push(entry("Ticking", ExternalCancel));
        expected.push(entry("Ticking", Ended));
        f.log.expect(expected);

        self.task = Some(f.run("Ticking", TaskSpec::new("Ticking").ticking())?);
        self.fixture = Some(f);
        Ok(())
    }

    fn update(&mut self, delta_time: f32) -> Result<bool, TestFailure> {
        let task = self
            .task
            .ok_or_else(|| TestFailure::SetUp("task missing".to_string()))?;
        let f = fixture(&mut self.fixture)?;

        f.component.tick(delta_time);
        self.ticks += 1;
        if self.ticks < Self::TICKS {
            return Ok(false);
        }

        f.component.external_cancel(task);
        ai_test_equal!(f.state(task), Some(TaskState::Finished), "cancelled task state");
        ai_test_false!(f.component.should_tick(), "no active ticking task left");
        Ok(true)
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        verify(&self.fixture)
    }
}

#[derive(Default)]
pub struct SelfEnd {
    fixture: Option<Fixture>,
    owner_log: OwnerLog,
}

impl AiTest for SelfEnd {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        let f = Fixture::new(env)?;
        f.log.expect([entry("SelfEnd", Activate), entry("SelfEnd", Ended)]);
        self.owner_log.expect([
            ("SelfEnd".to_string(), OwnerMessage::Initialized),
            ("SelfEnd".to_string(), OwnerMessage::Deactivated),
        ]);
        self.fixture = Some(f);
        Ok(())
    }

    fn instant_test(&mut self) -> Result<(), TestFailure> {
        let owner_log = self.owner_log.clone();
        let f = fixture(&mut self.fixture)?;
        let owner = f.component.add_owner(Box::new(MockOwner::new(&owner_log)));

        let task = f.component.run_task(
            TaskOwnerRef::Owner(owner),
            MockTask::new("SelfEnd", &f.log).instant_finish().boxed(),
            TaskSpec::new("SelfEnd").with_required(f.movement),
        )?;

        ai_test_equal!(f.state(task), Some(TaskState::Finished), "task state");
        ai_test_true!(f.component.priority_queue().is_empty(), "queue is empty");
        check_claims(&f.component)?;
        ai_test_true!(f.component.currently_claimed_resources().is_empty(), "no claims left");
        Ok(())
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        verify(&self.fixture)?;
        self.owner_log.verify()
    }
}

#[derive(Default)]
pub struct SimplePauseResume {
    fixture: Option<Fixture>,
}

impl AiTest for SimplePauseResume {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        let f = Fixture::new(env)?;
        f.log.expect([
            entry("Low", Activate),
            entry("Low", Pause),
            entry("High", Activate),
            entry("High", Ended),
            entry("Low", Resume),
        ]);
        self.fixture = Some(f);
        Ok(())
    }

    fn instant_test(&mut self) -> Result<(), TestFailure> {
        let f = fixture(&mut self.fixture)?;
        let movement = f.movement;

        let low = f.run("Low", TaskSpec::new("Low").with_priority(1).with_required(movement))?;
        ai_test_equal!(f.state(low), Some(TaskState::Active), "low priority task");

        let high = f.run("High", TaskSpec::new("High").with_priority(2).with_required(movement))?;
        ai_test_equal!(f.state(low), Some(TaskState::Paused), "low priority task");
        ai_test_equal!(f.state(high), Some(TaskState::Active), "high priority task");
        check_claims(&f.component)?;

        f.component.end_task(high);
        ai_test_equal!(f.state(low), Some(TaskState::Active), "low priority task");
        check_claims(&f.component)?;
        Ok(())
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        verify(&self.fixture)
    }
}

#[derive(Default)]
pub struct Priorities {
    fixture: Option<Fixture>,
}

impl AiTest for Priorities {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        let f = Fixture::new(env)?;
        f.log.expect([
            entry("A", Activate),
            entry("A", Pause),
            entry("B", Activate),
            entry("B", Pause),
            entry("D", Activate),
            entry("D", Ended),
            entry("B", Resume),
            entry("B", Ended),
            entry("A", Resume),
            entry("A", Ended),
            entry("C", Activate),
        ]);
        self.fixture = Some(f);
        Ok(())
    }

    fn instant_test(&mut self) -> Result<(), TestFailure> {
        let f = fixture(&mut self.fixture)?;
        let movement = f.movement;
        let spec = |name: &str, priority: u8| {
            TaskSpec::new(name).with_priority(priority).with_required(movement)
        };

        let a = f.run("A", spec("A", 1))?;
        // same priority as the running task counts as higher
        let b = f.run("B", spec("B", 1))?;
        ai_test_equal!(f.state(a), Some(TaskState::Paused), "A after B");
        ai_test_equal!(f.state(b), Some(TaskState::Active), "B after B");

        let c = f.run("C", spec("C", 0))?;
        ai_test_equal!(f.state(c), Some(TaskState::AwaitingActivation), "C after C");

        let d = f.run("D", spec("D", 2))?;
        ai_test_equal!(f.component.priority_queue().to_vec(), vec![d, b, a, c], "queue order");
        ai_test_equal!(f.component.top_active_priority(), Some(2), "top priority");
        check_claims(&f.component)?;

        for (ended, next) in [(d, b), (b, a), (a, c)] {
            f.component.end_task(ended);
            ai_test_equal!(f.state(next), Some(TaskState::Active), format!("{} after {} ended", next, ended));
            check_claims(&f.component)?;
        }
        ai_test_equal!(f.component.top_active_priority(), Some(0), "top priority");
        Ok(())
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        verify(&self.fixture)
    }
}

#[derive(Default)]
pub struct ClaimedResources {
    fixture: Option<Fixture>,
}

impl AiTest for ClaimedResources {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        let f = Fixture::new(env)?;
        f.log.expect([
            entry("Task0", Activate),
            entry("Task0", Pause),
            entry("Task1", Activate),
            entry("Task1", Ended),
            entry("Task0", Resume),
        ]);
        self.fixture = Some(f);
        Ok(())
    }

    fn instant_test(&mut self) -> Result<(), TestFailure> {
        let f = fixture(&mut self.fixture)?;
        let (movement, animation) = (f.movement, f.animation);

        let task0 = f.run("Task0", TaskSpec::new("Task0").with_required(movement))?;
        ai_test_equal!(f.component.currently_claimed_resources(), movement, "claims of Task0");

        let task1 = f.run(
            "Task1",
            TaskSpec::new("Task1")
                .with_required(animation)
                .with_claimed(movement.union(animation)),
        )?;
        ai_test_equal!(f.state(task0), Some(TaskState::Paused), "Task0 shadowed by a claim");
        ai_test_equal!(f.state(task1), Some(TaskState::Active), "Task1");
        ai_test_equal!(
            f.component.currently_claimed_resources(),
            movement.union(animation),
            "claims of Task1"
        );
        check_claims(&f.component)?;

        f.component.end_task(task1);
        ai_test_equal!(f.state(task0), Some(TaskState::Active), "Task0 after Task1 ended");
        ai_test_equal!(f.component.currently_claimed_resources(), movement, "claims of Task0");
        Ok(())
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        verify(&self.fixture)
    }
}

#[derive(Default)]
pub struct ClaimedResourcesAndInstantFinish {
    fixture: Option<Fixture>,
}

impl AiTest for ClaimedResourcesAndInstantFinish {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        let f = Fixture::new(env)?;
        f.log.expect([
            entry("Task0", Activate),
            entry("Task0", Pause),
            entry("Instant", Activate),
            entry("Instant", Ended),
            entry("Task0", Resume),
        ]);
        self.fixture = Some(f);
        Ok(())
    }

    fn instant_test(&mut self) -> Result<(), TestFailure> {
        let f = fixture(&mut self.fixture)?;
        let movement = f.movement;

        let task0 = f.run("Task0", TaskSpec::new("Task0").with_required(movement))?;
        let instant = f.component.run_task(
            TaskOwnerRef::Component,
            MockTask::new("Instant", &f.log).instant_finish().boxed(),
            TaskSpec::new("Instant").with_claimed(movement),
        )?;

        ai_test_equal!(f.state(instant), Some(TaskState::Finished), "instant task");
        ai_test_equal!(f.state(task0), Some(TaskState::Active), "Task0");
        ai_test_equal!(f.component.priority_queue().to_vec(), vec![task0], "queue");
        ai_test_equal!(f.component.currently_claimed_resources(), movement, "claims");
        ai_test_equal!(f.component.pending_event_count(), 0, "pending events");
        check_claims(&f.component)?;
        Ok(())
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        verify(&self.fixture)
    }
}

#[derive(Default)]
pub struct EndAllOwnedBy {
    fixture: Option<Fixture>,
    first_log: OwnerLog,
    second_log: OwnerLog,
}

impl AiTest for EndAllOwnedBy {
    fn set_up(&mut self, env: &TestEnv) -> Result<(), TestFailure> {
        let f = Fixture::new(env)?;
        f.log.expect([
            entry("X", Activate),
            entry("X", Ended),
            entry("Y", Ended),
            entry("Z", Activate),
        ]);
        // tasks ended with their owner do not report back to it
        self.first_log.expect([
            ("X".to_string(), OwnerMessage::Initialized),
            ("X".to_string(), OwnerMessage::Activated),
            ("Y".to_string(), OwnerMessage::Initialized),
        ]);
        self.second_log.expect([
            ("Z".to_string(), OwnerMessage::Initialized),
            ("Z".to_string(), OwnerMessage::Activated),
        ]);
        self.fixture = Some(f);
        Ok(())
    }

    fn instant_test(&mut self) -> Result<(), TestFailure> {
        let (first_log, second_log) = (self.first_log.clone(), self.second_log.clone());
        let f = fixture(&mut self.fixture)?;
        let movement = f.movement;
        let first = f.component.add_owner(Box::new(MockOwner::new(&first_log)));
        let second = f.component.add_owner(Box::new(MockOwner::new(&second_log)));

        let mut run = |owner, name: &str, priority: u8| {
            f.component.run_task(
                TaskOwnerRef::Owner(owner),
                MockTask::new(name, &f.log).boxed(),
                TaskSpec::new(name).with_priority(priority).with_required(movement),
            )
        };
        let x = run(first, "X", 5)?;
        let y = run(first, "Y", 4)?;
        let z = run(second, "Z", 3)?;

        f.component.end_all_resource_consuming_tasks_owned_by(TaskOwnerRef::Owner(first));

        ai_test_equal!(f.state(x), Some(TaskState::Finished), "X");
        ai_test_equal!(f.state(y), Some(TaskState::Finished), "Y");
        ai_test_equal!(f.state(z), Some(TaskState::Active), "Z");
        ai_test_equal!(f.component.priority_queue().to_vec(), vec![z], "queue");
        check_claims(&f.component)?;
        Ok(())
    }

    fn tear_down(&mut self) -> Result<(), TestFailure> {
        verify(&self.fixture)?;
        self.first_log.verify()?;
        self.second_log.verify()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::TestRunner;
    use gametask_core::TasksConfig;

    fn run(test: &mut dyn AiTest) {
        let runner = TestRunner::with_defaults().unwrap();
        let report = runner.run("scenario", test);
        assert!(report.passed, "{:?}", report.error);
    }

    #[test]
    fn test_component_state() {
        run(&mut ComponentState::default());
    }

    #[test]
    fn test_priorities() {
        run(&mut Priorities::default());
    }

    #[test]
    fn test_claimed_resources() {
        run(&mut ClaimedResources::default());
    }

    #[test]
    fn test_end_all_owned_by() {
        run(&mut EndAllOwnedBy::default());
    }

    #[test]
    fn test_config_is_used() {
        let env = TestEnv::new(gametask_core::RuntimeConfig::default()).unwrap();
        let f = Fixture::new(&env).unwrap();
        assert_eq!(f.component.config(), &TasksConfig::default());
    }
}
